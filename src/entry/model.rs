use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// The failing grade a student was originally given.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Grade {
    #[serde(rename = "0")]
    Zero,
    /// ร: result withheld.
    #[serde(rename = "ร")]
    Withheld,
    /// มส: not eligible to sit the final (incomplete).
    #[serde(rename = "มส")]
    Incomplete,
}

impl Grade {
    pub const ALL: [Grade; 3] = [Grade::Zero, Grade::Withheld, Grade::Incomplete];

    pub fn as_str(&self) -> &'static str {
        match self {
            Grade::Zero => "0",
            Grade::Withheld => "ร",
            Grade::Incomplete => "มส",
        }
    }

    /// Parses the wire value. Surrounding whitespace is ignored.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        Self::ALL.into_iter().find(|g| g.as_str() == s)
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Remediation status of an entry.
///
/// Flows PENDING → RESOLVED → RECORDED, with DELETED as a soft-delete
/// marker reachable from any state that has not been recorded yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Status {
    #[serde(rename = "PENDING")]
    Pending,
    #[serde(rename = "RESOLVED")]
    TeacherResolved,
    #[serde(rename = "RECORDED")]
    AdminRecorded,
    #[serde(rename = "DELETED")]
    Deleted,
}

impl Status {
    /// Value stored in the remote document.
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Pending => "PENDING",
            Status::TeacherResolved => "RESOLVED",
            Status::AdminRecorded => "RECORDED",
            Status::Deleted => "DELETED",
        }
    }

    /// Human-readable label shown in tables.
    pub fn label(&self) -> &'static str {
        match self {
            Status::Pending => "รอแก้ไข",
            Status::TeacherResolved => "ดำเนินการแก้แล้ว",
            Status::AdminRecorded => "บันทึกเข้าระบบแล้ว",
            Status::Deleted => "ถูกลบ",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One student's failing-grade remediation record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entry {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub teacher_name: String,
    pub student_id: String,
    pub student_name: String,
    pub subject: String,
    pub subject_code: String,
    pub grade: Grade,
    pub term: String,
    pub academic_year: String,
    pub status: Status,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_grade: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// Fields a teacher supplies when filing a failing grade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryDraft {
    pub teacher_name: String,
    pub student_id: String,
    pub student_name: String,
    pub subject: String,
    pub subject_code: String,
    pub grade: Grade,
    pub term: String,
    pub academic_year: String,
}

/// A partial update. Only `Some` fields are written, both locally and remotely.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub student_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub student_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grade: Option<Grade>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub term: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub academic_year: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<Status>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_grade: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl EntryPatch {
    pub fn status(status: Status) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    /// True when this patch soft-deletes the entry.
    pub fn is_deletion(&self) -> bool {
        self.status == Some(Status::Deleted)
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Merges the patch into `entry`, leaving unset fields untouched.
    pub fn apply_to(&self, entry: &mut Entry) {
        fn merge<T: Clone>(slot: &mut T, value: &Option<T>) {
            if let Some(v) = value {
                *slot = v.clone();
            }
        }
        fn merge_opt<T: Clone>(slot: &mut Option<T>, value: &Option<T>) {
            if value.is_some() {
                *slot = value.clone();
            }
        }

        merge(&mut entry.student_id, &self.student_id);
        merge(&mut entry.student_name, &self.student_name);
        merge(&mut entry.subject, &self.subject);
        merge(&mut entry.subject_code, &self.subject_code);
        merge(&mut entry.grade, &self.grade);
        merge(&mut entry.term, &self.term);
        merge(&mut entry.academic_year, &self.academic_year);
        merge(&mut entry.status, &self.status);
        merge_opt(&mut entry.resolved_date, &self.resolved_date);
        merge_opt(&mut entry.new_grade, &self.new_grade);
        merge_opt(&mut entry.note, &self.note);
    }
}

#[cfg(test)]
pub(crate) fn sample_entry(id: &str, timestamp: &str) -> Entry {
    Entry {
        id: id.to_string(),
        timestamp: timestamp.parse().unwrap(),
        teacher_name: "ครูรหัส t1".into(),
        student_id: "12345".into(),
        student_name: "เด็กชายสมชาย ใจดี".into(),
        subject: "คณิตศาสตร์".into(),
        subject_code: "ค21101".into(),
        grade: Grade::Zero,
        term: "1".into(),
        academic_year: "2566".into(),
        status: Status::Pending,
        resolved_date: None,
        new_grade: None,
        note: None,
    }
}
