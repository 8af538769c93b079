//! List filtering, dashboard statistics, CSV export and tabular import.

use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, Offset, Utc};
use serde::Serialize;

use crate::auth::{Role, User};
use crate::entry::{Entry, EntryDraft, Grade, Status};
use crate::error::GradeFixError;

/// Bangkok is UTC+7 with no daylight saving.
const THAI_OFFSET_SECS: i32 = 7 * 3600;
const BUDDHIST_ERA_OFFSET: i32 = 543;

const CSV_HEADERS: [&str; 13] = [
    "Timestamp",
    "ชื่อครูผู้สอน",
    "รหัสนักเรียน",
    "ชื่อ-สกุลนักเรียน",
    "วิชา",
    "รหัสวิชา",
    "ผลการเรียนเดิม",
    "ภาคเรียน",
    "ปีการศึกษา",
    "วันที่แก้",
    "เกรดใหม่",
    "สถานะ",
    "หมายเหตุ",
];

/// Criteria for the entry list view.
#[derive(Debug, Clone, Default)]
pub struct ListFilter {
    /// Substring matched against student name, student id and subject.
    pub search: Option<String>,
    pub status: Option<Status>,
}

impl ListFilter {
    fn matches(&self, entry: &Entry) -> bool {
        let search_ok = match self.search.as_deref().map(str::trim) {
            None | Some("") => true,
            Some(term) => {
                entry.student_name.contains(term)
                    || entry.student_id.contains(term)
                    || entry.subject.contains(term)
            }
        };
        let status_ok = self.status.is_none_or(|s| entry.status == s);
        search_ok && status_ok
    }
}

/// Whether `user` sees `entry` in the list at all.
///
/// Admins work the queue of entries teachers have resolved; teachers see
/// only what they filed.
pub fn visible_to(user: &User, entry: &Entry) -> bool {
    match user.role {
        Role::Admin => entry.status != Status::Pending,
        Role::Teacher => entry.teacher_name == user.name,
    }
}

pub fn filter_entries<'a>(entries: &'a [Entry], user: &User, filter: &ListFilter) -> Vec<&'a Entry> {
    entries
        .iter()
        .filter(|e| visible_to(user, e) && filter.matches(e))
        .collect()
}

/// Dashboard scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Scope {
    #[default]
    All,
    Mine,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GradeDistribution {
    pub zero: usize,
    pub withheld: usize,
    pub incomplete: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Stats {
    pub total: usize,
    pub pending: usize,
    pub resolved: usize,
    pub recorded: usize,
    pub grades: GradeDistribution,
}

impl Stats {
    pub fn compute(entries: &[Entry], scope: Scope, user: &User) -> Self {
        let mut stats = Stats::default();
        let scoped = entries
            .iter()
            .filter(|e| scope == Scope::All || e.teacher_name == user.name);

        for entry in scoped {
            stats.total += 1;
            match entry.status {
                Status::Pending => stats.pending += 1,
                Status::TeacherResolved => stats.resolved += 1,
                Status::AdminRecorded => stats.recorded += 1,
                Status::Deleted => {}
            }
            match entry.grade {
                Grade::Zero => stats.grades.zero += 1,
                Grade::Withheld => stats.grades.withheld += 1,
                Grade::Incomplete => stats.grades.incomplete += 1,
            }
        }
        stats
    }
}

fn bangkok() -> FixedOffset {
    FixedOffset::east_opt(THAI_OFFSET_SECS).unwrap_or_else(|| Utc.fix())
}

/// `d/m/yyyy HH:MM:SS` in Bangkok time with a Buddhist-era year.
pub fn thai_datetime(ts: DateTime<Utc>) -> String {
    let local = ts.with_timezone(&bangkok());
    format!(
        "{}/{}/{} {}",
        local.day(),
        local.month(),
        local.year() + BUDDHIST_ERA_OFFSET,
        local.format("%H:%M:%S"),
    )
}

/// `d/m/yyyy` with a Buddhist-era year.
pub fn thai_date(date: NaiveDate) -> String {
    format!(
        "{}/{}/{}",
        date.day(),
        date.month(),
        date.year() + BUDDHIST_ERA_OFFSET
    )
}

fn quote(cell: &str) -> String {
    format!("\"{}\"", cell.replace('"', "\"\""))
}

/// Renders entries as CSV with a UTF-8 BOM so spreadsheet apps detect Thai text.
pub fn export_csv<'a>(entries: impl IntoIterator<Item = &'a Entry>) -> String {
    let mut out = String::from("\u{FEFF}");
    out.push_str(&CSV_HEADERS.join(","));

    for entry in entries {
        let dash = |v: &Option<String>| v.clone().filter(|s| !s.is_empty()).unwrap_or_else(|| "-".into());
        let row = [
            thai_datetime(entry.timestamp),
            entry.teacher_name.clone(),
            entry.student_id.clone(),
            entry.student_name.clone(),
            entry.subject.clone(),
            entry.subject_code.clone(),
            entry.grade.to_string(),
            entry.term.clone(),
            entry.academic_year.clone(),
            entry.resolved_date.map(thai_date).unwrap_or_else(|| "-".into()),
            dash(&entry.new_grade),
            entry.status.to_string(),
            dash(&entry.note),
        ];
        out.push('\n');
        out.push_str(&row.iter().map(|c| quote(c)).collect::<Vec<_>>().join(","));
    }
    out
}

pub fn default_export_name(today: NaiveDate) -> String {
    format!("grade_fix_data_{}.csv", today.format("%Y-%m-%d"))
}

fn lenient_grade(cell: &str) -> Grade {
    if cell.contains('0') {
        Grade::Zero
    } else if cell.contains("มส") {
        Grade::Incomplete
    } else if cell.contains('ร') {
        Grade::Withheld
    } else {
        Grade::Zero
    }
}

/// Splits one delimited line, honouring double-quoted cells.
fn split_row(line: &str, delim: char) -> Vec<String> {
    let mut cells = Vec::new();
    let mut cell = String::new();
    let mut quoted = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if quoted && chars.peek() == Some(&'"') => {
                cell.push('"');
                chars.next();
            }
            '"' => quoted = !quoted,
            c if c == delim && !quoted => cells.push(std::mem::take(&mut cell)),
            c => cell.push(c),
        }
    }
    cells.push(cell);
    cells.into_iter().map(|c| c.trim().to_string()).collect()
}

/// Parses the import template: a header row, then
/// `no, student id, name, subject, subject code, grade, term, year`.
///
/// Tab-separated when the header contains a tab, comma-separated otherwise.
/// Short rows and rows with neither id nor name are skipped.
pub fn parse_import(text: &str, teacher_name: &str) -> Result<Vec<EntryDraft>, GradeFixError> {
    let text = text.trim_start_matches('\u{FEFF}');
    let mut lines = text.lines();
    let Some(header) = lines.next() else {
        return Err(GradeFixError::Import {
            line: 1,
            reason: "file is empty".into(),
        });
    };
    let delim = if header.contains('\t') { '\t' } else { ',' };

    let mut drafts = Vec::new();
    for line in lines {
        let cells = split_row(line, delim);
        if cells.len() < 8 {
            continue;
        }
        if cells[1].is_empty() && cells[2].is_empty() {
            continue;
        }
        drafts.push(EntryDraft {
            teacher_name: teacher_name.to_string(),
            student_id: cells[1].clone(),
            student_name: cells[2].clone(),
            subject: cells[3].clone(),
            subject_code: cells[4].clone(),
            grade: lenient_grade(&cells[5]),
            term: cells[6].clone(),
            academic_year: cells[7].clone(),
        });
    }

    if drafts.is_empty() {
        return Err(GradeFixError::Import {
            line: text.lines().count(),
            reason: "no student rows found".into(),
        });
    }
    Ok(drafts)
}
