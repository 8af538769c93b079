use chrono::{DateTime, NaiveDate, Utc};

use super::model::{Entry, EntryDraft, EntryPatch, Status};
use crate::auth::{Role, User};
use crate::error::LifecycleError;

/// Grades a remediated student can end up with.
pub const NEW_GRADES: [&str; 7] = ["1", "1.5", "2", "2.5", "3", "3.5", "4"];

/// A status change requested by a user.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// The filing teacher reports the remediation outcome.
    Resolve {
        new_grade: String,
        resolved_date: NaiveDate,
        note: Option<String>,
    },
    /// Academic affairs acknowledges the result into the official system.
    Record,
    /// Soft delete. Must be confirmed by the user first.
    Delete { confirmed: bool },
}

impl Action {
    pub fn target(&self) -> Status {
        match self {
            Action::Resolve { .. } => Status::TeacherResolved,
            Action::Record => Status::AdminRecorded,
            Action::Delete { .. } => Status::Deleted,
        }
    }
}

/// Transition rules for remediation entries.
///
/// ```text
/// PENDING ──resolve──▶ RESOLVED ──record──▶ RECORDED
///    │                    │
///    └──────delete────────┴──▶ DELETED
/// ```
pub struct Lifecycle;

impl Lifecycle {
    /// Builds a new PENDING entry from a teacher's draft.
    pub fn file(
        id: String,
        draft: EntryDraft,
        now: DateTime<Utc>,
    ) -> Result<Entry, LifecycleError> {
        let required = [
            ("teacherName", &draft.teacher_name),
            ("studentId", &draft.student_id),
            ("studentName", &draft.student_name),
            ("subject", &draft.subject),
            ("term", &draft.term),
            ("academicYear", &draft.academic_year),
        ];
        if let Some((field, _)) = required.iter().find(|(_, v)| v.trim().is_empty()) {
            return Err(LifecycleError::IncompleteDraft(*field));
        }

        Ok(Entry {
            id,
            timestamp: now,
            teacher_name: draft.teacher_name.trim().to_string(),
            student_id: draft.student_id.trim().to_string(),
            student_name: draft.student_name.trim().to_string(),
            subject: draft.subject.trim().to_string(),
            subject_code: draft.subject_code.trim().to_string(),
            grade: draft.grade,
            term: draft.term.trim().to_string(),
            academic_year: draft.academic_year.trim().to_string(),
            status: Status::Pending,
            resolved_date: None,
            new_grade: None,
            note: None,
        })
    }

    /// Whether the graph has an edge `from → to`.
    pub fn can_transition(from: Status, to: Status) -> bool {
        matches!(
            (from, to),
            (Status::Pending, Status::TeacherResolved)
                | (Status::TeacherResolved, Status::AdminRecorded)
                | (Status::Pending | Status::TeacherResolved, Status::Deleted)
        )
    }

    /// Computes the partial update that performs `action` on `entry`.
    ///
    /// Nothing is mutated here; on error the caller must not write anything.
    pub fn plan(entry: &Entry, action: &Action) -> Result<EntryPatch, LifecycleError> {
        let to = action.target();
        if !Self::can_transition(entry.status, to) {
            return Err(LifecycleError::InvalidTransition {
                from: entry.status,
                to,
            });
        }

        match action {
            Action::Resolve {
                new_grade,
                resolved_date,
                note,
            } => {
                let new_grade = new_grade.trim();
                if new_grade.is_empty() {
                    return Err(LifecycleError::MissingNewGrade);
                }
                if !NEW_GRADES.contains(&new_grade) {
                    return Err(LifecycleError::InvalidNewGrade(new_grade.to_string()));
                }
                Ok(EntryPatch {
                    status: Some(to),
                    new_grade: Some(new_grade.to_string()),
                    resolved_date: Some(*resolved_date),
                    note: note.clone(),
                    ..Default::default()
                })
            }
            Action::Record => Ok(EntryPatch::status(to)),
            Action::Delete { confirmed } => {
                if !confirmed {
                    return Err(LifecycleError::NotConfirmed);
                }
                Ok(EntryPatch::status(to))
            }
        }
    }

    /// Session-level gating: teachers act on their own entries, admins record.
    ///
    /// This is the only authority check in the system; the store accepts any write.
    pub fn permits(user: &User, entry: &Entry, action: &Action) -> bool {
        match (user.role, action) {
            (Role::Teacher, Action::Resolve { .. } | Action::Delete { .. }) => {
                entry.teacher_name == user.name
            }
            (Role::Admin, Action::Record) => true,
            _ => false,
        }
    }

    /// Descriptive edits belong to the filing teacher while the entry is PENDING.
    pub fn can_edit(user: &User, entry: &Entry) -> bool {
        user.role == Role::Teacher
            && entry.teacher_name == user.name
            && entry.status == Status::Pending
    }

    pub fn authorize_edit(user: &User, entry: &Entry) -> Result<(), LifecycleError> {
        if Self::can_edit(user, entry) {
            Ok(())
        } else {
            Err(LifecycleError::NotEditable {
                role: user.role,
                status: entry.status,
            })
        }
    }

    /// Like [`Lifecycle::permits`] but as a `Result`, then plans the patch.
    pub fn authorize_and_plan(
        user: &User,
        entry: &Entry,
        action: &Action,
    ) -> Result<EntryPatch, LifecycleError> {
        if !Self::permits(user, entry, action) {
            return Err(LifecycleError::NotPermitted {
                role: user.role,
                to: action.target(),
            });
        }
        Self::plan(entry, action)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::model::{Grade, sample_entry};

    fn teacher() -> User {
        User {
            username: "t1".into(),
            name: "ครูรหัส t1".into(),
            role: Role::Teacher,
        }
    }

    fn admin() -> User {
        User {
            username: "t28".into(),
            name: "สาวจิราภรณ์ มูลี".into(),
            role: Role::Admin,
        }
    }

    fn resolve(new_grade: &str) -> Action {
        Action::Resolve {
            new_grade: new_grade.into(),
            resolved_date: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            note: None,
        }
    }

    fn draft() -> EntryDraft {
        EntryDraft {
            teacher_name: "ครูรหัส t1".into(),
            student_id: " 12345 ".into(),
            student_name: "เด็กหญิงมาลี".into(),
            subject: "วิทยาศาสตร์".into(),
            subject_code: "ว21101".into(),
            grade: Grade::Withheld,
            term: "2".into(),
            academic_year: "2566".into(),
        }
    }

    #[test]
    fn filing_creates_pending_entry() {
        let now = Utc::now();
        let entry = Lifecycle::file("42".into(), draft(), now).unwrap();
        assert_eq!(entry.status, Status::Pending);
        assert_eq!(entry.student_id, "12345");
        assert_eq!(entry.timestamp, now);
        assert!(entry.new_grade.is_none());
        assert!(entry.resolved_date.is_none());
    }

    #[test]
    fn filing_rejects_blank_student_name() {
        let mut d = draft();
        d.student_name = "  ".into();
        let err = Lifecycle::file("42".into(), d, Utc::now()).unwrap_err();
        assert_eq!(err, LifecycleError::IncompleteDraft("studentName"));
    }

    #[test]
    fn resolve_then_record_walks_the_happy_path() {
        let mut entry = sample_entry("1", "2024-05-01T00:00:00Z");

        let patch = Lifecycle::plan(&entry, &resolve("2")).unwrap();
        patch.apply_to(&mut entry);
        assert_eq!(entry.status, Status::TeacherResolved);
        assert_eq!(entry.new_grade.as_deref(), Some("2"));
        assert_eq!(entry.resolved_date, NaiveDate::from_ymd_opt(2024, 6, 1));

        let before = entry.clone();
        let patch = Lifecycle::plan(&entry, &Action::Record).unwrap();
        assert_eq!(patch, EntryPatch::status(Status::AdminRecorded));
        patch.apply_to(&mut entry);
        assert_eq!(entry.status, Status::AdminRecorded);
        assert_eq!(entry.new_grade, before.new_grade);
        assert_eq!(entry.resolved_date, before.resolved_date);
        assert_eq!(entry.note, before.note);
    }

    #[test]
    fn resolve_without_new_grade_is_rejected() {
        let entry = sample_entry("1", "2024-05-01T00:00:00Z");
        assert_eq!(
            Lifecycle::plan(&entry, &resolve("  ")),
            Err(LifecycleError::MissingNewGrade)
        );
    }

    #[test]
    fn resolve_accepts_only_listed_grades() {
        let entry = sample_entry("1", "2024-05-01T00:00:00Z");
        for grade in NEW_GRADES {
            assert!(Lifecycle::plan(&entry, &resolve(grade)).is_ok());
        }
        assert_eq!(
            Lifecycle::plan(&entry, &resolve("5")),
            Err(LifecycleError::InvalidNewGrade("5".into()))
        );
        assert!(matches!(
            Lifecycle::plan(&entry, &resolve("A")),
            Err(LifecycleError::InvalidNewGrade(_))
        ));
    }

    #[test]
    fn only_the_filing_teacher_edits_pending_entries() {
        let mut entry = sample_entry("1", "2024-05-01T00:00:00Z");
        assert!(Lifecycle::can_edit(&teacher(), &entry));
        assert_eq!(
            Lifecycle::authorize_edit(&admin(), &entry),
            Err(LifecycleError::NotEditable {
                role: Role::Admin,
                status: Status::Pending,
            })
        );

        let mut other = entry.clone();
        other.teacher_name = "someone else".into();
        assert!(!Lifecycle::can_edit(&teacher(), &other));

        for status in [Status::TeacherResolved, Status::AdminRecorded] {
            entry.status = status;
            assert!(!Lifecycle::can_edit(&teacher(), &entry));
        }
    }

    #[test]
    fn record_requires_teacher_resolution_first() {
        let entry = sample_entry("1", "2024-05-01T00:00:00Z");
        assert_eq!(
            Lifecycle::plan(&entry, &Action::Record),
            Err(LifecycleError::InvalidTransition {
                from: Status::Pending,
                to: Status::AdminRecorded,
            })
        );
    }

    #[test]
    fn recorded_entries_cannot_be_deleted() {
        let mut entry = sample_entry("1", "2024-05-01T00:00:00Z");
        entry.status = Status::AdminRecorded;
        assert!(matches!(
            Lifecycle::plan(&entry, &Action::Delete { confirmed: true }),
            Err(LifecycleError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn delete_requires_confirmation() {
        let entry = sample_entry("1", "2024-05-01T00:00:00Z");
        assert_eq!(
            Lifecycle::plan(&entry, &Action::Delete { confirmed: false }),
            Err(LifecycleError::NotConfirmed)
        );
        let patch = Lifecycle::plan(&entry, &Action::Delete { confirmed: true }).unwrap();
        assert!(patch.is_deletion());
    }

    #[test]
    fn status_never_regresses() {
        let all = [
            Status::Pending,
            Status::TeacherResolved,
            Status::AdminRecorded,
            Status::Deleted,
        ];
        for from in all {
            for to in all {
                if Lifecycle::can_transition(from, to) {
                    assert_ne!(from, Status::Deleted);
                    assert_ne!(from, Status::AdminRecorded);
                    assert_ne!(to, Status::Pending);
                }
            }
        }
    }

    #[test]
    fn teachers_act_only_on_their_own_entries() {
        let entry = sample_entry("1", "2024-05-01T00:00:00Z");
        assert!(Lifecycle::permits(&teacher(), &entry, &resolve("2")));

        let mut other = entry.clone();
        other.teacher_name = "someone else".into();
        assert!(!Lifecycle::permits(&teacher(), &other, &resolve("2")));
        assert!(!Lifecycle::permits(&teacher(), &entry, &Action::Record));
    }

    #[test]
    fn admins_only_record() {
        let entry = sample_entry("1", "2024-05-01T00:00:00Z");
        assert!(Lifecycle::permits(&admin(), &entry, &Action::Record));
        assert!(!Lifecycle::permits(&admin(), &entry, &resolve("2")));
        assert!(matches!(
            Lifecycle::authorize_and_plan(&admin(), &entry, &Action::Delete { confirmed: true }),
            Err(LifecycleError::NotPermitted { .. })
        ));
    }
}
