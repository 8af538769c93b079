use thiserror::Error;

use crate::auth::Role;
use crate::entry::Status;
use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum GradeFixError {
    #[error("Sync error: {0}")]
    Sync(#[from] SyncError),

    #[error("{0}")]
    Lifecycle(#[from] LifecycleError),

    #[error("{0}")]
    Auth(#[from] AuthError),

    #[error("Entry not found: {0}")]
    EntryNotFound(String),

    #[error("Import error on line {line}: {reason}")]
    Import { line: usize, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// The only two failure kinds the sync layer distinguishes.
///
/// Both are recovered the same way: fall back to the Local Cache and raise
/// the offline indicator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncError {
    #[error("remote store unavailable: {0}")]
    RemoteUnavailable(String),

    #[error("remote store is not configured (set api_key and project_id)")]
    ConfigMissing,
}

impl From<StoreError> for SyncError {
    fn from(err: StoreError) -> Self {
        SyncError::RemoteUnavailable(err.to_string())
    }
}

/// Rejections from the entry lifecycle. None of them cause a write.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LifecycleError {
    #[error("a new grade is required to mark an entry as resolved")]
    MissingNewGrade,

    #[error("cannot move an entry from {from} to {to}")]
    InvalidTransition { from: Status, to: Status },

    #[error("deletion was not confirmed")]
    NotConfirmed,

    #[error("{role} accounts may not move entries to {to}")]
    NotPermitted { role: Role, to: Status },

    #[error("missing required field: {0}")]
    IncompleteDraft(&'static str),

    #[error("'{0}' is not a valid new grade (use 1, 1.5, 2, 2.5, 3, 3.5 or 4)")]
    InvalidNewGrade(String),

    #[error("{role} accounts may not edit this {status} entry")]
    NotEditable { role: Role, status: Status },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("invalid username or password")]
    InvalidCredentials,

    #[error("current password is incorrect")]
    WrongOldPassword,

    #[error("new password must be at least {min} characters")]
    PasswordTooShort { min: usize },

    #[error("new password and confirmation do not match")]
    PasswordMismatch,
}
