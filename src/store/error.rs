//! Error types for the remote document store.
//!
//! [`StoreError`] covers HTTP-level failures and documents that do not match
//! the entry schema. The sync layer folds every variant into
//! `SyncError::RemoteUnavailable`.

use thiserror::Error;

/// Errors raised while talking to the remote collection.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Non-success HTTP status (401 bad key, 403 rules, 404 missing document, 5xx).
    #[error("API error (status {status}): {message}")]
    ApiError { status: u16, message: String },

    /// DNS, connection refused, timeout, or a body that failed to decode.
    #[error("network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),
}

/// A remote document that cannot be mapped to or from an entry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("document {document}: {reason}")]
    Invalid { document: String, reason: String },

    #[error("field {field}: unsupported value type {kind}")]
    UnsupportedValue { field: String, kind: String },

    #[error("record did not serialize to an object")]
    NotAnObject,
}
