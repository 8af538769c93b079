pub mod client;
pub mod error;
pub mod types;

use std::future::Future;

use crate::entry::{Entry, EntryPatch};

pub use client::FirestoreClient;
pub use error::StoreError;

/// The remote collection contract: documents keyed by entry id.
///
/// Futures are `Send` so scheduled reconciles can run on the runtime.
pub trait EntryStore: Send + Sync {
    /// Every document in the collection, including soft-deleted ones.
    fn get_all(&self) -> impl Future<Output = Result<Vec<Entry>, StoreError>> + Send;

    /// Full replace of the document `id`.
    fn set_by_id(
        &self,
        id: &str,
        entry: &Entry,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Merge `patch` into the existing document `id`.
    fn update_by_id(
        &self,
        id: &str,
        patch: &EntryPatch,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;
}
