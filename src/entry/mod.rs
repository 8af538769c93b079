mod lifecycle;
mod model;

pub use lifecycle::{Action, Lifecycle};
pub use model::{Entry, EntryDraft, EntryPatch, Grade, Status};

#[cfg(test)]
pub(crate) use model::sample_entry;
