//! Checkpoint store: completed chunk translations that survive restarts.

mod store;
mod types;

pub use store::CheckpointStore;
pub use types::{CheckpointEntry, fingerprint};
