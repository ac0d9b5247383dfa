//! Replay of attendance captured while a client was offline.

pub mod queue;

pub use queue::{OfflinePayload, OfflineQueue, QueuedSubmission, Submitter, SyncReport};
