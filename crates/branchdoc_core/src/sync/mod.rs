//! Snapshot sync engine.
//!
//! Keeps a live CRDT document and its persisted snapshot in step: remote
//! snapshots are imported, local edits are debounced and exported, and the
//! two paths never echo each other.

mod clock;
mod engine;

pub use clock::{Clock, ManualClock, SystemClock};
pub use engine::{ExportCallback, SnapshotSyncEngine, SyncPhase};
