//! Test utilities for branchdoc_core
//!
//! Fixture builders shared by the unit tests: snapshots with known text and
//! rows carrying branch metadata.

use crate::branch::{BranchesMetadata, MAIN_BRANCH, update_branch_snapshot};
use crate::crdt::SnapshotDoc;
use crate::store::DocumentRow;

/// Base64 snapshot of a document whose text is `text`.
pub fn snapshot_of(text: &str) -> String {
    let doc = SnapshotDoc::new();
    doc.set_text(text);
    doc.export_base64()
}

/// A base snapshot and a fork of it with `addition` appended.
///
/// Both share history, so merging them keeps the addition.
pub fn forked_snapshots(base: &str, addition: &str) -> (String, String) {
    let origin = SnapshotDoc::new();
    origin.set_text(base);
    let base_snapshot = origin.export_base64();

    let fork = SnapshotDoc::from_base64(&base_snapshot).unwrap();
    fork.insert_text(fork.text_len(), addition);
    (base_snapshot, fork.export_base64())
}

/// Branch metadata with the given (name, snapshot) pairs, in order.
pub fn metadata_with(branches: &[(&str, &str)], active: Option<&str>) -> BranchesMetadata {
    let mut metadata = BranchesMetadata::default();
    for (name, snapshot) in branches {
        metadata = update_branch_snapshot(Some(&metadata), name, snapshot);
    }
    metadata.active_branch = Some(active.unwrap_or(MAIN_BRANCH).to_string());
    metadata
}

/// Row 1 at "notes/a.md" carrying the given branches.
pub fn branched_row(branches: &[(&str, &str)], active: Option<&str>) -> DocumentRow {
    let mut row = DocumentRow::new(Some(1), "notes/a.md");
    row.set_branches_metadata(&metadata_with(branches, active))
        .unwrap();
    row
}
