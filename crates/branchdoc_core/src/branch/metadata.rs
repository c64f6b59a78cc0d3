//! Pure transformations over [`BranchesMetadata`].
//!
//! Nothing here performs I/O or mutates its input: every function takes the
//! current metadata (or `None` when the row has not been migrated to
//! branching yet) and returns the next value. Callers doing
//! read-modify-write against the row store treat the return value as the
//! definitive next state.
//!
//! Missing metadata, missing branches and dangling pointers are normal
//! inputs with documented fallbacks, never errors.

use serde::Deserialize;

use super::types::{Branch, BranchesMetadata, MAIN_BRANCH, RecentSnapshot};
use crate::config::DEFAULT_MAX_RECENT_SNAPSHOTS;
use crate::error::Result;
use crate::store::DocumentRow;

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

fn or_initialized(metadata: Option<&BranchesMetadata>) -> BranchesMetadata {
    metadata
        .cloned()
        .unwrap_or_else(|| initialize_branches(None))
}

/// Wrap the current snapshot (if any) as the "main" branch.
pub fn initialize_branches(current_snapshot: Option<&str>) -> BranchesMetadata {
    let mut metadata = BranchesMetadata::default();
    metadata.branches.insert(
        MAIN_BRANCH.to_string(),
        Branch::new(current_snapshot.unwrap_or_default().to_string()),
    );
    metadata.active_branch = Some(MAIN_BRANCH.to_string());
    metadata
}

/// Parse the branch metadata of a row.
///
/// Returns `Ok(None)` when the row has no metadata, or its metadata has no
/// `branches` key (not yet migrated to branching).
///
/// # Errors
///
/// Fails with [`crate::BranchDocError::Json`] when a `branches` key is present but
/// does not parse. Writers must not treat that as unmigrated.
pub fn read_branches_metadata(row: &DocumentRow) -> Result<Option<BranchesMetadata>> {
    let Some(value) = row.metadata.as_ref() else {
        return Ok(None);
    };
    if value.get("branches").is_none() {
        return Ok(None);
    }
    Ok(Some(BranchesMetadata::deserialize(value)?))
}

/// Read the branch metadata of a row.
///
/// Returns `None` when the row is not migrated. Metadata that cannot be
/// parsed is logged and also reads as `None`; see [`read_branches_metadata`]
/// for writers.
pub fn get_branches_metadata(row: &DocumentRow) -> Option<BranchesMetadata> {
    read_branches_metadata(row).unwrap_or_else(|e| {
        log::warn!(
            "[BranchMetadata] ignoring unreadable branch metadata on {}: {}",
            row.path,
            e
        );
        None
    })
}

/// Persisted snapshot of a branch, or `None` if there is no metadata or no
/// such branch.
pub fn get_branch_snapshot(row: &DocumentRow, branch_name: &str) -> Option<String> {
    get_branches_metadata(row)?
        .branches
        .get(branch_name)
        .map(|branch| branch.snapshot.clone())
}

/// Branch names of a row; a row without metadata implicitly has "main".
pub fn list_branches(row: &DocumentRow) -> Vec<String> {
    match get_branches_metadata(row) {
        Some(metadata) => metadata.branch_names(),
        None => vec![MAIN_BRANCH.to_string()],
    }
}

/// Active branch of a row, or "main" when unset or not migrated.
pub fn get_active_branch(row: &DocumentRow) -> String {
    get_branches_metadata(row)
        .and_then(|metadata| metadata.active_branch)
        .unwrap_or_else(|| MAIN_BRANCH.to_string())
}

/// Add `new_name` as a copy of `source_name`'s snapshot.
///
/// A missing source yields an empty snapshot. An existing branch named
/// `new_name` is left untouched; choosing a free name is the caller's job.
pub fn create_branch(
    metadata: Option<&BranchesMetadata>,
    new_name: &str,
    source_name: &str,
) -> BranchesMetadata {
    let mut next = or_initialized(metadata);
    if next.contains(new_name) {
        return next;
    }

    let snapshot = next
        .branch(source_name)
        .map(|branch| branch.snapshot.clone())
        .unwrap_or_default();
    next.branches
        .insert(new_name.to_string(), Branch::new(snapshot));
    next
}

/// Set a branch's snapshot, creating the branch if it does not exist.
pub fn update_branch_snapshot(
    metadata: Option<&BranchesMetadata>,
    name: &str,
    snapshot: &str,
) -> BranchesMetadata {
    let mut next = or_initialized(metadata);
    match next.branches.get_mut(name) {
        Some(branch) => {
            branch.snapshot = snapshot.to_string();
            branch.updated_at = now_ms();
        }
        None => {
            next.branches
                .insert(name.to_string(), Branch::new(snapshot.to_string()));
        }
    }
    next
}

/// Point the active branch at `name`. The name is not validated.
pub fn set_active_branch(metadata: Option<&BranchesMetadata>, name: &str) -> BranchesMetadata {
    let mut next = or_initialized(metadata);
    next.active_branch = Some(name.to_string());
    next
}

/// Remove a branch. "main" is never removed.
///
/// Returns the input unchanged when there is no metadata or `name` is
/// "main". Deleting the active branch moves the pointer back to "main".
pub fn delete_branch(
    metadata: Option<&BranchesMetadata>,
    name: &str,
) -> Option<BranchesMetadata> {
    let metadata = metadata?;
    if name == MAIN_BRANCH {
        return Some(metadata.clone());
    }

    let mut next = metadata.clone();
    next.branches.shift_remove(name);
    if next.active_branch.as_deref() == Some(name) {
        next.active_branch = Some(MAIN_BRANCH.to_string());
    }
    Some(next)
}

/// Move `old_name`'s entry to `new_name`, keeping its snapshot, timestamps
/// and position. The active pointer follows the rename.
///
/// Returns the input unchanged when `old_name` is missing or `new_name` is
/// already taken.
pub fn rename_branch(
    metadata: &BranchesMetadata,
    old_name: &str,
    new_name: &str,
) -> BranchesMetadata {
    if old_name == new_name || !metadata.contains(old_name) || metadata.contains(new_name) {
        return metadata.clone();
    }

    let mut next = metadata.clone();
    next.branches = metadata
        .branches
        .iter()
        .map(|(name, branch)| {
            let name = if name == old_name { new_name } else { name };
            (name.to_string(), branch.clone())
        })
        .collect();
    if next.active_branch.as_deref() == Some(old_name) {
        next.active_branch = Some(new_name.to_string());
    }
    next
}

/// Prepend a snapshot to `recentSnapshots`, keeping at most `max_snapshots`.
pub fn add_recent_snapshot(
    metadata: Option<&BranchesMetadata>,
    branch_name: &str,
    snapshot: &str,
    max_snapshots: usize,
) -> BranchesMetadata {
    let mut next = or_initialized(metadata);
    next.recent_snapshots.insert(
        0,
        RecentSnapshot {
            snapshot: snapshot.to_string(),
            timestamp: now_ms(),
            branch_name: branch_name.to_string(),
        },
    );
    next.recent_snapshots.truncate(max_snapshots);
    next
}

/// [`add_recent_snapshot`] with the default cap of 20.
pub fn add_recent_snapshot_default(
    metadata: Option<&BranchesMetadata>,
    branch_name: &str,
    snapshot: &str,
) -> BranchesMetadata {
    add_recent_snapshot(metadata, branch_name, snapshot, DEFAULT_MAX_RECENT_SNAPSHOTS)
}
