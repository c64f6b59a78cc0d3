//! Branch metadata store.
//!
//! The persisted side of branching: a map of branch name to snapshot, the
//! active-branch pointer and a capped list of recent snapshots, stored in a
//! document row's `metadata` JSON. Every function in [`metadata`] and
//! [`names`] is pure.

pub mod metadata;
pub mod names;
mod types;

pub use metadata::{
    add_recent_snapshot, add_recent_snapshot_default, create_branch, delete_branch,
    get_active_branch, get_branch_snapshot, get_branches_metadata, initialize_branches,
    list_branches, read_branches_metadata, rename_branch, set_active_branch, update_branch_snapshot,
};
pub use names::{MAX_BRANCH_NAME_LEN, generate_unique_branch_name, sanitize_branch_name};
pub use types::{Branch, BranchesMetadata, MAIN_BRANCH, RecentSnapshot};
