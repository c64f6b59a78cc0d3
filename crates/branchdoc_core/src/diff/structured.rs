//! Block-level comparison of two documents.
//!
//! Top-level blocks are compared by position: block `i` on the left is
//! compared with block `i` on the right. Inserting or removing a block in
//! the middle therefore shifts every later comparison and reports those
//! blocks as modified. Text of modified blocks is diffed character by
//! character.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use super::text_diff::{self, TextSpan};
use crate::crdt::{BlockNode, SnapshotDoc};
use crate::error::Result;

/// How one positional block pair compares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export, export_to = "bindings/")]
pub enum NodeStatus {
    /// Only on the right
    Added,
    /// Only on the left
    Deleted,
    /// Same text on both sides
    Unchanged,
    /// Text differs
    Modified,
}

/// Comparison of the blocks at one index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct NodeDiff {
    /// Position in the block sequence
    pub index: usize,
    /// Classification
    pub status: NodeStatus,
    /// Block kind (right side when present, else left)
    pub kind: String,
    /// Left block text, if the left side has a block here
    pub left_text: Option<String>,
    /// Right block text, if the right side has a block here
    pub right_text: Option<String>,
    /// Character-level edits; only filled for modified blocks
    pub spans: Vec<TextSpan>,
}

/// Result of [`diff_structured`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct DiffResult {
    /// One entry per index up to the longer sequence
    pub nodes: Vec<NodeDiff>,
    /// Number of added blocks
    pub additions: usize,
    /// Number of deleted blocks
    pub deletions: usize,
    /// Number of modified blocks
    pub modifications: usize,
}

impl DiffResult {
    /// True when every block is unchanged.
    pub fn is_identical(&self) -> bool {
        self.additions == 0 && self.deletions == 0 && self.modifications == 0
    }
}

/// Plain text of two snapshots, for external diffing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct TextPair {
    /// Text of the left snapshot
    pub left_text: String,
    /// Text of the right snapshot
    pub right_text: String,
}

/// Extract the plain text of two base64 snapshots.
///
/// Each snapshot is imported into a throwaway document; nothing persisted
/// is touched. An empty snapshot reads as empty text.
///
/// # Errors
///
/// Fails if either snapshot is malformed.
pub fn diff_text(left: &str, right: &str) -> Result<TextPair> {
    Ok(TextPair {
        left_text: SnapshotDoc::from_base64(left)?.text(),
        right_text: SnapshotDoc::from_base64(right)?.text(),
    })
}

/// Compare the top-level blocks of two documents by index.
pub fn diff_structured(left: &SnapshotDoc, right: &SnapshotDoc) -> DiffResult {
    diff_blocks(&left.blocks(), &right.blocks())
}

/// [`diff_structured`] over base64 snapshots.
pub fn diff_structured_snapshots(left: &str, right: &str) -> Result<DiffResult> {
    Ok(diff_structured(
        &SnapshotDoc::from_base64(left)?,
        &SnapshotDoc::from_base64(right)?,
    ))
}

fn diff_blocks(left: &[BlockNode], right: &[BlockNode]) -> DiffResult {
    let mut result = DiffResult::default();

    for index in 0..left.len().max(right.len()) {
        let node = match (left.get(index), right.get(index)) {
            (None, Some(added)) => {
                result.additions += 1;
                NodeDiff {
                    index,
                    status: NodeStatus::Added,
                    kind: added.kind.clone(),
                    left_text: None,
                    right_text: Some(added.text.clone()),
                    spans: Vec::new(),
                }
            }
            (Some(deleted), None) => {
                result.deletions += 1;
                NodeDiff {
                    index,
                    status: NodeStatus::Deleted,
                    kind: deleted.kind.clone(),
                    left_text: Some(deleted.text.clone()),
                    right_text: None,
                    spans: Vec::new(),
                }
            }
            (Some(before), Some(after)) => {
                let (status, spans) = if before.text == after.text {
                    (NodeStatus::Unchanged, Vec::new())
                } else {
                    result.modifications += 1;
                    (
                        NodeStatus::Modified,
                        text_diff::diff_spans(&before.text, &after.text),
                    )
                };
                NodeDiff {
                    index,
                    status,
                    kind: after.kind.clone(),
                    left_text: Some(before.text.clone()),
                    right_text: Some(after.text.clone()),
                    spans,
                }
            }
            (None, None) => continue,
        };
        result.nodes.push(node);
    }

    result
}
