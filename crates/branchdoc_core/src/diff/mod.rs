//! Diff and merge over snapshots.
//!
//! - [`merge`]: combine two branch snapshots by CRDT convergence
//! - [`text_diff`]: character-level LCS diff with semantic cleanup
//! - [`structured`]: positional block comparison and plain-text extraction

pub mod merge;
pub mod structured;
pub mod text_diff;

pub use merge::{merge_base64, merge_snapshots};
pub use structured::{
    DiffResult, NodeDiff, NodeStatus, TextPair, diff_structured, diff_structured_snapshots,
    diff_text,
};
pub use text_diff::{DiffOp, DiffOpKind, SpanKind, TextSpan, diff_chars, diff_spans};
