//! Character-level text diff.
//!
//! Longest-common-subsequence diff over `char`s, followed by a semantic
//! cleanup pass that folds short coincidental equalities into the
//! surrounding edits (so "cat" → "dog" reads as one replacement rather than
//! a scatter of single-letter edits). Results are reported as operations
//! and as byte-offset spans into the left and right texts.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Largest LCS table (in cells) computed before falling back to a
/// whole-range replacement.
pub const MAX_LCS_CELLS: usize = 2_000_000;

/// Kind of a diff operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export, export_to = "bindings/")]
pub enum DiffOpKind {
    /// Present in both texts
    Equal,
    /// Only in the right text
    Insert,
    /// Only in the left text
    Delete,
}

/// A run of text with one [`DiffOpKind`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct DiffOp {
    /// Operation kind
    pub kind: DiffOpKind,
    /// Text covered by the operation
    pub text: String,
}

impl DiffOp {
    fn new(kind: DiffOpKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
        }
    }

    fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

/// Kind of an edit span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export, export_to = "bindings/")]
pub enum SpanKind {
    /// Inserted text; offsets index the right text
    Insert,
    /// Deleted text; offsets index the left text
    Delete,
}

/// An inserted or deleted range, as byte offsets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct TextSpan {
    /// Insert or delete
    pub kind: SpanKind,
    /// Start byte offset (inclusive)
    pub start: usize,
    /// End byte offset (exclusive)
    pub end: usize,
    /// The inserted or deleted text
    pub text: String,
}

/// Diff two strings into equal/insert/delete operations.
///
/// Concatenating the `Equal` and `Delete` texts yields `left`; the `Equal`
/// and `Insert` texts yield `right`. Between two equalities, deletions come
/// before insertions.
pub fn diff_chars(left: &str, right: &str) -> Vec<DiffOp> {
    if left == right {
        return if left.is_empty() {
            Vec::new()
        } else {
            vec![DiffOp::new(DiffOpKind::Equal, left)]
        };
    }

    let a: Vec<char> = left.chars().collect();
    let b: Vec<char> = right.chars().collect();

    let prefix = a.iter().zip(&b).take_while(|(x, y)| x == y).count();
    let suffix = a[prefix..]
        .iter()
        .rev()
        .zip(b[prefix..].iter().rev())
        .take_while(|(x, y)| x == y)
        .count();

    let mut ops = Vec::new();
    if prefix > 0 {
        ops.push(DiffOp::new(DiffOpKind::Equal, collect(&a[..prefix])));
    }
    ops.extend(diff_middle(
        &a[prefix..a.len() - suffix],
        &b[prefix..b.len() - suffix],
    ));
    if suffix > 0 {
        ops.push(DiffOp::new(DiffOpKind::Equal, collect(&a[a.len() - suffix..])));
    }

    let mut ops = normalize(ops);
    cleanup_semantic(&mut ops);
    ops
}

/// Diff two strings and report the edits as byte-offset spans.
pub fn diff_spans(left: &str, right: &str) -> Vec<TextSpan> {
    spans_from_ops(&diff_chars(left, right))
}

/// Convert operations into spans, tracking byte offsets on both sides.
pub fn spans_from_ops(ops: &[DiffOp]) -> Vec<TextSpan> {
    let mut spans = Vec::new();
    let (mut left_pos, mut right_pos) = (0usize, 0usize);

    for op in ops {
        let len = op.text.len();
        match op.kind {
            DiffOpKind::Equal => {
                left_pos += len;
                right_pos += len;
            }
            DiffOpKind::Delete => {
                spans.push(TextSpan {
                    kind: SpanKind::Delete,
                    start: left_pos,
                    end: left_pos + len,
                    text: op.text.clone(),
                });
                left_pos += len;
            }
            DiffOpKind::Insert => {
                spans.push(TextSpan {
                    kind: SpanKind::Insert,
                    start: right_pos,
                    end: right_pos + len,
                    text: op.text.clone(),
                });
                right_pos += len;
            }
        }
    }
    spans
}

fn collect(chars: &[char]) -> String {
    chars.iter().collect()
}

/// LCS diff of the region between the common prefix and suffix.
fn diff_middle(a: &[char], b: &[char]) -> Vec<DiffOp> {
    if a.is_empty() && b.is_empty() {
        return Vec::new();
    }
    if a.is_empty() {
        return vec![DiffOp::new(DiffOpKind::Insert, collect(b))];
    }
    if b.is_empty() {
        return vec![DiffOp::new(DiffOpKind::Delete, collect(a))];
    }

    let (n, m) = (a.len(), b.len());
    if (n + 1).saturating_mul(m + 1) > MAX_LCS_CELLS {
        log::debug!(
            "[TextDiff] {}x{} exceeds LCS limit, reporting a full replacement",
            n,
            m
        );
        return vec![
            DiffOp::new(DiffOpKind::Delete, collect(a)),
            DiffOp::new(DiffOpKind::Insert, collect(b)),
        ];
    }

    // lcs[i * width + j] = LCS length of a[i..] and b[j..]
    let width = m + 1;
    let mut lcs = vec![0u32; (n + 1) * width];
    for i in (0..n).rev() {
        for j in (0..m).rev() {
            lcs[i * width + j] = if a[i] == b[j] {
                lcs[(i + 1) * width + j + 1] + 1
            } else {
                lcs[(i + 1) * width + j].max(lcs[i * width + j + 1])
            };
        }
    }

    let mut ops = Vec::new();
    let (mut i, mut j) = (0, 0);
    while i < n && j < m {
        if a[i] == b[j] {
            push_char(&mut ops, DiffOpKind::Equal, a[i]);
            i += 1;
            j += 1;
        } else if lcs[(i + 1) * width + j] >= lcs[i * width + j + 1] {
            push_char(&mut ops, DiffOpKind::Delete, a[i]);
            i += 1;
        } else {
            push_char(&mut ops, DiffOpKind::Insert, b[j]);
            j += 1;
        }
    }
    for &c in &a[i..] {
        push_char(&mut ops, DiffOpKind::Delete, c);
    }
    for &c in &b[j..] {
        push_char(&mut ops, DiffOpKind::Insert, c);
    }
    ops
}

fn push_char(ops: &mut Vec<DiffOp>, kind: DiffOpKind, c: char) {
    match ops.last_mut() {
        Some(last) if last.kind == kind => last.text.push(c),
        _ => ops.push(DiffOp::new(kind, c.to_string())),
    }
}

/// Merge adjacent operations: between equalities, one delete then one
/// insert; consecutive equalities joined; empty operations dropped.
fn normalize(ops: Vec<DiffOp>) -> Vec<DiffOp> {
    let mut result: Vec<DiffOp> = Vec::with_capacity(ops.len());
    let mut deleted = String::new();
    let mut inserted = String::new();

    let flush = |result: &mut Vec<DiffOp>, deleted: &mut String, inserted: &mut String| {
        if !deleted.is_empty() {
            result.push(DiffOp::new(DiffOpKind::Delete, std::mem::take(deleted)));
        }
        if !inserted.is_empty() {
            result.push(DiffOp::new(DiffOpKind::Insert, std::mem::take(inserted)));
        }
    };

    for op in ops {
        match op.kind {
            DiffOpKind::Delete => deleted.push_str(&op.text),
            DiffOpKind::Insert => inserted.push_str(&op.text),
            DiffOpKind::Equal => {
                if op.text.is_empty() {
                    continue;
                }
                flush(&mut result, &mut deleted, &mut inserted);
                match result.last_mut() {
                    Some(last) if last.kind == DiffOpKind::Equal => last.text.push_str(&op.text),
                    _ => result.push(op),
                }
            }
        }
    }
    flush(&mut result, &mut deleted, &mut inserted);
    result
}

/// Edit sizes (inserted, deleted chars) in the run of edits ending just
/// before `end` (exclusive) and starting after the previous equality.
fn edits_before(ops: &[DiffOp], end: usize) -> (usize, usize) {
    edit_totals(ops[..end].iter().rev())
}

fn edits_after(ops: &[DiffOp], start: usize) -> (usize, usize) {
    edit_totals(ops[start..].iter())
}

fn edit_totals<'a>(ops: impl Iterator<Item = &'a DiffOp>) -> (usize, usize) {
    let mut totals = (0, 0);
    for op in ops {
        match op.kind {
            DiffOpKind::Insert => totals.0 += op.char_len(),
            DiffOpKind::Delete => totals.1 += op.char_len(),
            DiffOpKind::Equal => break,
        }
    }
    totals
}

/// Fold equalities no longer than the edits on both sides of them into
/// those edits.
fn cleanup_semantic(ops: &mut Vec<DiffOp>) {
    loop {
        let candidate = (0..ops.len()).find(|&index| {
            if ops[index].kind != DiffOpKind::Equal {
                return false;
            }
            let len = ops[index].char_len();
            let (ins_before, del_before) = edits_before(ops, index);
            let (ins_after, del_after) = edits_after(ops, index + 1);
            len <= ins_before.max(del_before) && len <= ins_after.max(del_after)
        });

        let Some(index) = candidate else {
            return;
        };

        let text = std::mem::take(&mut ops[index].text);
        ops[index] = DiffOp::new(DiffOpKind::Delete, text.clone());
        ops.insert(index + 1, DiffOp::new(DiffOpKind::Insert, text));
        *ops = normalize(std::mem::take(ops));
    }
}
