//! Live CRDT document for one (document, branch) pair.
//!
//! This module provides `SnapshotDoc`, a thin wrapper over a yrs [`Doc`]
//! that speaks in whole snapshots: `import` merges a serialized state into
//! the document and `export_snapshot` serializes the full state back out.
//! The wrapper also exposes the two containers the rest of the crate reads:
//! a plain-text body and a fragment of top-level block nodes.

use std::sync::Arc;

use yrs::types::xml::{XmlElementPrelim, XmlOut, XmlTextPrelim};
use yrs::updates::decoder::Decode;
use yrs::{
    Doc, GetString, ReadTxn, StateVector, Text, TextRef, Transact, Update, XmlFragment,
    XmlFragmentRef,
};

use crate::codec;
use crate::error::{BranchDocError, Result};

/// Name of the Y.Text holding the plain-text content.
pub const TEXT_CONTAINER_NAME: &str = "body";

/// Name of the Y.XmlFragment holding the top-level block nodes.
pub const BLOCKS_CONTAINER_NAME: &str = "blocks";

/// Tag used for blocks created through [`SnapshotDoc::push_block`].
pub const PARAGRAPH_TAG: &str = "paragraph";

/// One top-level node of the block fragment, flattened for comparison.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockNode {
    /// Element tag (e.g. "paragraph"), or "#text" for a bare text node
    pub kind: String,
    /// Concatenated text of every descendant text node
    pub text: String,
}

/// A CRDT document holding one branch of one file.
///
/// # Example
///
/// ```ignore
/// use branchdoc_core::crdt::SnapshotDoc;
///
/// let doc = SnapshotDoc::new();
/// doc.set_text("Hello");
/// let snapshot = doc.export_snapshot();
///
/// let copy = SnapshotDoc::new();
/// copy.import(&snapshot)?;
/// assert_eq!(copy.text(), "Hello");
/// ```
pub struct SnapshotDoc {
    doc: Doc,
    text: TextRef,
    blocks: XmlFragmentRef,
}

impl SnapshotDoc {
    /// Create a new empty document.
    pub fn new() -> Self {
        let doc = Doc::new();
        let text = doc.get_or_insert_text(TEXT_CONTAINER_NAME);
        let blocks = doc.get_or_insert_xml_fragment(BLOCKS_CONTAINER_NAME);

        Self { doc, text, blocks }
    }

    /// Create a document pre-loaded with a snapshot.
    pub fn from_snapshot(snapshot: &[u8]) -> Result<Self> {
        let doc = Self::new();
        doc.import(snapshot)?;
        Ok(doc)
    }

    /// Create a document pre-loaded with a base64 snapshot.
    pub fn from_base64(snapshot: &str) -> Result<Self> {
        Self::from_snapshot(&codec::base64_to_bytes(snapshot)?)
    }

    /// Get the underlying yrs document.
    pub fn doc(&self) -> &Doc {
        &self.doc
    }

    // ==================== Snapshot Operations ====================

    /// Merge a serialized snapshot into this document.
    ///
    /// An empty snapshot is a no-op. The CRDT merge is commutative, so
    /// importing a state that is already known changes nothing.
    ///
    /// # Errors
    ///
    /// Returns [`BranchDocError::Crdt`] if the bytes cannot be decoded or
    /// applied.
    pub fn import(&self, snapshot: &[u8]) -> Result<()> {
        if snapshot.is_empty() {
            return Ok(());
        }

        let update = Update::decode_v1(snapshot)
            .map_err(|e| BranchDocError::Crdt(format!("Failed to decode snapshot: {}", e)))?;

        let mut txn = self.doc.transact_mut();
        txn.apply_update(update)
            .map_err(|e| BranchDocError::Crdt(format!("Failed to apply snapshot: {}", e)))?;
        Ok(())
    }

    /// Merge a base64 snapshot into this document.
    pub fn import_base64(&self, snapshot: &str) -> Result<()> {
        self.import(&codec::base64_to_bytes(snapshot)?)
    }

    /// Serialize the full document state.
    pub fn export_snapshot(&self) -> Vec<u8> {
        let txn = self.doc.transact();
        txn.encode_state_as_update_v1(&StateVector::default())
    }

    /// Serialize the full document state as base64.
    pub fn export_base64(&self) -> String {
        codec::bytes_to_base64(&self.export_snapshot())
    }

    // ==================== Text Operations ====================

    /// Get the plain-text content.
    pub fn text(&self) -> String {
        let txn = self.doc.transact();
        self.text.get_string(&txn)
    }

    /// Length of the plain-text content in bytes.
    pub fn text_len(&self) -> u32 {
        let txn = self.doc.transact();
        self.text.len(&txn)
    }

    /// Replace the plain-text content using minimal edits.
    ///
    /// Only the span between the common prefix and common suffix is
    /// deleted and re-inserted, so the CRDT identity of untouched
    /// characters is preserved and concurrent edits keep merging cleanly.
    pub fn set_text(&self, content: &str) {
        let current = self.text();
        if current == content {
            return;
        }

        let prefix: usize = current
            .chars()
            .zip(content.chars())
            .take_while(|(a, b)| a == b)
            .map(|(a, _)| a.len_utf8())
            .sum();

        let max_suffix = (current.len() - prefix).min(content.len() - prefix);
        let suffix: usize = current[prefix..]
            .chars()
            .rev()
            .zip(content[prefix..].chars().rev())
            .take_while(|(a, b)| a == b)
            .map(|(a, _)| a.len_utf8())
            .scan(0usize, |acc, len| {
                *acc += len;
                (*acc <= max_suffix).then_some(len)
            })
            .sum();

        let delete_end = current.len() - suffix;
        let insert_end = content.len() - suffix;

        let mut txn = self.doc.transact_mut();
        if delete_end > prefix {
            self.text
                .remove_range(&mut txn, prefix as u32, (delete_end - prefix) as u32);
        }
        if insert_end > prefix {
            self.text
                .insert(&mut txn, prefix as u32, &content[prefix..insert_end]);
        }
    }

    /// Insert text at a byte offset.
    pub fn insert_text(&self, index: u32, text: &str) {
        let mut txn = self.doc.transact_mut();
        self.text.insert(&mut txn, index, text);
    }

    /// Delete `length` bytes starting at a byte offset.
    pub fn delete_text(&self, index: u32, length: u32) {
        let mut txn = self.doc.transact_mut();
        self.text.remove_range(&mut txn, index, length);
    }

    // ==================== Block Operations ====================

    /// Append a paragraph block containing `text`.
    pub fn push_block(&self, text: &str) {
        let mut txn = self.doc.transact_mut();
        let element = self
            .blocks
            .push_back(&mut txn, XmlElementPrelim::empty(PARAGRAPH_TAG));
        if !text.is_empty() {
            element.push_back(&mut txn, XmlTextPrelim::new(text));
        }
    }

    /// Insert a paragraph block at `index`.
    pub fn insert_block(&self, index: u32, text: &str) {
        let mut txn = self.doc.transact_mut();
        let element = self
            .blocks
            .insert(&mut txn, index, XmlElementPrelim::empty(PARAGRAPH_TAG));
        if !text.is_empty() {
            element.push_back(&mut txn, XmlTextPrelim::new(text));
        }
    }

    /// Remove the block at `index`.
    pub fn remove_block(&self, index: u32) {
        let mut txn = self.doc.transact_mut();
        if index < self.blocks.len(&txn) {
            self.blocks.remove_range(&mut txn, index, 1);
        }
    }

    /// Number of top-level blocks.
    pub fn block_count(&self) -> u32 {
        let txn = self.doc.transact();
        self.blocks.len(&txn)
    }

    /// Flatten the top-level blocks into (kind, text) pairs, in order.
    pub fn blocks(&self) -> Vec<BlockNode> {
        let txn = self.doc.transact();
        let len = self.blocks.len(&txn);
        (0..len)
            .filter_map(|index| self.blocks.get(&txn, index))
            .map(|node| flatten_node(&txn, &node))
            .collect()
    }
}

impl Default for SnapshotDoc {
    fn default() -> Self {
        Self::new()
    }
}

fn flatten_node<T: ReadTxn>(txn: &T, node: &XmlOut) -> BlockNode {
    match node {
        XmlOut::Text(text) => BlockNode {
            kind: "#text".to_string(),
            text: text.get_string(txn),
        },
        XmlOut::Element(element) => BlockNode {
            kind: element.tag().to_string(),
            text: element
                .successors(txn)
                .filter_map(|child| match child {
                    XmlOut::Text(text) => Some(text.get_string(txn)),
                    _ => None,
                })
                .collect(),
        },
        XmlOut::Fragment(fragment) => BlockNode {
            kind: "#fragment".to_string(),
            text: fragment
                .successors(txn)
                .filter_map(|child| match child {
                    XmlOut::Text(text) => Some(text.get_string(txn)),
                    _ => None,
                })
                .collect(),
        },
    }
}

impl std::fmt::Debug for SnapshotDoc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnapshotDoc")
            .field("text_len", &self.text_len())
            .field("block_count", &self.block_count())
            .finish_non_exhaustive()
    }
}

/// Shared handle to a live document.
pub type SharedDoc = Arc<SnapshotDoc>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_doc_is_empty() {
        let doc = SnapshotDoc::new();
        assert_eq!(doc.text(), "");
        assert_eq!(doc.text_len(), 0);
        assert_eq!(doc.block_count(), 0);
    }

    #[test]
    fn test_set_and_get_text() {
        let doc = SnapshotDoc::new();
        doc.set_text("Hello World");
        assert_eq!(doc.text(), "Hello World");

        doc.set_text("Hello Brave World");
        assert_eq!(doc.text(), "Hello Brave World");

        doc.set_text("");
        assert_eq!(doc.text(), "");
    }

    #[test]
    fn test_set_text_multibyte() {
        let doc = SnapshotDoc::new();
        doc.set_text("café au lait");
        doc.set_text("café noir");
        assert_eq!(doc.text(), "café noir");

        doc.set_text("ééé");
        doc.set_text("éé");
        assert_eq!(doc.text(), "éé");
    }

    #[test]
    fn test_insert_and_delete_text() {
        let doc = SnapshotDoc::new();
        doc.set_text("Hello World");
        doc.insert_text(6, "Beautiful ");
        assert_eq!(doc.text(), "Hello Beautiful World");

        doc.delete_text(6, 10);
        assert_eq!(doc.text(), "Hello World");
    }

    #[test]
    fn test_export_import_round_trip() {
        let doc = SnapshotDoc::new();
        doc.set_text("Persistent content");
        doc.push_block("First");
        doc.push_block("Second");

        let copy = SnapshotDoc::from_snapshot(&doc.export_snapshot()).unwrap();
        assert_eq!(copy.text(), "Persistent content");
        assert_eq!(
            copy.blocks().iter().map(|b| b.text.as_str()).collect::<Vec<_>>(),
            vec!["First", "Second"]
        );
    }

    #[test]
    fn test_base64_round_trip() {
        let doc = SnapshotDoc::new();
        doc.set_text("over the wire");

        let copy = SnapshotDoc::from_base64(&doc.export_base64()).unwrap();
        assert_eq!(copy.text(), "over the wire");
    }

    #[test]
    fn test_import_empty_is_noop() {
        let doc = SnapshotDoc::new();
        doc.set_text("keep");
        doc.import(&[]).unwrap();
        doc.import_base64("").unwrap();
        assert_eq!(doc.text(), "keep");
    }

    #[test]
    fn test_import_malformed_fails() {
        let doc = SnapshotDoc::new();
        let result = doc.import(&[0xFF, 0xFF, 0xFF]);
        assert!(matches!(result, Err(BranchDocError::Crdt(_))));
    }

    #[test]
    fn test_concurrent_edits_converge() {
        let doc1 = SnapshotDoc::new();
        doc1.set_text("Hello World");

        let doc2 = SnapshotDoc::from_snapshot(&doc1.export_snapshot()).unwrap();

        doc1.insert_text(0, "A: ");
        doc2.insert_text(11, "!");

        let state1 = doc1.export_snapshot();
        let state2 = doc2.export_snapshot();
        doc1.import(&state2).unwrap();
        doc2.import(&state1).unwrap();

        assert_eq!(doc1.text(), doc2.text());
        assert_eq!(doc1.text(), "A: Hello World!");
    }

    #[test]
    fn test_block_operations() {
        let doc = SnapshotDoc::new();
        doc.push_block("one");
        doc.push_block("three");
        doc.insert_block(1, "two");
        assert_eq!(doc.block_count(), 3);

        let blocks = doc.blocks();
        assert_eq!(blocks[1].kind, PARAGRAPH_TAG);
        assert_eq!(blocks[1].text, "two");

        doc.remove_block(0);
        doc.remove_block(10);
        let texts: Vec<String> = doc.blocks().into_iter().map(|b| b.text).collect();
        assert_eq!(texts, vec!["two", "three"]);
    }

    #[test]
    fn test_empty_block_has_empty_text() {
        let doc = SnapshotDoc::new();
        doc.push_block("");
        assert_eq!(doc.blocks()[0].text, "");
    }
}
