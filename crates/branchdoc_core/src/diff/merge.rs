//! Snapshot merge.
//!
//! Merging is plain CRDT convergence: both snapshots are imported into a
//! fresh document and its state is exported. Import order only affects the
//! exact bytes produced, never the merged content.

use crate::codec;
use crate::crdt::SnapshotDoc;
use crate::error::Result;

/// Merge `source` into `target`, returning the combined snapshot.
///
/// Empty inputs are skipped, so `merge_snapshots(&[], s)` is equivalent to
/// `s` alone. Merging a snapshot with itself yields the same content.
///
/// # Errors
///
/// Fails if either snapshot cannot be decoded or applied.
pub fn merge_snapshots(target: &[u8], source: &[u8]) -> Result<Vec<u8>> {
    let doc = SnapshotDoc::new();
    doc.import(target)?;
    doc.import(source)?;
    Ok(doc.export_snapshot())
}

/// [`merge_snapshots`] over base64-encoded snapshots.
pub fn merge_base64(target: &str, source: &str) -> Result<String> {
    let merged = merge_snapshots(
        &codec::base64_to_bytes(target)?,
        &codec::base64_to_bytes(source)?,
    )?;
    Ok(codec::bytes_to_base64(&merged))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BranchDocError;

    fn text_of(snapshot: &[u8]) -> String {
        SnapshotDoc::from_snapshot(snapshot).unwrap().text()
    }

    fn snapshot(text: &str) -> Vec<u8> {
        let doc = SnapshotDoc::new();
        doc.set_text(text);
        doc.export_snapshot()
    }

    #[test]
    fn test_merge_is_idempotent() {
        let s = snapshot("Hello");
        assert_eq!(text_of(&merge_snapshots(&s, &s).unwrap()), "Hello");
    }

    #[test]
    fn test_merge_with_empty_is_identity() {
        let s = snapshot("Hello");
        assert_eq!(text_of(&merge_snapshots(&[], &s).unwrap()), "Hello");
        assert_eq!(text_of(&merge_snapshots(&s, &[]).unwrap()), "Hello");
        assert_eq!(text_of(&merge_snapshots(&[], &[]).unwrap()), "");
    }

    #[test]
    fn test_merge_keeps_both_sides_of_fork() {
        let origin = SnapshotDoc::new();
        origin.set_text("AB");
        let base = origin.export_snapshot();

        let current = SnapshotDoc::from_snapshot(&base).unwrap();
        let source = SnapshotDoc::from_snapshot(&base).unwrap();
        source.insert_text(2, "C");
        current.insert_text(0, ">");

        let merged = merge_snapshots(&current.export_snapshot(), &source.export_snapshot()).unwrap();
        assert_eq!(text_of(&merged), ">ABC");
    }

    #[test]
    fn test_merge_order_does_not_change_content() {
        let base = snapshot("AB");
        let left = SnapshotDoc::from_snapshot(&base).unwrap();
        let right = SnapshotDoc::from_snapshot(&base).unwrap();
        left.insert_text(1, "x");
        right.insert_text(2, "y");

        let (l, r) = (left.export_snapshot(), right.export_snapshot());
        assert_eq!(
            text_of(&merge_snapshots(&l, &r).unwrap()),
            text_of(&merge_snapshots(&r, &l).unwrap())
        );
    }

    #[test]
    fn test_merge_base64() {
        let s = codec::bytes_to_base64(&snapshot("Hi"));
        let merged = merge_base64("", &s).unwrap();
        assert_eq!(SnapshotDoc::from_base64(&merged).unwrap().text(), "Hi");
    }

    #[test]
    fn test_merge_rejects_malformed() {
        let s = snapshot("Hi");
        assert!(matches!(
            merge_snapshots(&s, &[0xFF, 0xFF, 0xFF]),
            Err(BranchDocError::Crdt(_))
        ));
        assert!(matches!(
            merge_base64("%%%", ""),
            Err(BranchDocError::Base64(_))
        ));
    }
}
