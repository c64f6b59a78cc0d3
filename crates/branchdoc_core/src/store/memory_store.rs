//! In-memory row store for testing.
//!
//! This provides a simple in-memory implementation of [`RowStore`]
//! for use in unit tests, demos and single-process hosts.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

use super::row::DocumentRow;
use super::row_store::{BoxFuture, RowMutator, RowStore};
use crate::crdt::DocumentId;
use crate::error::{BranchDocError, Result};

/// In-memory row store.
///
/// Rows live in a `HashMap` behind an `RwLock`; data is lost when dropped.
/// Each `update_row` runs its mutator on a copy of the row under the write
/// lock and commits the copy only if the mutator succeeds, so updates are
/// atomic read-modify-writes.
#[derive(Debug, Default, Clone)]
pub struct MemoryRowStore {
    rows: Arc<RwLock<HashMap<DocumentId, DocumentRow>>>,
    commits: Arc<AtomicUsize>,
    fail_writes: Arc<AtomicBool>,
}

impl MemoryRowStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a row, keyed by its identity.
    pub fn insert_row(&self, row: DocumentRow) {
        let mut rows = self.rows.write().unwrap();
        rows.insert(row.document_id(), row);
    }

    /// Remove a row, returning it if present.
    pub fn remove_row(&self, id: &DocumentId) -> Option<DocumentRow> {
        let mut rows = self.rows.write().unwrap();
        rows.remove(id)
    }

    /// Current value of a row.
    pub fn row(&self, id: &DocumentId) -> Option<DocumentRow> {
        let rows = self.rows.read().unwrap();
        rows.get(id).cloned()
    }

    /// Number of successful `update_row` commits so far.
    pub fn commit_count(&self) -> usize {
        self.commits.load(Ordering::SeqCst)
    }

    /// Make every subsequent `update_row` fail (simulates a lost connection).
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn update_sync(&self, id: &DocumentId, mutator: RowMutator<'_>) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(BranchDocError::Store(format!("write to '{}' rejected", id)));
        }

        let mut rows = self.rows.write().unwrap();
        let current = rows
            .get(id)
            .ok_or_else(|| BranchDocError::RowNotFound(id.to_string()))?;

        let mut next = current.clone();
        mutator(&mut next)?;
        rows.insert(id.clone(), next);
        self.commits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

impl RowStore for MemoryRowStore {
    fn get_row<'a>(&'a self, id: &'a DocumentId) -> BoxFuture<'a, Result<Option<DocumentRow>>> {
        Box::pin(async move { Ok(self.row(id)) })
    }

    fn update_row<'a>(
        &'a self,
        id: &'a DocumentId,
        mutator: RowMutator<'a>,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move { self.update_sync(id, mutator) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::row_store::{block_on_test, row_mutator};

    fn store_with_row() -> (MemoryRowStore, DocumentId) {
        let store = MemoryRowStore::new();
        let row = DocumentRow::new(Some(1), "notes/a.md");
        let id = row.document_id();
        store.insert_row(row);
        (store, id)
    }

    #[test]
    fn test_get_row() {
        let (store, id) = store_with_row();
        let row = block_on_test(store.get_row(&id)).unwrap().unwrap();
        assert_eq!(row.path, "notes/a.md");

        let missing = DocumentId::Id(99);
        assert!(block_on_test(store.get_row(&missing)).unwrap().is_none());
    }

    #[test]
    fn test_update_row_commits() {
        let (store, id) = store_with_row();
        block_on_test(store.update_row(
            &id,
            row_mutator(|row| {
                row.path = "notes/b.md".to_string();
                Ok(())
            }),
        ))
        .unwrap();

        assert_eq!(store.row(&id).unwrap().path, "notes/b.md");
        assert_eq!(store.commit_count(), 1);
    }

    #[test]
    fn test_failing_mutator_commits_nothing() {
        let (store, id) = store_with_row();
        let result = block_on_test(store.update_row(
            &id,
            row_mutator(|row| {
                row.path = "partial.md".to_string();
                Err(BranchDocError::Store("nope".to_string()))
            }),
        ));

        assert!(result.is_err());
        assert_eq!(store.row(&id).unwrap().path, "notes/a.md");
        assert_eq!(store.commit_count(), 0);
    }

    #[test]
    fn test_update_missing_row() {
        let store = MemoryRowStore::new();
        let result = block_on_test(store.update_row(
            &DocumentId::Id(5),
            row_mutator(|_| Ok(())),
        ));
        assert!(matches!(result, Err(BranchDocError::RowNotFound(_))));
    }

    #[test]
    fn test_rejected_writes() {
        let (store, id) = store_with_row();
        store.set_fail_writes(true);
        let result = block_on_test(
            store.update_row(&id, row_mutator(|_| Ok(()))),
        );
        assert!(matches!(result, Err(BranchDocError::Store(_))));

        store.set_fail_writes(false);
        assert!(block_on_test(store.update_row(&id, row_mutator(|_| Ok(())))).is_ok());
    }

    #[test]
    fn test_path_keyed_rows() {
        let store = MemoryRowStore::new();
        store.insert_row(DocumentRow::new(None, "draft.md"));
        assert!(store.row(&DocumentId::from("draft.md")).is_some());
        assert!(store.remove_row(&DocumentId::from("draft.md")).is_some());
        assert!(store.row(&DocumentId::from("draft.md")).is_none());
    }
}
