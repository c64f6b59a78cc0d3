//! Reference-counted pool of live documents.
//!
//! This module provides `DocRegistry`, which hands out one shared
//! [`SnapshotDoc`] per [`DocKey`]. Every consumer showing the same file and
//! branch edits the same in-memory document, so two panes never diverge.
//!
//! # Lifecycle
//!
//! ```text
//! absent --acquire--> live(1) --acquire--> live(N) --release...--> evicted
//! ```
//!
//! Re-acquiring an evicted key builds a fresh, empty document; durable
//! state lives only in the persisted snapshot.
//!
//! Alongside each document the registry keeps the last snapshot known to be
//! persisted and a "remote apply in progress" flag. The flag is only set
//! through [`DocRegistry::remote_apply`], whose guard clears it on every
//! exit path.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use super::key::DocKey;
use super::snapshot_doc::SnapshotDoc;

struct RegistryEntry {
    doc: Arc<SnapshotDoc>,
    ref_count: usize,
    last_saved: Option<String>,
    applying_remote: bool,
}

impl RegistryEntry {
    fn new() -> Self {
        Self {
            doc: Arc::new(SnapshotDoc::new()),
            ref_count: 0,
            last_saved: None,
            applying_remote: false,
        }
    }
}

/// Registry of live documents keyed by (document, branch).
///
/// Construct one per session and share it by `Arc`; tests build isolated
/// instances.
///
/// # Example
///
/// ```ignore
/// use branchdoc_core::crdt::{DocKey, DocRegistry};
///
/// let registry = DocRegistry::new();
/// let key = DocKey::new(1, "main");
///
/// let doc = registry.acquire(&key);
/// doc.set_text("hello");
/// assert!(std::sync::Arc::ptr_eq(&doc, &registry.acquire(&key)));
///
/// registry.release(&key);
/// registry.release(&key);
/// assert!(!registry.is_loaded(&key));
/// ```
#[derive(Default)]
pub struct DocRegistry {
    entries: Mutex<HashMap<DocKey, RegistryEntry>>,
}

impl DocRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the live document for `key`, creating it on first use, and take
    /// a reference to it.
    pub fn acquire(&self, key: &DocKey) -> Arc<SnapshotDoc> {
        let mut entries = self.entries.lock().unwrap();
        let entry = entries.entry(key.clone()).or_insert_with(|| {
            log::debug!("[DocRegistry] creating document for {}", key);
            RegistryEntry::new()
        });
        entry.ref_count += 1;
        Arc::clone(&entry.doc)
    }

    /// Drop a reference to `key`, evicting the entry when none remain.
    ///
    /// Releasing a key that is not loaded is a no-op.
    pub fn release(&self, key: &DocKey) {
        let mut entries = self.entries.lock().unwrap();
        let Some(entry) = entries.get_mut(key) else {
            return;
        };

        entry.ref_count = entry.ref_count.saturating_sub(1);
        if entry.ref_count == 0 {
            entries.remove(key);
            log::debug!("[DocRegistry] evicted document for {}", key);
        }
    }

    /// Record the last snapshot known to be persisted for `key`.
    ///
    /// No-op if the key is not loaded.
    pub fn set_last_saved(&self, key: &DocKey, value: Option<String>) {
        let mut entries = self.entries.lock().unwrap();
        if let Some(entry) = entries.get_mut(key) {
            entry.last_saved = value;
        }
    }

    /// Last snapshot known to be persisted for `key`.
    pub fn last_saved(&self, key: &DocKey) -> Option<String> {
        let entries = self.entries.lock().unwrap();
        entries.get(key).and_then(|entry| entry.last_saved.clone())
    }

    /// Mark a remote import into `key`'s document as started.
    ///
    /// Prefer [`DocRegistry::remote_apply`], which ends the apply on drop.
    pub fn begin_remote_apply(&self, key: &DocKey) {
        self.set_applying(key, true);
    }

    /// Mark a remote import into `key`'s document as finished.
    pub fn end_remote_apply(&self, key: &DocKey) {
        self.set_applying(key, false);
    }

    /// Whether a remote import into `key`'s document is in progress.
    pub fn is_remote_applying(&self, key: &DocKey) -> bool {
        let entries = self.entries.lock().unwrap();
        entries.get(key).is_some_and(|entry| entry.applying_remote)
    }

    /// Begin a remote apply that ends when the returned guard is dropped,
    /// including on early return or unwinding.
    pub fn remote_apply<'a>(&'a self, key: &DocKey) -> RemoteApplyGuard<'a> {
        self.begin_remote_apply(key);
        RemoteApplyGuard {
            registry: self,
            key: key.clone(),
        }
    }

    fn set_applying(&self, key: &DocKey, applying: bool) {
        let mut entries = self.entries.lock().unwrap();
        if let Some(entry) = entries.get_mut(key) {
            entry.applying_remote = applying;
        }
    }

    /// Check if a document is live for `key`.
    pub fn is_loaded(&self, key: &DocKey) -> bool {
        let entries = self.entries.lock().unwrap();
        entries.contains_key(key)
    }

    /// Number of references held on `key` (0 if not loaded).
    pub fn ref_count(&self, key: &DocKey) -> usize {
        let entries = self.entries.lock().unwrap();
        entries.get(key).map_or(0, |entry| entry.ref_count)
    }

    /// Number of live documents.
    pub fn loaded_count(&self) -> usize {
        let entries = self.entries.lock().unwrap();
        entries.len()
    }

    /// Keys of all live documents.
    pub fn loaded_keys(&self) -> Vec<DocKey> {
        let entries = self.entries.lock().unwrap();
        entries.keys().cloned().collect()
    }
}

impl std::fmt::Debug for DocRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let entries = self.entries.lock().unwrap();
        f.debug_struct("DocRegistry")
            .field(
                "loaded",
                &entries
                    .iter()
                    .map(|(key, entry)| (key.to_string(), entry.ref_count))
                    .collect::<Vec<_>>(),
            )
            .finish()
    }
}

/// Scoped "remote apply in progress" marker for one key.
#[must_use = "the remote apply ends as soon as the guard is dropped"]
pub struct RemoteApplyGuard<'a> {
    registry: &'a DocRegistry,
    key: DocKey,
}

impl Drop for RemoteApplyGuard<'_> {
    fn drop(&mut self) {
        self.registry.end_remote_apply(&self.key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(branch: &str) -> DocKey {
        DocKey::new(1, branch)
    }

    #[test]
    fn test_acquire_creates_empty_doc() {
        let registry = DocRegistry::new();
        let doc = registry.acquire(&key("main"));
        assert_eq!(doc.text(), "");
        assert_eq!(registry.ref_count(&key("main")), 1);
        assert!(registry.last_saved(&key("main")).is_none());
        assert!(!registry.is_remote_applying(&key("main")));
    }

    #[test]
    fn test_acquire_shares_instance() {
        let registry = DocRegistry::new();
        let doc1 = registry.acquire(&key("main"));
        doc1.set_text("shared");

        let doc2 = registry.acquire(&key("main"));
        assert!(Arc::ptr_eq(&doc1, &doc2));
        assert_eq!(doc2.text(), "shared");
        assert_eq!(registry.ref_count(&key("main")), 2);
    }

    #[test]
    fn test_keys_are_independent() {
        let registry = DocRegistry::new();
        let main = registry.acquire(&key("main"));
        let feature = registry.acquire(&key("feature"));
        assert!(!Arc::ptr_eq(&main, &feature));
        assert_eq!(registry.loaded_count(), 2);
    }

    #[test]
    fn test_refcount_lifecycle() {
        let registry = DocRegistry::new();
        let k = key("main");
        let n = 3;

        let first = registry.acquire(&k);
        first.set_text("live");
        for _ in 1..n {
            registry.acquire(&k);
        }
        for _ in 0..n - 1 {
            registry.release(&k);
        }

        // One holder left: same instance
        assert!(registry.is_loaded(&k));
        let again = registry.acquire(&k);
        assert!(Arc::ptr_eq(&first, &again));
        registry.release(&k);

        // Last release evicts; next acquire is a fresh, empty document
        registry.release(&k);
        assert!(!registry.is_loaded(&k));
        let fresh = registry.acquire(&k);
        assert!(!Arc::ptr_eq(&first, &fresh));
        assert_eq!(fresh.text(), "");
    }

    #[test]
    fn test_release_unknown_key_is_noop() {
        let registry = DocRegistry::new();
        registry.release(&key("ghost"));
        assert_eq!(registry.loaded_count(), 0);
    }

    #[test]
    fn test_last_saved_bookkeeping() {
        let registry = DocRegistry::new();
        let k = key("main");

        // No entry: ignored
        registry.set_last_saved(&k, Some("abc".to_string()));
        assert!(registry.last_saved(&k).is_none());

        registry.acquire(&k);
        registry.set_last_saved(&k, Some("abc".to_string()));
        assert_eq!(registry.last_saved(&k).as_deref(), Some("abc"));

        registry.release(&k);
        registry.acquire(&k);
        assert!(registry.last_saved(&k).is_none());
    }

    #[test]
    fn test_remote_apply_flags() {
        let registry = DocRegistry::new();
        let k = key("main");
        registry.acquire(&k);

        registry.begin_remote_apply(&k);
        assert!(registry.is_remote_applying(&k));
        registry.end_remote_apply(&k);
        assert!(!registry.is_remote_applying(&k));
    }

    #[test]
    fn test_remote_apply_guard_clears_on_early_return() {
        let registry = DocRegistry::new();
        let k = key("main");
        registry.acquire(&k);

        fn failing_import(registry: &DocRegistry, k: &DocKey) -> Result<(), &'static str> {
            let _guard = registry.remote_apply(k);
            assert!(registry.is_remote_applying(k));
            Err("malformed")
        }

        assert!(failing_import(&registry, &k).is_err());
        assert!(!registry.is_remote_applying(&k));
    }

    #[test]
    fn test_loaded_keys() {
        let registry = DocRegistry::new();
        registry.acquire(&key("a"));
        registry.acquire(&key("b"));

        let mut keys = registry.loaded_keys();
        keys.sort();
        assert_eq!(keys, vec![key("a"), key("b")]);
    }
}
