//! Reconciles one live document with its persisted snapshot.
//!
//! This module provides `SnapshotSyncEngine`, which sits between a live
//! [`SnapshotDoc`](crate::crdt::SnapshotDoc) and the snapshot value stored
//! for its (document, branch) key.
//!
//! # Import path
//!
//! [`SnapshotSyncEngine::apply_remote`] is fed every snapshot value observed
//! on the persisted row. A value that changed, and is not the value this
//! engine saved itself, is imported under the registry's remote-apply guard.
//! The next export attempt is then skipped so the import is never echoed
//! straight back.
//!
//! # Export path
//!
//! ```text
//! Idle --mark_dirty--> DirtyPending{deadline} --poll--> ExportQueued --run_idle--> Idle
//!                        ^          |
//!                        +mark_dirty+
//! ```
//!
//! `flush` cancels whatever is pending and exports immediately. Every
//! export is compared against the last saved value and only handed to the
//! export callback when it differs.
//!
//! # Usage
//!
//! ```ignore
//! let mut engine = SnapshotSyncEngine::new(registry, clock, debounce, Box::new(|key, snapshot| {
//!     persist(key, snapshot)
//! }));
//! engine.bind(Some(doc), key);
//! engine.apply_remote(Some(&persisted_snapshot));
//!
//! // On every keystroke
//! engine.mark_dirty();
//!
//! // From the host's timer / idle loop
//! engine.poll();
//! engine.run_idle();
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant};

use super::clock::Clock;
use crate::crdt::{DocKey, DocRegistry, SharedDoc};
use crate::error::Result;

/// Receives each exported snapshot (base64) together with its key.
///
/// Returning an error leaves "last saved" untouched so the content is
/// exported again on the next attempt.
pub type ExportCallback = Box<dyn FnMut(&DocKey, &str) -> Result<()> + Send>;

/// Export scheduling state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    /// Nothing to export
    Idle,
    /// Local edits pending; export once `deadline` passes
    DirtyPending {
        /// When the debounce window closes
        deadline: Instant,
    },
    /// Debounce elapsed; waiting for the idle pass to export
    ExportQueued,
}

/// Sync engine for one bound (document, branch) key.
pub struct SnapshotSyncEngine {
    registry: Arc<DocRegistry>,
    clock: Arc<dyn Clock>,
    debounce: Duration,

    doc: Option<SharedDoc>,
    key: Option<DocKey>,

    phase: SyncPhase,
    skip_next_export: bool,

    /// Last snapshot this engine saved or imported for the bound key
    last_saved: Option<String>,
    /// Last remote value seen by `apply_remote`
    last_remote: Option<String>,

    on_export: ExportCallback,
}

impl SnapshotSyncEngine {
    /// Create an unbound engine.
    pub fn new(
        registry: Arc<DocRegistry>,
        clock: Arc<dyn Clock>,
        debounce: Duration,
        on_export: ExportCallback,
    ) -> Self {
        Self {
            registry,
            clock,
            debounce,
            doc: None,
            key: None,
            phase: SyncPhase::Idle,
            skip_next_export: false,
            last_saved: None,
            last_remote: None,
            on_export,
        }
    }

    /// Bind the engine to a live document and its key.
    ///
    /// Resets scheduling state. "Last saved" is seeded from the registry so
    /// that several consumers of one key agree on what is persisted.
    pub fn bind(&mut self, doc: Option<SharedDoc>, key: DocKey) {
        log::debug!("[SyncEngine] binding to {}", key);
        self.last_saved = self.registry.last_saved(&key);
        self.doc = doc;
        self.key = Some(key);
        self.phase = SyncPhase::Idle;
        self.skip_next_export = false;
        self.last_remote = None;
    }

    /// Drop the bound document and key. Pending work is discarded.
    pub fn unbind(&mut self) {
        if let Some(key) = &self.key {
            log::debug!("[SyncEngine] unbinding from {}", key);
        }
        self.doc = None;
        self.key = None;
        self.phase = SyncPhase::Idle;
        self.skip_next_export = false;
        self.last_saved = None;
        self.last_remote = None;
    }

    /// Key the engine is bound to.
    pub fn key(&self) -> Option<&DocKey> {
        self.key.as_ref()
    }

    /// Live document the engine is bound to.
    pub fn doc(&self) -> Option<&SharedDoc> {
        self.doc.as_ref()
    }

    /// Current scheduling state.
    pub fn phase(&self) -> SyncPhase {
        self.phase
    }

    /// Whether an export is waiting on the debounce or the idle pass.
    pub fn has_pending_export(&self) -> bool {
        self.phase != SyncPhase::Idle
    }

    /// Whether the next export attempt will be skipped.
    pub fn skips_next_export(&self) -> bool {
        self.skip_next_export
    }

    /// Last snapshot saved or imported for the bound key.
    pub fn last_saved(&self) -> Option<&str> {
        self.last_saved.as_deref()
    }

    // ==================== Import Path ====================

    /// Feed the latest persisted snapshot for the bound key.
    ///
    /// `None` means the row has not been loaded yet. Returns `true` if the
    /// value was imported into the live document.
    pub fn apply_remote(&mut self, remote: Option<&str>) -> bool {
        let Some(remote) = remote else {
            return false;
        };
        if self.last_remote.as_deref() == Some(remote) {
            return false;
        }
        self.last_remote = Some(remote.to_string());

        if self.last_saved.as_deref() == Some(remote) {
            log::debug!("[SyncEngine] skipping echo of our own snapshot");
            return false;
        }

        let (Some(doc), Some(key)) = (self.doc.as_ref(), self.key.as_ref()) else {
            return false;
        };

        let result = {
            let _guard = self.registry.remote_apply(key);
            doc.import_base64(remote)
        };

        match result {
            Ok(()) => {
                log::debug!(
                    "[SyncEngine] imported remote snapshot for {} ({} chars)",
                    key,
                    remote.len()
                );
                self.last_saved = Some(remote.to_string());
                self.registry.set_last_saved(key, Some(remote.to_string()));
                self.skip_next_export = true;
                true
            }
            Err(e) => {
                log::warn!(
                    "[SyncEngine] failed to import remote snapshot for {}: {}",
                    key,
                    e
                );
                false
            }
        }
    }

    // ==================== Export Path ====================

    /// Record a local edit and (re)start the debounce window.
    pub fn mark_dirty(&mut self) {
        if self.doc.is_none() {
            return;
        }
        self.phase = SyncPhase::DirtyPending {
            deadline: self.clock.now() + self.debounce,
        };
    }

    /// Advance the debounce timer. Returns `true` once an export is queued.
    pub fn poll(&mut self) -> bool {
        if let SyncPhase::DirtyPending { deadline } = self.phase {
            if self.clock.now() >= deadline {
                self.phase = SyncPhase::ExportQueued;
            }
        }
        self.phase == SyncPhase::ExportQueued
    }

    /// Run the queued export, if any. Returns the snapshot handed to the
    /// export callback.
    pub fn run_idle(&mut self) -> Option<String> {
        if self.phase != SyncPhase::ExportQueued {
            return None;
        }
        self.phase = SyncPhase::Idle;
        self.export_now()
    }

    /// Cancel any pending debounce and export immediately.
    ///
    /// Safe to call with nothing pending: an unchanged document produces
    /// no callback.
    pub fn flush(&mut self) -> Option<String> {
        self.phase = SyncPhase::Idle;
        self.export_now()
    }

    fn export_now(&mut self) -> Option<String> {
        let (Some(doc), Some(key)) = (self.doc.as_ref(), self.key.as_ref()) else {
            return None;
        };

        if self.registry.is_remote_applying(key) {
            log::debug!("[SyncEngine] remote apply in progress for {}, deferring export", key);
            self.phase = SyncPhase::ExportQueued;
            return None;
        }

        if self.skip_next_export {
            self.skip_next_export = false;
            log::debug!("[SyncEngine] skipping export right after import for {}", key);
            return None;
        }

        let snapshot = doc.export_base64();
        if self.last_saved.as_deref() == Some(snapshot.as_str()) {
            return None;
        }

        match (self.on_export)(key, &snapshot) {
            Ok(()) => {
                self.registry.set_last_saved(key, Some(snapshot.clone()));
                self.last_saved = Some(snapshot.clone());
                Some(snapshot)
            }
            Err(e) => {
                log::warn!("[SyncEngine] export failed for {}: {}", key, e);
                None
            }
        }
    }

    /// Forget the saved value for `key` so the next export is not
    /// suppressed (used after a failed persistence write).
    pub fn invalidate_last_saved(&mut self, key: &DocKey) {
        if self.key.as_ref() == Some(key) {
            self.last_saved = None;
        }
        self.registry.set_last_saved(key, None);
    }
}

impl std::fmt::Debug for SnapshotSyncEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnapshotSyncEngine")
            .field("key", &self.key)
            .field("phase", &self.phase)
            .field("skip_next_export", &self.skip_next_export)
            .field("has_doc", &self.doc.is_some())
            .finish()
    }
}
