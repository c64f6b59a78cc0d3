//! Branch operations for one open document.
//!
//! This module provides `BranchController`, which owns the live document of
//! the active branch (through the [`DocRegistry`]), its
//! [`SnapshotSyncEngine`], and every branch operation the UI can trigger:
//! switch, create, rename, merge and delete.
//!
//! # Flow
//!
//! Operations never touch the persisted row directly. Each one flushes the
//! sync engine, then submits a single read-modify-write through the
//! [`RowStore`] built from the pure functions in [`crate::branch`]. The live
//! document follows the row: [`BranchController::apply_row`] reacts to the
//! persisted `activeBranch` and snapshot, swapping registry entries when
//! the active branch changes.
//!
//! # Failures
//!
//! All operations are best-effort. Store failures, missing rows, missing
//! branches and invalid names are logged and reported as `false`/`None`;
//! nothing here returns an error to the caller.
//!
//! # Usage
//!
//! ```ignore
//! let mut controller = BranchController::open(store, registry, Arc::new(SystemClock), config, id).await;
//!
//! if let Some(doc) = controller.document() {
//!     doc.set_text("draft");
//! }
//! controller.mark_dirty();
//!
//! controller.create_branch("experiment", None).await;
//! assert_eq!(controller.current_branch(), Some("experiment"));
//! ```

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use crate::branch::{
    self, BranchesMetadata, MAIN_BRANCH, generate_unique_branch_name, sanitize_branch_name,
};
use crate::config::{DEFAULT_AUTO_BRANCH_PREFIX, SyncConfig};
use crate::crdt::{DocKey, DocRegistry, DocumentId, SharedDoc};
use crate::diff;
use crate::error::{BranchDocError, Result};
use crate::store::{DocumentRow, RowStore, row_mutator};
use crate::sync::{Clock, SnapshotSyncEngine};

/// A snapshot exported by the engine, waiting to be written to the row.
#[derive(Debug, Clone)]
struct PendingExport {
    key: DocKey,
    snapshot: String,
}

type ExportQueue = Arc<Mutex<VecDeque<PendingExport>>>;

/// Branch operations controller for one document.
pub struct BranchController {
    store: Arc<dyn RowStore>,
    registry: Arc<DocRegistry>,
    config: SyncConfig,
    document: DocumentId,

    engine: SnapshotSyncEngine,
    pending: ExportQueue,

    /// Key currently acquired from the registry
    current: Option<DocKey>,
    /// Last observed value of the persisted row
    row: Option<DocumentRow>,
}

impl BranchController {
    /// Create a controller without loading the row.
    ///
    /// Call [`BranchController::refresh`] (or feed rows to
    /// [`BranchController::apply_row`]) before using it.
    pub fn new(
        store: Arc<dyn RowStore>,
        registry: Arc<DocRegistry>,
        clock: Arc<dyn Clock>,
        config: SyncConfig,
        document: DocumentId,
    ) -> Self {
        let pending: ExportQueue = Arc::new(Mutex::new(VecDeque::new()));
        let queue = Arc::clone(&pending);
        let engine = SnapshotSyncEngine::new(
            Arc::clone(&registry),
            clock,
            config.debounce(),
            Box::new(move |key, snapshot| {
                queue.lock().unwrap().push_back(PendingExport {
                    key: key.clone(),
                    snapshot: snapshot.to_string(),
                });
                Ok(())
            }),
        );

        Self {
            store,
            registry,
            config,
            document,
            engine,
            pending,
            current: None,
            row: None,
        }
    }

    /// Create a controller and load the row.
    pub async fn open(
        store: Arc<dyn RowStore>,
        registry: Arc<DocRegistry>,
        clock: Arc<dyn Clock>,
        config: SyncConfig,
        document: DocumentId,
    ) -> Self {
        let mut controller = Self::new(store, registry, clock, config, document);
        controller.refresh().await;
        controller
    }

    // ==================== Accessors ====================

    /// Identity of the controlled document.
    pub fn document_id(&self) -> &DocumentId {
        &self.document
    }

    /// Live document of the current branch.
    pub fn document(&self) -> Option<SharedDoc> {
        self.engine.doc().cloned()
    }

    /// Registry key currently held.
    pub fn key(&self) -> Option<&DocKey> {
        self.current.as_ref()
    }

    /// Branch whose live document is currently loaded.
    pub fn current_branch(&self) -> Option<&str> {
        self.current.as_ref().map(|key| key.branch.as_str())
    }

    /// Active branch as persisted ("main" if unset or not loaded).
    ///
    /// A dangling pointer resolves to "main", matching the branch
    /// [`BranchController::apply_row`] loads.
    pub fn active_branch(&self) -> String {
        self.row
            .as_ref()
            .and_then(DocumentRow::branches_metadata)
            .map_or_else(
                || MAIN_BRANCH.to_string(),
                |metadata| metadata.resolved_active_branch().to_string(),
            )
    }

    /// Branch names as persisted.
    pub fn list_branches(&self) -> Vec<String> {
        self.row
            .as_ref()
            .map(branch::list_branches)
            .unwrap_or_else(|| vec![MAIN_BRANCH.to_string()])
    }

    /// Persisted snapshot of a branch.
    pub fn branch_snapshot(&self, name: &str) -> Option<String> {
        self.row
            .as_ref()
            .and_then(|row| branch::get_branch_snapshot(row, name))
    }

    /// Last observed row.
    pub fn row(&self) -> Option<&DocumentRow> {
        self.row.as_ref()
    }

    /// The sync engine of the current branch.
    pub fn engine(&self) -> &SnapshotSyncEngine {
        &self.engine
    }

    // ==================== Row Observation ====================

    /// Reload the row from the store and apply it.
    ///
    /// Returns `false` if the row is missing or could not be read.
    pub async fn refresh(&mut self) -> bool {
        match self.store.get_row(&self.document).await {
            Ok(Some(row)) => {
                self.apply_row(row);
                true
            }
            Ok(None) => {
                log::debug!("[BranchController] row {} not found", self.document);
                false
            }
            Err(e) => {
                log::warn!("[BranchController] failed to read row {}: {}", self.document, e);
                false
            }
        }
    }

    /// React to a new value of the persisted row.
    ///
    /// When the active branch differs from the loaded one, the old registry
    /// entry is released and the new branch's document is acquired and
    /// pre-loaded with its persisted snapshot. The active branch's snapshot
    /// is then handed to the sync engine's import path.
    pub fn apply_row(&mut self, row: DocumentRow) {
        let metadata = row.branches_metadata();
        let branch = metadata
            .as_ref()
            .map_or(MAIN_BRANCH, BranchesMetadata::resolved_active_branch)
            .to_string();
        let snapshot = metadata
            .as_ref()
            .and_then(|metadata| metadata.branch(&branch))
            .map(|branch| branch.snapshot.clone());

        let key = DocKey::new(self.document.clone(), branch);
        if self.current.as_ref() != Some(&key) {
            self.swap_to(key, snapshot.as_deref());
        }

        self.row = Some(row);
        self.engine.apply_remote(snapshot.as_deref());
    }

    fn swap_to(&mut self, key: DocKey, snapshot: Option<&str>) {
        if let Some(old) = self.current.take() {
            // Anything still pending belongs to the old branch
            self.engine.flush();
            self.registry.release(&old);
        }

        let doc = self.registry.acquire(&key);
        match snapshot {
            Some(snapshot) if self.registry.last_saved(&key).as_deref() != Some(snapshot) => {
                let result = {
                    let _guard = self.registry.remote_apply(&key);
                    doc.import_base64(snapshot)
                };
                match result {
                    Ok(()) => self.registry.set_last_saved(&key, Some(snapshot.to_string())),
                    Err(e) => log::warn!("[BranchController] failed to load {}: {}", key, e),
                }
            }
            _ => {}
        }

        log::debug!("[BranchController] now editing {}", key);
        self.engine.bind(Some(doc), key.clone());
        self.current = Some(key);
    }

    // ==================== Export Scheduling ====================

    /// Record a local edit to the live document.
    pub fn mark_dirty(&mut self) {
        self.engine.mark_dirty();
    }

    /// Drive the debounce and idle export, then persist what was exported.
    ///
    /// Hosts call this from their timer or idle loop.
    pub async fn tick(&mut self) -> bool {
        self.engine.poll();
        self.engine.run_idle();
        if self.pending.lock().unwrap().is_empty() {
            return true;
        }
        self.persist_pending().await
    }

    /// Export pending edits immediately and persist them.
    ///
    /// Returns `false` if a persistence write failed.
    pub async fn flush(&mut self) -> bool {
        self.engine.flush();
        self.persist_pending().await
    }

    /// Write every queued export to its branch.
    ///
    /// Exports for branches that no longer exist are dropped. A failed
    /// write forgets the saved value so the next flush exports again; this
    /// includes rows whose branch metadata is unreadable, which are left
    /// untouched rather than re-initialized.
    async fn persist_pending(&mut self) -> bool {
        let queued: Vec<PendingExport> = self.pending.lock().unwrap().drain(..).collect();
        if queued.is_empty() {
            return true;
        }

        let mut all_ok = true;
        for PendingExport { key, snapshot } in queued {
            let branch_name = key.branch.clone();
            let result = self
                .store
                .update_row(
                    &key.document,
                    row_mutator(move |row| {
                        let next = match row.read_branches_metadata()? {
                            Some(metadata) if metadata.contains(&branch_name) => {
                                branch::update_branch_snapshot(
                                    Some(&metadata),
                                    &branch_name,
                                    &snapshot,
                                )
                            }
                            None if branch_name == MAIN_BRANCH => {
                                branch::initialize_branches(Some(&snapshot))
                            }
                            _ => return Err(BranchDocError::BranchNotFound(branch_name)),
                        };
                        row.set_branches_metadata(&next)
                    }),
                )
                .await;

            match result {
                Ok(()) => log::debug!("[BranchController] saved snapshot for {}", key),
                Err(BranchDocError::BranchNotFound(name)) => {
                    log::debug!(
                        "[BranchController] dropping export for vanished branch '{}'",
                        name
                    );
                }
                Err(e) => {
                    log::warn!("[BranchController] failed to save {}: {}", key, e);
                    self.engine.invalidate_last_saved(&key);
                    all_ok = false;
                }
            }
        }

        self.refresh().await;
        all_ok
    }

    // ==================== Branch Operations ====================

    /// Make `name` the active branch.
    ///
    /// No-op if `name` is already current or no row is loaded. The live
    /// document is swapped when the new `activeBranch` is observed.
    pub async fn switch_branch(&mut self, name: &str) -> bool {
        let Some(current) = self.current_branch() else {
            log::debug!("[BranchController] switch ignored: no document loaded");
            return false;
        };
        if current == name {
            return false;
        }

        self.flush().await;

        let target = name.to_string();
        let result = self
            .store
            .update_row(
                &self.document,
                row_mutator(move |row| {
                    let metadata = row.read_branches_metadata()?;
                    let exists = metadata
                        .as_ref()
                        .map_or(target == MAIN_BRANCH, |metadata| metadata.contains(&target));
                    if !exists {
                        return Err(BranchDocError::BranchNotFound(target));
                    }
                    row.set_branches_metadata(&branch::set_active_branch(
                        metadata.as_ref(),
                        &target,
                    ))
                }),
            )
            .await;

        self.finish("switch", name, result).await
    }

    /// Create `name` from `from_branch` (default: current) and switch to it.
    ///
    /// The name is sanitized first; empty or existing names are rejected.
    /// When copying the current branch the live document is exported so
    /// unsaved edits carry over.
    pub async fn create_branch(&mut self, name: &str, from_branch: Option<&str>) -> bool {
        let name = sanitize_branch_name(name);
        if name.is_empty() {
            log::debug!("[BranchController] create ignored: empty branch name");
            return false;
        }
        let Some((source, live)) = self.prepare_create(from_branch).await else {
            return false;
        };

        let new_name = name.clone();
        let result = self
            .store
            .update_row(
                &self.document,
                row_mutator(move |row| {
                    let metadata = row.read_branches_metadata()?;
                    let taken = metadata
                        .as_ref()
                        .map_or(new_name == MAIN_BRANCH, |metadata| metadata.contains(&new_name));
                    if taken {
                        return Err(BranchDocError::BranchExists(new_name));
                    }
                    let next = create_from(metadata.as_ref(), &new_name, &source, live.as_deref())?;
                    row.set_branches_metadata(&next)
                }),
            )
            .await;

        if !self.finish("create", &name, result).await {
            return false;
        }
        self.switch_branch(&name).await;
        true
    }

    /// Create a branch with a generated unique name and switch to it.
    ///
    /// The name is `prefix`, `prefix-1`, … (default prefix from
    /// [`SyncConfig::auto_branch_prefix`]), chosen inside the same row
    /// update that creates the branch. Returns the chosen name.
    pub async fn create_branch_auto(
        &mut self,
        prefix: Option<&str>,
        from_branch: Option<&str>,
    ) -> Option<String> {
        let prefix = match sanitize_branch_name(prefix.unwrap_or(&self.config.auto_branch_prefix)) {
            prefix if prefix.is_empty() => DEFAULT_AUTO_BRANCH_PREFIX.to_string(),
            prefix => prefix,
        };
        let (source, live) = self.prepare_create(from_branch).await?;

        let mut chosen: Option<String> = None;
        let slot = &mut chosen;
        let result = self
            .store
            .update_row(
                &self.document,
                row_mutator(move |row| {
                    let metadata = row.read_branches_metadata()?;
                    let name = generate_unique_branch_name(metadata.as_ref(), &prefix);
                    let next = create_from(metadata.as_ref(), &name, &source, live.as_deref())?;
                    row.set_branches_metadata(&next)?;
                    *slot = Some(name);
                    Ok(())
                }),
            )
            .await;

        let name = chosen.unwrap_or_default();
        if !self.finish("create", &name, result).await {
            return None;
        }
        self.switch_branch(&name).await;
        Some(name)
    }

    /// Flush and resolve the source of a new branch: the branch name and,
    /// when it is the current branch, a live export of its document.
    async fn prepare_create(&mut self, from_branch: Option<&str>) -> Option<(String, Option<String>)> {
        let Some(current) = self.current_branch().map(str::to_string) else {
            log::debug!("[BranchController] create ignored: no document loaded");
            return None;
        };
        let source = from_branch.map_or_else(|| current.clone(), str::to_string);

        self.flush().await;

        let live = if source == current {
            self.engine.doc().map(|doc| doc.export_base64())
        } else {
            None
        };
        Some((source, live))
    }

    /// Rename `old_name` to the sanitized `new_name`.
    ///
    /// A taken name gets a `-1`, `-2`, … suffix. Returns the final name, or
    /// `None` if nothing was renamed.
    pub async fn rename_branch(&mut self, old_name: &str, new_name: &str) -> Option<String> {
        let sanitized = sanitize_branch_name(new_name);
        if sanitized.is_empty() || sanitized == old_name {
            log::debug!(
                "[BranchController] rename of '{}' ignored: '{}' sanitizes to '{}'",
                old_name,
                new_name,
                sanitized
            );
            return None;
        }

        self.flush().await;

        let old = old_name.to_string();
        let mut chosen: Option<String> = None;
        let slot = &mut chosen;
        let result = self
            .store
            .update_row(
                &self.document,
                row_mutator(move |row| {
                    let metadata = row
                        .read_branches_metadata()?
                        .unwrap_or_else(|| branch::initialize_branches(None));
                    if !metadata.contains(&old) {
                        return Err(BranchDocError::BranchNotFound(old));
                    }
                    let target = if metadata.contains(&sanitized) {
                        generate_unique_branch_name(Some(&metadata), &sanitized)
                    } else {
                        sanitized
                    };
                    row.set_branches_metadata(&branch::rename_branch(&metadata, &old, &target))?;
                    *slot = Some(target);
                    Ok(())
                }),
            )
            .await;

        if !self.finish("rename", old_name, result).await {
            return None;
        }
        chosen
    }

    /// Merge `source_branch` into the current branch.
    ///
    /// The merged snapshot replaces the current branch's snapshot; the
    /// source is left untouched. The replaced snapshot is recorded in the
    /// recent-snapshot list. Aborts if the source has no snapshot.
    pub async fn merge_branch(&mut self, source_branch: &str) -> bool {
        let Some(current) = self.current_branch().map(str::to_string) else {
            log::debug!("[BranchController] merge ignored: no document loaded");
            return false;
        };
        if current == source_branch {
            log::debug!("[BranchController] merge of '{}' into itself ignored", current);
            return false;
        }

        self.flush().await;

        let Some(metadata) = self.load_metadata().await else {
            return false;
        };
        let source_snapshot = match metadata.branch(source_branch) {
            Some(branch) if !branch.snapshot.is_empty() => branch.snapshot.clone(),
            _ => {
                log::debug!(
                    "[BranchController] merge aborted: '{}' has no snapshot",
                    source_branch
                );
                return false;
            }
        };
        let target_snapshot = metadata
            .branch(&current)
            .map(|branch| branch.snapshot.clone())
            .unwrap_or_default();

        let merged = match diff::merge_base64(&target_snapshot, &source_snapshot) {
            Ok(merged) => merged,
            Err(e) => {
                log::warn!(
                    "[BranchController] merge of '{}' into '{}' failed: {}",
                    source_branch,
                    current,
                    e
                );
                return false;
            }
        };

        let max_recent = self.config.max_recent_snapshots;
        let target = current.clone();
        let result = self
            .store
            .update_row(
                &self.document,
                row_mutator(move |row| {
                    let metadata = row.read_branches_metadata()?;
                    let recorded = if target_snapshot.is_empty() {
                        metadata
                    } else {
                        Some(branch::add_recent_snapshot(
                            metadata.as_ref(),
                            &target,
                            &target_snapshot,
                            max_recent,
                        ))
                    };
                    let next =
                        branch::update_branch_snapshot(recorded.as_ref(), &target, &merged);
                    row.set_branches_metadata(&next)
                }),
            )
            .await;

        self.finish("merge into", &current, result).await
    }

    /// Delete a branch. "main" and unknown branches are refused.
    ///
    /// Deleting the active branch moves the document back to "main".
    pub async fn delete_branch(&mut self, name: &str) -> bool {
        if name == MAIN_BRANCH {
            log::debug!("[BranchController] refusing to delete '{}'", MAIN_BRANCH);
            return false;
        }
        if self.current.is_none() {
            log::debug!("[BranchController] delete ignored: no document loaded");
            return false;
        }

        self.flush().await;

        let target = name.to_string();
        let result = self
            .store
            .update_row(
                &self.document,
                row_mutator(move |row| {
                    let metadata = row.read_branches_metadata()?;
                    let next = match metadata.as_ref() {
                        Some(metadata) if metadata.contains(&target) => {
                            branch::delete_branch(Some(metadata), &target)
                        }
                        _ => None,
                    };
                    match next {
                        Some(next) => row.set_branches_metadata(&next),
                        None => Err(BranchDocError::BranchNotFound(target)),
                    }
                }),
            )
            .await;

        self.finish("delete", name, result).await
    }

    /// Flush, persist and release the live document.
    pub async fn close(&mut self) {
        self.flush().await;
        if let Some(key) = self.current.take() {
            log::debug!("[BranchController] closing {}", key);
            self.engine.unbind();
            self.registry.release(&key);
        }
    }

    // ==================== Helpers ====================

    async fn load_metadata(&self) -> Option<BranchesMetadata> {
        match self.store.get_row(&self.document).await {
            Ok(row) => row.and_then(|row| row.branches_metadata()),
            Err(e) => {
                log::warn!("[BranchController] failed to read row {}: {}", self.document, e);
                None
            }
        }
    }

    /// Log the outcome of a branch write and pick up the new row.
    async fn finish(&mut self, operation: &str, branch: &str, result: Result<()>) -> bool {
        match result {
            Ok(()) => {
                log::info!("[BranchController] {} '{}' on {}", operation, branch, self.document);
                self.refresh().await;
                true
            }
            Err(
                e @ (BranchDocError::RowNotFound(_)
                | BranchDocError::BranchNotFound(_)
                | BranchDocError::BranchExists(_)),
            ) => {
                log::debug!("[BranchController] {} '{}' skipped: {}", operation, branch, e);
                false
            }
            Err(e) => {
                log::warn!("[BranchController] {} '{}' failed: {}", operation, branch, e);
                false
            }
        }
    }
}

/// New metadata with `name` copied from `source`, then overwritten with the
/// live snapshot when one was taken.
///
/// Without a live snapshot the source must exist in `metadata`; an
/// unmigrated row only has "main".
fn create_from(
    metadata: Option<&BranchesMetadata>,
    name: &str,
    source: &str,
    live: Option<&str>,
) -> Result<BranchesMetadata> {
    let source_exists =
        metadata.map_or(source == MAIN_BRANCH, |metadata| metadata.contains(source));
    if live.is_none() && !source_exists {
        return Err(BranchDocError::BranchNotFound(source.to_string()));
    }

    let created = branch::create_branch(metadata, name, source);
    Ok(match live {
        Some(snapshot) => branch::update_branch_snapshot(Some(&created), name, snapshot),
        None => created,
    })
}

impl Drop for BranchController {
    fn drop(&mut self) {
        if let Some(key) = self.current.take() {
            self.registry.release(&key);
        }
    }
}

impl std::fmt::Debug for BranchController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BranchController")
            .field("document", &self.document)
            .field("current", &self.current)
            .field("engine", &self.engine)
            .finish_non_exhaustive()
    }
}
