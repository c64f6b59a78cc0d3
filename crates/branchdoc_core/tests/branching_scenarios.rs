//! End-to-end branching scenarios through the public API

use std::sync::{Arc, Mutex};
use std::time::Duration;

use branchdoc_core::branch::{self, BranchesMetadata, MAIN_BRANCH};
use branchdoc_core::codec::{base64_to_bytes, bytes_to_base64};
use branchdoc_core::config::SyncConfig;
use branchdoc_core::crdt::{DocKey, DocRegistry, DocumentId, SnapshotDoc};
use branchdoc_core::diff::{self, NodeStatus};
use branchdoc_core::store::{DocumentRow, MemoryRowStore};
use branchdoc_core::sync::{ManualClock, SnapshotSyncEngine};
use branchdoc_core::BranchController;
use futures_lite::future::block_on;
use serde_json::json;

fn snapshot_of(text: &str) -> String {
    let doc = SnapshotDoc::new();
    doc.set_text(text);
    doc.export_base64()
}

fn text_of(snapshot: &str) -> String {
    SnapshotDoc::from_base64(snapshot).unwrap().text()
}

fn row_with(metadata: Option<serde_json::Value>) -> DocumentRow {
    let mut row = DocumentRow::new(Some(7), "journal/today.md");
    row.metadata = metadata;
    row
}

fn open(store: &MemoryRowStore, registry: &Arc<DocRegistry>) -> BranchController {
    block_on(BranchController::open(
        Arc::new(store.clone()),
        Arc::clone(registry),
        Arc::new(ManualClock::new()),
        SyncConfig::default(),
        DocumentId::Id(7),
    ))
}

fn persisted(store: &MemoryRowStore) -> BranchesMetadata {
    store
        .row(&DocumentId::Id(7))
        .and_then(|row| row.branches_metadata())
        .unwrap()
}

#[test]
fn test_base64_round_trip() {
    let buffers: Vec<Vec<u8>> = vec![
        Vec::new(),
        vec![0],
        vec![0xFF; 3],
        (0..=255).collect(),
        (0..100_000u32).map(|i| (i % 251) as u8).collect(),
    ];
    for buffer in buffers {
        assert_eq!(base64_to_bytes(&bytes_to_base64(&buffer)).unwrap(), buffer);
    }
}

#[test]
fn test_merge_idempotence_and_identity() {
    let s = snapshot_of("Some content");

    let merged = diff::merge_base64(&s, &s).unwrap();
    assert_eq!(text_of(&merged), "Some content");

    assert_eq!(text_of(&diff::merge_base64("", &s).unwrap()), "Some content");
    assert_eq!(text_of(&diff::merge_base64(&s, "").unwrap()), "Some content");
}

#[test]
fn test_registry_refcounting() {
    let registry = DocRegistry::new();
    let key = DocKey::new(7, "main");

    let first = registry.acquire(&key);
    first.set_text("held");
    for _ in 0..4 {
        registry.acquire(&key);
    }
    for _ in 0..4 {
        registry.release(&key);
    }
    assert!(Arc::ptr_eq(&first, &registry.acquire(&key)));

    registry.release(&key);
    registry.release(&key);
    let fresh = registry.acquire(&key);
    assert!(!Arc::ptr_eq(&first, &fresh));
    assert_eq!(fresh.text(), "");
}

#[test]
fn test_main_is_never_deleted() {
    let only_main = branch::initialize_branches(Some("S"));
    let with_feature = branch::create_branch(Some(&only_main), "feature", MAIN_BRANCH);
    let feature_active = branch::set_active_branch(Some(&with_feature), "feature");
    let main_active = branch::set_active_branch(Some(&with_feature), MAIN_BRANCH);

    for metadata in [only_main, with_feature, feature_active, main_active] {
        assert_eq!(
            branch::delete_branch(Some(&metadata), MAIN_BRANCH),
            Some(metadata.clone())
        );
    }
}

#[test]
fn test_active_branch_fallback() {
    let rows = [
        row_with(None),
        row_with(Some(json!({ "title": "no branches" }))),
        row_with(Some(json!({ "branches": { "main": { "snapshot": "" } } }))),
    ];
    for row in &rows {
        assert_eq!(branch::get_active_branch(row), "main");
    }
}

#[test]
fn test_sync_suppression_after_import() {
    let registry = Arc::new(DocRegistry::new());
    let calls = Arc::new(Mutex::new(0usize));
    let counter = Arc::clone(&calls);

    let mut engine = SnapshotSyncEngine::new(
        Arc::clone(&registry),
        Arc::new(ManualClock::new()),
        Duration::from_millis(300),
        Box::new(move |_, _| {
            *counter.lock().unwrap() += 1;
            Ok(())
        }),
    );
    let key = DocKey::new(7, "main");
    engine.bind(Some(registry.acquire(&key)), key.clone());

    let remote = snapshot_of("remote edit");
    assert!(engine.apply_remote(Some(&remote)));
    assert_eq!(registry.last_saved(&key), Some(remote));

    engine.flush();
    engine.flush();
    assert_eq!(*calls.lock().unwrap(), 0);
}

#[test]
fn test_create_and_switch() {
    // Pure step: creating from null metadata with the live export S0
    let s0 = snapshot_of("work in progress");
    let created = branch::create_branch(None, "feature", MAIN_BRANCH);
    let overwritten = branch::update_branch_snapshot(Some(&created), "feature", &s0);
    assert_eq!(overwritten.branches["main"].snapshot, "");
    assert_eq!(overwritten.branches["feature"].snapshot, s0);

    // Through the controller
    let store = MemoryRowStore::new();
    store.insert_row(row_with(None));
    let registry = Arc::new(DocRegistry::new());
    let mut controller = open(&store, &registry);

    let doc = controller.document().unwrap();
    doc.set_text("work in progress");
    let live = doc.export_base64();

    assert!(block_on(controller.create_branch("feature", None)));

    let metadata = persisted(&store);
    assert_eq!(metadata.branches["feature"].snapshot, live);
    assert_eq!(metadata.active_branch.as_deref(), Some("feature"));
    assert_eq!(controller.current_branch(), Some("feature"));
    assert_eq!(controller.document().unwrap().text(), "work in progress");
}

#[test]
fn test_rename_collision() {
    let store = MemoryRowStore::new();
    let mut metadata = branch::initialize_branches(None);
    metadata = branch::create_branch(Some(&metadata), "feature", MAIN_BRANCH);
    metadata = branch::create_branch(Some(&metadata), "feature-1", MAIN_BRANCH);
    let mut row = row_with(None);
    row.set_branches_metadata(&metadata).unwrap();
    store.insert_row(row);

    let registry = Arc::new(DocRegistry::new());
    let mut controller = open(&store, &registry);

    let renamed = block_on(controller.rename_branch("main", " feature "));
    assert_eq!(renamed.as_deref(), Some("feature-2"));

    let metadata = persisted(&store);
    assert!(metadata.contains("feature-2"));
    assert!(!metadata.contains("main"));
    assert_eq!(metadata.active_branch.as_deref(), Some("feature-2"));
}

#[test]
fn test_merge_into_current() {
    let origin = SnapshotDoc::new();
    origin.set_text("AB");
    let current = origin.export_base64();

    let fork = SnapshotDoc::from_base64(&current).unwrap();
    fork.insert_text(2, "C");
    let source = fork.export_base64();

    let mut metadata = branch::initialize_branches(Some(&current));
    metadata = branch::update_branch_snapshot(Some(&metadata), "source", &source);
    let mut row = row_with(None);
    row.set_branches_metadata(&metadata).unwrap();

    let store = MemoryRowStore::new();
    store.insert_row(row);
    let registry = Arc::new(DocRegistry::new());
    let mut controller = open(&store, &registry);

    assert!(block_on(controller.merge_branch("source")));

    let metadata = persisted(&store);
    assert_eq!(text_of(&metadata.branches["main"].snapshot), "ABC");
    assert_eq!(metadata.branches["source"].snapshot, source);
}

#[test]
fn test_structural_diff_counts() {
    let left = SnapshotDoc::new();
    left.push_block("First paragraph");
    left.push_block("Second paragraph");

    let right = SnapshotDoc::new();
    right.push_block("First paragraph");
    right.push_block("Second paragraph, edited");
    right.push_block("Brand new closing paragraph");

    let result = diff::diff_structured(&left, &right);
    assert_eq!(result.additions, 1);
    assert_eq!(result.modifications, 1);
    assert_eq!(result.deletions, 0);
    assert_eq!(result.nodes[0].status, NodeStatus::Unchanged);
    assert_eq!(result.nodes[1].status, NodeStatus::Modified);
    assert_eq!(result.nodes[2].status, NodeStatus::Added);
}

#[test]
fn test_diff_text_reads_both_sides() {
    let pair = diff::diff_text(&snapshot_of("left side"), &snapshot_of("right side")).unwrap();
    assert_eq!(pair.left_text, "left side");
    assert_eq!(pair.right_text, "right side");
}
