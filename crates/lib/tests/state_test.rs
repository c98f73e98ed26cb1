//! # State Store Tests
//!
//! The durability contract: absent state loads empty, saves are atomic and
//! round-trip exactly, and the same blob works through the local-file store
//! and an object store.

mod common;

use blogwatch::state::{open_state_store, AppState, ObjectStateStore, StateStore};
use blogwatch::types::IngestionResult;
use common::setup_tracing;
use object_store::memory::InMemory;
use object_store::path::Path as ObjectPath;
use std::sync::Arc;

fn populated_state() -> AppState {
    let mut state = AppState::default();
    state.mark_seen(["id-a".to_string(), "id-b".to_string()]);
    let mut result = IngestionResult::empty();
    result.discovered_count = 2;
    result.ingested_count = 2;
    result.new_post_ids = vec!["id-a".to_string(), "id-b".to_string()];
    state.record_result(result, 10);
    state
}

#[tokio::test]
async fn local_store_loads_empty_when_absent() {
    setup_tracing();
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("state.json");
    let store = open_state_store(path.to_str().expect("utf-8 path")).expect("store opens");

    let state = store.load().await.expect("load succeeds");
    assert_eq!(state, AppState::default());
}

#[tokio::test]
async fn local_store_round_trips_and_leaves_no_temp_file() {
    setup_tracing();
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("state.json");
    let store = open_state_store(path.to_str().expect("utf-8 path")).expect("store opens");

    let state = populated_state();
    store.save(&state).await.expect("save succeeds");

    let reloaded = store.load().await.expect("load succeeds");
    assert_eq!(reloaded, state);

    // The on-disk encoding keeps the app:-prefixed keys, and the sibling
    // temp file was renamed away.
    let raw = std::fs::read_to_string(&path).expect("state file exists");
    assert!(raw.contains("app:last_seen_post_ids"));
    let names: Vec<String> = std::fs::read_dir(dir.path())
        .expect("dir listing")
        .map(|entry| entry.expect("dir entry").file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec!["state.json".to_string()]);
}

#[tokio::test]
async fn local_store_creates_missing_parent_directories() {
    setup_tracing();
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("nested/deeper/state.json");
    let store = open_state_store(path.to_str().expect("utf-8 path")).expect("store opens");

    store.save(&populated_state()).await.expect("save succeeds");
    assert!(path.exists());
}

#[tokio::test]
async fn saving_twice_keeps_the_latest_state_only() {
    setup_tracing();
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("state.json");
    let store = open_state_store(path.to_str().expect("utf-8 path")).expect("store opens");

    store.save(&populated_state()).await.expect("first save");
    let mut newer = populated_state();
    newer.mark_seen(["id-c".to_string()]);
    store.save(&newer).await.expect("second save");

    let reloaded = store.load().await.expect("load succeeds");
    assert_eq!(reloaded, newer);
    assert_eq!(reloaded.last_seen_post_ids.len(), 3);
}

#[tokio::test]
async fn object_store_round_trips_the_same_blob() {
    setup_tracing();
    let store = ObjectStateStore::new(
        Arc::new(InMemory::new()),
        ObjectPath::from("state/blogwatch_state.json"),
    );

    let empty = store.load().await.expect("absent state loads empty");
    assert_eq!(empty, AppState::default());

    let state = populated_state();
    store.save(&state).await.expect("save succeeds");
    let reloaded = store.load().await.expect("load succeeds");
    assert_eq!(reloaded, state);
}

#[tokio::test]
async fn uri_state_paths_select_the_object_store() {
    setup_tracing();
    let dir = tempfile::tempdir().expect("tempdir");
    let uri = format!("file://{}/state.json", dir.path().display());
    let store = open_state_store(&uri).expect("store opens");

    let state = populated_state();
    store.save(&state).await.expect("save succeeds");
    assert_eq!(store.load().await.expect("load succeeds"), state);
}
