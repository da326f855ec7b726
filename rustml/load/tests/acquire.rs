mod common;

use common::{Behavior, FakeHub};
use rustml_load::{resolve, LoadError, ModelReference};
use std::sync::Mutex;

fn patterns() -> Vec<String> {
    vec!["*.safetensors".to_string(), "*.json".to_string()]
}

#[test]
fn local_directory_makes_no_hub_calls() {
    let tmp = tempfile::tempdir().unwrap();
    let hub = FakeHub::new(Behavior::ServerError, tmp.path());
    let reference = ModelReference::LocalDirectory(tmp.path().to_path_buf());

    let dir = resolve(&reference, &hub, &patterns(), &|_: u64, _: u64| {}).unwrap();

    assert_eq!(dir, tmp.path());
    assert_eq!(hub.snapshot_count(), 0);
    assert_eq!(hub.local_dir_count(), 0);
}

#[test]
fn remote_id_snapshots_with_patterns_and_progress() {
    let tmp = tempfile::tempdir().unwrap();
    let snapshot_dir = tmp.path().join("snap");
    let hub = FakeHub::new(Behavior::Succeed(snapshot_dir.clone()), tmp.path());
    let seen = Mutex::new(Vec::new());

    let dir = resolve(
        &ModelReference::RemoteId("org/model".into()),
        &hub,
        &patterns(),
        &|done: u64, total: u64| seen.lock().unwrap().push((done, total)),
    )
    .unwrap();

    assert_eq!(dir, snapshot_dir);
    let calls = hub.snapshot_calls.lock().unwrap();
    assert_eq!(calls.as_slice(), &[("org/model".to_string(), patterns())]);
    assert_eq!(*seen.lock().unwrap(), vec![(0, 100), (100, 100)]);
    assert_eq!(hub.local_dir_count(), 0);
}

#[test]
fn unauthorized_falls_back_to_cache() {
    let tmp = tempfile::tempdir().unwrap();
    let hub = FakeHub::new(Behavior::Unauthorized, tmp.path());

    let dir = resolve(&ModelReference::RemoteId("org/private".into()), &hub, &patterns(), &|_: u64, _: u64| {}).unwrap();

    assert_eq!(dir, tmp.path().join("org--private"));
    assert_eq!(hub.snapshot_count(), 1);
    assert_eq!(hub.local_dir_count(), 1);
}

#[test]
fn offline_falls_back_to_cache() {
    let tmp = tempfile::tempdir().unwrap();
    let hub = FakeHub::new(Behavior::Offline, tmp.path());

    let dir = resolve(&ModelReference::RemoteId("org/model".into()), &hub, &patterns(), &|_: u64, _: u64| {}).unwrap();

    assert_eq!(dir, tmp.path().join("org--model"));
}

#[test]
fn other_transfer_failures_propagate() {
    let tmp = tempfile::tempdir().unwrap();
    let hub = FakeHub::new(Behavior::ServerError, tmp.path());

    let err = resolve(&ModelReference::RemoteId("org/model".into()), &hub, &patterns(), &|_: u64, _: u64| {}).unwrap_err();

    assert!(matches!(err, LoadError::Transfer(_)), "got {:?}", err);
    assert_eq!(hub.local_dir_count(), 0);
}
