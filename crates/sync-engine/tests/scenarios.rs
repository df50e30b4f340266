//! End-to-end reconciliation scenarios (spec §8), exercised against the
//! public `Reconciler` API and an in-memory `Transport` the way
//! `ax-server`'s integration suite exercises its router against a live
//! HTTP client rather than unit-testing handlers directly.

use std::sync::Arc;

use chrono::{Duration, Utc};
use sync_core::{CancelToken, RelPath};
use sync_engine::Reconciler;
use sync_local::{content_hash, IgnoreMatcher};
use sync_remote::MemoryTransport;
use tempfile::TempDir;

#[tokio::test]
async fn scenario_tie_break_prefers_local() {
    let dir = TempDir::new().unwrap();
    let transport = Arc::new(MemoryTransport::new("user-1"));

    let tie_time = Utc::now() - Duration::seconds(60);
    transport.seed(
        RelPath::new("doc.md").unwrap(),
        b"remote version".to_vec(),
        content_hash(b"remote version"),
        tie_time,
    );
    std::fs::write(dir.path().join("doc.md"), "local version").unwrap();
    filetime::set_file_mtime(
        dir.path().join("doc.md"),
        filetime::FileTime::from_unix_time(tie_time.timestamp(), 0),
    )
    .unwrap();

    let reconciler = Reconciler::new(
        transport.clone(),
        dir.path().to_path_buf(),
        IgnoreMatcher::new(&[]),
        "user-1".to_string(),
    );
    let cancel = CancelToken::new();

    let summary = reconciler.full_reconciliation(&cancel).await.unwrap();
    assert_eq!(summary.uploaded, 1);
    assert_eq!(summary.downloaded, 0);

    let remote_listing = transport.list_files(&cancel).await.unwrap();
    let remote_file = remote_listing
        .files
        .get(&RelPath::new("doc.md").unwrap())
        .unwrap();
    assert_eq!(remote_file.hash, content_hash(b"local version"));
}

#[tokio::test]
async fn scenario_ignored_paths_never_transit() {
    let dir = TempDir::new().unwrap();
    std::fs::create_dir_all(dir.path().join("project/.git")).unwrap();
    std::fs::write(dir.path().join("project/.git/config"), "git config").unwrap();
    std::fs::write(dir.path().join("project/build.log"), "build output").unwrap();

    let transport = Arc::new(MemoryTransport::new("user-1"));
    let ignore = IgnoreMatcher::new(&[".git".to_string(), "*.log".to_string()]);
    let reconciler = Reconciler::new(transport.clone(), dir.path().to_path_buf(), ignore, "user-1".to_string());
    let cancel = CancelToken::new();

    let summary = reconciler.full_reconciliation(&cancel).await.unwrap();
    assert_eq!(summary.uploaded, 0);

    let remote_listing = transport.list_files(&cancel).await.unwrap();
    assert!(remote_listing.files.is_empty());
    assert_eq!(reconciler.index_len().await, 0);
}

#[tokio::test]
async fn scenario_index_reload_after_full_sync_is_stable() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("a.txt"), "content").unwrap();

    let transport = Arc::new(MemoryTransport::new("user-1"));
    let reconciler = Reconciler::new(
        transport,
        dir.path().to_path_buf(),
        IgnoreMatcher::new(&[]),
        "user-1".to_string(),
    );
    let cancel = CancelToken::new();
    reconciler.full_reconciliation(&cancel).await.unwrap();

    let reloaded = sync_engine::IndexStore::new(dir.path()).load("user-1");
    assert_eq!(reloaded.len(), 1);
    assert!(reloaded.get(&RelPath::new("a.txt").unwrap()).is_some());
}

#[tokio::test]
async fn scenario_first_time_paths_transfer_not_delete() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("new_local.txt"), "new").unwrap();

    let transport = Arc::new(MemoryTransport::new("user-1"));
    transport.seed(
        RelPath::new("new_remote.txt").unwrap(),
        b"remote new".to_vec(),
        content_hash(b"remote new"),
        Utc::now(),
    );

    let reconciler = Reconciler::new(
        transport.clone(),
        dir.path().to_path_buf(),
        IgnoreMatcher::new(&[]),
        "user-1".to_string(),
    );
    let cancel = CancelToken::new();
    let summary = reconciler.full_reconciliation(&cancel).await.unwrap();

    assert_eq!(summary.uploaded, 1);
    assert_eq!(summary.downloaded, 1);
    assert_eq!(summary.deleted_remote, 0);
    assert_eq!(summary.deleted_local, 0);
    assert!(dir.path().join("new_remote.txt").exists());

    let remote_listing = transport.list_files(&cancel).await.unwrap();
    assert!(remote_listing
        .files
        .contains_key(&RelPath::new("new_local.txt").unwrap()));
}
