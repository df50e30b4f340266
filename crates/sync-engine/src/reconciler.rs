//! The policy engine (spec §4.8): the only component that mutates the
//! `Index` and the only component that issues remote mutations in response
//! to local changes or reconciliation passes.

use std::collections::HashSet;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use sync_core::{
    content_eq, CancelToken, ContentMeta, FileState, GetFileOutcome, Index, RelPath, Source,
    SyncError, Transport,
};
use sync_local::{content_hash, is_binary, scan, FsOp, IgnoreMatcher, WatchEvent};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::index_store::IndexStore;

/// Fuses remote metadata, local state, and indexed state per path and
/// executes the resulting upload/download/delete/no-op action.
pub struct Reconciler {
    transport: Arc<dyn Transport>,
    local_root: std::path::PathBuf,
    ignore: IgnoreMatcher,
    user_id: String,
    index: RwLock<Index>,
    store: IndexStore,
    full_sync_running: AtomicBool,
}

/// Outcome of one full reconciliation pass, returned for status reporting
/// and tests.
#[derive(Debug, Default, Clone)]
pub struct ReconcileSummary {
    pub uploaded: usize,
    pub downloaded: usize,
    pub deleted_remote: usize,
    pub deleted_local: usize,
    pub unchanged: usize,
    pub errors: usize,
}

impl Reconciler {
    pub fn new(
        transport: Arc<dyn Transport>,
        local_root: std::path::PathBuf,
        ignore: IgnoreMatcher,
        user_id: String,
    ) -> Self {
        let store = IndexStore::new(&local_root);
        let index = store.load(&user_id);
        Reconciler {
            transport,
            local_root,
            ignore,
            user_id,
            index: RwLock::new(index),
            store,
            full_sync_running: AtomicBool::new(false),
        }
    }

    pub async fn index_len(&self) -> usize {
        self.index.read().await.len()
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Run one full reconciliation pass (spec §4.8.1). Returns immediately
    /// without doing any work if a prior pass is still in flight (P12: no
    /// overlapping full syncs).
    pub async fn full_reconciliation(
        &self,
        cancel: &CancelToken,
    ) -> Result<ReconcileSummary, SyncError> {
        if self
            .full_sync_running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("full reconciliation already running, skipping this tick");
            return Ok(ReconcileSummary::default());
        }

        let result = self.run_full_reconciliation(cancel).await;
        self.full_sync_running.store(false, Ordering::SeqCst);
        result
    }

    async fn run_full_reconciliation(
        &self,
        cancel: &CancelToken,
    ) -> Result<ReconcileSummary, SyncError> {
        let remote = self.transport.list_files(cancel).await?;
        let local = scan(&self.local_root, &self.ignore);

        let mut paths: HashSet<RelPath> = HashSet::with_capacity(remote.files.len() + local.len());
        paths.extend(remote.files.keys().cloned());
        paths.extend(local.keys().cloned());

        let mut summary = ReconcileSummary::default();

        for path in paths {
            if cancel.is_cancelled() {
                break;
            }

            let r = remote.files.get(&path).cloned();
            let l = local.get(&path).cloned();
            let i = self.index.read().await.get(&path).cloned();

            match self.apply_decision(&path, r, l, i, cancel).await {
                Ok(Outcome::Uploaded) => summary.uploaded += 1,
                Ok(Outcome::Downloaded) => summary.downloaded += 1,
                Ok(Outcome::DeletedRemote) => summary.deleted_remote += 1,
                Ok(Outcome::DeletedLocal) => summary.deleted_local += 1,
                Ok(Outcome::Unchanged) => summary.unchanged += 1,
                Err(e) => {
                    warn!(path = %path, error = %e, "reconciliation action failed, skipping path");
                    summary.errors += 1;
                }
            }
        }

        {
            let mut index = self.index.write().await;
            let stale: Vec<RelPath> = index
                .files
                .keys()
                .filter(|p| !remote.files.contains_key(*p) && !local.contains_key(*p))
                .cloned()
                .collect();
            for path in stale {
                index.remove(&path);
            }
            index.last_sync = Utc::now();
            self.store.save(&index)?;
        }

        info!(
            uploaded = summary.uploaded,
            downloaded = summary.downloaded,
            deleted_remote = summary.deleted_remote,
            deleted_local = summary.deleted_local,
            unchanged = summary.unchanged,
            errors = summary.errors,
            "full reconciliation complete"
        );

        Ok(summary)
    }

    /// Apply the §4.8.2 decision table for a single path.
    async fn apply_decision(
        &self,
        path: &RelPath,
        r: Option<sync_core::RemoteFileMeta>,
        l: Option<FileState>,
        i: Option<FileState>,
        cancel: &CancelToken,
    ) -> Result<Outcome, SyncError> {
        match (r, l, i) {
            (Some(r), Some(l), _) if content_eq(&r, &l) => {
                let state = FileState {
                    path: path.clone(),
                    hash: l.hash,
                    size: l.size,
                    modified: l.modified,
                    source: Source::Both,
                    synced_at: Utc::now(),
                };
                self.index.write().await.insert(state);
                Ok(Outcome::Unchanged)
            }
            (Some(r), Some(l), _) if l.modified() > r.modified() => {
                let meta = self.upload(path, cancel).await?;
                self.index.write().await.insert(FileState {
                    path: path.clone(),
                    hash: meta.hash,
                    size: meta.size,
                    modified: meta.modified,
                    source: Source::Local,
                    synced_at: Utc::now(),
                });
                Ok(Outcome::Uploaded)
            }
            (Some(r), Some(l), _) if r.modified() > l.modified() => {
                let _ = r;
                let _ = l;
                self.download(path, cancel).await?;
                Ok(Outcome::Downloaded)
            }
            (Some(_), Some(_), _) => {
                // Equal timestamps, differing content: local-preference tiebreak.
                let meta = self.upload(path, cancel).await?;
                self.index.write().await.insert(FileState {
                    path: path.clone(),
                    hash: meta.hash,
                    size: meta.size,
                    modified: meta.modified,
                    source: Source::Local,
                    synced_at: Utc::now(),
                });
                Ok(Outcome::Uploaded)
            }
            (Some(_), None, Some(_)) => {
                self.transport.delete_file(path, cancel).await?;
                self.index.write().await.remove(path);
                Ok(Outcome::DeletedRemote)
            }
            (Some(_), None, None) => {
                self.download(path, cancel).await?;
                Ok(Outcome::Downloaded)
            }
            (None, Some(_), Some(_)) => {
                self.delete_local_file(path)?;
                self.index.write().await.remove(path);
                Ok(Outcome::DeletedLocal)
            }
            (None, Some(_), None) => {
                let meta = self.upload(path, cancel).await?;
                self.index.write().await.insert(FileState {
                    path: path.clone(),
                    hash: meta.hash,
                    size: meta.size,
                    modified: meta.modified,
                    source: Source::Local,
                    synced_at: Utc::now(),
                });
                Ok(Outcome::Uploaded)
            }
            (None, None, Some(_)) => {
                // Neither side has the path, but a stale index entry does;
                // only reachable here if a caller feeds a path outside the
                // remote/local union. The post-pass cleanup in
                // `run_full_reconciliation` handles the ordinary case.
                self.index.write().await.remove(path);
                Ok(Outcome::Unchanged)
            }
            (None, None, None) => Ok(Outcome::Unchanged),
        }
    }

    async fn upload(
        &self,
        path: &RelPath,
        cancel: &CancelToken,
    ) -> Result<sync_core::RemoteFileMeta, SyncError> {
        let local_path = path.to_local_path(&self.local_root);
        let content = std::fs::read(&local_path)?;
        let meta = self.transport.put_file(path, &content, cancel).await?;
        Ok(meta)
    }

    async fn download(&self, path: &RelPath, cancel: &CancelToken) -> Result<(), SyncError> {
        match self.transport.get_file(path, cancel).await? {
            GetFileOutcome::Found(content, meta) => {
                write_local_file(&self.local_root, path, &content, meta.modified)?;
                self.index.write().await.insert(FileState {
                    path: path.clone(),
                    hash: meta.hash,
                    size: meta.size,
                    modified: meta.modified,
                    source: Source::Remote,
                    synced_at: Utc::now(),
                });
                Ok(())
            }
            GetFileOutcome::NotFound => {
                // The remote deleted the file between ListFiles and GetFile;
                // treat it the same as a remote-absent path.
                self.index.write().await.remove(path);
                Ok(())
            }
        }
    }

    fn delete_local_file(&self, path: &RelPath) -> Result<(), SyncError> {
        let local_path = path.to_local_path(&self.local_root);
        match std::fs::remove_file(&local_path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// React to one debounced local event (spec §4.8.3).
    pub async fn handle_event(&self, event: WatchEvent, cancel: &CancelToken) -> Result<(), SyncError> {
        match event.op {
            FsOp::Create | FsOp::Write => {
                let local_path = event.path.to_local_path(&self.local_root);
                let content = match std::fs::read(&local_path) {
                    Ok(bytes) => bytes,
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                        // Already gone by the time the debounce fired; the
                        // periodic sync will reconcile the remove.
                        return Ok(());
                    }
                    Err(e) => return Err(e.into()),
                };

                if content.is_empty() || is_binary(&content) {
                    return Ok(());
                }

                let meta = self.transport.put_file(&event.path, &content, cancel).await?;
                let state = FileState {
                    path: event.path.clone(),
                    hash: meta.hash,
                    size: meta.size,
                    modified: meta.modified,
                    source: Source::Local,
                    synced_at: Utc::now(),
                };
                self.index.write().await.insert(state);
                self.persist_index().await?;
                Ok(())
            }
            FsOp::Remove => {
                self.transport.delete_file(&event.path, cancel).await?;
                self.index.write().await.remove(&event.path);
                self.persist_index().await?;
                Ok(())
            }
            FsOp::Rename => Ok(()),
        }
    }

    async fn persist_index(&self) -> Result<(), SyncError> {
        let index = self.index.read().await;
        self.store.save(&index)
    }

    /// Content hash recomputed locally, used only by tests that want to
    /// assert the upload path hashed what it read.
    #[cfg(test)]
    pub(crate) fn hash_local_file(&self, path: &RelPath) -> String {
        let bytes = std::fs::read(path.to_local_path(&self.local_root)).unwrap();
        content_hash(&bytes)
    }
}

enum Outcome {
    Uploaded,
    Downloaded,
    DeletedRemote,
    DeletedLocal,
    Unchanged,
}

fn write_local_file(
    root: &Path,
    path: &RelPath,
    content: &[u8],
    modified: chrono::DateTime<Utc>,
) -> Result<(), SyncError> {
    let local_path = path.to_local_path(root);
    if let Some(parent) = local_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let tmp_path = local_path.with_extension("youlab-sync-tmp");
    std::fs::write(&tmp_path, content)?;
    std::fs::rename(&tmp_path, &local_path)?;

    let file_time = filetime::FileTime::from_unix_time(modified.timestamp(), modified.timestamp_subsec_nanos());
    if let Err(e) = filetime::set_file_mtime(&local_path, file_time) {
        warn!(path = %local_path.display(), error = %e, "failed to set downloaded file's mtime");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use std::sync::Arc;
    use sync_remote::MemoryTransport;
    use tempfile::TempDir;

    fn reconciler(root: &Path) -> Reconciler {
        Reconciler::new(
            Arc::new(MemoryTransport::new("user-1")),
            root.to_path_buf(),
            IgnoreMatcher::new(&[]),
            "user-1".to_string(),
        )
    }

    #[tokio::test]
    async fn fresh_bring_up_local_only_file_uploads() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("readme.md"), "hello\n").unwrap();

        let r = reconciler(dir.path());
        let cancel = CancelToken::new();
        let summary = r.full_reconciliation(&cancel).await.unwrap();

        assert_eq!(summary.uploaded, 1);
        assert_eq!(r.index_len().await, 1);
    }

    #[tokio::test]
    async fn fresh_bring_up_remote_only_file_downloads() {
        let dir = TempDir::new().unwrap();
        let transport = Arc::new(MemoryTransport::new("user-1"));
        transport.seed(
            RelPath::new("spec.md").unwrap(),
            b"S".to_vec(),
            content_hash(b"S"),
            Utc::now(),
        );

        let r = Reconciler::new(
            transport,
            dir.path().to_path_buf(),
            IgnoreMatcher::new(&[]),
            "user-1".to_string(),
        );
        let cancel = CancelToken::new();
        let summary = r.full_reconciliation(&cancel).await.unwrap();

        assert_eq!(summary.downloaded, 1);
        assert_eq!(std::fs::read(dir.path().join("spec.md")).unwrap(), b"S");
    }

    #[tokio::test]
    async fn idempotent_second_pass_makes_no_changes() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.txt"), "content").unwrap();

        let r = reconciler(dir.path());
        let cancel = CancelToken::new();
        r.full_reconciliation(&cancel).await.unwrap();

        let second = r.full_reconciliation(&cancel).await.unwrap();
        assert_eq!(second.uploaded, 0);
        assert_eq!(second.unchanged, 1);
    }

    #[tokio::test]
    async fn conflict_local_newer_uploads() {
        let dir = TempDir::new().unwrap();
        let transport = Arc::new(MemoryTransport::new("user-1"));
        let old_time = Utc::now() - Duration::seconds(30);
        transport.seed(
            RelPath::new("doc.md").unwrap(),
            b"old".to_vec(),
            content_hash(b"old"),
            old_time,
        );
        std::fs::write(dir.path().join("doc.md"), "new content").unwrap();
        // force local mtime newer than remote by touching it after seeding
        filetime::set_file_mtime(
            dir.path().join("doc.md"),
            filetime::FileTime::from_unix_time(Utc::now().timestamp() + 10, 0),
        )
        .unwrap();

        let r = Reconciler::new(
            transport,
            dir.path().to_path_buf(),
            IgnoreMatcher::new(&[]),
            "user-1".to_string(),
        );
        let cancel = CancelToken::new();
        let summary = r.full_reconciliation(&cancel).await.unwrap();
        assert_eq!(summary.uploaded, 1);
    }

    #[tokio::test]
    async fn deletion_memory_deletes_remote_when_local_removed() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.txt");
        std::fs::write(&path, "content").unwrap();

        let r = reconciler(dir.path());
        let cancel = CancelToken::new();
        r.full_reconciliation(&cancel).await.unwrap();

        std::fs::remove_file(&path).unwrap();
        let summary = r.full_reconciliation(&cancel).await.unwrap();
        assert_eq!(summary.deleted_remote, 1);
        assert_eq!(r.index_len().await, 0);
    }

    #[tokio::test]
    async fn event_driven_remove_deletes_remote_and_index() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.txt");
        std::fs::write(&path, "content").unwrap();

        let r = reconciler(dir.path());
        let cancel = CancelToken::new();
        r.full_reconciliation(&cancel).await.unwrap();

        std::fs::remove_file(&path).unwrap();
        r.handle_event(
            WatchEvent {
                path: RelPath::new("a.txt").unwrap(),
                op: FsOp::Remove,
                time: Utc::now(),
            },
            &cancel,
        )
        .await
        .unwrap();

        assert_eq!(r.index_len().await, 0);
    }

    #[tokio::test]
    async fn event_driven_write_skips_empty_file() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("empty.txt"), "").unwrap();

        let r = reconciler(dir.path());
        let cancel = CancelToken::new();
        r.handle_event(
            WatchEvent {
                path: RelPath::new("empty.txt").unwrap(),
                op: FsOp::Write,
                time: Utc::now(),
            },
            &cancel,
        )
        .await
        .unwrap();

        assert_eq!(r.index_len().await, 0);
    }

    #[tokio::test]
    async fn no_overlap_full_syncs() {
        let dir = TempDir::new().unwrap();
        let r = Arc::new(reconciler(dir.path()));
        r.full_sync_running.store(true, Ordering::SeqCst);

        let cancel = CancelToken::new();
        let summary = r.full_reconciliation(&cancel).await.unwrap();
        assert_eq!(summary.uploaded, 0);
        assert_eq!(summary.downloaded, 0);
        assert_eq!(summary.unchanged, 0);
    }
}
