//! An in-memory `Transport`, grounded on the pack's in-memory storage
//! backends used for fast, deterministic tests without a live server. Also
//! useful for the reconciler's own test suite, which exercises the full
//! decision table without spinning up HTTP.

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::Utc;
use sync_core::{CancelToken, GetFileOutcome, RelPath, RemoteFileMeta, RemoteListing, Transport, TransportError};

struct Entry {
    content: Vec<u8>,
    meta: RemoteFileMeta,
}

/// In-memory workspace for one user, useful as a `Transport` test double.
pub struct MemoryTransport {
    user_id: String,
    files: RwLock<HashMap<RelPath, Entry>>,
    reachable: std::sync::atomic::AtomicBool,
}

impl MemoryTransport {
    pub fn new(user_id: impl Into<String>) -> Self {
        MemoryTransport {
            user_id: user_id.into(),
            files: RwLock::new(HashMap::new()),
            reachable: std::sync::atomic::AtomicBool::new(true),
        }
    }

    /// Seed the workspace with a file as if a prior `put_file` had
    /// succeeded, without exercising the async API.
    pub fn seed(&self, path: RelPath, content: Vec<u8>, hash: String, modified: chrono::DateTime<Utc>) {
        let meta = RemoteFileMeta {
            path: path.clone(),
            hash,
            size: content.len() as u64,
            modified,
        };
        self.files
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(path, Entry { content, meta });
    }

    /// Simulate the remote becoming unreachable; every subsequent call
    /// fails until `set_reachable(true)`.
    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, std::sync::atomic::Ordering::SeqCst);
    }

    fn check_reachable(&self) -> Result<(), TransportError> {
        if self.reachable.load(std::sync::atomic::Ordering::SeqCst) {
            Ok(())
        } else {
            Err(TransportError::ConnectionFailed {
                source: Box::new(std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "remote unreachable")),
            })
        }
    }
}

#[async_trait::async_trait]
impl Transport for MemoryTransport {
    async fn ping(&self, _cancel: &CancelToken) -> Result<(), TransportError> {
        self.check_reachable()
    }

    async fn list_files(&self, _cancel: &CancelToken) -> Result<RemoteListing, TransportError> {
        self.check_reachable()?;
        let files = self.files.read().unwrap_or_else(|e| e.into_inner());
        Ok(RemoteListing {
            user_id: self.user_id.clone(),
            files: files.iter().map(|(k, v)| (k.clone(), v.meta.clone())).collect(),
        })
    }

    async fn get_file(
        &self,
        path: &RelPath,
        _cancel: &CancelToken,
    ) -> Result<GetFileOutcome, TransportError> {
        self.check_reachable()?;
        let files = self.files.read().unwrap_or_else(|e| e.into_inner());
        match files.get(path) {
            Some(entry) => Ok(GetFileOutcome::Found(entry.content.clone(), entry.meta.clone())),
            None => Ok(GetFileOutcome::NotFound),
        }
    }

    async fn put_file(
        &self,
        path: &RelPath,
        content: &[u8],
        _cancel: &CancelToken,
    ) -> Result<RemoteFileMeta, TransportError> {
        self.check_reachable()?;
        let hash = sha256_hex(content);
        let meta = RemoteFileMeta {
            path: path.clone(),
            hash,
            size: content.len() as u64,
            modified: Utc::now(),
        };
        self.files.write().unwrap_or_else(|e| e.into_inner()).insert(
            path.clone(),
            Entry {
                content: content.to_vec(),
                meta: meta.clone(),
            },
        );
        Ok(meta)
    }

    async fn delete_file(&self, path: &RelPath, _cancel: &CancelToken) -> Result<(), TransportError> {
        self.check_reachable()?;
        self.files.write().unwrap_or_else(|e| e.into_inner()).remove(path);
        Ok(())
    }
}

/// Local re-implementation to avoid a `sync-local` dependency from this
/// crate purely for test-double hashing; kept in step with
/// `sync_local::content_hash` by the shared SHA-256 algorithm, not by code
/// sharing.
fn sha256_hex(content: &[u8]) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(content);
    let digest = hasher.finalize();
    use std::fmt::Write;
    let mut out = String::with_capacity(digest.len() * 2);
    for b in digest {
        write!(out, "{:02x}", b).expect("writing to a String never fails");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use sync_core::CancelToken;

    #[tokio::test]
    async fn put_then_get_round_trips() {
        let transport = MemoryTransport::new("user-1");
        let cancel = CancelToken::new();
        let path = RelPath::new("a.txt").unwrap();

        let meta = transport.put_file(&path, b"hello", &cancel).await.unwrap();
        assert_eq!(meta.size, 5);

        match transport.get_file(&path, &cancel).await.unwrap() {
            GetFileOutcome::Found(content, got_meta) => {
                assert_eq!(content, b"hello");
                assert_eq!(got_meta.hash, meta.hash);
            }
            GetFileOutcome::NotFound => panic!("expected file to be found"),
        }
    }

    #[tokio::test]
    async fn get_missing_file_is_not_found() {
        let transport = MemoryTransport::new("user-1");
        let cancel = CancelToken::new();
        let path = RelPath::new("missing.txt").unwrap();
        assert!(matches!(
            transport.get_file(&path, &cancel).await.unwrap(),
            GetFileOutcome::NotFound
        ));
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let transport = MemoryTransport::new("user-1");
        let cancel = CancelToken::new();
        let path = RelPath::new("a.txt").unwrap();
        transport.delete_file(&path, &cancel).await.unwrap();
        transport.put_file(&path, b"x", &cancel).await.unwrap();
        transport.delete_file(&path, &cancel).await.unwrap();
        transport.delete_file(&path, &cancel).await.unwrap();
        assert!(matches!(
            transport.get_file(&path, &cancel).await.unwrap(),
            GetFileOutcome::NotFound
        ));
    }

    #[tokio::test]
    async fn unreachable_remote_fails_every_call() {
        let transport = MemoryTransport::new("user-1");
        transport.set_reachable(false);
        let cancel = CancelToken::new();
        assert!(transport.ping(&cancel).await.is_err());
        assert!(transport.list_files(&cancel).await.is_err());
    }
}
