use std::collections::HashMap;

use async_trait::async_trait;

use crate::cancel::CancelToken;
use crate::error::TransportError;
use crate::model::{RelPath, RemoteFileMeta};

/// The full remote listing for one user's workspace.
#[derive(Debug, Clone)]
pub struct RemoteListing {
    pub user_id: String,
    pub files: HashMap<RelPath, RemoteFileMeta>,
}

/// Result of fetching a single file's content from the remote.
///
/// Distinguishes "the remote has no such file" from a transport failure so
/// the reconciler can treat the former as a legitimate decision-table input
/// rather than an error to propagate.
#[derive(Debug)]
pub enum GetFileOutcome {
    Found(Vec<u8>, RemoteFileMeta),
    NotFound,
}

/// The wire contract between the daemon and a remote workspace.
///
/// Every method accepts a `CancelToken` so a caller tearing down the daemon
/// (or superseding a stale reconciliation pass) can abort an in-flight
/// request instead of waiting it out.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Verify the remote is reachable and the configured credentials are
    /// accepted.
    async fn ping(&self, cancel: &CancelToken) -> Result<(), TransportError>;

    /// Fetch metadata for every file the remote currently holds for this
    /// user.
    async fn list_files(&self, cancel: &CancelToken) -> Result<RemoteListing, TransportError>;

    /// Fetch one file's content and metadata. Returns `GetFileOutcome::NotFound`
    /// rather than an error when the remote has no record of `path`.
    async fn get_file(
        &self,
        path: &RelPath,
        cancel: &CancelToken,
    ) -> Result<GetFileOutcome, TransportError>;

    /// Upload `content` as the new state of `path`, creating or overwriting
    /// it on the remote.
    async fn put_file(
        &self,
        path: &RelPath,
        content: &[u8],
        cancel: &CancelToken,
    ) -> Result<RemoteFileMeta, TransportError>;

    /// Remove `path` from the remote. Idempotent: deleting an already-absent
    /// path is not an error.
    async fn delete_file(&self, path: &RelPath, cancel: &CancelToken) -> Result<(), TransportError>;
}
