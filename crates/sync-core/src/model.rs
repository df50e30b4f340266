use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A slash-normalized path relative to the configured local root.
///
/// Never absolute, never empty, never contains a `.` or `..` component after
/// normalization -- `new` rejects anything that would escape the root.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RelPath(String);

impl RelPath {
    /// Build a `RelPath` from a slash- or OS-separator-delimited string,
    /// normalizing separators and rejecting traversal components.
    pub fn new(raw: impl AsRef<str>) -> Result<Self, String> {
        let raw = raw.as_ref();
        let mut parts = Vec::new();
        for component in raw.split(['/', '\\']) {
            match component {
                "" | "." => continue,
                ".." => return Err(format!("path escapes root: {raw}")),
                other => parts.push(other),
            }
        }
        if parts.is_empty() {
            return Err(format!("empty relative path: {raw}"));
        }
        Ok(RelPath(parts.join("/")))
    }

    /// Compute the `RelPath` of `path` relative to `root`.
    pub fn from_path(root: &Path, path: &Path) -> Result<Self, String> {
        let rel = path
            .strip_prefix(root)
            .map_err(|_| format!("{} is not under {}", path.display(), root.display()))?;
        Self::new(rel.to_string_lossy())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Resolve this relative path against a local root.
    pub fn to_local_path(&self, root: &Path) -> PathBuf {
        let mut buf = root.to_path_buf();
        for component in self.0.split('/') {
            buf.push(component);
        }
        buf
    }

    /// Whether this path lies under the given reserved subdirectory name
    /// (e.g. `.youlab-sync`), checked against the first path component.
    pub fn is_under_reserved_dir(&self, reserved_dir_name: &str) -> bool {
        self.0
            .split('/')
            .next()
            .map(|first| first == reserved_dir_name)
            .unwrap_or(false)
    }
}

impl std::fmt::Display for RelPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Provenance of the last sync that produced a `FileState` record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    Local,
    Remote,
    Both,
}

/// The observed state of one file, as tracked by the local scanner or
/// persisted in the index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileState {
    pub path: RelPath,
    /// Lowercase hex SHA-256 digest of the file's content.
    pub hash: String,
    pub size: u64,
    pub modified: DateTime<Utc>,
    pub source: Source,
    pub synced_at: DateTime<Utc>,
}

/// Metadata for a file as reported by the remote workspace's listing or
/// per-file endpoints. No provenance -- the remote has no concept of it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteFileMeta {
    pub path: RelPath,
    pub hash: String,
    pub size: u64,
    pub modified: DateTime<Utc>,
}

/// Common accessor for the fields the reconciler's decision table compares,
/// shared between locally-observed and remotely-reported file records.
pub trait ContentMeta {
    fn hash(&self) -> &str;
    fn modified(&self) -> DateTime<Utc>;
}

impl ContentMeta for FileState {
    fn hash(&self) -> &str {
        &self.hash
    }

    fn modified(&self) -> DateTime<Utc> {
        self.modified
    }
}

impl ContentMeta for RemoteFileMeta {
    fn hash(&self) -> &str {
        &self.hash
    }

    fn modified(&self) -> DateTime<Utc> {
        self.modified
    }
}

/// Two records are content-equal iff their hex digests are bit-exact equal.
pub fn content_eq(a: &impl ContentMeta, b: &impl ContentMeta) -> bool {
    a.hash() == b.hash()
}

pub const INDEX_SCHEMA_VERSION: u32 = 1;

/// The persisted map of last-known file states, keyed by relative path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Index {
    pub version: u32,
    pub user_id: String,
    pub last_sync: DateTime<Utc>,
    pub files: HashMap<RelPath, FileState>,
}

impl Index {
    /// An empty index for a fresh workspace, at the current schema version.
    pub fn empty(user_id: impl Into<String>) -> Self {
        Index {
            version: INDEX_SCHEMA_VERSION,
            user_id: user_id.into(),
            last_sync: Utc::now(),
            files: HashMap::new(),
        }
    }

    pub fn get(&self, path: &RelPath) -> Option<&FileState> {
        self.files.get(path)
    }

    pub fn insert(&mut self, state: FileState) {
        self.files.insert(state.path.clone(), state);
    }

    pub fn remove(&mut self, path: &RelPath) -> Option<FileState> {
        self.files.remove(path)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}
