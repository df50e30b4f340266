//! Persistence of the `Index` at `{local_root}/{RESERVED_DIR}/index.json`
//! (spec §4.6). Saves write to a sibling temporary file and rename into
//! place so a crash mid-save cannot leave a half-written index behind --
//! grounded on the same write-tmp-then-rename shape used elsewhere in the
//! pack for downloaded file content, generalized here to the index file
//! itself.

use std::path::{Path, PathBuf};

use sync_core::{Index, SyncError};
use sync_local::RESERVED_DIR;
use tracing::warn;

/// Owns the on-disk location of one local root's index file. Concurrent
/// access is mediated entirely by the `Reconciler`; this type performs no
/// locking of its own (spec §4.6).
pub struct IndexStore {
    path: PathBuf,
}

impl IndexStore {
    pub fn new(local_root: &Path) -> Self {
        IndexStore {
            path: local_root.join(RESERVED_DIR).join("index.json"),
        }
    }

    /// Load the index from disk. A missing file yields an empty index at
    /// the current schema version rather than an error. A corrupted file is
    /// logged and treated the same way; the next successful save replaces
    /// it.
    pub fn load(&self, user_id: &str) -> Index {
        match std::fs::read(&self.path) {
            Ok(bytes) => match serde_json::from_slice::<Index>(&bytes) {
                Ok(index) => index,
                Err(e) => {
                    warn!(path = %self.path.display(), error = %e, "index file corrupted, starting fresh");
                    Index::empty(user_id)
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Index::empty(user_id),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "failed to read index file, starting fresh");
                Index::empty(user_id)
            }
        }
    }

    /// Serialize `index` and write it atomically: write to a temporary
    /// sibling, then rename over the real path.
    pub fn save(&self, index: &Index) -> Result<(), SyncError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let serialized = serde_json::to_vec_pretty(index)?;

        let tmp_path = self.path.with_extension("json.tmp");
        std::fs::write(&tmp_path, &serialized)?;
        std::fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sync_core::{FileState, RelPath, Source};
    use tempfile::TempDir;

    #[test]
    fn load_missing_file_yields_empty_index() {
        let dir = TempDir::new().unwrap();
        let store = IndexStore::new(dir.path());
        let index = store.load("user-1");
        assert!(index.is_empty());
        assert_eq!(index.user_id, "user-1");
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = TempDir::new().unwrap();
        let store = IndexStore::new(dir.path());
        let mut index = Index::empty("user-1");
        let now = chrono::Utc::now();
        index.insert(FileState {
            path: RelPath::new("a.txt").unwrap(),
            hash: "abc".into(),
            size: 3,
            modified: now,
            source: Source::Both,
            synced_at: now,
        });

        store.save(&index).unwrap();
        let reloaded = store.load("user-1");
        assert_eq!(reloaded.len(), 1);
        assert_eq!(
            reloaded.get(&RelPath::new("a.txt").unwrap()).unwrap().hash,
            "abc"
        );
    }

    #[test]
    fn corrupted_file_yields_empty_index() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join(RESERVED_DIR)).unwrap();
        std::fs::write(dir.path().join(RESERVED_DIR).join("index.json"), b"not json").unwrap();

        let store = IndexStore::new(dir.path());
        let index = store.load("user-1");
        assert!(index.is_empty());
    }

    #[test]
    fn save_does_not_leave_tmp_file_behind() {
        let dir = TempDir::new().unwrap();
        let store = IndexStore::new(dir.path());
        let index = Index::empty("user-1");
        store.save(&index).unwrap();
        assert!(!dir.path().join(RESERVED_DIR).join("index.json.tmp").exists());
        assert!(dir.path().join(RESERVED_DIR).join("index.json").exists());
    }
}
