use std::collections::HashMap;
use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use sync_core::{FileState, RelPath, Source};
use tracing::warn;

use crate::classify::is_binary;
use crate::hash::content_hash;
use crate::ignore::IgnoreMatcher;

/// Name of the subdirectory reserved for the daemon's own index file. Never
/// scanned, watched, or reconciled.
pub const RESERVED_DIR: &str = ".youlab-sync";

/// Walks `root` depth-first, producing a map of relative path to observed
/// local state. Skips the reserved sync subdirectory, ignored paths, binary
/// files, and empty files. Individual file or directory errors are logged
/// and skipped; the walk as a whole always completes.
pub fn scan(root: &Path, ignore: &IgnoreMatcher) -> HashMap<RelPath, FileState> {
    let mut out = HashMap::new();
    walk_dir(root, root, ignore, &mut out);
    out
}

fn walk_dir(root: &Path, dir: &Path, ignore: &IgnoreMatcher, out: &mut HashMap<RelPath, FileState>) {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(dir = %dir.display(), error = %e, "failed to read directory, skipping");
            return;
        }
    };

    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(dir = %dir.display(), error = %e, "failed to read directory entry, skipping");
                continue;
            }
        };
        let path = entry.path();

        let rel = match path.strip_prefix(root) {
            Ok(rel) => rel,
            Err(_) => continue,
        };

        if rel
            .components()
            .next()
            .map(|c| c.as_os_str() == RESERVED_DIR)
            .unwrap_or(false)
        {
            continue;
        }

        if ignore.is_ignored(rel) {
            continue;
        }

        let file_type = match entry.file_type() {
            Ok(ft) => ft,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to stat entry, skipping");
                continue;
            }
        };

        if file_type.is_dir() {
            walk_dir(root, &path, ignore, out);
        } else if file_type.is_file() {
            if let Some((rel_path, state)) = scan_file(root, &path) {
                out.insert(rel_path, state);
            }
        }
        // symlinks and other special file types are not synchronized.
    }
}

fn scan_file(root: &Path, path: &Path) -> Option<(RelPath, FileState)> {
    let rel_path = match RelPath::from_path(root, path) {
        Ok(rel) => rel,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "skipping unrepresentable path");
            return None;
        }
    };

    let metadata = match fs::metadata(path) {
        Ok(m) => m,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "failed to stat file, skipping");
            return None;
        }
    };

    let content = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "failed to read file, skipping");
            return None;
        }
    };

    if content.is_empty() || is_binary(&content) {
        return None;
    }

    let modified: DateTime<Utc> = metadata
        .modified()
        .map(DateTime::<Utc>::from)
        .unwrap_or_else(|_| Utc::now());

    let state = FileState {
        path: rel_path.clone(),
        hash: content_hash(&content),
        size: content.len() as u64,
        modified,
        source: Source::Local,
        synced_at: DateTime::<Utc>::UNIX_EPOCH,
    };

    Some((rel_path, state))
}
