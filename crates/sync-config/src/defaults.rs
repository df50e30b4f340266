use crate::types::HumanDuration;

/// Default debounce interval applied when `watch.debounce` is absent.
pub fn default_debounce() -> HumanDuration {
    HumanDuration(std::time::Duration::from_millis(500))
}

/// Fixed per-request timeout applied by the HTTP transport, independent of
/// the broader cancellation token (spec §5).
pub const TRANSPORT_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(30);

/// Bounded capacity of the watcher's event channel (spec §4.7).
pub const EVENT_CHANNEL_CAPACITY: usize = 100;

/// Bounded capacity of the watcher's error channel (spec §4.7).
pub const ERROR_CHANNEL_CAPACITY: usize = 32;

/// Name of the reserved subdirectory holding the daemon's own index file.
pub const RESERVED_DIR: &str = ".youlab-sync";

/// Default ignore-glob list applied when the config omits `ignore`,
/// covering VCS metadata, editor temp files, OS metadata, and the most
/// common ecosystem caches (spec §6).
pub fn default_ignore_patterns() -> Vec<String> {
    [
        ".git",
        "*.swp",
        "*.swo",
        "*.tmp",
        "~*",
        ".DS_Store",
        "Thumbs.db",
        "node_modules",
        "__pycache__",
        "*.pyc",
        ".venv",
        "target",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}
