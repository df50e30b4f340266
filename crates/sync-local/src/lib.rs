mod classify;
mod hash;
mod ignore;
mod scanner;
mod watcher;

pub use classify::is_binary;
pub use hash::content_hash;
pub use ignore::IgnoreMatcher;
pub use scanner::{scan, RESERVED_DIR};
pub use watcher::{EventSource, FsOp, WatchEvent};
