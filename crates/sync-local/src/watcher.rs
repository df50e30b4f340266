//! Debounced filesystem watcher (the Event Source).
//!
//! Wraps `notify` with a recommended (inotify/FSEvents/etc) watcher by
//! default, falling back to a poll watcher under an env var for deterministic
//! tests, and adds the per-path debounce the daemon needs on top of raw
//! notify events.
//!
//! Debouncing uses a per-path generation counter rather than a map of
//! mutable timer handles: each raw event bumps the path's generation and
//! spawns a delayed emit that checks, when it wakes, whether its generation
//! is still current. A later raw event bumps the counter again and the
//! earlier timer's wake becomes a no-op, which is exactly "a new raw event
//! cancels and restarts the timer" without needing to cancel anything.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use notify::{Config, Event, EventKind, PollWatcher, RecommendedWatcher, RecursiveMode, Watcher};
use sync_core::{CancelToken, RelPath, SyncError};
use tokio::sync::mpsc;
use tracing::warn;

use crate::ignore::IgnoreMatcher;
use crate::scanner::RESERVED_DIR;

/// Filesystem operation that produced an event, per the wire-level vocabulary
/// the reconciler reacts to. `Rename` is never constructed by this watcher --
/// renames surface as a `Remove` of the old path and a `Create` of the new
/// one, per the daemon's rename-as-remove-plus-create policy -- but the
/// variant is kept so downstream matches stay exhaustive against the full
/// operation vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsOp {
    Create,
    Write,
    Remove,
    Rename,
}

/// A debounced, coalesced event ready for the reconciler.
#[derive(Debug, Clone)]
pub struct WatchEvent {
    pub path: RelPath,
    pub op: FsOp,
    pub time: DateTime<Utc>,
}

struct RawEvent {
    path: PathBuf,
    op: FsOp,
    time: DateTime<Utc>,
}

enum WatcherImpl {
    Recommended(RecommendedWatcher),
    Poll(PollWatcher),
}

impl WatcherImpl {
    fn watch(&mut self, path: &Path, mode: RecursiveMode) -> notify::Result<()> {
        match self {
            WatcherImpl::Recommended(w) => w.watch(path, mode),
            WatcherImpl::Poll(w) => w.watch(path, mode),
        }
    }
}

fn poll_interval_from_env() -> Option<Duration> {
    let value = std::env::var("YOULAB_SYNC_WATCH_POLL_INTERVAL_MS").ok()?;
    let millis: u64 = value.parse().ok()?;
    if millis == 0 {
        return None;
    }
    Some(Duration::from_millis(millis))
}

fn build_watcher<F>(handler: F) -> Result<WatcherImpl, SyncError>
where
    F: Fn(Result<Event, notify::Error>) + Send + 'static,
{
    if let Some(poll_interval) = poll_interval_from_env() {
        let config = Config::default()
            .with_poll_interval(poll_interval)
            .with_compare_contents(true);
        let watcher = PollWatcher::new(handler, config)
            .map_err(|e| SyncError::Watch(format!("failed to create poll watcher: {e}")))?;
        Ok(WatcherImpl::Poll(watcher))
    } else {
        let watcher = RecommendedWatcher::new(handler, Config::default())
            .map_err(|e| SyncError::Watch(format!("failed to create watcher: {e}")))?;
        Ok(WatcherImpl::Recommended(watcher))
    }
}

fn convert_event(event: &Event) -> Vec<RawEvent> {
    let op = match event.kind {
        EventKind::Create(_) => FsOp::Create,
        EventKind::Modify(_) => FsOp::Write,
        EventKind::Remove(_) => FsOp::Remove,
        EventKind::Access(_) | EventKind::Other | EventKind::Any => return Vec::new(),
    };
    let time = Utc::now();
    event
        .paths
        .iter()
        .cloned()
        .map(|path| RawEvent {
            path,
            op,
            time,
        })
        .collect()
}

/// A live, debounced subscription to filesystem changes under one root.
pub struct EventSource {
    watcher: Option<WatcherImpl>,
    cancel: CancelToken,
}

impl EventSource {
    /// Start watching `root` recursively. Ignored paths never produce
    /// output. Returns the source handle plus the events and errors
    /// channels; both are bounded, and both are closed by `stop`.
    pub fn start(
        root: PathBuf,
        ignore: IgnoreMatcher,
        debounce: Duration,
        capacity: usize,
    ) -> Result<(Self, mpsc::Receiver<WatchEvent>, mpsc::Receiver<String>), SyncError> {
        let (events_tx, events_rx) = mpsc::channel::<WatchEvent>(capacity);
        let (errors_tx, errors_rx) = mpsc::channel::<String>(32);
        let (raw_tx, mut raw_rx) = mpsc::channel::<RawEvent>(1024);

        let cancel = CancelToken::new();
        let pending: Arc<Mutex<HashMap<PathBuf, u64>>> = Arc::new(Mutex::new(HashMap::new()));

        {
            let cancel = cancel.clone();
            let pending = pending.clone();
            let root = root.clone();
            tokio::spawn(async move {
                loop {
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        raw = raw_rx.recv() => {
                            match raw {
                                Some(raw) => dispatch_raw(
                                    raw,
                                    &root,
                                    &ignore,
                                    &pending,
                                    debounce,
                                    events_tx.clone(),
                                    cancel.clone(),
                                ),
                                None => break,
                            }
                        }
                    }
                }
            });
        }

        let errors_tx_cb = errors_tx;
        let handler = move |result: Result<Event, notify::Error>| match result {
            Ok(event) => {
                for raw in convert_event(&event) {
                    if raw_tx.blocking_send(raw).is_err() {
                        // processing task has shut down; nothing to do.
                    }
                }
            }
            Err(e) => {
                if errors_tx_cb.try_send(format!("watch subscription error: {e}")).is_err() {
                    warn!("error channel full, dropping watch error");
                }
            }
        };

        let mut watcher = build_watcher(handler)?;
        watcher
            .watch(&root, RecursiveMode::Recursive)
            .map_err(|e| SyncError::Watch(format!("failed to watch {}: {e}", root.display())))?;

        Ok((
            EventSource {
                watcher: Some(watcher),
                cancel,
            },
            events_rx,
            errors_rx,
        ))
    }

    /// Stop the watcher: cancels pending debounce timers, releases the OS
    /// subscription, and lets the event/error channels close as their
    /// senders drop. Idempotent.
    pub fn stop(&mut self) {
        self.cancel.cancel();
        self.watcher = None;
    }
}

impl Drop for EventSource {
    fn drop(&mut self) {
        self.stop();
    }
}

#[allow(clippy::too_many_arguments)]
fn dispatch_raw(
    raw: RawEvent,
    root: &Path,
    ignore: &IgnoreMatcher,
    pending: &Arc<Mutex<HashMap<PathBuf, u64>>>,
    debounce: Duration,
    events_tx: mpsc::Sender<WatchEvent>,
    cancel: CancelToken,
) {
    let rel = match raw.path.strip_prefix(root) {
        Ok(rel) => rel.to_path_buf(),
        Err(_) => return,
    };

    if rel
        .components()
        .next()
        .map(|c| c.as_os_str() == RESERVED_DIR)
        .unwrap_or(false)
    {
        return;
    }

    if ignore.is_ignored(&rel) {
        return;
    }

    let rel_path = match RelPath::from_path(root, &raw.path) {
        Ok(rel_path) => rel_path,
        Err(e) => {
            warn!(path = %raw.path.display(), error = %e, "skipping unrepresentable watch path");
            return;
        }
    };

    let generation = {
        let mut pending = pending.lock().expect("pending map poisoned");
        let gen = pending.entry(raw.path.clone()).or_insert(0);
        *gen += 1;
        *gen
    };

    let pending = pending.clone();
    let watch_path = raw.path.clone();
    tokio::spawn(async move {
        tokio::select! {
            _ = cancel.cancelled() => {}
            _ = tokio::time::sleep(debounce) => {
                let still_current = {
                    let mut pending = pending.lock().expect("pending map poisoned");
                    match pending.get(&watch_path) {
                        Some(&g) if g == generation => {
                            pending.remove(&watch_path);
                            true
                        }
                        _ => false,
                    }
                };
                if still_current {
                    let event = WatchEvent {
                        path: rel_path,
                        op: raw.op,
                        time: raw.time,
                    };
                    if events_tx.try_send(event).is_err() {
                        warn!(path = %watch_path.display(), "events channel full, dropping event");
                    }
                }
            }
        }
    });
}
