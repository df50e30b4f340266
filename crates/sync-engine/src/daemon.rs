//! The Daemon Loop: wires the Index Store, the Reconciler, the Event Source,
//! and the periodic timer into the `starting -> initial-syncing -> running ->
//! stopping -> stopped` state machine (spec §4.8.4 / §4.9).
//!
//! Graceful shutdown follows the same ctrl_c + SIGTERM race used throughout
//! the pack for long-running services: a dedicated task awaits both signals
//! and triggers one shared `CancelToken` that every blocking operation below
//! observes.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use sync_config::{SyncDaemonConfig, EVENT_CHANNEL_CAPACITY};
use sync_core::{CancelToken, SyncError, Transport};
use sync_local::{EventSource, IgnoreMatcher};
use tracing::{error, info, warn};

use crate::reconciler::Reconciler;

/// Coarse daemon lifecycle state (spec §4.8.4), surfaced for status
/// reporting and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DaemonState {
    Starting,
    InitialSyncing,
    Running,
    Stopping,
    Stopped,
}

impl DaemonState {
    fn from_code(code: u8) -> Self {
        match code {
            0 => DaemonState::Starting,
            1 => DaemonState::InitialSyncing,
            2 => DaemonState::Running,
            3 => DaemonState::Stopping,
            _ => DaemonState::Stopped,
        }
    }
}

/// Owns the running daemon's components and its shutdown token.
pub struct Daemon {
    reconciler: Arc<Reconciler>,
    config: SyncDaemonConfig,
    cancel: CancelToken,
    state: AtomicU8,
}

impl Daemon {
    pub fn new(config: SyncDaemonConfig, transport: Arc<dyn Transport>) -> Self {
        let ignore = IgnoreMatcher::new(&config.ignore);
        let reconciler = Arc::new(Reconciler::new(
            transport,
            config.sync.local_folder.clone(),
            ignore,
            config.server.user_id.clone(),
        ));

        Daemon {
            reconciler,
            config,
            cancel: CancelToken::new(),
            state: AtomicU8::new(0),
        }
    }

    /// A cheap clone of the daemon's shutdown token, for an external caller
    /// that wants to trigger shutdown itself (e.g. a CLI's signal handler).
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn state(&self) -> DaemonState {
        DaemonState::from_code(self.state.load(Ordering::SeqCst))
    }

    fn set_state(&self, state: DaemonState) {
        self.state.store(state as u8, Ordering::SeqCst);
    }

    /// Run the daemon loop to completion (spec §4.9). Returns once shutdown
    /// has been fully processed.
    pub async fn run(&self) -> Result<(), SyncError> {
        info!("daemon starting");
        self.set_state(DaemonState::InitialSyncing);

        info!("running initial full reconciliation");
        if let Err(e) = self.reconciler.full_reconciliation(&self.cancel).await {
            warn!(error = %e, "initial full reconciliation failed, continuing anyway");
        }

        info!("entering running state");
        self.set_state(DaemonState::Running);

        let mut watcher_handle = if self.config.watch.enabled {
            Some(self.spawn_watcher()?)
        } else {
            None
        };

        let periodic_handle = if self.config.sync.bidirectional && !self.config.sync.interval.is_zero() {
            Some(self.spawn_periodic_timer())
        } else {
            None
        };

        self.cancel.cancelled().await;

        info!("shutdown signalled, stopping");
        self.set_state(DaemonState::Stopping);

        if let Some(mut handle) = watcher_handle.take() {
            handle.source.stop();
            let _ = tokio::time::timeout(Duration::from_millis(500), handle.worker).await;
        }

        if let Some(handle) = periodic_handle {
            let _ = tokio::time::timeout(Duration::from_millis(500), handle).await;
        }

        self.set_state(DaemonState::Stopped);
        info!("daemon stopped");
        Ok(())
    }

    /// Trigger shutdown. Idempotent.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    fn spawn_watcher(&self) -> Result<WatcherHandle, SyncError> {
        let ignore = IgnoreMatcher::new(&self.config.ignore);
        let (source, mut events, mut errors) = EventSource::start(
            self.config.sync.local_folder.clone(),
            ignore,
            self.config.watch.debounce.as_duration(),
            EVENT_CHANNEL_CAPACITY,
        )?;

        let reconciler = self.reconciler.clone();
        let cancel = self.cancel.clone();
        let worker = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    event = events.recv() => {
                        match event {
                            Some(event) => {
                                if let Err(e) = reconciler.handle_event(event, &cancel).await {
                                    warn!(error = %e, "event handling failed");
                                }
                            }
                            None => break,
                        }
                    }
                    error = errors.recv() => {
                        match error {
                            Some(message) => error!(message = %message, "watch subscription error"),
                            None => break,
                        }
                    }
                }
            }
        });

        Ok(WatcherHandle { source, worker })
    }

    fn spawn_periodic_timer(&self) -> tokio::task::JoinHandle<()> {
        let reconciler = self.reconciler.clone();
        let cancel = self.cancel.clone();
        let interval = self.config.sync.interval.as_duration();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // The first tick fires immediately; the daemon already ran an
            // initial full reconciliation, so skip it.
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        if let Err(e) = reconciler.full_reconciliation(&cancel).await {
                            warn!(error = %e, "periodic full reconciliation failed");
                        }
                    }
                }
            }
        })
    }
}

struct WatcherHandle {
    source: EventSource,
    worker: tokio::task::JoinHandle<()>,
}

/// Await `ctrl_c` or SIGTERM and cancel `token` on either. Runs until the
/// process receives a shutdown signal or `token` is already cancelled by
/// some other path (e.g. a test harness).
pub async fn watch_for_shutdown_signal(token: CancelToken) {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received ctrl-c"),
        _ = terminate => info!("received SIGTERM"),
        _ = token.cancelled() => {}
    }

    token.cancel();
}
