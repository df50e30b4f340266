//! The sync daemon's core engine: index persistence, the three-way
//! reconciliation policy, and the daemon loop that drives them against a
//! live `Transport` and local filesystem.

mod daemon;
mod index_store;
mod reconciler;
mod status;

pub use daemon::{watch_for_shutdown_signal, Daemon, DaemonState};
pub use index_store::IndexStore;
pub use reconciler::{ReconcileSummary, Reconciler};
pub use status::{check_status, StatusReport};
