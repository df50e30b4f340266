//! Operator-facing status reporting (spec §7: "status output reports
//! connection reachability and, when reachable, the number of files in the
//! remote workspace"). Returned as data; formatting for display is left to
//! the CLI layer.

use sync_core::{CancelToken, Transport};

/// A point-in-time snapshot of the daemon's connection to its remote
/// workspace, plus the locally-tracked index size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusReport {
    pub user_id: String,
    pub reachable: bool,
    pub remote_file_count: Option<usize>,
    pub indexed_file_count: usize,
    pub error: Option<String>,
}

/// Ping the remote and, if reachable, list its files to report a count.
/// Never propagates a transport error -- an unreachable remote is a valid
/// status, not a failure of the status check itself.
pub async fn check_status(
    transport: &dyn Transport,
    user_id: &str,
    indexed_file_count: usize,
    cancel: &CancelToken,
) -> StatusReport {
    match transport.ping(cancel).await {
        Ok(()) => match transport.list_files(cancel).await {
            Ok(listing) => StatusReport {
                user_id: user_id.to_string(),
                reachable: true,
                remote_file_count: Some(listing.files.len()),
                indexed_file_count,
                error: None,
            },
            Err(e) => StatusReport {
                user_id: user_id.to_string(),
                reachable: true,
                remote_file_count: None,
                indexed_file_count,
                error: Some(e.to_string()),
            },
        },
        Err(e) => StatusReport {
            user_id: user_id.to_string(),
            reachable: false,
            remote_file_count: None,
            indexed_file_count,
            error: Some(e.to_string()),
        },
    }
}
