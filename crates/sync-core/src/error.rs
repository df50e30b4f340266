/// Errors surfaced by a `Transport` implementation.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum TransportError {
    /// The request was cancelled before completion.
    #[error("request cancelled")]
    Cancelled,

    /// The remote reported that the path does not exist.
    #[error("path not found: {0}")]
    NotFound(String),

    /// Connecting to the remote failed.
    #[error("connection to remote failed")]
    ConnectionFailed {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The request exceeded its deadline.
    #[error("request '{operation}' timed out for path: {path}")]
    Timeout { operation: String, path: String },

    /// The remote rejected the request (authentication, bad request, etc).
    #[error("remote rejected request: {0}")]
    Rejected(String),

    /// IO error while reading/writing request bodies.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Any other transport-specific failure.
    #[error("transport error: {0}")]
    Other(String),
}

impl TransportError {
    /// Whether retrying the same request later might succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            TransportError::ConnectionFailed { .. } => true,
            TransportError::Timeout { .. } => true,
            TransportError::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::ConnectionRefused
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::TimedOut
                    | std::io::ErrorKind::Interrupted
            ),
            _ => false,
        }
    }
}

/// Top-level error for the sync daemon's core.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum SyncError {
    /// Configuration was rejected at startup.
    #[error("config error: {0}")]
    Config(String),

    /// The remote transport failed.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Local filesystem I/O failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The index store could not be loaded or saved.
    #[error("index error: {0}")]
    Index(String),

    /// The filesystem watcher failed.
    #[error("watch error: {0}")]
    Watch(String),

    /// JSON (de)serialization of the index failed.
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_failed_and_timeout_are_transient() {
        let err = TransportError::Timeout {
            operation: "get".into(),
            path: "/a".into(),
        };
        assert!(err.is_transient());
    }

    #[test]
    fn not_found_is_not_transient() {
        let err = TransportError::NotFound("/a".into());
        assert!(!err.is_transient());
    }

    #[test]
    fn io_connection_reset_is_transient() {
        let io_err = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset");
        let err = TransportError::Io(io_err);
        assert!(err.is_transient());
    }

    #[test]
    fn sync_error_wraps_transport_error() {
        let err: SyncError = TransportError::NotFound("/a".into()).into();
        assert!(matches!(err, SyncError::Transport(TransportError::NotFound(p)) if p == "/a"));
    }
}
