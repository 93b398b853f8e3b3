//! Error types for rstore
//!
//! Backend-specific failures are translated into this taxonomy by each
//! backend adapter so callers can branch on [`ErrorKind`] without inspecting
//! SDK error types.

use thiserror::Error;

/// Result type alias for rstore operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the pool, the storage façade, and backend adapters
#[derive(Error, Debug)]
pub enum Error {
    /// No pool slot became available before the wait timeout
    #[error("Connection pool exhausted: {0}")]
    PoolExhausted(String),

    /// The pool was closed while waiting or before acquisition
    #[error("Connection pool is closed")]
    PoolClosed,

    /// The pool factory could not create a client
    #[error("Failed to connect: {0}")]
    ConnectFailed(String),

    /// Object does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Any other backend or network failure
    #[error("Transport error: {0}")]
    Transport(String),

    /// Closing an upload stream failed; the object must be treated as not written
    #[error("Failed to finalize upload of {key}: {message}")]
    WriteFinalization { key: String, message: String },

    /// Invalid or inconsistent configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Local I/O failure (reading the upload source, spooling, ...)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Anything else, including errors raised by walk callbacks
    #[error("{0}")]
    General(String),
}

/// Coarse classification of an [`Error`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    PoolExhausted,
    PoolClosed,
    ConnectFailed,
    NotFound,
    Transport,
    WriteFinalization,
    Config,
    Io,
    Other,
}

impl Error {
    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::PoolExhausted(_) => ErrorKind::PoolExhausted,
            Error::PoolClosed => ErrorKind::PoolClosed,
            Error::ConnectFailed(_) => ErrorKind::ConnectFailed,
            Error::NotFound(_) => ErrorKind::NotFound,
            Error::Transport(_) => ErrorKind::Transport,
            Error::WriteFinalization { .. } => ErrorKind::WriteFinalization,
            Error::Config(_) => ErrorKind::Config,
            Error::Io(_) => ErrorKind::Io,
            Error::General(_) => ErrorKind::Other,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }

    /// Whether a caller-side retry has a reasonable chance of succeeding.
    ///
    /// This layer never retries on its own; the flag only informs callers.
    pub fn is_transient(&self) -> bool {
        match self {
            Error::PoolExhausted(_) | Error::Transport(_) | Error::ConnectFailed(_) => true,
            Error::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionRefused
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::TimedOut
                    | std::io::ErrorKind::Interrupted
            ),
            Error::PoolClosed
            | Error::NotFound(_)
            | Error::WriteFinalization { .. }
            | Error::Config(_)
            | Error::General(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kind() {
        assert_eq!(Error::NotFound("a".into()).kind(), ErrorKind::NotFound);
        assert_eq!(Error::PoolClosed.kind(), ErrorKind::PoolClosed);
        assert_eq!(Error::Config("no bucket".into()).kind(), ErrorKind::Config);
        assert_eq!(
            Error::WriteFinalization {
                key: "k".into(),
                message: "boom".into()
            }
            .kind(),
            ErrorKind::WriteFinalization
        );
    }

    #[test]
    fn test_is_transient() {
        assert!(Error::Transport("connection reset".into()).is_transient());
        assert!(Error::PoolExhausted("timed out".into()).is_transient());
        assert!(
            Error::Io(std::io::Error::from(std::io::ErrorKind::TimedOut)).is_transient()
        );

        assert!(!Error::NotFound("gone".into()).is_transient());
        assert!(!Error::PoolClosed.is_transient());
        assert!(!Error::Io(std::io::Error::from(std::io::ErrorKind::PermissionDenied)).is_transient());
    }

    #[test]
    fn test_display() {
        let err = Error::WriteFinalization {
            key: "backup/a".into(),
            message: "503".into(),
        };
        assert_eq!(err.to_string(), "Failed to finalize upload of backup/a: 503");
    }
}
