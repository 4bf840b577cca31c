//! Error types for the referral ledger.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for ledger operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the ledger and its collaborators.
#[derive(Debug, Error)]
pub enum Error {
    /// Persisted snapshot could not be parsed.
    #[error("corrupt store at {path}: {source}")]
    CorruptStore {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Reading or writing the snapshot failed (includes timeouts).
    #[error("store I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A ledger operation could not reach its store.
    #[error("ledger unavailable: {0}")]
    LedgerUnavailable(#[source] Box<Error>),

    /// Membership lookup failed at the transport level.
    #[error("membership oracle unavailable: {0}")]
    OracleUnavailable(String),

    /// Empty or non-numeric user identifier.
    #[error("invalid user id: {0:?}")]
    InvalidUserId(String),

    /// Notification delivery failed.
    #[error("notification failed: {0}")]
    Notify(String),
}

impl Error {
    /// Wrap a store error for ledger callers. Already-wrapped errors pass through.
    pub fn unavailable(err: Error) -> Self {
        match err {
            Error::LedgerUnavailable(_) => err,
            other => Error::LedgerUnavailable(Box::new(other)),
        }
    }

    /// True when the underlying cause is an unreadable snapshot.
    pub fn is_corrupt_store(&self) -> bool {
        match self {
            Error::CorruptStore { .. } => true,
            Error::LedgerUnavailable(inner) => inner.is_corrupt_store(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unavailable_does_not_double_wrap() {
        let io = Error::Io {
            path: PathBuf::from("store.json"),
            source: std::io::Error::new(std::io::ErrorKind::Other, "disk full"),
        };
        let once = Error::unavailable(io);
        let twice = Error::unavailable(once);
        match twice {
            Error::LedgerUnavailable(inner) => assert!(matches!(*inner, Error::Io { .. })),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn corrupt_store_is_detected_through_wrapper() {
        let parse = serde_json::from_str::<u32>("{").unwrap_err();
        let err = Error::unavailable(Error::CorruptStore {
            path: PathBuf::from("store.json"),
            source: parse,
        });
        assert!(err.is_corrupt_store());
        assert!(!Error::InvalidUserId("x".into()).is_corrupt_store());
    }
}
