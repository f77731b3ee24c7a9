use std::io;
use std::path::PathBuf;

use reqwest::StatusCode;
use thiserror::Error;

/// Coarse classification of a [`SyncError`], used for reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Mapping,
    Network,
    Filesystem,
    Cancelled,
    Destination,
}

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("{path} is not under any section location")]
    NotMapped { path: String },

    #[error("network error fetching {key}: {source}")]
    Network {
        key: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("server answered {status} for {key}")]
    Status { key: String, status: StatusCode },

    #[error("transfer of {key} stopped at {actual} of {expected} bytes")]
    Incomplete {
        key: String,
        actual: u64,
        expected: u64,
    },

    #[error("filesystem error at {}: {source}", path.display())]
    Filesystem {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("destination {} is unusable: {reason}", path.display())]
    Destination { path: PathBuf, reason: String },

    #[error("sync cancelled")]
    Cancelled,
}

impl SyncError {
    pub(crate) fn network(key: &str, source: reqwest::Error) -> Self {
        SyncError::Network {
            key: key.to_string(),
            source,
        }
    }

    pub(crate) fn fs(path: impl Into<PathBuf>, source: io::Error) -> Self {
        SyncError::Filesystem {
            path: path.into(),
            source,
        }
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            SyncError::NotMapped { .. } => FailureKind::Mapping,
            SyncError::Network { .. } | SyncError::Status { .. } | SyncError::Incomplete { .. } => {
                FailureKind::Network
            }
            SyncError::Filesystem { .. } => FailureKind::Filesystem,
            SyncError::Cancelled => FailureKind::Cancelled,
            SyncError::Destination { .. } => FailureKind::Destination,
        }
    }

    /// Fatal errors stop the whole batch instead of being recorded per part.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self.kind(),
            FailureKind::Cancelled | FailureKind::Destination
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_kinds() {
        assert!(SyncError::Cancelled.is_fatal());
        assert!(
            SyncError::Destination {
                path: PathBuf::from("/nope"),
                reason: "not a directory".to_string(),
            }
            .is_fatal()
        );

        let mapping = SyncError::NotMapped {
            path: "/elsewhere/a.mkv".to_string(),
        };
        assert_eq!(mapping.kind(), FailureKind::Mapping);
        assert!(!mapping.is_fatal());

        let fs = SyncError::fs("/tmp/x", io::Error::other("disk full"));
        assert_eq!(fs.kind(), FailureKind::Filesystem);
        assert!(!fs.is_fatal());
        assert!(fs.to_string().contains("disk full"));
    }

    #[test]
    fn test_incomplete_is_network() {
        let err = SyncError::Incomplete {
            key: "/library/parts/1/file.mkv".to_string(),
            actual: 10,
            expected: 20,
        };
        assert_eq!(err.kind(), FailureKind::Network);
        assert!(err.to_string().contains("10 of 20"));
    }
}
