//! Error types for the index engine.

use std::io;

/// Errors raised while writing, reading or querying an index.
///
/// `Corrupted`, `InvalidMagic` and `UnsupportedVersion` describe a broken
/// index file; callers usually delete the file and rebuild. `InvariantViolation`
/// means the builder was driven incorrectly and is never retryable.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("invalid index signature, expected \"IDX_ULEX\"")]
    InvalidMagic,

    #[error("unsupported index format version {found}")]
    UnsupportedVersion { found: i32 },

    #[error("index is corrupted: {reason}")]
    Corrupted { reason: String },

    #[error("index builder invariant violated: {reason}")]
    InvariantViolation { reason: String },

    #[error("background flush failed: {reason}")]
    FlushFailed { reason: String },
}

impl IndexError {
    pub(crate) fn corrupted(reason: impl Into<String>) -> Self {
        IndexError::Corrupted {
            reason: reason.into(),
        }
    }

    pub(crate) fn invariant(reason: impl Into<String>) -> Self {
        IndexError::InvariantViolation {
            reason: reason.into(),
        }
    }

    /// True when the index file itself is unusable and should be rebuilt.
    pub fn is_corruption(&self) -> bool {
        match self {
            IndexError::InvalidMagic
            | IndexError::UnsupportedVersion { .. }
            | IndexError::Corrupted { .. } => true,
            // A short read means the file ends in the middle of a segment.
            IndexError::Io(e) => e.kind() == io::ErrorKind::UnexpectedEof,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, IndexError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_corruption_kinds() {
        assert!(IndexError::InvalidMagic.is_corruption());
        assert!(IndexError::corrupted("missing terminator").is_corruption());
        assert!(IndexError::UnsupportedVersion { found: 7 }.is_corruption());
        assert!(!IndexError::invariant("unsorted").is_corruption());
        let eof = io::Error::new(io::ErrorKind::UnexpectedEof, "short");
        assert!(IndexError::from(eof).is_corruption());
        let denied = io::Error::new(io::ErrorKind::PermissionDenied, "nope");
        assert!(!IndexError::from(denied).is_corruption());
    }

    #[test]
    fn test_display() {
        let e = IndexError::corrupted("trigram directory has no terminator");
        assert_eq!(
            e.to_string(),
            "index is corrupted: trigram directory has no terminator"
        );
    }
}
