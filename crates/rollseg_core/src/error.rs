//! Error types for the rolling segment layer.

use rollseg_storage::StorageError;
use std::io;
use thiserror::Error;

/// Result type for rolling-layer operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in rolling-layer operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The segment (or a blob it requires) does not exist.
    #[error("segment does not exist: {segment}")]
    NotExists {
        /// Name of the missing segment.
        segment: String,
    },

    /// A segment with this name already exists.
    #[error("segment already exists: {segment}")]
    AlreadyExists {
        /// Name of the conflicting segment.
        segment: String,
    },

    /// The segment is sealed and can no longer be modified.
    #[error("segment is sealed: {segment}")]
    Sealed {
        /// Name of the sealed segment.
        segment: String,
    },

    /// A write was attempted at an offset other than the segment length.
    #[error("bad offset for segment '{segment}': expected {expected}, got {actual}")]
    BadOffset {
        /// Name of the segment.
        segment: String,
        /// The offset the segment would have accepted.
        expected: u64,
        /// The offset that was supplied.
        actual: u64,
    },

    /// A header append was rejected because another writer has modified
    /// the header since this handle was opened.
    #[error("writer is no longer primary for segment: {segment}")]
    NotPrimary {
        /// Name of the segment.
        segment: String,
    },

    /// A read spans a sub-segment that has been deleted by truncation.
    #[error("offsets {start_offset}-{last_offset} of segment '{segment}' have been deleted")]
    Truncated {
        /// Name of the segment.
        segment: String,
        /// First deleted offset.
        start_offset: u64,
        /// One past the last deleted offset.
        last_offset: u64,
    },

    /// A precondition of a composite operation did not hold.
    #[error("illegal state: {message}")]
    IllegalState {
        /// Description of the violated precondition.
        message: String,
    },

    /// The segment header could not be parsed.
    #[error("header corruption: {message}")]
    HeaderCorruption {
        /// Description of the corruption.
        message: String,
    },

    /// An invalid argument was provided.
    #[error("invalid argument: {message}")]
    InvalidArgument {
        /// Description of the argument issue.
        message: String,
    },

    /// An I/O error occurred in the substrate.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl CoreError {
    /// Creates a not-exists error.
    pub fn not_exists(segment: impl Into<String>) -> Self {
        Self::NotExists {
            segment: segment.into(),
        }
    }

    /// Creates an already-exists error.
    pub fn already_exists(segment: impl Into<String>) -> Self {
        Self::AlreadyExists {
            segment: segment.into(),
        }
    }

    /// Creates a sealed error.
    pub fn sealed(segment: impl Into<String>) -> Self {
        Self::Sealed {
            segment: segment.into(),
        }
    }

    /// Creates a bad-offset error.
    pub fn bad_offset(segment: impl Into<String>, expected: u64, actual: u64) -> Self {
        Self::BadOffset {
            segment: segment.into(),
            expected,
            actual,
        }
    }

    /// Creates a not-primary error.
    pub fn not_primary(segment: impl Into<String>) -> Self {
        Self::NotPrimary {
            segment: segment.into(),
        }
    }

    /// Creates an illegal-state error.
    pub fn illegal_state(message: impl Into<String>) -> Self {
        Self::IllegalState {
            message: message.into(),
        }
    }

    /// Creates a header-corruption error.
    pub fn header_corruption(message: impl Into<String>) -> Self {
        Self::HeaderCorruption {
            message: message.into(),
        }
    }

    /// Creates an invalid-argument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }
}

impl From<StorageError> for CoreError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotExists { blob } => Self::NotExists { segment: blob },
            StorageError::AlreadyExists { blob } => Self::AlreadyExists { segment: blob },
            StorageError::Sealed { blob } => Self::Sealed { segment: blob },
            StorageError::BadOffset { blob, offset, size } => Self::BadOffset {
                segment: blob,
                expected: size,
                actual: offset,
            },
            StorageError::Truncated { blob, offset } => Self::Truncated {
                segment: blob,
                start_offset: offset,
                last_offset: offset,
            },
            StorageError::Io(err) => Self::Io(err),
        }
    }
}
