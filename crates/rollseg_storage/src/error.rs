//! Error types for blob-store operations.

use std::io;
use thiserror::Error;

/// Result type for blob-store operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during blob-store operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The named blob does not exist.
    #[error("blob does not exist: {blob}")]
    NotExists {
        /// Name of the missing blob.
        blob: String,
    },

    /// A blob with this name already exists.
    #[error("blob already exists: {blob}")]
    AlreadyExists {
        /// Name of the conflicting blob.
        blob: String,
    },

    /// The blob is sealed and can no longer be modified.
    #[error("blob is sealed: {blob}")]
    Sealed {
        /// Name of the sealed blob.
        blob: String,
    },

    /// The offset is not valid for the blob's current size.
    ///
    /// For writes this means the offset did not match the blob length
    /// (appends are strict); for reads it means the requested range lies
    /// outside the blob.
    #[error("offset {offset} is not valid for blob '{blob}' of size {size}")]
    BadOffset {
        /// Name of the blob.
        blob: String,
        /// The offending offset.
        offset: u64,
        /// The blob's current size.
        size: u64,
    },

    /// Data at the requested offset has been removed from the blob.
    #[error("blob '{blob}' has been truncated at offset {offset}")]
    Truncated {
        /// Name of the truncated blob.
        blob: String,
        /// The requested offset.
        offset: u64,
    },

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}
