//! Blob-store trait definition.

use crate::error::StorageResult;

/// A handle to an open blob.
///
/// Handles are plain values: they carry the blob name and the access
/// mode they were opened with. They hold no OS resources, so dropping a
/// handle has no effect on the blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobHandle {
    name: String,
    read_only: bool,
}

impl BlobHandle {
    /// Creates a read-only handle to the named blob.
    #[must_use]
    pub fn read_only(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            read_only: true,
        }
    }

    /// Creates a read-write handle to the named blob.
    #[must_use]
    pub fn read_write(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            read_only: false,
        }
    }

    /// Returns the name of the blob this handle refers to.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns whether this handle was opened read-only.
    #[must_use]
    pub const fn is_read_only(&self) -> bool {
        self.read_only
    }
}

/// Metadata about a blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobInfo {
    /// Name of the blob.
    pub name: String,
    /// Current length in bytes.
    pub length: u64,
    /// Whether the blob is sealed.
    pub sealed: bool,
}

/// A low-level named blob store.
///
/// Blob stores are **opaque byte stores**. They provide simple
/// operations for creating, appending to, sealing, and concatenating
/// named blobs. The rolling layer owns all format interpretation -
/// blob stores do not understand headers or sub-segments.
///
/// # Invariants
///
/// - `write` only accepts the offset equal to the blob's current
///   length; anything else fails with a bad-offset error. A writer
///   holding a stale view of a blob is thereby fenced out.
/// - Once sealed, a blob accepts no further writes and cannot be the
///   target of a concat.
/// - `concat` atomically appends the source blob to the target and
///   deletes the source.
///
/// # Implementors
///
/// - [`super::InMemoryBlobStore`] - For testing
/// - [`super::FileBlobStore`] - For persistent storage
pub trait BlobStore: Send + Sync {
    /// Creates a new empty blob.
    ///
    /// # Errors
    ///
    /// Returns `AlreadyExists` if a blob with this name exists, or an
    /// I/O error.
    fn create(&self, name: &str) -> StorageResult<()>;

    /// Opens a blob for reading.
    ///
    /// # Errors
    ///
    /// Returns `NotExists` if the blob is missing.
    fn open_read(&self, name: &str) -> StorageResult<BlobHandle>;

    /// Opens a blob for writing.
    ///
    /// Opening a sealed blob succeeds; subsequent writes through the
    /// handle fail with `Sealed`.
    ///
    /// # Errors
    ///
    /// Returns `NotExists` if the blob is missing.
    fn open_write(&self, name: &str) -> StorageResult<BlobHandle>;

    /// Reads exactly `len` bytes starting at `offset`.
    ///
    /// # Errors
    ///
    /// Returns `BadOffset` if the range lies outside the blob, or an
    /// I/O error.
    fn read_at(&self, handle: &BlobHandle, offset: u64, len: usize) -> StorageResult<Vec<u8>>;

    /// Appends `data` to the blob.
    ///
    /// `offset` must equal the blob's current length.
    ///
    /// # Errors
    ///
    /// Returns `BadOffset` if `offset` does not match the blob length,
    /// `Sealed` if the blob is sealed, or `NotExists` if it is missing.
    fn write(&self, handle: &BlobHandle, offset: u64, data: &[u8]) -> StorageResult<()>;

    /// Seals the blob, preventing any further modification.
    ///
    /// Sealing an already-sealed blob is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `NotExists` if the blob is missing.
    fn seal(&self, handle: &BlobHandle) -> StorageResult<()>;

    /// Atomically appends the blob named `source_name` to the target
    /// blob and deletes the source.
    ///
    /// The source must be sealed and `offset` must equal the target's
    /// current length.
    ///
    /// # Errors
    ///
    /// Returns `NotExists` if either blob is missing, `Sealed` if the
    /// target is sealed, or `BadOffset` on an offset mismatch.
    fn concat(&self, target: &BlobHandle, offset: u64, source_name: &str) -> StorageResult<()>;

    /// Deletes the blob.
    ///
    /// # Errors
    ///
    /// Returns `NotExists` if the blob is already gone.
    fn delete(&self, handle: &BlobHandle) -> StorageResult<()>;

    /// Returns whether a blob with the given name exists.
    ///
    /// # Errors
    ///
    /// Returns an error if existence cannot be determined.
    fn exists(&self, name: &str) -> StorageResult<bool>;

    /// Returns metadata for the named blob.
    ///
    /// # Errors
    ///
    /// Returns `NotExists` if the blob is missing.
    fn stat(&self, name: &str) -> StorageResult<BlobInfo>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handle_modes() {
        let reader = BlobHandle::read_only("a");
        assert!(reader.is_read_only());
        assert_eq!(reader.name(), "a");

        let writer = BlobHandle::read_write("a");
        assert!(!writer.is_read_only());
        assert_eq!(writer.name(), "a");
    }
}
