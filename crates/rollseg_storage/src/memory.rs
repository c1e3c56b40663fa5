//! In-memory blob store for testing and ephemeral segments.

use crate::blobstore::{BlobHandle, BlobInfo, BlobStore};
use crate::error::{StorageError, StorageResult};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::io;

#[derive(Debug, Default)]
struct Blob {
    data: Vec<u8>,
    sealed: bool,
}

/// An in-memory blob store.
///
/// This store keeps all blobs in memory and is suitable for:
/// - Unit tests
/// - Integration tests
/// - Ephemeral segments that don't need persistence
///
/// # Thread Safety
///
/// This store is thread-safe and can be shared across threads.
///
/// # Example
///
/// ```rust
/// use rollseg_storage::{BlobStore, InMemoryBlobStore};
///
/// let store = InMemoryBlobStore::new();
/// store.create("blob").unwrap();
/// let handle = store.open_write("blob").unwrap();
/// store.write(&handle, 0, b"test data").unwrap();
/// assert_eq!(store.stat("blob").unwrap().length, 9);
/// ```
#[derive(Debug, Default)]
pub struct InMemoryBlobStore {
    blobs: RwLock<HashMap<String, Blob>>,
}

impl InMemoryBlobStore {
    /// Creates a new empty in-memory blob store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the names of all blobs, sorted.
    ///
    /// Useful for testing and debugging.
    #[must_use]
    pub fn blob_names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.blobs.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Returns a copy of the named blob's contents, if it exists.
    ///
    /// Useful for testing and debugging.
    #[must_use]
    pub fn blob_data(&self, name: &str) -> Option<Vec<u8>> {
        self.blobs.read().get(name).map(|b| b.data.clone())
    }
}

impl BlobStore for InMemoryBlobStore {
    fn create(&self, name: &str) -> StorageResult<()> {
        let mut blobs = self.blobs.write();
        if blobs.contains_key(name) {
            return Err(StorageError::AlreadyExists {
                blob: name.to_string(),
            });
        }
        blobs.insert(name.to_string(), Blob::default());
        Ok(())
    }

    fn open_read(&self, name: &str) -> StorageResult<BlobHandle> {
        if !self.blobs.read().contains_key(name) {
            return Err(StorageError::NotExists {
                blob: name.to_string(),
            });
        }
        Ok(BlobHandle::read_only(name))
    }

    fn open_write(&self, name: &str) -> StorageResult<BlobHandle> {
        if !self.blobs.read().contains_key(name) {
            return Err(StorageError::NotExists {
                blob: name.to_string(),
            });
        }
        Ok(BlobHandle::read_write(name))
    }

    fn read_at(&self, handle: &BlobHandle, offset: u64, len: usize) -> StorageResult<Vec<u8>> {
        let blobs = self.blobs.read();
        let blob = blobs.get(handle.name()).ok_or_else(|| StorageError::NotExists {
            blob: handle.name().to_string(),
        })?;

        let size = blob.data.len() as u64;
        let end = offset.saturating_add(len as u64);
        if offset > size || end > size {
            return Err(StorageError::BadOffset {
                blob: handle.name().to_string(),
                offset,
                size,
            });
        }

        Ok(blob.data[offset as usize..end as usize].to_vec())
    }

    fn write(&self, handle: &BlobHandle, offset: u64, data: &[u8]) -> StorageResult<()> {
        let mut blobs = self.blobs.write();
        let blob = blobs.get_mut(handle.name()).ok_or_else(|| StorageError::NotExists {
            blob: handle.name().to_string(),
        })?;

        if blob.sealed {
            return Err(StorageError::Sealed {
                blob: handle.name().to_string(),
            });
        }

        let size = blob.data.len() as u64;
        if offset != size {
            return Err(StorageError::BadOffset {
                blob: handle.name().to_string(),
                offset,
                size,
            });
        }

        blob.data.extend_from_slice(data);
        Ok(())
    }

    fn seal(&self, handle: &BlobHandle) -> StorageResult<()> {
        let mut blobs = self.blobs.write();
        let blob = blobs.get_mut(handle.name()).ok_or_else(|| StorageError::NotExists {
            blob: handle.name().to_string(),
        })?;
        blob.sealed = true;
        Ok(())
    }

    fn concat(&self, target: &BlobHandle, offset: u64, source_name: &str) -> StorageResult<()> {
        let mut blobs = self.blobs.write();

        let source_data = {
            let source = blobs.get(source_name).ok_or_else(|| StorageError::NotExists {
                blob: source_name.to_string(),
            })?;
            if !source.sealed {
                return Err(StorageError::Io(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("concat source '{source_name}' is not sealed"),
                )));
            }
            source.data.clone()
        };

        {
            let target_blob =
                blobs.get_mut(target.name()).ok_or_else(|| StorageError::NotExists {
                    blob: target.name().to_string(),
                })?;
            if target_blob.sealed {
                return Err(StorageError::Sealed {
                    blob: target.name().to_string(),
                });
            }
            let size = target_blob.data.len() as u64;
            if offset != size {
                return Err(StorageError::BadOffset {
                    blob: target.name().to_string(),
                    offset,
                    size,
                });
            }
            target_blob.data.extend_from_slice(&source_data);
        }

        blobs.remove(source_name);
        Ok(())
    }

    fn delete(&self, handle: &BlobHandle) -> StorageResult<()> {
        let mut blobs = self.blobs.write();
        if blobs.remove(handle.name()).is_none() {
            return Err(StorageError::NotExists {
                blob: handle.name().to_string(),
            });
        }
        Ok(())
    }

    fn exists(&self, name: &str) -> StorageResult<bool> {
        Ok(self.blobs.read().contains_key(name))
    }

    fn stat(&self, name: &str) -> StorageResult<BlobInfo> {
        let blobs = self.blobs.read();
        let blob = blobs.get(name).ok_or_else(|| StorageError::NotExists {
            blob: name.to_string(),
        })?;
        Ok(BlobInfo {
            name: name.to_string(),
            length: blob.data.len() as u64,
            sealed: blob.sealed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_then_stat() {
        let store = InMemoryBlobStore::new();
        store.create("a").unwrap();

        let info = store.stat("a").unwrap();
        assert_eq!(info.name, "a");
        assert_eq!(info.length, 0);
        assert!(!info.sealed);
    }

    #[test]
    fn create_duplicate_fails() {
        let store = InMemoryBlobStore::new();
        store.create("a").unwrap();

        let result = store.create("a");
        assert!(matches!(result, Err(StorageError::AlreadyExists { .. })));
    }

    #[test]
    fn open_missing_fails() {
        let store = InMemoryBlobStore::new();
        assert!(matches!(
            store.open_read("missing"),
            Err(StorageError::NotExists { .. })
        ));
        assert!(matches!(
            store.open_write("missing"),
            Err(StorageError::NotExists { .. })
        ));
    }

    #[test]
    fn write_then_read() {
        let store = InMemoryBlobStore::new();
        store.create("a").unwrap();
        let handle = store.open_write("a").unwrap();

        store.write(&handle, 0, b"hello").unwrap();
        store.write(&handle, 5, b" world").unwrap();

        let data = store.read_at(&handle, 0, 11).unwrap();
        assert_eq!(&data, b"hello world");

        let data = store.read_at(&handle, 6, 5).unwrap();
        assert_eq!(&data, b"world");
    }

    #[test]
    fn write_at_wrong_offset_fails() {
        let store = InMemoryBlobStore::new();
        store.create("a").unwrap();
        let handle = store.open_write("a").unwrap();
        store.write(&handle, 0, b"hello").unwrap();

        let result = store.write(&handle, 3, b"x");
        assert!(matches!(result, Err(StorageError::BadOffset { .. })));

        let result = store.write(&handle, 10, b"x");
        assert!(matches!(result, Err(StorageError::BadOffset { .. })));
    }

    #[test]
    fn read_past_end_fails() {
        let store = InMemoryBlobStore::new();
        store.create("a").unwrap();
        let handle = store.open_write("a").unwrap();
        store.write(&handle, 0, b"hello").unwrap();

        let result = store.read_at(&handle, 3, 10);
        assert!(matches!(result, Err(StorageError::BadOffset { .. })));
    }

    #[test]
    fn sealed_blob_rejects_writes() {
        let store = InMemoryBlobStore::new();
        store.create("a").unwrap();
        let handle = store.open_write("a").unwrap();
        store.write(&handle, 0, b"data").unwrap();
        store.seal(&handle).unwrap();

        let result = store.write(&handle, 4, b"more");
        assert!(matches!(result, Err(StorageError::Sealed { .. })));

        // Sealing again is a no-op.
        store.seal(&handle).unwrap();
        assert!(store.stat("a").unwrap().sealed);
    }

    #[test]
    fn concat_appends_and_deletes_source() {
        let store = InMemoryBlobStore::new();
        store.create("target").unwrap();
        store.create("source").unwrap();

        let target = store.open_write("target").unwrap();
        let source = store.open_write("source").unwrap();
        store.write(&target, 0, b"abc").unwrap();
        store.write(&source, 0, b"def").unwrap();
        store.seal(&source).unwrap();

        store.concat(&target, 3, "source").unwrap();

        assert_eq!(store.blob_data("target").unwrap(), b"abcdef");
        assert!(!store.exists("source").unwrap());
    }

    #[test]
    fn concat_requires_sealed_source() {
        let store = InMemoryBlobStore::new();
        store.create("target").unwrap();
        store.create("source").unwrap();
        let target = store.open_write("target").unwrap();

        let result = store.concat(&target, 0, "source");
        assert!(result.is_err());
        assert!(store.exists("source").unwrap());
    }

    #[test]
    fn concat_at_wrong_offset_fails() {
        let store = InMemoryBlobStore::new();
        store.create("target").unwrap();
        store.create("source").unwrap();
        let target = store.open_write("target").unwrap();
        let source = store.open_write("source").unwrap();
        store.write(&target, 0, b"abc").unwrap();
        store.seal(&source).unwrap();

        let result = store.concat(&target, 1, "source");
        assert!(matches!(result, Err(StorageError::BadOffset { .. })));
    }

    #[test]
    fn delete_removes_blob() {
        let store = InMemoryBlobStore::new();
        store.create("a").unwrap();
        let handle = store.open_write("a").unwrap();

        store.delete(&handle).unwrap();
        assert!(!store.exists("a").unwrap());

        let result = store.delete(&handle);
        assert!(matches!(result, Err(StorageError::NotExists { .. })));
    }

    #[test]
    fn empty_read() {
        let store = InMemoryBlobStore::new();
        store.create("a").unwrap();
        let handle = store.open_write("a").unwrap();
        store.write(&handle, 0, b"hello").unwrap();

        let data = store.read_at(&handle, 2, 0).unwrap();
        assert!(data.is_empty());
    }

    #[test]
    fn blob_names_sorted() {
        let store = InMemoryBlobStore::new();
        store.create("b").unwrap();
        store.create("a").unwrap();
        assert_eq!(store.blob_names(), vec!["a".to_string(), "b".to_string()]);
    }
}
