//! File-based blob store for persistent storage.

use crate::blobstore::{BlobHandle, BlobInfo, BlobStore};
use crate::error::{StorageError, StorageResult};
use parking_lot::Mutex;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// A file-based blob store.
///
/// Every blob is a single file under the root directory; blob names may
/// contain `/` separators, in which case the intermediate directories
/// are created on demand. The sealed state is persisted through the
/// file's read-only permission bit, so it survives process restarts.
///
/// # Thread Safety
///
/// This store is thread-safe. Mutating operations are serialized by an
/// internal lock so that `concat` is atomic with respect to other
/// mutations.
///
/// # Example
///
/// ```no_run
/// use rollseg_storage::{BlobStore, FileBlobStore};
/// use std::path::Path;
///
/// let store = FileBlobStore::open(Path::new("/var/lib/rollseg")).unwrap();
/// store.create("events").unwrap();
/// let handle = store.open_write("events").unwrap();
/// store.write(&handle, 0, b"persistent data").unwrap();
/// ```
#[derive(Debug)]
pub struct FileBlobStore {
    root: PathBuf,
    mutations: Mutex<()>,
}

impl FileBlobStore {
    /// Opens a blob store rooted at the given directory, creating the
    /// directory if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn open(root: &Path) -> StorageResult<Self> {
        fs::create_dir_all(root)?;
        Ok(Self {
            root: root.to_path_buf(),
            mutations: Mutex::new(()),
        })
    }

    /// Returns the root directory of the store.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn blob_path(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    fn map_io(name: &str, err: io::Error) -> StorageError {
        match err.kind() {
            io::ErrorKind::NotFound => StorageError::NotExists {
                blob: name.to_string(),
            },
            io::ErrorKind::AlreadyExists => StorageError::AlreadyExists {
                blob: name.to_string(),
            },
            _ => StorageError::Io(err),
        }
    }

    fn metadata(&self, name: &str) -> StorageResult<fs::Metadata> {
        fs::metadata(self.blob_path(name)).map_err(|e| Self::map_io(name, e))
    }

    fn set_sealed(&self, name: &str, sealed: bool) -> StorageResult<()> {
        let path = self.blob_path(name);
        let mut perms = fs::metadata(&path)
            .map_err(|e| Self::map_io(name, e))?
            .permissions();
        perms.set_readonly(sealed);
        fs::set_permissions(&path, perms).map_err(|e| Self::map_io(name, e))?;
        Ok(())
    }
}

impl BlobStore for FileBlobStore {
    fn create(&self, name: &str) -> StorageResult<()> {
        let _guard = self.mutations.lock();
        let path = self.blob_path(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|e| Self::map_io(name, e))?;
        Ok(())
    }

    fn open_read(&self, name: &str) -> StorageResult<BlobHandle> {
        self.metadata(name)?;
        Ok(BlobHandle::read_only(name))
    }

    fn open_write(&self, name: &str) -> StorageResult<BlobHandle> {
        self.metadata(name)?;
        Ok(BlobHandle::read_write(name))
    }

    fn read_at(&self, handle: &BlobHandle, offset: u64, len: usize) -> StorageResult<Vec<u8>> {
        let name = handle.name();
        let metadata = self.metadata(name)?;
        let size = metadata.len();
        let end = offset.saturating_add(len as u64);
        if offset > size || end > size {
            return Err(StorageError::BadOffset {
                blob: name.to_string(),
                offset,
                size,
            });
        }
        if len == 0 {
            return Ok(Vec::new());
        }

        let mut file = File::open(self.blob_path(name)).map_err(|e| Self::map_io(name, e))?;
        file.seek(SeekFrom::Start(offset))?;
        let mut buffer = vec![0u8; len];
        file.read_exact(&mut buffer)?;
        Ok(buffer)
    }

    fn write(&self, handle: &BlobHandle, offset: u64, data: &[u8]) -> StorageResult<()> {
        let _guard = self.mutations.lock();
        let name = handle.name();
        let metadata = self.metadata(name)?;
        if metadata.permissions().readonly() {
            return Err(StorageError::Sealed {
                blob: name.to_string(),
            });
        }
        let size = metadata.len();
        if offset != size {
            return Err(StorageError::BadOffset {
                blob: name.to_string(),
                offset,
                size,
            });
        }

        let mut file = OpenOptions::new()
            .append(true)
            .open(self.blob_path(name))
            .map_err(|e| Self::map_io(name, e))?;
        file.write_all(data)?;
        file.sync_data()?;
        Ok(())
    }

    fn seal(&self, handle: &BlobHandle) -> StorageResult<()> {
        let _guard = self.mutations.lock();
        self.set_sealed(handle.name(), true)
    }

    fn concat(&self, target: &BlobHandle, offset: u64, source_name: &str) -> StorageResult<()> {
        let _guard = self.mutations.lock();
        let target_name = target.name();

        let source_meta = self.metadata(source_name)?;
        if !source_meta.permissions().readonly() {
            return Err(StorageError::Io(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("concat source '{source_name}' is not sealed"),
            )));
        }

        let target_meta = self.metadata(target_name)?;
        if target_meta.permissions().readonly() {
            return Err(StorageError::Sealed {
                blob: target_name.to_string(),
            });
        }
        let size = target_meta.len();
        if offset != size {
            return Err(StorageError::BadOffset {
                blob: target_name.to_string(),
                offset,
                size,
            });
        }

        let mut source_data = Vec::new();
        File::open(self.blob_path(source_name))
            .map_err(|e| Self::map_io(source_name, e))?
            .read_to_end(&mut source_data)?;

        let mut file = OpenOptions::new()
            .append(true)
            .open(self.blob_path(target_name))
            .map_err(|e| Self::map_io(target_name, e))?;
        file.write_all(&source_data)?;
        file.sync_data()?;
        drop(file);

        // The source is sealed (read-only); make it writable again so the
        // file can be removed on platforms that refuse to delete read-only
        // files.
        self.set_sealed(source_name, false)?;
        fs::remove_file(self.blob_path(source_name)).map_err(|e| Self::map_io(source_name, e))?;
        Ok(())
    }

    fn delete(&self, handle: &BlobHandle) -> StorageResult<()> {
        let _guard = self.mutations.lock();
        let name = handle.name();
        let metadata = self.metadata(name)?;
        if metadata.permissions().readonly() {
            self.set_sealed(name, false)?;
        }
        fs::remove_file(self.blob_path(name)).map_err(|e| Self::map_io(name, e))?;
        Ok(())
    }

    fn exists(&self, name: &str) -> StorageResult<bool> {
        match fs::metadata(self.blob_path(name)) {
            Ok(_) => Ok(true),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(StorageError::Io(err)),
        }
    }

    fn stat(&self, name: &str) -> StorageResult<BlobInfo> {
        let metadata = self.metadata(name)?;
        Ok(BlobInfo {
            name: name.to_string(),
            length: metadata.len(),
            sealed: metadata.permissions().readonly(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn create_then_write_then_read() {
        let dir = tempdir().unwrap();
        let store = FileBlobStore::open(dir.path()).unwrap();

        store.create("a").unwrap();
        let handle = store.open_write("a").unwrap();
        store.write(&handle, 0, b"hello").unwrap();
        store.write(&handle, 5, b" world").unwrap();

        let data = store.read_at(&handle, 0, 11).unwrap();
        assert_eq!(&data, b"hello world");
    }

    #[test]
    fn create_duplicate_fails() {
        let dir = tempdir().unwrap();
        let store = FileBlobStore::open(dir.path()).unwrap();

        store.create("a").unwrap();
        let result = store.create("a");
        assert!(matches!(result, Err(StorageError::AlreadyExists { .. })));
    }

    #[test]
    fn write_at_wrong_offset_fails() {
        let dir = tempdir().unwrap();
        let store = FileBlobStore::open(dir.path()).unwrap();
        store.create("a").unwrap();
        let handle = store.open_write("a").unwrap();
        store.write(&handle, 0, b"hello").unwrap();

        let result = store.write(&handle, 2, b"x");
        assert!(matches!(result, Err(StorageError::BadOffset { .. })));
    }

    #[test]
    fn sealed_state_survives_reopen() {
        let dir = tempdir().unwrap();

        {
            let store = FileBlobStore::open(dir.path()).unwrap();
            store.create("a").unwrap();
            let handle = store.open_write("a").unwrap();
            store.write(&handle, 0, b"data").unwrap();
            store.seal(&handle).unwrap();
        }

        let store = FileBlobStore::open(dir.path()).unwrap();
        let info = store.stat("a").unwrap();
        assert!(info.sealed);
        assert_eq!(info.length, 4);

        let handle = store.open_write("a").unwrap();
        let result = store.write(&handle, 4, b"more");
        assert!(matches!(result, Err(StorageError::Sealed { .. })));
    }

    #[test]
    fn concat_appends_and_deletes_source() {
        let dir = tempdir().unwrap();
        let store = FileBlobStore::open(dir.path()).unwrap();

        store.create("target").unwrap();
        store.create("source").unwrap();
        let target = store.open_write("target").unwrap();
        let source = store.open_write("source").unwrap();
        store.write(&target, 0, b"abc").unwrap();
        store.write(&source, 0, b"def").unwrap();
        store.seal(&source).unwrap();

        store.concat(&target, 3, "source").unwrap();

        let data = store.read_at(&target, 0, 6).unwrap();
        assert_eq!(&data, b"abcdef");
        assert!(!store.exists("source").unwrap());
    }

    #[test]
    fn delete_sealed_blob() {
        let dir = tempdir().unwrap();
        let store = FileBlobStore::open(dir.path()).unwrap();
        store.create("a").unwrap();
        let handle = store.open_write("a").unwrap();
        store.seal(&handle).unwrap();

        store.delete(&handle).unwrap();
        assert!(!store.exists("a").unwrap());
    }

    #[test]
    fn nested_blob_names() {
        let dir = tempdir().unwrap();
        let store = FileBlobStore::open(dir.path()).unwrap();

        store.create("scope/stream/0").unwrap();
        let handle = store.open_write("scope/stream/0").unwrap();
        store.write(&handle, 0, b"nested").unwrap();

        assert!(store.exists("scope/stream/0").unwrap());
        assert_eq!(store.stat("scope/stream/0").unwrap().length, 6);
    }

    #[test]
    fn stat_missing_fails() {
        let dir = tempdir().unwrap();
        let store = FileBlobStore::open(dir.path()).unwrap();
        assert!(matches!(
            store.stat("missing"),
            Err(StorageError::NotExists { .. })
        ));
    }
}
