//! End-to-end tests for the rolling store over the file blob store.

use rollseg_core::{CoreError, RollingPolicy, RollingStore};
use rollseg_storage::{BlobStore, FileBlobStore};
use std::sync::Arc;
use tempfile::tempdir;

#[test]
fn rolling_state_survives_reopen() {
    let dir = tempdir().unwrap();

    {
        let substrate = Arc::new(FileBlobStore::open(dir.path()).unwrap());
        let store = RollingStore::with_policy(substrate, RollingPolicy::new(64).unwrap());

        store.create("scope/stream/1").unwrap();
        let mut handle = store.open_write("scope/stream/1").unwrap();
        store.write(&mut handle, 0, &[b'x'; 200]).unwrap();
        assert_eq!(handle.sub_segments().len(), 4);
    }

    // A brand-new store over the same directory reconstructs the
    // segment purely from the header and blob metadata.
    let substrate = Arc::new(FileBlobStore::open(dir.path()).unwrap());
    let store = RollingStore::with_policy(substrate, RollingPolicy::new(64).unwrap());

    let info = store.info("scope/stream/1").unwrap();
    assert_eq!(info.length, 200);
    assert!(!info.sealed);

    let mut handle = store.open_write("scope/stream/1").unwrap();
    store.write(&mut handle, 200, &[b'y'; 20]).unwrap();

    let mut buf = vec![0u8; 220];
    store.read(&mut handle, 0, &mut buf).unwrap();
    assert_eq!(&buf[..200], &[b'x'; 200][..]);
    assert_eq!(&buf[200..], &[b'y'; 20][..]);
}

#[test]
fn sealed_segment_survives_reopen() {
    let dir = tempdir().unwrap();

    {
        let substrate = Arc::new(FileBlobStore::open(dir.path()).unwrap());
        let store = RollingStore::new(substrate);
        store.create("events").unwrap();
        let mut handle = store.open_write("events").unwrap();
        store.write(&mut handle, 0, b"finished").unwrap();
        store.seal(&mut handle).unwrap();
    }

    let substrate = Arc::new(FileBlobStore::open(dir.path()).unwrap());
    let store = RollingStore::new(substrate);

    let mut handle = store.open_write("events").unwrap();
    assert!(handle.is_sealed());

    let mut buf = vec![0u8; 8];
    store.read(&mut handle, 0, &mut buf).unwrap();
    assert_eq!(&buf, b"finished");

    let result = store.write(&mut handle, 8, b"!");
    assert!(matches!(result, Err(CoreError::Sealed { .. })));
}

#[test]
fn truncation_removes_files() {
    let dir = tempdir().unwrap();
    let substrate = Arc::new(FileBlobStore::open(dir.path()).unwrap());
    let store = RollingStore::with_policy(substrate.clone(), RollingPolicy::new(50).unwrap());

    store.create("seg").unwrap();
    let mut handle = store.open_write("seg").unwrap();
    store.write(&mut handle, 0, &[0u8; 150]).unwrap();

    store.truncate(&mut handle, 100).unwrap();

    assert!(!substrate
        .exists(&rollseg_core::sub_segment_name("seg", 0))
        .unwrap());
    assert!(!substrate
        .exists(&rollseg_core::sub_segment_name("seg", 50))
        .unwrap());
    assert!(substrate
        .exists(&rollseg_core::sub_segment_name("seg", 100))
        .unwrap());

    let mut buf = vec![0u8; 50];
    store.read(&mut handle, 100, &mut buf).unwrap();
    assert_eq!(buf, vec![0u8; 50]);
}

#[test]
fn delete_removes_all_files() {
    let dir = tempdir().unwrap();
    let substrate = Arc::new(FileBlobStore::open(dir.path()).unwrap());
    let store = RollingStore::with_policy(substrate.clone(), RollingPolicy::new(50).unwrap());

    store.create("seg").unwrap();
    let mut handle = store.open_write("seg").unwrap();
    store.write(&mut handle, 0, &[0u8; 120]).unwrap();
    store.delete(&mut handle).unwrap();

    assert!(!store.exists("seg").unwrap());
    assert!(!substrate
        .exists(&rollseg_core::header_name("seg"))
        .unwrap());
}
