//! # Rollseg Storage
//!
//! Blob-store substrate trait and implementations for rollseg.
//!
//! This crate provides the lowest-level storage abstraction for the
//! rolling segment layer. Blob stores are **opaque named byte stores** -
//! they do not interpret the data they hold, and they know nothing about
//! segment headers, rolling policies, or sub-segments.
//!
//! ## Design Principles
//!
//! - Blobs are addressed by name and are strictly append-only
//! - Every operation is synchronous and blocks on the caller's thread
//! - An append at any offset other than the current blob length fails
//!   with [`StorageError::BadOffset`]; this is the fencing primitive the
//!   rolling layer builds on
//! - Implementations must be `Send + Sync` for concurrent access
//!
//! ## Available Stores
//!
//! - [`InMemoryBlobStore`] - For testing and ephemeral segments
//! - [`FileBlobStore`] - One file per blob under a root directory
//!
//! ## Example
//!
//! ```rust
//! use rollseg_storage::{BlobStore, InMemoryBlobStore};
//!
//! let store = InMemoryBlobStore::new();
//! store.create("greeting").unwrap();
//! let blob = store.open_write("greeting").unwrap();
//! store.write(&blob, 0, b"hello world").unwrap();
//! let data = store.read_at(&blob, 0, 11).unwrap();
//! assert_eq!(&data, b"hello world");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod blobstore;
mod error;
mod file;
mod memory;

pub use blobstore::{BlobHandle, BlobInfo, BlobStore};
pub use error::{StorageError, StorageResult};
pub use file::FileBlobStore;
pub use memory::InMemoryBlobStore;
