//! # Rollseg Core
//!
//! A rolling segment layer on top of a generic blob-store substrate.
//!
//! Every segment created through this layer is made up of a **header**
//! and zero or more **sub-segments**:
//!
//! - The header holds the segment's rolling policy and an ordered,
//!   append-only table of offset-to-sub-segment pointers.
//! - Each sub-segment is one blob in the underlying store. A
//!   sub-segment starting at offset `N` with length `L` backs offsets
//!   `[N, N+L)` of the segment.
//! - A segment exists if it has a non-empty header and its last
//!   sub-segment exists (a freshly created segment with no sub-segments
//!   also exists). A segment is sealed when its header is sealed.
//!
//! Writes route through the active (tail) sub-segment and roll over to
//! a new one when the tail reaches the policy's maximum length. Reads
//! locate the backing blob for a logical offset through the table.
//! Concatenation either splices the source blob into the target's tail
//! (native) or extends the target header with rebased entries from the
//! source header (header merge). Truncation deletes sub-segments lying
//! entirely below the truncation offset.
//!
//! Segments created before this layer was applied (a bare blob with no
//! header) remain fully accessible: they are modeled as a single
//! sub-segment and need no migration.
//!
//! ## Example
//!
//! ```rust
//! use rollseg_core::{RollingPolicy, RollingStore};
//! use rollseg_storage::InMemoryBlobStore;
//! use std::sync::Arc;
//!
//! # fn main() -> rollseg_core::CoreResult<()> {
//! let store = RollingStore::with_policy(
//!     Arc::new(InMemoryBlobStore::new()),
//!     RollingPolicy::new(1024)?,
//! );
//!
//! store.create("logs/audit")?;
//! let mut segment = store.open_write("logs/audit")?;
//! store.write(&mut segment, 0, b"hello")?;
//!
//! let mut buf = [0u8; 5];
//! store.read(&mut segment, 0, &mut buf)?;
//! assert_eq!(&buf, b"hello");
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod codec;
mod error;
mod handle;
mod naming;
mod policy;
mod store;
mod sub_segment;

pub use error::{CoreError, CoreResult};
pub use handle::RollingHandle;
pub use naming::{header_name, sub_segment_name};
pub use policy::RollingPolicy;
pub use store::{RollingStore, SegmentInfo};
pub use sub_segment::SubSegment;
