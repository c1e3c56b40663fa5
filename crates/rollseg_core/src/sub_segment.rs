//! Sub-segment value type.

use crate::naming;
use std::fmt;

/// One physical blob backing a contiguous offset range of a segment.
///
/// A sub-segment starting at offset `N` with length `L` holds the data
/// for segment offsets `[N, N+L)`. Both the sealed flag and the
/// existence flag only move forward: a sealed sub-segment never becomes
/// writable again, and a deleted one never comes back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubSegment {
    name: String,
    start_offset: u64,
    length: u64,
    sealed: bool,
    exists: bool,
}

impl SubSegment {
    /// Creates a new sub-segment record with zero length.
    #[must_use]
    pub fn new(name: impl Into<String>, start_offset: u64) -> Self {
        Self {
            name: name.into(),
            start_offset,
            length: 0,
            sealed: false,
            exists: true,
        }
    }

    /// Creates the sub-segment that starts at the given offset of a
    /// segment, with its blob name derived from the segment name.
    #[must_use]
    pub fn for_segment(segment_name: &str, start_offset: u64) -> Self {
        Self::new(naming::sub_segment_name(segment_name, start_offset), start_offset)
    }

    /// Returns the name of the backing blob.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the segment offset at which this sub-segment starts.
    #[must_use]
    pub const fn start_offset(&self) -> u64 {
        self.start_offset
    }

    /// Returns the current length of this sub-segment.
    #[must_use]
    pub const fn length(&self) -> u64 {
        self.length
    }

    /// Returns one past the last segment offset backed by this
    /// sub-segment.
    #[must_use]
    pub const fn last_offset(&self) -> u64 {
        self.start_offset + self.length
    }

    /// Returns whether the given segment offset falls inside this
    /// sub-segment.
    #[must_use]
    pub const fn contains(&self, offset: u64) -> bool {
        self.start_offset <= offset && offset < self.last_offset()
    }

    /// Returns whether this sub-segment is sealed.
    #[must_use]
    pub const fn is_sealed(&self) -> bool {
        self.sealed
    }

    /// Returns whether the backing blob still exists.
    #[must_use]
    pub const fn exists(&self) -> bool {
        self.exists
    }

    /// Returns a copy of this sub-segment with a new start offset.
    ///
    /// Used during concatenation, when a source's sub-segments are
    /// spliced into the target at a higher base offset. The blob name,
    /// length, and flags are preserved.
    #[must_use]
    pub fn rebased(&self, new_start_offset: u64) -> Self {
        Self {
            name: self.name.clone(),
            start_offset: new_start_offset,
            length: self.length,
            sealed: self.sealed,
            exists: self.exists,
        }
    }

    pub(crate) fn set_length(&mut self, length: u64) {
        self.length = length;
    }

    pub(crate) fn increase_length(&mut self, delta: u64) {
        self.length += delta;
    }

    pub(crate) fn mark_sealed(&mut self) {
        self.sealed = true;
    }

    pub(crate) fn mark_inexistent(&mut self) {
        self.exists = false;
    }
}

impl fmt::Display for SubSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}..{})",
            self.name,
            self.start_offset,
            self.last_offset()
        )
    }
}
