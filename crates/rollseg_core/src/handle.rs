//! In-memory view of a rolling segment.

use crate::policy::RollingPolicy;
use crate::sub_segment::SubSegment;
use rollseg_storage::BlobHandle;

/// A handle to a rolling segment.
///
/// The handle is the in-memory view of a segment: its ordered
/// sub-segment table, the header blob handle (absent for segments
/// created before the rolling layer was applied), and the writer handle
/// to the active tail sub-segment when opened for write.
///
/// Handles are independent values. Two handles to the same segment may
/// coexist and their views may diverge; a read-only handle catches up
/// with writes made elsewhere through the refresh performed by
/// [`crate::RollingStore::read`]. A handle is not internally
/// synchronized - mutating it from multiple threads requires external
/// serialization, which the `&mut` receivers on the store's mutating
/// operations enforce.
#[derive(Debug, Clone)]
pub struct RollingHandle {
    segment_name: String,
    header: Option<BlobHandle>,
    policy: RollingPolicy,
    sub_segments: Vec<SubSegment>,
    active: Option<BlobHandle>,
    read_only: bool,
    sealed: bool,
    deleted: bool,
    header_length: u64,
}

impl RollingHandle {
    /// Creates a handle for a segment backed by a header.
    pub(crate) fn with_header(
        segment_name: String,
        header: BlobHandle,
        policy: RollingPolicy,
        sub_segments: Vec<SubSegment>,
        read_only: bool,
    ) -> Self {
        Self {
            segment_name,
            header: Some(header),
            policy,
            sub_segments,
            active: None,
            read_only,
            sealed: false,
            deleted: false,
            header_length: 0,
        }
    }

    /// Creates a handle for a legacy segment: a bare blob with no
    /// header, modeled as a single sub-segment starting at offset 0.
    pub(crate) fn legacy(segment_name: String, read_only: bool) -> Self {
        let sub_segments = vec![SubSegment::new(segment_name.clone(), 0)];
        Self {
            segment_name,
            header: None,
            policy: RollingPolicy::NO_ROLLING,
            sub_segments,
            active: None,
            read_only,
            sealed: false,
            deleted: false,
            header_length: 0,
        }
    }

    /// Returns the segment name.
    #[must_use]
    pub fn segment_name(&self) -> &str {
        &self.segment_name
    }

    /// Returns the rolling policy recorded for this segment.
    #[must_use]
    pub fn policy(&self) -> RollingPolicy {
        self.policy
    }

    /// Returns the logical length of the segment as known by this
    /// handle.
    #[must_use]
    pub fn length(&self) -> u64 {
        self.sub_segments.last().map_or(0, SubSegment::last_offset)
    }

    /// Returns the ordered sub-segment table.
    #[must_use]
    pub fn sub_segments(&self) -> &[SubSegment] {
        &self.sub_segments
    }

    /// Returns whether this handle was opened read-only.
    #[must_use]
    pub const fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// Returns whether the segment is sealed as known by this handle.
    #[must_use]
    pub const fn is_sealed(&self) -> bool {
        self.sealed
    }

    /// Returns whether the segment was deleted through this handle (or
    /// observed deleted during a read).
    #[must_use]
    pub const fn is_deleted(&self) -> bool {
        self.deleted
    }

    /// Returns the durable byte length of the header blob as known by
    /// this handle.
    #[must_use]
    pub const fn header_length(&self) -> u64 {
        self.header_length
    }

    pub(crate) fn header(&self) -> Option<&BlobHandle> {
        self.header.as_ref()
    }

    pub(crate) fn set_header(&mut self, header: BlobHandle) {
        self.header = Some(header);
    }

    pub(crate) fn set_header_length(&mut self, length: u64) {
        self.header_length = length;
    }

    pub(crate) fn increase_header_length(&mut self, delta: u64) {
        self.header_length += delta;
    }

    pub(crate) fn active(&self) -> Option<&BlobHandle> {
        self.active.as_ref()
    }

    pub(crate) fn set_active(&mut self, active: BlobHandle) {
        self.active = Some(active);
    }

    pub(crate) fn clear_active(&mut self) {
        self.active = None;
    }

    pub(crate) fn last_sub_segment(&self) -> Option<&SubSegment> {
        self.sub_segments.last()
    }

    pub(crate) fn last_sub_segment_mut(&mut self) -> Option<&mut SubSegment> {
        self.sub_segments.last_mut()
    }

    pub(crate) fn sub_segment_mut(&mut self, index: usize) -> &mut SubSegment {
        &mut self.sub_segments[index]
    }

    /// Appends a new tail sub-segment and records its writer handle.
    pub(crate) fn push_sub_segment(&mut self, sub: SubSegment, active: BlobHandle) {
        self.sub_segments.push(sub);
        self.active = Some(active);
    }

    pub(crate) fn extend_sub_segments(&mut self, subs: Vec<SubSegment>) {
        self.sub_segments.extend(subs);
    }

    pub(crate) fn mark_sealed(&mut self) {
        self.sealed = true;
    }

    pub(crate) fn mark_deleted(&mut self) {
        self.deleted = true;
    }

    /// Replaces this handle's view with the one from a freshly opened
    /// handle to the same segment.
    ///
    /// The sub-segment table is replaced wholesale; the header length
    /// and sealed flag are carried over. The access mode and the active
    /// writer handle are untouched.
    pub(crate) fn refresh(&mut self, other: &RollingHandle) {
        self.sub_segments = other.sub_segments.clone();
        self.header_length = other.header_length;
        self.policy = other.policy;
        if other.sealed {
            self.sealed = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_handle_has_zero_length() {
        let handle = RollingHandle::with_header(
            "seg".to_string(),
            BlobHandle::read_write("seg$header"),
            RollingPolicy::NO_ROLLING,
            Vec::new(),
            false,
        );
        assert_eq!(handle.length(), 0);
        assert!(handle.sub_segments().is_empty());
        assert!(!handle.is_sealed());
        assert!(!handle.is_deleted());
    }

    #[test]
    fn length_is_tail_last_offset() {
        let mut subs = vec![SubSegment::for_segment("seg", 0)];
        subs[0].set_length(100);
        let mut tail = SubSegment::for_segment("seg", 100);
        tail.set_length(50);
        subs.push(tail);

        let handle = RollingHandle::with_header(
            "seg".to_string(),
            BlobHandle::read_only("seg$header"),
            RollingPolicy::NO_ROLLING,
            subs,
            true,
        );
        assert_eq!(handle.length(), 150);
    }

    #[test]
    fn legacy_handle_is_single_sub_segment() {
        let handle = RollingHandle::legacy("old".to_string(), true);
        assert!(handle.header().is_none());
        assert_eq!(handle.sub_segments().len(), 1);
        assert_eq!(handle.sub_segments()[0].name(), "old");
        assert_eq!(handle.sub_segments()[0].start_offset(), 0);
    }

    #[test]
    fn refresh_replaces_table_and_sticks_sealed() {
        let mut stale = RollingHandle::with_header(
            "seg".to_string(),
            BlobHandle::read_only("seg$header"),
            RollingPolicy::NO_ROLLING,
            Vec::new(),
            true,
        );

        let mut sub = SubSegment::for_segment("seg", 0);
        sub.set_length(10);
        let mut fresh = RollingHandle::with_header(
            "seg".to_string(),
            BlobHandle::read_only("seg$header"),
            RollingPolicy::NO_ROLLING,
            vec![sub],
            true,
        );
        fresh.set_header_length(64);
        fresh.mark_sealed();

        stale.refresh(&fresh);
        assert_eq!(stale.length(), 10);
        assert_eq!(stale.header_length(), 64);
        assert!(stale.is_sealed());
    }
}
