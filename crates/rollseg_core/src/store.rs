//! Rolling segment store.

use crate::codec;
use crate::error::{CoreError, CoreResult};
use crate::handle::RollingHandle;
use crate::naming;
use crate::policy::RollingPolicy;
use crate::sub_segment::SubSegment;
use rollseg_storage::{BlobHandle, BlobStore, StorageError};
use std::sync::Arc;
use tracing::{debug, warn};

/// Summary information about a segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentInfo {
    /// Name of the segment.
    pub name: String,
    /// Whether the segment is sealed.
    pub sealed: bool,
    /// Logical length of the segment in bytes.
    pub length: u64,
}

/// A layer on top of a blob store that rolls segments over on a
/// size-based policy and truncates them at arbitrary offsets.
///
/// All operations are synchronous and execute on the caller's thread.
/// The store itself is stateless apart from the shared blob-store
/// reference, so it can be used from any number of threads; per-handle
/// mutations are serialized by the `&mut RollingHandle` receivers.
///
/// Crash consistency comes from the ordering of durable effects: every
/// length-changing fact (a new sub-segment, a concat) is appended to
/// the header before the corresponding data blob is opened for
/// writing, and interrupted operations leave only empty unsealed blobs
/// behind, which the next `create` or rollover detects and reuses.
pub struct RollingStore {
    blobs: Arc<dyn BlobStore>,
    default_policy: RollingPolicy,
}

impl RollingStore {
    /// Creates a store whose default policy never rolls over.
    #[must_use]
    pub fn new(blobs: Arc<dyn BlobStore>) -> Self {
        Self::with_policy(blobs, RollingPolicy::NO_ROLLING)
    }

    /// Creates a store with the given default rolling policy, applied
    /// to every segment created without an explicit policy.
    #[must_use]
    pub fn with_policy(blobs: Arc<dyn BlobStore>, default_policy: RollingPolicy) -> Self {
        Self {
            blobs,
            default_policy,
        }
    }

    /// Creates a new segment with the store's default policy.
    ///
    /// # Errors
    ///
    /// Returns `AlreadyExists` if the segment already exists.
    pub fn create(&self, segment_name: &str) -> CoreResult<SegmentInfo> {
        self.create_with_policy(segment_name, self.default_policy)
    }

    /// Creates a new segment with the given rolling policy.
    ///
    /// An existing header blob that is empty and unsealed is treated as
    /// the remnant of an interrupted create and reused.
    ///
    /// # Errors
    ///
    /// Returns `AlreadyExists` if the segment already exists, either as
    /// a headered segment or as a bare blob under the segment name.
    pub fn create_with_policy(
        &self,
        segment_name: &str,
        policy: RollingPolicy,
    ) -> CoreResult<SegmentInfo> {
        let header_name = naming::header_name(segment_name);

        // A bare blob under the segment name is a segment from before
        // the rolling layer was applied; it blocks creation just like a
        // header would.
        if self.blobs.exists(segment_name)? {
            return Err(CoreError::already_exists(segment_name));
        }

        match self.blobs.create(&header_name) {
            Ok(()) => {}
            Err(StorageError::AlreadyExists { .. }) => {
                self.check_if_empty_and_not_sealed(&header_name, segment_name)?;
                debug!(segment = segment_name, "empty header found; reusing");
            }
            Err(err) => return Err(err.into()),
        }

        let header_handle = self.blobs.open_write(&header_name)?;
        if let Err(err) = self.write_new_header(&header_handle, segment_name, policy) {
            // Don't leave a half-written header behind; the delete is
            // best effort and its own failure is ignored.
            warn!(segment = segment_name, error = %err, "could not write segment header; rolling back");
            let _ = self.blobs.delete(&header_handle);
            return Err(err);
        }

        debug!(segment = segment_name, "created");
        Ok(SegmentInfo {
            name: segment_name.to_string(),
            sealed: false,
            length: 0,
        })
    }

    /// Opens a segment for reading.
    ///
    /// # Errors
    ///
    /// Returns `NotExists` if neither a non-empty header nor a bare
    /// blob exists under the segment name, or if the tail sub-segment
    /// blob is missing.
    pub fn open_read(&self, segment_name: &str) -> CoreResult<RollingHandle> {
        self.open_handle(segment_name, true)
    }

    /// Opens a segment for writing.
    ///
    /// The tail sub-segment is opened for append unless it is sealed.
    ///
    /// # Errors
    ///
    /// Returns `NotExists` if the segment does not exist.
    pub fn open_write(&self, segment_name: &str) -> CoreResult<RollingHandle> {
        let mut handle = self.open_handle(segment_name, false)?;

        let tail = handle
            .last_sub_segment()
            .filter(|s| !s.is_sealed())
            .map(|s| s.name().to_string());
        if let Some(name) = tail {
            let active = self.blobs.open_write(&name)?;
            handle.set_active(active);
        }

        Ok(handle)
    }

    /// Reads `buf.len()` bytes starting at logical offset `offset`.
    ///
    /// A non-sealed read-only handle whose known length is too short
    /// for the request is refreshed from the header before the range is
    /// validated, so a reader observes writes made through other
    /// handles.
    ///
    /// # Errors
    ///
    /// Returns `Truncated` if the range spans a deleted sub-segment,
    /// `NotExists` if the segment has been deleted, or
    /// `InvalidArgument` if the range lies beyond the segment.
    pub fn read(
        &self,
        handle: &mut RollingHandle,
        offset: u64,
        buf: &mut [u8],
    ) -> CoreResult<usize> {
        Self::ensure_not_deleted(handle)?;
        let len = buf.len() as u64;

        if handle.is_read_only() && !handle.is_sealed() && offset + len > handle.length() {
            let fresh = self.open_read(handle.segment_name())?;
            handle.refresh(&fresh);
            debug!(segment = handle.segment_name(), length = handle.length(), "handle refreshed");
        }

        if buf.is_empty() {
            if offset <= handle.length() {
                return Ok(0);
            }
            return Err(CoreError::invalid_argument(format!(
                "offset {offset} is beyond segment length {}",
                handle.length()
            )));
        }
        if offset >= handle.length() || offset + len > handle.length() {
            return Err(CoreError::invalid_argument(format!(
                "read range {offset}..{} is beyond segment length {}",
                offset + len,
                handle.length()
            )));
        }

        match self.read_inner(handle, offset, buf) {
            Err(err @ CoreError::Truncated { .. }) => {
                // The segment may have been truncated or deleted through
                // another handle; refresh to find out which.
                match self.open_read(handle.segment_name()) {
                    Ok(fresh) => {
                        handle.refresh(&fresh);
                        Err(err)
                    }
                    Err(CoreError::NotExists { .. }) => {
                        handle.mark_deleted();
                        Err(CoreError::not_exists(handle.segment_name()))
                    }
                    Err(other) => Err(other),
                }
            }
            result => result,
        }
    }

    fn read_inner(
        &self,
        handle: &mut RollingHandle,
        offset: u64,
        buf: &mut [u8],
    ) -> CoreResult<usize> {
        let mut index = handle
            .sub_segments()
            .partition_point(|s| s.last_offset() <= offset);
        let mut bytes_read = 0usize;

        while bytes_read < buf.len() && index < handle.sub_segments().len() {
            let current = handle.sub_segments()[index].clone();
            if !current.exists() {
                return Err(Self::truncated(handle.segment_name(), &current));
            }
            if current.length() == 0 {
                // Empty non-tail sub-segments should have been removed
                // by truncation; nothing to read from them either way.
                index += 1;
                continue;
            }

            let read_offset = offset + bytes_read as u64 - current.start_offset();
            let read_len =
                (buf.len() - bytes_read).min((current.length() - read_offset) as usize);

            let attempt = self
                .blobs
                .open_read(current.name())
                .and_then(|blob| self.blobs.read_at(&blob, read_offset, read_len));
            match attempt {
                Ok(data) => {
                    buf[bytes_read..bytes_read + data.len()].copy_from_slice(&data);
                    bytes_read += data.len();
                    if read_offset + data.len() as u64 >= current.length() {
                        index += 1;
                    }
                }
                Err(StorageError::NotExists { .. }) => {
                    handle.sub_segment_mut(index).mark_inexistent();
                    return Err(Self::truncated(handle.segment_name(), &current));
                }
                Err(err) => return Err(err.into()),
            }
        }

        Ok(bytes_read)
    }

    /// Appends `data` to the segment at logical offset `offset`.
    ///
    /// `offset` must equal the segment's current length. The write is
    /// split across sub-segments as needed so that no sub-segment
    /// exceeds the policy's maximum length; a zero-length write is a
    /// no-op and does not roll over.
    ///
    /// # Errors
    ///
    /// Returns `BadOffset` on an offset mismatch, `Sealed` if the
    /// segment is sealed, `NotExists` if it was deleted, and
    /// `NotPrimary` if another writer has taken over the segment.
    pub fn write(&self, handle: &mut RollingHandle, offset: u64, data: &[u8]) -> CoreResult<()> {
        Self::ensure_writable(handle)?;
        Self::ensure_not_deleted(handle)?;
        Self::ensure_not_sealed(handle)?;
        Self::ensure_offset(handle, offset)?;

        let mut bytes_written = 0usize;
        while bytes_written < data.len() {
            let max_length = handle.policy().max_length();
            if handle.active().is_none()
                || handle
                    .last_sub_segment()
                    .is_some_and(|s| s.length() >= max_length)
            {
                self.rollover(handle)?;
            }

            let (start_offset, current_len) = match handle.last_sub_segment() {
                Some(tail) => (tail.start_offset(), tail.length()),
                None => {
                    return Err(CoreError::illegal_state(
                        "segment has no tail sub-segment after rollover",
                    ))
                }
            };
            let remaining = (data.len() - bytes_written) as u64;
            let write_len = remaining.min(max_length - current_len) as usize;
            let sub_offset = offset + bytes_written as u64 - start_offset;

            let active = handle.active().cloned().ok_or_else(|| {
                CoreError::illegal_state("segment has no active sub-segment after rollover")
            })?;
            self.blobs
                .write(&active, sub_offset, &data[bytes_written..bytes_written + write_len])?;

            if let Some(tail) = handle.last_sub_segment_mut() {
                tail.increase_length(write_len as u64);
            }
            bytes_written += write_len;
        }

        Ok(())
    }

    /// Seals the segment: no further writes are accepted; reads still
    /// succeed.
    ///
    /// # Errors
    ///
    /// Returns `NotExists` if the segment was deleted, or
    /// `InvalidArgument` on a read-only handle.
    pub fn seal(&self, handle: &mut RollingHandle) -> CoreResult<()> {
        Self::ensure_writable(handle)?;
        Self::ensure_not_deleted(handle)?;

        self.seal_active(handle)?;
        if let Some(header) = handle.header().cloned() {
            self.blobs.seal(&header)?;
        }
        handle.mark_sealed();
        debug!(segment = handle.segment_name(), "sealed");
        Ok(())
    }

    /// Concatenates the sealed segment `source_name` to the end of
    /// `target`.
    ///
    /// Picks one of two strategies: a **native** concat splices the
    /// source's single blob into the target's active sub-segment
    /// through the substrate's concat primitive (keeping lots of small
    /// transactions from piling up tiny sub-segments); a **header
    /// merge** extends the target header with the source's rebased
    /// sub-segment table without rewriting any data.
    ///
    /// An empty source is simply deleted.
    ///
    /// # Errors
    ///
    /// Returns `IllegalState` if the source is not sealed or has been
    /// truncated, and `BadOffset` if `target_offset` does not match the
    /// target's length.
    pub fn concat(
        &self,
        target: &mut RollingHandle,
        target_offset: u64,
        source_name: &str,
    ) -> CoreResult<()> {
        Self::ensure_writable(target)?;
        Self::ensure_not_deleted(target)?;
        Self::ensure_not_sealed(target)?;
        Self::ensure_offset(target, target_offset)?;

        let mut source = self.open_write(source_name)?;
        if !source.is_sealed() {
            return Err(CoreError::illegal_state(format!(
                "cannot concat '{source_name}' into '{}': source is not sealed",
                target.segment_name()
            )));
        }
        if source.length() == 0 {
            debug!(source = source_name, "concat source is empty; deleting");
            return self.delete(&mut source);
        }

        // A source with deleted sub-segments would leave a hole in the
        // target; refuse up front.
        self.refresh_sub_segment_existence(&mut source)?;
        if source.sub_segments().iter().any(|s| !s.exists()) {
            return Err(CoreError::illegal_state(format!(
                "cannot use segment '{source_name}' as concat source: it is truncated"
            )));
        }

        if Self::should_concat_natively(&source, target) {
            debug!(source = source_name, target = target.segment_name(), "native concat");
            self.concat_natively(target, &source)
        } else {
            debug!(source = source_name, target = target.segment_name(), "header-merge concat");
            self.concat_header_merge(target, &source)
        }
    }

    fn concat_natively(
        &self,
        target: &mut RollingHandle,
        source: &RollingHandle,
    ) -> CoreResult<()> {
        if target.last_sub_segment().map_or(true, SubSegment::is_sealed) {
            // The tail cannot take more data; start a fresh one.
            self.rollover(target)?;
        }

        let last_source = source
            .last_sub_segment()
            .ok_or_else(|| CoreError::illegal_state("concat source has no sub-segments"))?;
        let active = target
            .active()
            .cloned()
            .ok_or_else(|| CoreError::illegal_state("concat target has no active sub-segment"))?;
        let tail_length = target.last_sub_segment().map_or(0, SubSegment::length);

        self.blobs.concat(&active, tail_length, last_source.name())?;
        if let Some(tail) = target.last_sub_segment_mut() {
            tail.increase_length(last_source.length());
        }

        if let Some(source_header) = source.header().cloned() {
            match self.blobs.delete(&source_header) {
                Ok(()) => {}
                Err(StorageError::NotExists { .. }) => {
                    warn!(header = source_header.name(), "concat source header already deleted");
                }
                Err(err) => return Err(err.into()),
            }
        }
        Ok(())
    }

    fn concat_header_merge(
        &self,
        target: &mut RollingHandle,
        source: &RollingHandle,
    ) -> CoreResult<()> {
        if target.header().is_none() {
            self.create_header(target)?;
        }

        let base_offset = target.length();
        let rebased = Self::rebase(source.sub_segments(), base_offset);
        let entry_count = u32::try_from(source.sub_segments().len())
            .map_err(|_| CoreError::illegal_state("concat source has too many sub-segments"))?;

        self.seal_active(target)?;
        self.append_header_entry(target, &codec::serialize_concat(entry_count, base_offset))?;

        let target_header = target
            .header()
            .cloned()
            .ok_or_else(|| CoreError::illegal_state("concat target has no header"))?;
        let source_header = source
            .header()
            .cloned()
            .ok_or_else(|| CoreError::illegal_state("concat source has no header"))?;
        self.blobs
            .concat(&target_header, target.header_length(), source_header.name())?;
        target.increase_header_length(source.header_length());
        target.extend_sub_segments(rebased);
        Ok(())
    }

    /// Deletes the segment.
    ///
    /// The handle is marked deleted even when parts of the removal
    /// fail, so it cannot be used afterwards; the first error is
    /// returned. A non-sealed segment is sealed first so no other
    /// writer can add sub-segments mid-delete.
    ///
    /// # Errors
    ///
    /// Returns `NotExists` if the segment was already gone.
    pub fn delete(&self, handle: &mut RollingHandle) -> CoreResult<()> {
        let result = match handle.header().cloned() {
            None => self.delete_legacy(handle),
            Some(header) => self.delete_with_header(handle, &header),
        };
        handle.mark_deleted();
        if result.is_ok() {
            debug!(segment = handle.segment_name(), "deleted");
        }
        result
    }

    fn delete_legacy(&self, handle: &mut RollingHandle) -> CoreResult<()> {
        let result = self
            .blobs
            .open_write(handle.segment_name())
            .and_then(|blob| self.blobs.delete(&blob));
        if let Some(last) = handle.last_sub_segment_mut() {
            last.mark_inexistent();
        }
        result.map_err(CoreError::from)
    }

    fn delete_with_header(
        &self,
        handle: &mut RollingHandle,
        header: &BlobHandle,
    ) -> CoreResult<()> {
        if !handle.is_sealed() {
            if handle.is_read_only() {
                let mut write_handle = self.open_write(handle.segment_name())?;
                self.seal(&mut write_handle)?;
                handle.refresh(&write_handle);
            } else {
                self.seal(handle)?;
            }
        }

        self.delete_sub_segments(handle, |_| true)?;
        match self.blobs.delete(header) {
            Ok(()) => Ok(()),
            Err(StorageError::NotExists { .. }) => {
                Err(CoreError::not_exists(handle.segment_name()))
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Deletes every sub-segment lying entirely below
    /// `truncation_offset`.
    ///
    /// A sub-segment straddling the offset is kept in full. Truncating
    /// at the segment length rolls over first, so a fresh empty tail
    /// pins the segment's length while all data is removed. Legacy
    /// segments (no header) cannot be truncated; the call is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if `truncation_offset` is beyond the
    /// segment length.
    pub fn truncate(&self, handle: &mut RollingHandle, truncation_offset: u64) -> CoreResult<()> {
        Self::ensure_writable(handle)?;
        Self::ensure_not_deleted(handle)?;
        if handle.header().is_none() {
            return Ok(());
        }
        if truncation_offset > handle.length() {
            return Err(CoreError::invalid_argument(format!(
                "truncation offset {truncation_offset} is beyond segment length {}",
                handle.length()
            )));
        }

        if handle
            .last_sub_segment()
            .is_some_and(|s| Self::can_truncate(s, truncation_offset))
        {
            // Full truncation; roll over so an empty tail survives to
            // record the segment's length.
            self.rollover(handle)?;
        }

        self.delete_sub_segments(handle, |s| Self::can_truncate(s, truncation_offset))
    }

    /// Returns whether a segment with the given name exists.
    ///
    /// # Errors
    ///
    /// Propagates substrate failures other than `NotExists`.
    pub fn exists(&self, segment_name: &str) -> CoreResult<bool> {
        match self.open_read(segment_name) {
            Ok(_) => Ok(true),
            Err(CoreError::NotExists { .. }) => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// Returns summary information about a segment.
    ///
    /// # Errors
    ///
    /// Returns `NotExists` if the segment does not exist.
    pub fn info(&self, segment_name: &str) -> CoreResult<SegmentInfo> {
        let handle = self.open_read(segment_name)?;
        Ok(SegmentInfo {
            name: handle.segment_name().to_string(),
            sealed: handle.is_sealed(),
            length: handle.length(),
        })
    }

    /// Returns whether this store supports truncation. Always true.
    #[must_use]
    pub const fn supports_truncation(&self) -> bool {
        true
    }

    // ---- open ----

    fn open_handle(&self, segment_name: &str, read_only: bool) -> CoreResult<RollingHandle> {
        let mut handle = match self.try_open_with_header(segment_name, read_only)? {
            Some(handle) => handle,
            None => {
                // No header (or only an empty crash remnant): try the
                // segment name directly as a legacy bare blob.
                if read_only {
                    self.blobs.open_read(segment_name)?;
                } else {
                    self.blobs.open_write(segment_name)?;
                }
                RollingHandle::legacy(segment_name.to_string(), read_only)
            }
        };

        // Non-tail lengths follow from consecutive start offsets, and
        // every non-tail sub-segment is sealed. Only the tail needs a
        // stat to learn its actual length and sealed state.
        let count = handle.sub_segments().len();
        for i in 0..count.saturating_sub(1) {
            let next_start = handle.sub_segments()[i + 1].start_offset();
            let sub = handle.sub_segment_mut(i);
            let length = next_start - sub.start_offset();
            sub.set_length(length);
            sub.mark_sealed();
        }
        if count > 0 {
            let tail_name = handle.sub_segments()[count - 1].name().to_string();
            let info = match self.blobs.stat(&tail_name) {
                Ok(info) => info,
                Err(StorageError::NotExists { .. }) => {
                    // A segment whose tail blob is gone does not exist.
                    return Err(CoreError::not_exists(segment_name));
                }
                Err(err) => return Err(err.into()),
            };
            let has_header = handle.header().is_some();
            let tail = handle.sub_segment_mut(count - 1);
            tail.set_length(info.length);
            if info.sealed {
                tail.mark_sealed();
                if !has_header {
                    handle.mark_sealed();
                }
            }
        }

        Ok(handle)
    }

    fn try_open_with_header(
        &self,
        segment_name: &str,
        read_only: bool,
    ) -> CoreResult<Option<RollingHandle>> {
        let header_name = naming::header_name(segment_name);
        let header_info = match self.blobs.stat(&header_name) {
            Ok(info) => info,
            Err(StorageError::NotExists { .. }) => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        if header_info.length == 0 {
            // Remnant of an interrupted create; the segment was never
            // fully created.
            return Ok(None);
        }

        let header_handle = if read_only {
            self.blobs.open_read(&header_name)?
        } else {
            self.blobs.open_write(&header_name)?
        };
        let data = self
            .blobs
            .read_at(&header_handle, 0, header_info.length as usize)?;
        let (policy, sub_segments) = codec::deserialize(&data)?;

        let mut handle = RollingHandle::with_header(
            segment_name.to_string(),
            header_handle,
            policy,
            sub_segments,
            read_only,
        );
        handle.set_header_length(header_info.length);
        if header_info.sealed {
            handle.mark_sealed();
        }
        Ok(Some(handle))
    }

    // ---- sub-segment operations ----

    fn rollover(&self, handle: &mut RollingHandle) -> CoreResult<()> {
        if handle.header().is_none() {
            return Err(CoreError::illegal_state(
                "cannot roll over a segment with no header",
            ));
        }
        if handle.is_read_only() {
            return Err(CoreError::illegal_state(
                "cannot roll over through a read-only handle",
            ));
        }
        if handle.is_sealed() {
            return Err(CoreError::sealed(handle.segment_name()));
        }

        debug!(segment = handle.segment_name(), length = handle.length(), "rolling over");
        self.seal_active(handle)?;
        self.create_sub_segment(handle)
    }

    fn seal_active(&self, handle: &mut RollingHandle) -> CoreResult<()> {
        let Some(active) = handle.active().cloned() else {
            return Ok(());
        };
        if handle.last_sub_segment().map_or(true, SubSegment::is_sealed) {
            return Ok(());
        }

        self.blobs.seal(&active)?;
        handle.clear_active();
        if let Some(tail) = handle.last_sub_segment_mut() {
            tail.mark_sealed();
        }
        debug!(
            segment = handle.segment_name(),
            sub_segment = active.name(),
            "sealed active sub-segment"
        );
        Ok(())
    }

    fn create_sub_segment(&self, handle: &mut RollingHandle) -> CoreResult<()> {
        let sub = SubSegment::for_segment(handle.segment_name(), handle.length());

        // An existing empty unsealed blob under the new name is most
        // likely left over from a previously interrupted rollover.
        match self.blobs.create(sub.name()) {
            Ok(()) => {}
            Err(StorageError::AlreadyExists { .. }) => {
                self.check_if_empty_and_not_sealed(sub.name(), handle.segment_name())?;
            }
            Err(err) => return Err(err.into()),
        }

        // The header entry must be durable before the blob is opened
        // for writing; a crash in between leaves an empty sub-segment
        // the table already accounts for.
        let entry = codec::serialize_sub_segment(&sub)?;
        self.append_header_entry(handle, &entry)?;

        let active = self.blobs.open_write(sub.name())?;
        debug!(
            segment = handle.segment_name(),
            sub_segment = sub.name(),
            start_offset = sub.start_offset(),
            "created sub-segment"
        );
        handle.push_sub_segment(sub, active);
        Ok(())
    }

    fn delete_sub_segments<F>(&self, handle: &mut RollingHandle, can_delete: F) -> CoreResult<()>
    where
        F: Fn(&SubSegment) -> bool,
    {
        for index in 0..handle.sub_segments().len() {
            let name = {
                let sub = &handle.sub_segments()[index];
                if !sub.exists() || !can_delete(sub) {
                    continue;
                }
                sub.name().to_string()
            };

            match self
                .blobs
                .open_write(&name)
                .and_then(|blob| self.blobs.delete(&blob))
            {
                Ok(()) => {
                    handle.sub_segment_mut(index).mark_inexistent();
                    debug!(
                        segment = handle.segment_name(),
                        sub_segment = name.as_str(),
                        "deleted sub-segment"
                    );
                }
                Err(StorageError::NotExists { .. }) => {
                    // Already gone; just keep the view consistent.
                    handle.sub_segment_mut(index).mark_inexistent();
                }
                Err(err) => return Err(err.into()),
            }
        }
        Ok(())
    }

    fn refresh_sub_segment_existence(&self, handle: &mut RollingHandle) -> CoreResult<()> {
        // Once deleted, a sub-segment cannot come back, so only the
        // ones still assumed present need checking.
        for index in 0..handle.sub_segments().len() {
            let name = {
                let sub = &handle.sub_segments()[index];
                if !sub.exists() {
                    continue;
                }
                sub.name().to_string()
            };
            if !self.blobs.exists(&name)? {
                handle.sub_segment_mut(index).mark_inexistent();
            }
        }
        Ok(())
    }

    // ---- header operations ----

    fn create_header(&self, handle: &mut RollingHandle) -> CoreResult<()> {
        if handle.header().is_some() {
            return Err(CoreError::illegal_state("segment already has a header"));
        }

        let header_name = naming::header_name(handle.segment_name());
        self.blobs.create(&header_name)?;
        let header_handle = self.blobs.open_write(&header_name)?;

        let data = codec::serialize_handle(handle.policy(), handle.sub_segments())?;
        match self.blobs.write(&header_handle, 0, &data) {
            Ok(()) => {}
            Err(StorageError::BadOffset { .. }) => {
                return Err(CoreError::not_primary(handle.segment_name()))
            }
            Err(err) => return Err(err.into()),
        }

        handle.set_header(header_handle);
        handle.set_header_length(data.len() as u64);
        debug!(segment = handle.segment_name(), "created header");
        Ok(())
    }

    fn write_new_header(
        &self,
        header_handle: &BlobHandle,
        segment_name: &str,
        policy: RollingPolicy,
    ) -> CoreResult<()> {
        let data = codec::serialize_handle(policy, &[])?;
        match self.blobs.write(header_handle, 0, &data) {
            Ok(()) => Ok(()),
            Err(StorageError::BadOffset { .. }) => Err(CoreError::not_primary(segment_name)),
            Err(err) => Err(err.into()),
        }
    }

    fn append_header_entry(&self, handle: &mut RollingHandle, entry: &[u8]) -> CoreResult<()> {
        let header = handle
            .header()
            .cloned()
            .ok_or_else(|| CoreError::illegal_state("segment has no header"))?;
        match self.blobs.write(&header, handle.header_length(), entry) {
            Ok(()) => {
                handle.increase_header_length(entry.len() as u64);
                Ok(())
            }
            // An append at a stale offset means another writer has
            // extended the header since this handle was opened.
            Err(StorageError::BadOffset { .. }) => {
                Err(CoreError::not_primary(handle.segment_name()))
            }
            Err(err) => Err(err.into()),
        }
    }

    // ---- helpers ----

    fn should_concat_natively(source: &RollingHandle, target: &RollingHandle) -> bool {
        if source.header().is_none() {
            return true;
        }
        let (Some(last_source), Some(last_target)) =
            (source.last_sub_segment(), target.last_sub_segment())
        else {
            return false;
        };
        last_source.start_offset() == 0
            && !last_target.is_sealed()
            && last_target.length() + last_source.length() <= target.policy().max_length()
    }

    fn rebase(sub_segments: &[SubSegment], new_start_offset: u64) -> Vec<SubSegment> {
        let mut offset = new_start_offset;
        sub_segments
            .iter()
            .map(|sub| {
                let rebased = sub.rebased(offset);
                offset += sub.length();
                rebased
            })
            .collect()
    }

    fn can_truncate(sub: &SubSegment, truncation_offset: u64) -> bool {
        // Only sub-segments entirely below the offset go; an empty tail
        // that starts exactly at the offset is spared because it pins
        // the segment's length.
        sub.start_offset() < truncation_offset && sub.last_offset() <= truncation_offset
    }

    fn check_if_empty_and_not_sealed(
        &self,
        blob_name: &str,
        segment_name: &str,
    ) -> CoreResult<()> {
        match self.blobs.stat(blob_name) {
            Ok(info) if info.length > 0 || info.sealed => {
                Err(CoreError::already_exists(segment_name))
            }
            Ok(_) => Ok(()),
            Err(StorageError::NotExists { .. }) => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    fn truncated(segment_name: &str, sub: &SubSegment) -> CoreError {
        CoreError::Truncated {
            segment: segment_name.to_string(),
            start_offset: sub.start_offset(),
            last_offset: sub.last_offset(),
        }
    }

    fn ensure_writable(handle: &RollingHandle) -> CoreResult<()> {
        if handle.is_read_only() {
            return Err(CoreError::invalid_argument("handle is read-only"));
        }
        Ok(())
    }

    fn ensure_not_deleted(handle: &RollingHandle) -> CoreResult<()> {
        if handle.is_deleted() {
            return Err(CoreError::not_exists(handle.segment_name()));
        }
        Ok(())
    }

    fn ensure_not_sealed(handle: &RollingHandle) -> CoreResult<()> {
        if handle.is_sealed() {
            return Err(CoreError::sealed(handle.segment_name()));
        }
        Ok(())
    }

    fn ensure_offset(handle: &RollingHandle, offset: u64) -> CoreResult<()> {
        if offset != handle.length() {
            return Err(CoreError::bad_offset(
                handle.segment_name(),
                handle.length(),
                offset,
            ));
        }
        Ok(())
    }
}

impl std::fmt::Debug for RollingStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RollingStore")
            .field("default_policy", &self.default_policy)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sub_with_length(name: &str, start_offset: u64, length: u64) -> SubSegment {
        let mut sub = SubSegment::new(name, start_offset);
        sub.set_length(length);
        sub
    }

    #[test]
    fn rebase_assigns_contiguous_offsets() {
        let subs = vec![
            sub_with_length("s$offset.0", 0, 60),
            sub_with_length("s$offset.60", 60, 40),
        ];

        let rebased = RollingStore::rebase(&subs, 80);
        assert_eq!(rebased[0].start_offset(), 80);
        assert_eq!(rebased[0].last_offset(), 140);
        assert_eq!(rebased[1].start_offset(), 140);
        assert_eq!(rebased[1].last_offset(), 180);
        // Names still point at the source blobs.
        assert_eq!(rebased[0].name(), "s$offset.0");
    }

    #[test]
    fn can_truncate_spares_straddlers_and_empty_tails() {
        let below = sub_with_length("a", 0, 50);
        let straddling = sub_with_length("b", 50, 50);
        let empty_at_offset = sub_with_length("c", 75, 0);

        assert!(RollingStore::can_truncate(&below, 75));
        assert!(!RollingStore::can_truncate(&straddling, 75));
        assert!(!RollingStore::can_truncate(&empty_at_offset, 75));

        // Truncating at 0 never deletes anything.
        assert!(!RollingStore::can_truncate(&below, 0));
    }

    #[test]
    fn native_concat_choice() {
        let policy = RollingPolicy::from_raw(100);
        let header = BlobHandle::read_write("t$header");

        let mut target = RollingHandle::with_header(
            "t".to_string(),
            header.clone(),
            policy,
            vec![sub_with_length("t$offset.0", 0, 30)],
            false,
        );

        // Headerless source: always native.
        let legacy_source = RollingHandle::legacy("src".to_string(), false);
        assert!(RollingStore::should_concat_natively(&legacy_source, &target));

        // Single-sub-segment source that fits: native.
        let small_source = RollingHandle::with_header(
            "s".to_string(),
            BlobHandle::read_write("s$header"),
            policy,
            vec![sub_with_length("s$offset.0", 0, 40)],
            false,
        );
        assert!(RollingStore::should_concat_natively(&small_source, &target));

        // Source too large for the target's tail: header merge.
        let large_source = RollingHandle::with_header(
            "s".to_string(),
            BlobHandle::read_write("s$header"),
            policy,
            vec![sub_with_length("s$offset.0", 0, 80)],
            false,
        );
        assert!(!RollingStore::should_concat_natively(&large_source, &target));

        // Multi-sub-segment source: header merge.
        let multi_source = RollingHandle::with_header(
            "s".to_string(),
            BlobHandle::read_write("s$header"),
            policy,
            vec![
                sub_with_length("s$offset.0", 0, 10),
                sub_with_length("s$offset.10", 10, 10),
            ],
            false,
        );
        assert!(!RollingStore::should_concat_natively(&multi_source, &target));

        // Sealed target tail: header merge for headered sources.
        if let Some(tail) = target.last_sub_segment_mut() {
            tail.mark_sealed();
        }
        assert!(!RollingStore::should_concat_natively(&small_source, &target));
        assert!(RollingStore::should_concat_natively(&legacy_source, &target));
    }
}
