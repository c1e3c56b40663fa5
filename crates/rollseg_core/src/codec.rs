//! Header blob serialization.
//!
//! Header layout (little-endian):
//!
//! ```text
//! | magic (4) | version (1) | max_length (8) | entries... |
//! ```
//!
//! Each entry is a 1-byte tag followed by its payload:
//!
//! - `NewSubSegment` (tag 1): `start_offset (8) | name_len (2) | name`
//! - `ConcatBegin` (tag 2): `entry_count (4) | base_offset (8)`
//!
//! The header is extended purely by appending, which is what makes a
//! blob-level concat of two headers a valid header: a `ConcatBegin`
//! entry is followed in the byte stream by the complete serialized
//! header of the source segment. The parser consumes sub-segments from
//! that embedded header - recursing through any concats the source
//! itself contains - until `entry_count` of them have been produced,
//! rebasing each by the base offset.

use crate::error::{CoreError, CoreResult};
use crate::policy::RollingPolicy;
use crate::sub_segment::SubSegment;

/// Magic bytes identifying a segment header.
pub const HEADER_MAGIC: [u8; 4] = *b"RSEG";

/// Current header format version.
pub const HEADER_VERSION: u8 = 1;

const TAG_NEW_SUB_SEGMENT: u8 = 1;
const TAG_CONCAT_BEGIN: u8 = 2;

/// Serializes a complete header: the fixed prefix plus one
/// `NewSubSegment` entry per sub-segment in the table.
pub fn serialize_handle(policy: RollingPolicy, sub_segments: &[SubSegment]) -> CoreResult<Vec<u8>> {
    let mut buf = Vec::with_capacity(13 + sub_segments.len() * 32);
    buf.extend_from_slice(&HEADER_MAGIC);
    buf.push(HEADER_VERSION);
    buf.extend_from_slice(&policy.max_length().to_le_bytes());
    for sub in sub_segments {
        buf.extend_from_slice(&serialize_sub_segment(sub)?);
    }
    Ok(buf)
}

/// Serializes a single `NewSubSegment` entry.
pub fn serialize_sub_segment(sub: &SubSegment) -> CoreResult<Vec<u8>> {
    let name = sub.name().as_bytes();
    let name_len = u16::try_from(name.len()).map_err(|_| {
        CoreError::invalid_argument(format!("sub-segment name too long: {} bytes", name.len()))
    })?;

    let mut buf = Vec::with_capacity(11 + name.len());
    buf.push(TAG_NEW_SUB_SEGMENT);
    buf.extend_from_slice(&sub.start_offset().to_le_bytes());
    buf.extend_from_slice(&name_len.to_le_bytes());
    buf.extend_from_slice(name);
    Ok(buf)
}

/// Serializes a single `ConcatBegin` entry.
pub fn serialize_concat(entry_count: u32, base_offset: u64) -> Vec<u8> {
    let mut buf = Vec::with_capacity(13);
    buf.push(TAG_CONCAT_BEGIN);
    buf.extend_from_slice(&entry_count.to_le_bytes());
    buf.extend_from_slice(&base_offset.to_le_bytes());
    buf
}

/// Parses a header blob back into its policy and sub-segment table.
///
/// Sub-segment lengths and sealed flags are not recorded in the header;
/// the caller derives them from consecutive start offsets and a stat of
/// the tail blob.
pub fn deserialize(data: &[u8]) -> CoreResult<(RollingPolicy, Vec<SubSegment>)> {
    let mut reader = Reader::new(data);
    let mut sub_segments = Vec::new();
    let policy = parse_header(&mut reader, None, 0, &mut sub_segments)?;
    Ok((policy, sub_segments))
}

/// Parses one serialized header (prefix plus entries) out of `reader`.
///
/// With `take = None` the entry stream runs to the end of the buffer;
/// with `take = Some(n)` it stops once `n` sub-segments have been
/// produced, which is how an embedded source header is delimited. Every
/// produced sub-segment has `rebase` added to its start offset.
fn parse_header(
    reader: &mut Reader<'_>,
    take: Option<usize>,
    rebase: u64,
    out: &mut Vec<SubSegment>,
) -> CoreResult<RollingPolicy> {
    let magic = reader.read_bytes(4)?;
    if magic != HEADER_MAGIC {
        return Err(CoreError::header_corruption("bad magic"));
    }
    let version = reader.read_u8()?;
    if version != HEADER_VERSION {
        return Err(CoreError::header_corruption(format!(
            "unsupported header version {version}"
        )));
    }
    let max_length = reader.read_u64()?;
    if max_length == 0 {
        return Err(CoreError::header_corruption("zero max_length in policy"));
    }
    let policy = RollingPolicy::from_raw(max_length);

    let mut produced = 0usize;
    loop {
        match take {
            Some(count) if produced >= count => {
                if produced > count {
                    return Err(CoreError::header_corruption(
                        "embedded header produced more sub-segments than declared",
                    ));
                }
                break;
            }
            Some(_) if reader.is_empty() => {
                return Err(CoreError::header_corruption(
                    "embedded header ended before declared sub-segment count",
                ));
            }
            None if reader.is_empty() => break,
            _ => {}
        }

        let tag = reader.read_u8()?;
        match tag {
            TAG_NEW_SUB_SEGMENT => {
                let start_offset = reader.read_u64()?;
                let name_len = reader.read_u16()? as usize;
                let name_bytes = reader.read_bytes(name_len)?;
                let name = std::str::from_utf8(name_bytes)
                    .map_err(|_| CoreError::header_corruption("sub-segment name is not UTF-8"))?;
                out.push(SubSegment::new(name, rebase + start_offset));
                produced += 1;
            }
            TAG_CONCAT_BEGIN => {
                let entry_count = reader.read_u32()? as usize;
                let base_offset = reader.read_u64()?;
                parse_header(reader, Some(entry_count), rebase + base_offset, out)?;
                produced += entry_count;
            }
            other => {
                return Err(CoreError::header_corruption(format!(
                    "unknown header entry tag {other}"
                )));
            }
        }
    }

    Ok(policy)
}

struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn is_empty(&self) -> bool {
        self.pos >= self.data.len()
    }

    fn read_bytes(&mut self, len: usize) -> CoreResult<&'a [u8]> {
        let end = self.pos.checked_add(len).filter(|&end| end <= self.data.len());
        let Some(end) = end else {
            return Err(CoreError::header_corruption("unexpected end of header"));
        };
        let bytes = &self.data[self.pos..end];
        self.pos = end;
        Ok(bytes)
    }

    fn read_u8(&mut self) -> CoreResult<u8> {
        Ok(self.read_bytes(1)?[0])
    }

    fn read_u16(&mut self) -> CoreResult<u16> {
        let bytes = self.read_bytes(2)?;
        Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
    }

    fn read_u32(&mut self) -> CoreResult<u32> {
        let bytes = self.read_bytes(4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn read_u64(&mut self) -> CoreResult<u64> {
        let bytes = self.read_bytes(8)?;
        let mut raw = [0u8; 8];
        raw.copy_from_slice(bytes);
        Ok(u64::from_le_bytes(raw))
    }
}
