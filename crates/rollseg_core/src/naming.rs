//! Blob naming conventions for segments.
//!
//! Segment names must not contain the `$` marker; it is reserved for
//! the derived blob names below. Both derivations are deterministic,
//! so a reader can locate any blob of a segment from header data
//! alone.

/// Suffix appended to a segment name to form its header blob name.
const HEADER_SUFFIX: &str = "$header";

/// Marker between a segment name and a sub-segment's start offset.
const OFFSET_MARKER: &str = "$offset.";

/// Returns the name of the header blob for a segment.
#[must_use]
pub fn header_name(segment_name: &str) -> String {
    format!("{segment_name}{HEADER_SUFFIX}")
}

/// Returns the name of the sub-segment blob starting at the given
/// offset within a segment.
#[must_use]
pub fn sub_segment_name(segment_name: &str, start_offset: u64) -> String {
    format!("{segment_name}{OFFSET_MARKER}{start_offset}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_name_is_deterministic() {
        assert_eq!(header_name("a/b"), "a/b$header");
        assert_eq!(header_name("a/b"), header_name("a/b"));
    }

    #[test]
    fn sub_segment_names_differ_by_offset() {
        let first = sub_segment_name("seg", 0);
        let second = sub_segment_name("seg", 100);
        assert_eq!(first, "seg$offset.0");
        assert_eq!(second, "seg$offset.100");
        assert_ne!(first, second);
    }

    #[test]
    fn derived_names_do_not_collide_across_segments() {
        assert_ne!(sub_segment_name("a", 0), sub_segment_name("b", 0));
        assert_ne!(header_name("a"), sub_segment_name("a", 0));
    }
}
