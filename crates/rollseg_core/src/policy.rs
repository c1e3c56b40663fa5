//! Rolling policy for segments.

use crate::error::{CoreError, CoreResult};

/// Size policy governing when a segment rolls over to a new
/// sub-segment.
///
/// The policy is immutable and recorded in the segment header at
/// creation time, so every handle to the segment observes the same
/// maximum sub-segment length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RollingPolicy {
    max_length: u64,
}

impl RollingPolicy {
    /// A policy that never rolls over: the segment stays a single
    /// sub-segment regardless of size.
    pub const NO_ROLLING: Self = Self {
        max_length: u64::MAX,
    };

    /// Creates a policy with the given maximum sub-segment length.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if `max_length` is zero.
    pub fn new(max_length: u64) -> CoreResult<Self> {
        if max_length == 0 {
            return Err(CoreError::invalid_argument(
                "rolling policy max_length must be positive",
            ));
        }
        Ok(Self { max_length })
    }

    /// Constructs a policy from an already-validated raw value.
    pub(crate) const fn from_raw(max_length: u64) -> Self {
        Self { max_length }
    }

    /// Returns the maximum length of a single sub-segment.
    #[must_use]
    pub const fn max_length(self) -> u64 {
        self.max_length
    }

    /// Returns whether this policy never rolls over.
    #[must_use]
    pub const fn is_unbounded(self) -> bool {
        self.max_length == u64::MAX
    }
}

impl Default for RollingPolicy {
    fn default() -> Self {
        Self::NO_ROLLING
    }
}
