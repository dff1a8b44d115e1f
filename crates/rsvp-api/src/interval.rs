//! The interval overlap rule
//!
//! Intervals are half-open in comparison semantics: the end instant is
//! exclusive, so back-to-back bookings that touch do not conflict.

use chrono::{DateTime, Utc};

/// Returns true iff the two windows share at least one instant.
///
/// `overlaps(a, b) = a.start < b.end && b.start < a.end`
///
/// Symmetric and O(1). Degenerate (zero-length) windows never overlap
/// anything; callers reject `start == end` during validation.
pub fn overlaps(
    a_start: DateTime<Utc>,
    a_end: DateTime<Utc>,
    b_start: DateTime<Utc>,
    b_end: DateTime<Utc>,
) -> bool {
    a_start < b_end && b_start < a_end
}
