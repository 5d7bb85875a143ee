//! Wraparound-aware sequence number arithmetic.
//!
//! Sequence numbers are unsigned 16-bit counters that wrap modulo 65536.
//! Ordering uses the half-range rule: `s1` is considered greater than `s2`
//! when it lies within the 32768 sequences ahead of `s2`, so 0 is greater
//! than 65535 even though it is numerically smaller.

/// Returns whether `s1` is strictly after `s2` in wraparound order.
///
/// `sequence_greater_than(2, 1)` is true, `sequence_greater_than(1, 1)` is
/// false, and `sequence_greater_than(0, 65535)` is true.
pub fn sequence_greater_than(s1: u16, s2: u16) -> bool {
    ((s1 > s2) && (s1 - s2 <= 32768)) || ((s1 < s2) && (s2 - s1 > 32768))
}

/// Returns whether `s1` is strictly before `s2` in wraparound order.
pub fn sequence_less_than(s1: u16, s2: u16) -> bool {
    sequence_greater_than(s2, s1)
}

/// Signed distance from `from` to `to`, in the range -32768..=32767.
///
/// Positive when `to` is ahead of `from`: `wrapping_diff(65535, 0)` is 1,
/// `wrapping_diff(0, 65535)` is -1.
pub fn wrapping_diff(from: u16, to: u16) -> i16 {
    to.wrapping_sub(from) as i16
}

/// Unsigned steps forward from `from` to reach `to`, in 0..=65535.
///
/// `forward_distance(65533, 2)` is 5. Used for slot-range checks where only
/// the forward direction matters.
pub fn forward_distance(from: u16, to: u16) -> u16 {
    to.wrapping_sub(from)
}
