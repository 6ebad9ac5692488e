//! The fixed integer range shared by every Tuple and Modifier value.
//!
//! Callers must not assume finer precision than a whole step survives a
//! round trip through the store.

/// Smallest value a Tuple or Modifier may hold.
pub const MIN_VALUE: i64 = -10_000;

/// Largest value a Tuple or Modifier may hold.
pub const MAX_VALUE: i64 = 10_000;

/// Saturate `value` into `[MIN_VALUE, MAX_VALUE]`.
pub const fn clamp(value: i64) -> i64 {
    if value < MIN_VALUE {
        MIN_VALUE
    } else if value > MAX_VALUE {
        MAX_VALUE
    } else {
        value
    }
}

/// Bound an increment so `stored + delta` cannot overflow before clamping.
///
/// Any delta beyond the full width of the range has the same effect as the
/// width itself.
pub const fn clamp_delta(delta: i64) -> i64 {
    const WIDTH: i64 = MAX_VALUE - MIN_VALUE;
    if delta < -WIDTH {
        -WIDTH
    } else if delta > WIDTH {
        WIDTH
    } else {
        delta
    }
}
