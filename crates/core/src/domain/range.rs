//! Conversion between hardware and normalized value ranges
//!
//! All arithmetic is integer with a half-step bias, so repeated conversions
//! do not drift. A zero-width source range saturates to the floor of the
//! target range, and values outside the source range saturate at its bounds.

use serde::{Deserialize, Serialize};

/// Closed integer range `[min, max]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ValueRange {
    pub min: i64,
    pub max: i64,
}

impl ValueRange {
    pub const fn new(min: i64, max: i64) -> Self {
        Self { min, max }
    }

    /// Width of the range
    pub fn span(&self) -> i64 {
        self.max.saturating_sub(self.min)
    }

    pub fn is_degenerate(&self) -> bool {
        self.min == self.max
    }

    pub fn contains(&self, value: i64) -> bool {
        value >= self.min && value <= self.max
    }
}

/// Rescale `value` from `from` into `to`, rounding to nearest.
///
/// Values outside `from` saturate at its bounds, so the result always lies
/// inside `to`. An empty or inverted `from` collapses to `to.min`.
fn rescale(from: ValueRange, to: ValueRange, value: i64) -> i64 {
    if from.max <= from.min || to.max < to.min {
        return to.min;
    }
    // Offsets and spans are non-negative and below 2^64, so the product fits u128
    let span = (from.max as i128 - from.min as i128) as u128;
    let offset = (value.clamp(from.min, from.max) as i128 - from.min as i128) as u128;
    let n = offset * (to.max as i128 - to.min as i128) as u128;
    (to.min as i128 + ((n + span / 2) / span) as i128) as i64
}

/// Convert a raw hardware value into the normalized user range
pub fn to_user(hw: ValueRange, user: ValueRange, value: i64) -> i64 {
    rescale(hw, user, value)
}

/// Convert a normalized user value into the raw hardware range
pub fn from_user(hw: ValueRange, user: ValueRange, value: i64) -> i64 {
    if user.is_degenerate() {
        return hw.min;
    }
    rescale(user, hw, value)
}
