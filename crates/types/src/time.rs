//! Simulation time.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::ops::{Add, AddAssign, Sub};

/// A totally ordered simulation timestamp.
///
/// Event lists are generic over this trait. Besides ordering it supplies the
/// bucket arithmetic the ladder queue uses to spread events over a rung, so
/// integer and floating-point clocks share one implementation.
pub trait Timestamp:
    Copy + PartialEq + PartialOrd + fmt::Debug + fmt::Display + Send + Sync + 'static
{
    /// Whether the value can be ordered and bucketed.
    ///
    /// Always true for integers; false for NaN and infinite floats.
    fn is_valid(&self) -> bool;

    /// Total order over valid timestamps.
    fn cmp_time(&self, other: &Self) -> Ordering;

    /// Width of each of `count` buckets spreading `[min, max]`.
    ///
    /// Integer widths are never below one tick.
    fn bucket_width(min: Self, max: Self, count: usize) -> Self;

    /// Index of the bucket holding `self` on a rung starting at `start`.
    ///
    /// Negative when `self` precedes `start`.
    fn bucket_index(self, start: Self, width: Self) -> i64;

    /// Start time of bucket `index` on a rung starting at `start`.
    fn bucket_start(start: Self, width: Self, index: usize) -> Self;

    /// Whether a bucket of `width` is already at the finest resolution.
    fn is_min_width(width: Self) -> bool;

    /// The smaller of two timestamps.
    fn earlier(self, other: Self) -> Self {
        if other.cmp_time(&self) == Ordering::Less {
            other
        } else {
            self
        }
    }

    /// The larger of two timestamps.
    fn later(self, other: Self) -> Self {
        if other.cmp_time(&self) == Ordering::Greater {
            other
        } else {
            self
        }
    }
}

macro_rules! impl_integer_timestamp {
    ($($t:ty),* $(,)?) => {$(
        impl Timestamp for $t {
            fn is_valid(&self) -> bool {
                true
            }

            fn cmp_time(&self, other: &Self) -> Ordering {
                Ord::cmp(self, other)
            }

            fn bucket_width(min: Self, max: Self, count: usize) -> Self {
                let span = max as i128 - min as i128;
                let width = (span / count.max(1) as i128).max(1);
                width.min(<$t>::MAX as i128) as $t
            }

            fn bucket_index(self, start: Self, width: Self) -> i64 {
                let offset = self as i128 - start as i128;
                let index = offset.div_euclid((width as i128).max(1));
                index.clamp(i64::MIN as i128, i64::MAX as i128) as i64
            }

            fn bucket_start(start: Self, width: Self, index: usize) -> Self {
                let at = (start as i128)
                    .saturating_add((width as i128).saturating_mul(index as i128));
                at.clamp(<$t>::MIN as i128, <$t>::MAX as i128) as $t
            }

            fn is_min_width(width: Self) -> bool {
                width <= 1
            }
        }
    )*};
}

macro_rules! impl_float_timestamp {
    ($($t:ty),* $(,)?) => {$(
        impl Timestamp for $t {
            fn is_valid(&self) -> bool {
                self.is_finite()
            }

            fn cmp_time(&self, other: &Self) -> Ordering {
                self.total_cmp(other)
            }

            fn bucket_width(min: Self, max: Self, count: usize) -> Self {
                (max - min) / count.max(1) as $t
            }

            fn bucket_index(self, start: Self, width: Self) -> i64 {
                if width <= 0.0 {
                    return 0;
                }
                // `as` saturates for out-of-range floats.
                ((self - start) / width).floor() as i64
            }

            fn bucket_start(start: Self, width: Self, index: usize) -> Self {
                start + width * index as $t
            }

            fn is_min_width(width: Self) -> bool {
                !width.is_normal() || width <= 0.0
            }
        }
    )*};
}

impl_integer_timestamp!(u16, u32, u64, usize, i32, i64);
impl_float_timestamp!(f32, f64);

/// Simulation time in integer ticks.
///
/// Arithmetic saturates at [`VirtualTime::MAX`] instead of overflowing, so
/// `now + delay` near the end of time stays ordered.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct VirtualTime(pub u64);

impl VirtualTime {
    /// The start of simulated time.
    pub const ZERO: Self = VirtualTime(0);

    /// The largest representable time.
    pub const MAX: Self = VirtualTime(u64::MAX);

    /// Create a time from a tick count.
    pub const fn from_ticks(ticks: u64) -> Self {
        VirtualTime(ticks)
    }

    /// Get the raw tick count.
    pub const fn ticks(self) -> u64 {
        self.0
    }

    /// Add, clamping at [`VirtualTime::MAX`].
    pub fn saturating_add(self, other: Self) -> Self {
        VirtualTime(self.0.saturating_add(other.0))
    }

    /// Subtract, clamping at zero.
    pub fn saturating_sub(self, other: Self) -> Self {
        VirtualTime(self.0.saturating_sub(other.0))
    }
}

impl From<u64> for VirtualTime {
    fn from(ticks: u64) -> Self {
        VirtualTime(ticks)
    }
}

impl Add for VirtualTime {
    type Output = VirtualTime;

    fn add(self, rhs: Self) -> Self::Output {
        self.saturating_add(rhs)
    }
}

impl AddAssign for VirtualTime {
    fn add_assign(&mut self, rhs: Self) {
        *self = self.saturating_add(rhs);
    }
}

impl Sub for VirtualTime {
    type Output = VirtualTime;

    fn sub(self, rhs: Self) -> Self::Output {
        self.saturating_sub(rhs)
    }
}

impl fmt::Display for VirtualTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Timestamp for VirtualTime {
    fn is_valid(&self) -> bool {
        true
    }

    fn cmp_time(&self, other: &Self) -> Ordering {
        self.cmp(other)
    }

    fn bucket_width(min: Self, max: Self, count: usize) -> Self {
        VirtualTime(u64::bucket_width(min.0, max.0, count))
    }

    fn bucket_index(self, start: Self, width: Self) -> i64 {
        self.0.bucket_index(start.0, width.0)
    }

    fn bucket_start(start: Self, width: Self, index: usize) -> Self {
        VirtualTime(u64::bucket_start(start.0, width.0, index))
    }

    fn is_min_width(width: Self) -> bool {
        u64::is_min_width(width.0)
    }
}
