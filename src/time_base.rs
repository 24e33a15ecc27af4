//! Rational time bases and timestamp rescaling.
//!
//! Every stream in a container carries its own native time base. The
//! pipeline rescales all timestamps into one session-wide [`TimeBase`] so
//! consumers can synchronize audio and video without knowing stream details.

use std::fmt::{Display, Formatter, Result as FmtResult};

use ffmpeg_next::{Rational, Rescale};

/// Sentinel meaning "no timestamp", identical to FFmpeg's `AV_NOPTS_VALUE`.
pub const NO_TIMESTAMP: i64 = ffmpeg_sys_next::AV_NOPTS_VALUE;

/// A strictly positive rational unit of time, in seconds per tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimeBase {
    numerator: i32,
    denominator: i32,
}

impl TimeBase {
    /// One tick per microsecond, FFmpeg's `AV_TIME_BASE`.
    pub const MICROSECONDS: TimeBase = TimeBase {
        numerator: 1,
        denominator: ffmpeg_sys_next::AV_TIME_BASE,
    };

    /// Create a time base of `numerator / denominator` seconds per tick.
    ///
    /// Returns `None` unless both parts are positive.
    pub fn new(numerator: i32, denominator: i32) -> Option<Self> {
        if numerator <= 0 || denominator <= 0 {
            return None;
        }
        Some(Self {
            numerator,
            denominator,
        })
    }

    /// A time base of `1 / ticks` seconds, e.g. `per_second(24)` for frame counting.
    ///
    /// Returns `None` when `ticks` is not positive.
    pub fn per_second(ticks: i32) -> Option<Self> {
        Self::new(1, ticks)
    }

    pub fn numerator(&self) -> i32 {
        self.numerator
    }

    pub fn denominator(&self) -> i32 {
        self.denominator
    }

    /// Rescale `timestamp` from `from` into `to`, rounding to nearest.
    ///
    /// [`NO_TIMESTAMP`] passes through unchanged.
    pub fn rescale(timestamp: i64, from: TimeBase, to: TimeBase) -> i64 {
        if timestamp == NO_TIMESTAMP || from == to {
            return timestamp;
        }
        timestamp.rescale(Rational::from(from), Rational::from(to))
    }

    /// Convert a timestamp in this time base into seconds.
    pub fn to_seconds(&self, timestamp: i64) -> f64 {
        timestamp as f64 * self.numerator as f64 / self.denominator as f64
    }

    /// Convert seconds into the nearest timestamp in this time base.
    pub fn from_seconds(&self, seconds: f64) -> i64 {
        (seconds * self.denominator as f64 / self.numerator as f64).round() as i64
    }
}

impl Default for TimeBase {
    fn default() -> Self {
        Self::MICROSECONDS
    }
}

impl From<TimeBase> for Rational {
    fn from(time_base: TimeBase) -> Self {
        Rational::new(time_base.numerator, time_base.denominator)
    }
}

impl TryFrom<Rational> for TimeBase {
    type Error = Rational;

    /// Fails with the original rational when it is zero or negative.
    fn try_from(rational: Rational) -> Result<Self, Self::Error> {
        TimeBase::new(rational.numerator(), rational.denominator()).ok_or(rational)
    }
}

impl Display for TimeBase {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}/{}", self.numerator, self.denominator)
    }
}
