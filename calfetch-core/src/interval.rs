//! Numeric intervals used by the coverage set.

use std::fmt;

use chrono::{DateTime, Utc};

use crate::error::{CalFetchError, CalFetchResult};

/// A span between two points on the real line, in practice Unix-epoch
/// milliseconds.
///
/// An interval is only valid when `start < end`; zero-width and NaN-bounded
/// intervals are rejected by every operation that accepts one.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Interval {
    pub start: f64,
    pub end: f64,
}

impl Interval {
    pub const fn new(start: f64, end: f64) -> Self {
        Interval { start, end }
    }

    /// Build an interval from two timestamps, using epoch milliseconds.
    /// Sub-millisecond precision is truncated.
    pub fn from_times(from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        Interval {
            start: from.timestamp_millis() as f64,
            end: to.timestamp_millis() as f64,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.start < self.end
    }

    /// Whether the two half-open intervals share any point.
    pub fn overlaps(&self, other: &Interval) -> bool {
        self.start < other.end && other.start < self.end
    }

    pub(crate) fn validate(&self) -> CalFetchResult<()> {
        if self.is_valid() {
            Ok(())
        } else {
            Err(CalFetchError::InvalidInterval {
                start: self.start,
                end: self.end,
            })
        }
    }

    /// Convert back to timestamps. Fails for bounds outside chrono's range,
    /// which includes the infinite sentinels used by `inverse`.
    pub fn to_times(&self) -> CalFetchResult<(DateTime<Utc>, DateTime<Utc>)> {
        let convert = |ms: f64| {
            if ms.is_finite() {
                DateTime::from_timestamp_millis(ms as i64)
            } else {
                None
            }
        };

        match (convert(self.start), convert(self.end)) {
            (Some(from), Some(to)) => Ok((from, to)),
            _ => Err(CalFetchError::InvalidInterval {
                start: self.start,
                end: self.end,
            }),
        }
    }
}

impl From<(f64, f64)> for Interval {
    fn from((start, end): (f64, f64)) -> Self {
        Interval { start, end }
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{},{}]", self.start, self.end)
    }
}
