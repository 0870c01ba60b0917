//! Named sequences of timestamped values

use time::OffsetDateTime;

use crate::Error;

const NANOS_PER_SECOND: f64 = 1e9;

/// A single observation of a [`Series`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    /// When the value was observed, always UTC
    pub timestamp: OffsetDateTime,
    /// The observed value. `None` when the backend reported no value.
    pub value: Option<f64>,
}

/// A named sequence of points, in the order the backend delivered them
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Series {
    /// The flat series name, for instance `host1.cpu.load`
    pub name: String,
    /// The observations of this series
    pub points: Vec<Point>,
}

impl Series {
    /// Create a new, empty [`Series`]
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            points: Vec::new(),
        }
    }

    /// Append a point
    pub fn push(&mut self, timestamp: OffsetDateTime, value: Option<f64>) {
        self.points.push(Point { timestamp, value });
    }

    /// Append a point whose timestamp is given as epoch seconds.
    ///
    /// # Errors
    ///
    /// Function will return an error if `seconds` is not a representable
    /// instant, see [`timestamp_from_epoch`].
    pub fn push_epoch(&mut self, seconds: f64, value: Option<f64>) -> Result<(), Error> {
        self.push(timestamp_from_epoch(seconds)?, value);
        Ok(())
    }

    /// Number of points
    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Whether this series holds no points
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Convert epoch seconds to a UTC instant.
///
/// The seconds are scaled to nanoseconds before conversion, so fractional
/// seconds survive and no local timezone is consulted.
///
/// # Errors
///
/// Function will return an error if `seconds` is not finite or lies outside
/// the range [`OffsetDateTime`] can represent.
#[allow(clippy::cast_possible_truncation)]
pub fn timestamp_from_epoch(seconds: f64) -> Result<OffsetDateTime, Error> {
    if !seconds.is_finite() {
        return Err(Error::Timestamp(seconds));
    }
    let nanos = (seconds * NANOS_PER_SECOND) as i128;
    OffsetDateTime::from_unix_timestamp_nanos(nanos).map_err(|_| Error::Timestamp(seconds))
}
