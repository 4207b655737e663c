use jiff::civil::{Date, DateTime, Time};
use jiff::tz::TimeZone;
use jiff::{Timestamp, Zoned};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum IntervalError {
    #[error("Start ({start}) must be before end ({end})")]
    Empty { start: DateTime, end: DateTime },

    #[error("Start and end must fall on the same day ({start} / {end})")]
    SpansDays { start: DateTime, end: DateTime },

    #[error("Invalid date-time '{0}': expected ISO-8601, e.g. 2025-03-01T09:00")]
    Unparseable(String),
}

/// Half-open `[start, end)` window on a single calendar day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interval {
    start: DateTime,
    end: DateTime,
}

impl Interval {
    pub fn new(start: DateTime, end: DateTime) -> Result<Self, IntervalError> {
        if start >= end {
            return Err(IntervalError::Empty { start, end });
        }
        // Jobs store one date plus two times, so the window cannot wrap midnight.
        if start.date() != end.date() {
            return Err(IntervalError::SpansDays { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn on(date: Date, start: Time, end: Time) -> Result<Self, IntervalError> {
        Self::new(date.to_datetime(start), date.to_datetime(end))
    }

    pub fn start(&self) -> DateTime {
        self.start
    }

    pub fn end(&self) -> DateTime {
        self.end
    }

    /// Calendar day used to scope conflict lookups.
    pub fn date(&self) -> Date {
        self.start.date()
    }

    pub fn overlaps(&self, other_start: DateTime, other_end: DateTime) -> bool {
        other_start < self.end && other_end > self.start
    }
}

/// Accepts civil (`2025-03-01T09:00`), zoned (`...+01:00[Europe/Madrid]`) and
/// RFC 3339 instants; instants are read in the system time zone.
pub fn parse_datetime(input: &str) -> Result<DateTime, IntervalError> {
    let trimmed = input.trim();
    if let Ok(zoned) = trimmed.parse::<Zoned>() {
        return Ok(zoned.datetime());
    }
    if let Ok(timestamp) = trimmed.parse::<Timestamp>() {
        return Ok(timestamp.to_zoned(TimeZone::system()).datetime());
    }
    trimmed
        .parse::<DateTime>()
        .map_err(|_| IntervalError::Unparseable(input.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use jiff::civil::date;

    #[test]
    fn test_rejects_empty_interval() {
        let at = date(2025, 3, 1).at(9, 0, 0, 0);
        assert_eq!(
            Interval::new(at, at),
            Err(IntervalError::Empty { start: at, end: at })
        );
    }

    #[test]
    fn test_rejects_reversed_interval() {
        let start = date(2025, 3, 1).at(11, 0, 0, 0);
        let end = date(2025, 3, 1).at(10, 0, 0, 0);
        assert!(matches!(
            Interval::new(start, end),
            Err(IntervalError::Empty { .. })
        ));
    }

    #[test]
    fn test_rejects_interval_crossing_midnight() {
        let start = date(2025, 3, 1).at(23, 0, 0, 0);
        let end = date(2025, 3, 2).at(1, 0, 0, 0);
        assert!(matches!(
            Interval::new(start, end),
            Err(IntervalError::SpansDays { .. })
        ));
    }

    #[test]
    fn test_adjacent_windows_do_not_overlap() {
        let day = date(2025, 3, 1);
        let proposed = Interval::new(day.at(10, 0, 0, 0), day.at(11, 0, 0, 0)).unwrap();
        assert!(!proposed.overlaps(day.at(9, 0, 0, 0), day.at(10, 0, 0, 0)));
        assert!(!proposed.overlaps(day.at(11, 0, 0, 0), day.at(12, 0, 0, 0)));
        assert!(proposed.overlaps(day.at(9, 0, 0, 0), day.at(10, 30, 0, 0)));
        assert!(proposed.overlaps(day.at(10, 15, 0, 0), day.at(10, 45, 0, 0)));
    }

    #[test]
    fn test_parse_civil_and_zoned_inputs() {
        assert_eq!(
            parse_datetime("2025-03-01T09:00").unwrap(),
            date(2025, 3, 1).at(9, 0, 0, 0)
        );
        assert_eq!(
            parse_datetime("2025-03-01T09:00:00+01:00[+01:00]").unwrap(),
            date(2025, 3, 1).at(9, 0, 0, 0)
        );
        assert!(parse_datetime("2025-03-01T09:00:00Z").is_ok());
        assert!(matches!(
            parse_datetime("tomorrow-ish"),
            Err(IntervalError::Unparseable(_))
        ));
    }
}
