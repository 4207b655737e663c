use std::str::FromStr;

use jiff::SignedDuration;
use jiff::civil::{Date, Time};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    models::job::Job,
    scheduling::interval::{Interval, IntervalError},
};

/// Board column a job is shown in. Derived from the job's window, never stored.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum BucketKey {
    Morning,
    Afternoon,
    Evening,
    Unscheduled,
}

impl BucketKey {
    pub const ALL: [BucketKey; 4] = [
        BucketKey::Morning,
        BucketKey::Afternoon,
        BucketKey::Evening,
        BucketKey::Unscheduled,
    ];

    pub fn label(self) -> &'static str {
        match self {
            BucketKey::Morning => "Morning",
            BucketKey::Afternoon => "Afternoon",
            BucketKey::Evening => "Evening",
            BucketKey::Unscheduled => "Unscheduled",
        }
    }
}

impl std::fmt::Display for BucketKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BucketKey::Morning => write!(f, "morning"),
            BucketKey::Afternoon => write!(f, "afternoon"),
            BucketKey::Evening => write!(f, "evening"),
            BucketKey::Unscheduled => write!(f, "unscheduled"),
        }
    }
}

#[derive(Debug, Error)]
#[error("Unknown bucket '{0}'. Expected one of: morning, afternoon, evening, unscheduled")]
pub struct UnknownBucket(String);

impl FromStr for BucketKey {
    type Err = UnknownBucket;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "morning" | "am" => Ok(BucketKey::Morning),
            "afternoon" | "pm" => Ok(BucketKey::Afternoon),
            "evening" => Ok(BucketKey::Evening),
            "unscheduled" | "none" => Ok(BucketKey::Unscheduled),
            _ => Err(UnknownBucket(s.to_string())),
        }
    }
}

/// Fixed time-of-day cut-offs plus the slot each column drops jobs into.
#[derive(Debug, Clone, Copy)]
pub struct BucketBoundaries {
    pub afternoon_starts: Time,
    pub evening_starts: Time,
    pub morning_slot: Time,
    pub afternoon_slot: Time,
    pub evening_slot: Time,
    pub default_duration: SignedDuration,
}

impl Default for BucketBoundaries {
    fn default() -> Self {
        crate::config::Config::default().boundaries()
    }
}

impl BucketBoundaries {
    pub fn classify(&self, start: Time) -> BucketKey {
        if start < self.afternoon_starts {
            BucketKey::Morning
        } else if start < self.evening_starts {
            BucketKey::Afternoon
        } else {
            BucketKey::Evening
        }
    }

    pub fn slot(&self, bucket: BucketKey) -> Option<Time> {
        match bucket {
            BucketKey::Morning => Some(self.morning_slot),
            BucketKey::Afternoon => Some(self.afternoon_slot),
            BucketKey::Evening => Some(self.evening_slot),
            BucketKey::Unscheduled => None,
        }
    }

    /// Window a job gets when dropped into `bucket` on `date`: the column's
    /// slot as start, keeping `duration` (or the default one).
    /// `Unscheduled` has no window.
    pub fn slot_window(
        &self,
        bucket: BucketKey,
        date: Date,
        duration: Option<SignedDuration>,
    ) -> Result<Option<Interval>, IntervalError> {
        let Some(slot) = self.slot(bucket) else {
            return Ok(None);
        };
        let start = date.to_datetime(slot);
        let end = start
            .checked_add(duration.unwrap_or(self.default_duration))
            .map_err(|_| IntervalError::SpansDays { start, end: start })?;
        Interval::new(start, end).map(Some)
    }
}

/// Classifies by start time. Anything without a full window is `Unscheduled`.
pub fn bucket_for_times(
    start: Option<Time>,
    end: Option<Time>,
    boundaries: &BucketBoundaries,
) -> BucketKey {
    match (start, end) {
        (Some(start), Some(_)) => boundaries.classify(start),
        _ => BucketKey::Unscheduled,
    }
}

pub fn bucket_for_job(job: &Job, boundaries: &BucketBoundaries) -> BucketKey {
    bucket_for_times(job.start_time, job.end_time, boundaries)
}
