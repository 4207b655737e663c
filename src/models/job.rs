use jiff::{SignedDuration, Timestamp};
use jiff::civil::{Date, DateTime, Time};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Serialize, Deserialize, Default, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    #[default]
    Scheduled,
    InProgress,
    Completed,
    Cancelled,
}

impl JobStatus {
    /// Completed and cancelled jobs are frozen with respect to scheduling.
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Cancelled)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::Scheduled => write!(f, "scheduled"),
            JobStatus::InProgress => write!(f, "in progress"),
            JobStatus::Completed => write!(f, "completed"),
            JobStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

#[derive(Serialize, Deserialize, Default, Clone, Debug)]
pub struct Job {
    /// UUID to identify the job
    pub id: Uuid,
    /// User-facing auto-incremental job number
    pub job_number: u64,
    /// Customer the work is for
    pub customer_name: String,
    /// What needs to be done
    pub description: String,
    /// Assigned technician, `None` while unassigned
    pub technician_id: Option<Uuid>,
    /// Board zone tag
    pub zone: Option<String>,
    /// Day the job is booked on
    pub scheduled_date: Option<Date>,
    pub start_time: Option<Time>,
    pub end_time: Option<Time>,
    pub status: JobStatus,
    /// Manual ordering inside its zone + bucket column
    pub position: i64,
    pub notes: Option<String>,
    pub created_at: Timestamp,
    pub completed_at: Option<Timestamp>,
    pub cancelled_at: Option<Timestamp>,
}

impl Job {
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Start and end as civil datetimes, only when the job has a full window.
    pub fn window(&self) -> Option<(DateTime, DateTime)> {
        let date = self.scheduled_date?;
        let start = self.start_time?;
        let end = self.end_time?;
        Some((date.to_datetime(start), date.to_datetime(end)))
    }

    pub fn duration(&self) -> Option<SignedDuration> {
        let (start, end) = self.window()?;
        Some(end.duration_since(start))
    }
}
