use jiff::civil::{Date, DateTime};
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    models::{
        job::{Job, JobStatus},
        store::Store,
    },
    scheduling::{
        bucket::{BucketBoundaries, BucketKey},
        conflicts::{self, Conflict, ConflictCheck, find_conflicts},
        interval::{Interval, IntervalError},
        ordering::{ReorderError, plan_reorder},
    },
    services::{
        GroupKey, TechnicianLookupError, append_to_group, commit, group_members, normalize_zone,
        resolve_technician,
    },
    storage::{Storage, StorageError},
};

/// Lets conflicts through only when the caller explicitly forces the write.
fn screen_conflicts(
    job_number: u64,
    conflicts: Vec<Conflict>,
    force: bool,
) -> Result<(), Vec<Conflict>> {
    if conflicts.is_empty() {
        return Ok(());
    }
    if force {
        warn!(
            job = job_number,
            overlapping = ?conflicts.iter().map(|c| c.job_number).collect::<Vec<_>>(),
            "Forcing write over conflicting bookings"
        );
        return Ok(());
    }
    warn!(job = job_number, count = conflicts.len(), "Write blocked by conflicts");
    Err(conflicts)
}

fn job_id(store: &Store, job_number: u64) -> Option<Uuid> {
    store.get_job_by_number(job_number).map(|j| j.id)
}

// ---------------------------------------------------------------------------
// Conflict check
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum CheckConflictsError {
    #[error(transparent)]
    InvalidInterval(#[from] IntervalError),

    #[error(transparent)]
    Technician(#[from] TechnicianLookupError),

    #[error("Job #{0} not found")]
    JobNotFound(u64),
}

pub struct CheckConflictsParameters {
    pub technician: String,
    pub start: DateTime,
    pub end: DateTime,
    pub exclude_job: Option<u64>,
}

/// Advisory only: reports overlaps without touching the store.
pub fn check_conflicts(
    store: &Store,
    parameters: CheckConflictsParameters,
) -> Result<ConflictCheck, CheckConflictsError> {
    let interval = Interval::new(parameters.start, parameters.end)?;
    let technician = resolve_technician(store, &parameters.technician)?;
    let exclude = parameters
        .exclude_job
        .map(|n| job_id(store, n).ok_or(CheckConflictsError::JobNotFound(n)))
        .transpose()?;

    let result = conflicts::check(store, technician.id, &interval, exclude);
    debug!(
        technician = %technician.name,
        start = %interval.start(),
        end = %interval.end(),
        clear = result.is_clear(),
        "Checked conflicts"
    );
    Ok(result)
}

// ---------------------------------------------------------------------------
// Move between zone / bucket columns
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum MoveJobError {
    #[error("Job #{0} not found")]
    JobNotFound(u64),

    #[error("Cannot modify completed or cancelled jobs (job #{job_number} is {status})")]
    Terminal { job_number: u64, status: JobStatus },

    #[error("Job #{0} has no scheduled date; pass one to place it in a time bucket")]
    MissingDate(u64),

    #[error(transparent)]
    InvalidInterval(#[from] IntervalError),

    #[error("Job #{job_number} would overlap {} booking(s) for its technician", .conflicts.len())]
    Conflict {
        job_number: u64,
        conflicts: Vec<Conflict>,
    },

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

pub struct MoveJobParameters {
    pub job_number: u64,
    pub to_zone: Option<String>,
    pub to_bucket: BucketKey,
    /// Day to place the job on; defaults to the job's own date
    pub date: Option<Date>,
    pub force: bool,
}

#[derive(Debug)]
pub enum MoveOutcome {
    Unchanged,
    Moved(Job),
}

pub fn move_job(
    store: &mut Store,
    storage: &impl Storage,
    boundaries: &BucketBoundaries,
    parameters: MoveJobParameters,
) -> Result<MoveOutcome, MoveJobError> {
    let job = store
        .get_job_by_number(parameters.job_number)
        .ok_or(MoveJobError::JobNotFound(parameters.job_number))?;
    if job.is_terminal() {
        return Err(MoveJobError::Terminal {
            job_number: job.job_number,
            status: job.status,
        });
    }

    let from = GroupKey::of(job, boundaries);
    let to = GroupKey {
        date: parameters.date.or(job.scheduled_date),
        zone: normalize_zone(parameters.to_zone.as_deref()),
        bucket: parameters.to_bucket,
    };
    if from == to {
        debug!(job = job.job_number, "Move target is the current column");
        return Ok(MoveOutcome::Unchanged);
    }

    // Staying in the same bucket keeps the time of day, even across days;
    // any other bucket lands on its slot.
    let window = match (to.bucket, job.start_time.zip(job.end_time)) {
        (BucketKey::Unscheduled, _) => None,
        (bucket, Some((start, end))) if bucket == from.bucket => {
            let date = to.date.ok_or(MoveJobError::MissingDate(job.job_number))?;
            Some(Interval::on(date, start, end)?)
        }
        (bucket, _) => {
            let date = to.date.ok_or(MoveJobError::MissingDate(job.job_number))?;
            boundaries.slot_window(bucket, date, job.duration())?
        }
    };

    if let (Some(technician_id), Some(interval)) = (job.technician_id, window.as_ref()) {
        let found = find_conflicts(store, technician_id, interval, Some(job.id));
        screen_conflicts(job.job_number, found, parameters.force).map_err(|conflicts| {
            MoveJobError::Conflict {
                job_number: job.job_number,
                conflicts,
            }
        })?;
    }

    let id = job.id;
    let mut candidate = store.clone();
    let target = candidate
        .get_job_mut(id)
        .ok_or(MoveJobError::JobNotFound(parameters.job_number))?;
    target.zone = parameters
        .to_zone
        .map(|z| z.trim().to_string())
        .filter(|z| !z.is_empty());
    target.scheduled_date = to.date;
    target.start_time = window.map(|w| w.start().time());
    target.end_time = window.map(|w| w.end().time());
    append_to_group(&mut candidate, &to, boundaries, id);
    let moved = candidate
        .get_job(id)
        .cloned()
        .ok_or(MoveJobError::JobNotFound(parameters.job_number))?;

    commit(store, storage, candidate)?;
    info!(
        job = moved.job_number,
        zone = ?moved.zone,
        bucket = %to.bucket,
        position = moved.position,
        "Job moved"
    );
    Ok(MoveOutcome::Moved(moved))
}

// ---------------------------------------------------------------------------
// Reorder inside a column
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ReorderJobError {
    #[error("Job #{0} not found")]
    JobNotFound(u64),

    #[error("Cannot modify completed or cancelled jobs (job #{job_number} is {status})")]
    Terminal { job_number: u64, status: JobStatus },

    #[error("Invalid reorder target: {0}")]
    InvalidTarget(#[from] ReorderError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

pub struct ReorderJobParameters {
    pub job_number: u64,
    /// Job that should end up directly before this one
    pub after: Option<u64>,
    /// Job that should end up directly after this one
    pub before: Option<u64>,
}

#[derive(Debug, PartialEq, Eq)]
pub enum ReorderOutcome {
    Unchanged,
    Reordered { rows_written: usize },
}

pub fn reorder_in_bucket(
    store: &mut Store,
    storage: &impl Storage,
    boundaries: &BucketBoundaries,
    parameters: ReorderJobParameters,
) -> Result<ReorderOutcome, ReorderJobError> {
    let job = store
        .get_job_by_number(parameters.job_number)
        .ok_or(ReorderJobError::JobNotFound(parameters.job_number))?;
    if job.is_terminal() {
        return Err(ReorderJobError::Terminal {
            job_number: job.job_number,
            status: job.status,
        });
    }

    // Completed and cancelled jobs are fixed in place and cannot anchor a drop.
    let lookup = |n: u64| -> Result<Uuid, ReorderJobError> {
        let anchor = store
            .get_job_by_number(n)
            .ok_or(ReorderJobError::JobNotFound(n))?;
        if anchor.is_terminal() {
            return Err(ReorderJobError::Terminal {
                job_number: n,
                status: anchor.status,
            });
        }
        Ok(anchor.id)
    };
    let prev = parameters.after.map(lookup).transpose()?;
    let next = parameters.before.map(lookup).transpose()?;

    let key = GroupKey::of(job, boundaries);
    let group = group_members(store, &key, boundaries);
    let writes = plan_reorder(&group, job.id, prev, next)?;
    if writes.is_empty() {
        debug!(job = job.job_number, "Job already in place");
        return Ok(ReorderOutcome::Unchanged);
    }

    let job_number = job.job_number;
    let mut candidate = store.clone();
    for (id, position) in &writes {
        if let Some(member) = candidate.get_job_mut(*id) {
            member.position = *position;
        }
    }
    commit(store, storage, candidate)?;

    if writes.len() > 1 {
        debug!(job = job_number, rows = writes.len(), "Column renumbered");
    }
    info!(job = job_number, bucket = %key.bucket, "Job reordered");
    Ok(ReorderOutcome::Reordered {
        rows_written: writes.len(),
    })
}

// ---------------------------------------------------------------------------
// Technician assignment
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum AssignTechnicianError {
    #[error("Job #{0} not found")]
    JobNotFound(u64),

    #[error("Cannot modify completed or cancelled jobs (job #{job_number} is {status})")]
    Terminal { job_number: u64, status: JobStatus },

    #[error(transparent)]
    Technician(#[from] TechnicianLookupError),

    #[error("Technician '{0}' is inactive")]
    TechnicianInactive(String),

    #[error(transparent)]
    InvalidInterval(#[from] IntervalError),

    #[error("Job #{job_number} would overlap {} booking(s) for the technician", .conflicts.len())]
    Conflict {
        job_number: u64,
        conflicts: Vec<Conflict>,
    },

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

pub struct AssignTechnicianParameters {
    pub job_number: u64,
    /// `None` unassigns the job
    pub technician: Option<String>,
    pub force: bool,
}

#[derive(Debug)]
pub struct AssignOutcome {
    pub assigned: bool,
    pub job: Job,
    /// Technician's home zone differs from the job's zone
    pub zone_mismatch: bool,
}

pub fn assign_technician(
    store: &mut Store,
    storage: &impl Storage,
    parameters: AssignTechnicianParameters,
) -> Result<AssignOutcome, AssignTechnicianError> {
    let job = store
        .get_job_by_number(parameters.job_number)
        .ok_or(AssignTechnicianError::JobNotFound(parameters.job_number))?;
    if job.is_terminal() {
        return Err(AssignTechnicianError::Terminal {
            job_number: job.job_number,
            status: job.status,
        });
    }

    let technician = parameters
        .technician
        .as_deref()
        .map(|query| resolve_technician(store, query))
        .transpose()?;
    if let Some(technician) = technician
        && !technician.active
    {
        return Err(AssignTechnicianError::TechnicianInactive(
            technician.name.clone(),
        ));
    }

    let technician_id = technician.map(|t| t.id);
    let zone_mismatch = match (
        technician.and_then(|t| normalize_zone(t.zone.as_deref())),
        normalize_zone(job.zone.as_deref()),
    ) {
        (Some(home), Some(zone)) => home != zone,
        _ => false,
    };

    if job.technician_id == technician_id {
        return Ok(AssignOutcome {
            assigned: false,
            job: job.clone(),
            zone_mismatch,
        });
    }

    if let (Some(technician_id), Some((start, end))) = (technician_id, job.window()) {
        let interval = Interval::new(start, end)?;
        let found = find_conflicts(store, technician_id, &interval, Some(job.id));
        screen_conflicts(job.job_number, found, parameters.force).map_err(|conflicts| {
            AssignTechnicianError::Conflict {
                job_number: job.job_number,
                conflicts,
            }
        })?;
    }

    let id = job.id;
    let mut candidate = store.clone();
    let target = candidate
        .get_job_mut(id)
        .ok_or(AssignTechnicianError::JobNotFound(parameters.job_number))?;
    target.technician_id = technician_id;
    let updated = target.clone();

    commit(store, storage, candidate)?;
    if zone_mismatch {
        debug!(job = updated.job_number, "Technician assigned outside home zone");
    }
    info!(
        job = updated.job_number,
        technician = ?parameters.technician,
        "Technician assignment changed"
    );
    Ok(AssignOutcome {
        assigned: true,
        job: updated,
        zone_mismatch,
    })
}

// ---------------------------------------------------------------------------
// Resize / reschedule
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum UpdateJobTimeError {
    #[error("Job #{0} not found")]
    JobNotFound(u64),

    #[error("Cannot modify completed or cancelled jobs (job #{job_number} is {status})")]
    Terminal { job_number: u64, status: JobStatus },

    #[error(transparent)]
    InvalidInterval(#[from] IntervalError),

    #[error("Job #{job_number} would overlap {} booking(s) for its technician", .conflicts.len())]
    Conflict {
        job_number: u64,
        conflicts: Vec<Conflict>,
    },

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

pub struct UpdateJobTimeParameters {
    pub job_number: u64,
    pub start: DateTime,
    pub end: DateTime,
    pub force: bool,
}

#[derive(Debug)]
pub struct UpdateTimeOutcome {
    pub updated: bool,
    pub job: Job,
}

pub fn update_job_time(
    store: &mut Store,
    storage: &impl Storage,
    boundaries: &BucketBoundaries,
    parameters: UpdateJobTimeParameters,
) -> Result<UpdateTimeOutcome, UpdateJobTimeError> {
    let job = store
        .get_job_by_number(parameters.job_number)
        .ok_or(UpdateJobTimeError::JobNotFound(parameters.job_number))?;
    if job.is_terminal() {
        return Err(UpdateJobTimeError::Terminal {
            job_number: job.job_number,
            status: job.status,
        });
    }

    let interval = Interval::new(parameters.start, parameters.end)?;
    if job.window() == Some((interval.start(), interval.end())) {
        return Ok(UpdateTimeOutcome {
            updated: false,
            job: job.clone(),
        });
    }

    if let Some(technician_id) = job.technician_id {
        let found = find_conflicts(store, technician_id, &interval, Some(job.id));
        screen_conflicts(job.job_number, found, parameters.force).map_err(|conflicts| {
            UpdateJobTimeError::Conflict {
                job_number: job.job_number,
                conflicts,
            }
        })?;
    }

    let from = GroupKey::of(job, boundaries);
    let to = GroupKey {
        date: Some(interval.date()),
        zone: from.zone.clone(),
        bucket: boundaries.classify(interval.start().time()),
    };
    let id = job.id;
    let mut candidate = store.clone();
    let target = candidate
        .get_job_mut(id)
        .ok_or(UpdateJobTimeError::JobNotFound(parameters.job_number))?;
    target.scheduled_date = Some(interval.date());
    target.start_time = Some(interval.start().time());
    target.end_time = Some(interval.end().time());
    if from != to {
        append_to_group(&mut candidate, &to, boundaries, id);
    }
    let updated = candidate
        .get_job(id)
        .cloned()
        .ok_or(UpdateJobTimeError::JobNotFound(parameters.job_number))?;

    commit(store, storage, candidate)?;
    info!(
        job = updated.job_number,
        start = %interval.start(),
        end = %interval.end(),
        "Job rescheduled"
    );
    Ok(UpdateTimeOutcome {
        updated: true,
        job: updated,
    })
}
