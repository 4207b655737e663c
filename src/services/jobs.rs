use jiff::civil::{Date, Time};
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use crate::{
    models::{
        job::{Job, JobStatus},
        store::Store,
    },
    scheduling::{
        bucket::BucketBoundaries,
        conflicts::{Conflict, find_conflicts},
        interval::{Interval, IntervalError},
    },
    services::{GroupKey, TechnicianLookupError, append_to_group, commit, resolve_technician},
    storage::{Storage, StorageError},
};

#[derive(Debug, Error)]
pub enum AddJobError {
    #[error("Customer name cannot be empty")]
    MissingCustomer,

    #[error("A time window needs a date plus both start and end")]
    IncompleteWindow,

    #[error(transparent)]
    InvalidInterval(#[from] IntervalError),

    #[error(transparent)]
    Technician(#[from] TechnicianLookupError),

    #[error("Technician '{0}' is inactive")]
    TechnicianInactive(String),

    #[error("New job would overlap {} booking(s) for the technician", .0.len())]
    Conflict(Vec<Conflict>),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

pub struct AddJobParameters {
    pub customer_name: String,
    pub description: String,
    pub zone: Option<String>,
    pub date: Option<Date>,
    pub start: Option<Time>,
    pub end: Option<Time>,
    pub technician: Option<String>,
    pub notes: Option<String>,
    pub force: bool,
}

pub fn add_job(
    store: &mut Store,
    storage: &impl Storage,
    boundaries: &BucketBoundaries,
    parameters: AddJobParameters,
) -> Result<Job, AddJobError> {
    let customer_name = parameters.customer_name.trim().to_string();
    if customer_name.is_empty() {
        return Err(AddJobError::MissingCustomer);
    }

    // A date on its own is fine (unscheduled column for that day); times are not.
    let window = match (parameters.date, parameters.start, parameters.end) {
        (Some(date), Some(start), Some(end)) => Some(Interval::on(date, start, end)?),
        (_, None, None) => None,
        _ => return Err(AddJobError::IncompleteWindow),
    };

    let technician = parameters
        .technician
        .as_deref()
        .map(|query| resolve_technician(store, query))
        .transpose()?;
    if let Some(technician) = technician
        && !technician.active
    {
        return Err(AddJobError::TechnicianInactive(technician.name.clone()));
    }
    let technician_id = technician.map(|t| t.id);

    if let (Some(technician_id), Some(interval)) = (technician_id, window.as_ref()) {
        let conflicts = find_conflicts(store, technician_id, interval, None);
        if !conflicts.is_empty() {
            if !parameters.force {
                return Err(AddJobError::Conflict(conflicts));
            }
            tracing::warn!(count = conflicts.len(), "Booking new job over conflicts");
        }
    }

    let mut job = Job {
        id: Uuid::new_v4(),
        job_number: 0,
        customer_name,
        description: parameters.description,
        technician_id,
        zone: parameters
            .zone
            .map(|z| z.trim().to_string())
            .filter(|z| !z.is_empty()),
        scheduled_date: parameters.date,
        start_time: window.map(|w| w.start().time()),
        end_time: window.map(|w| w.end().time()),
        status: JobStatus::Scheduled,
        position: 0,
        notes: parameters.notes,
        created_at: jiff::Timestamp::now(),
        completed_at: None,
        cancelled_at: None,
    };
    let key = GroupKey::of(&job, boundaries);
    let mut candidate = store.clone();
    job.job_number = candidate.add_job(job.clone());
    append_to_group(&mut candidate, &key, boundaries, job.id);
    if let Some(placed) = candidate.get_job(job.id) {
        job.position = placed.position;
    }
    commit(store, storage, candidate)?;

    info!(job = job.job_number, zone = ?job.zone, "Job added");
    Ok(job)
}

#[derive(Debug, Error)]
pub enum ChangeStatusError {
    #[error("Job #{0} not found")]
    JobNotFound(u64),

    #[error("Cannot modify completed or cancelled jobs (job #{job_number} is {status})")]
    Terminal { job_number: u64, status: JobStatus },

    #[error("Job #{0} is already in progress")]
    AlreadyInProgress(u64),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

pub struct ChangeStatusParameters {
    pub job_number: u64,
}

fn transition(
    store: &mut Store,
    storage: &impl Storage,
    job_number: u64,
    to: JobStatus,
) -> Result<Job, ChangeStatusError> {
    let job = store
        .get_job_by_number(job_number)
        .ok_or(ChangeStatusError::JobNotFound(job_number))?;
    if job.is_terminal() {
        return Err(ChangeStatusError::Terminal {
            job_number,
            status: job.status,
        });
    }
    if to == JobStatus::InProgress && job.status == JobStatus::InProgress {
        return Err(ChangeStatusError::AlreadyInProgress(job_number));
    }

    let id = job.id;
    let now = jiff::Timestamp::now();
    let mut candidate = store.clone();
    let target = candidate
        .get_job_mut(id)
        .ok_or(ChangeStatusError::JobNotFound(job_number))?;
    target.status = to;
    match to {
        JobStatus::Completed => target.completed_at = Some(now),
        JobStatus::Cancelled => target.cancelled_at = Some(now),
        JobStatus::Scheduled | JobStatus::InProgress => {}
    }
    let updated = target.clone();

    commit(store, storage, candidate)?;
    info!(job = job_number, status = %to, "Job status changed");
    Ok(updated)
}

pub fn start_job(
    store: &mut Store,
    storage: &impl Storage,
    parameters: ChangeStatusParameters,
) -> Result<Job, ChangeStatusError> {
    transition(store, storage, parameters.job_number, JobStatus::InProgress)
}

pub fn complete_job(
    store: &mut Store,
    storage: &impl Storage,
    parameters: ChangeStatusParameters,
) -> Result<Job, ChangeStatusError> {
    transition(store, storage, parameters.job_number, JobStatus::Completed)
}

pub fn cancel_job(
    store: &mut Store,
    storage: &impl Storage,
    parameters: ChangeStatusParameters,
) -> Result<Job, ChangeStatusError> {
    transition(store, storage, parameters.job_number, JobStatus::Cancelled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        services::fixtures::{at, day, job, technician},
        storage::memory::MemoryStorage,
    };

    fn params(customer: &str) -> AddJobParameters {
        AddJobParameters {
            customer_name: customer.to_string(),
            description: String::from("Replace water heater"),
            zone: Some(String::from(" North ")),
            date: Some(day()),
            start: Some(at(9, 0)),
            end: Some(at(11, 0)),
            technician: None,
            notes: None,
            force: false,
        }
    }

    #[test]
    fn test_add_job_numbers_and_places_last() {
        let mut store = Store::default();
        let storage = MemoryStorage::default();
        let b = BucketBoundaries::default();

        let first = add_job(&mut store, &storage, &b, params("Acme")).unwrap();
        let second = add_job(&mut store, &storage, &b, params("Globex")).unwrap();

        assert_eq!(first.job_number, 1);
        assert_eq!(second.job_number, 2);
        assert_eq!(first.zone.as_deref(), Some("North"));
        assert!(second.position > first.position);
        assert_eq!(storage.saved().unwrap().jobs.len(), 2);
    }

    #[test]
    fn test_add_job_rejects_partial_window() {
        let mut store = Store::default();
        let result = add_job(
            &mut store,
            &MemoryStorage::default(),
            &BucketBoundaries::default(),
            AddJobParameters {
                end: None,
                ..params("Acme")
            },
        );
        assert!(matches!(result, Err(AddJobError::IncompleteWindow)));
    }

    #[test]
    fn test_add_job_checks_technician_conflicts() {
        let mut store = Store::default();
        let tech = technician(&mut store, "Ana", None);
        job(&mut store, "Busy", Some(tech), None, Some((at(10, 0), at(12, 0))), 0);
        let storage = MemoryStorage::default();
        let b = BucketBoundaries::default();

        let blocked = add_job(
            &mut store,
            &storage,
            &b,
            AddJobParameters {
                technician: Some(String::from("ana")),
                ..params("Acme")
            },
        );
        assert!(matches!(blocked, Err(AddJobError::Conflict(_))));
        assert_eq!(store.jobs.len(), 1);

        let forced = add_job(
            &mut store,
            &storage,
            &b,
            AddJobParameters {
                technician: Some(String::from("ana")),
                force: true,
                ..params("Acme")
            },
        );
        assert!(forced.is_ok());
    }

    #[test]
    fn test_status_transitions() {
        let mut store = Store::default();
        let a = job(&mut store, "A", None, None, None, 0);
        let storage = MemoryStorage::default();

        let started = start_job(&mut store, &storage, ChangeStatusParameters { job_number: a });
        assert_eq!(started.unwrap().status, JobStatus::InProgress);
        assert!(matches!(
            start_job(&mut store, &storage, ChangeStatusParameters { job_number: a }),
            Err(ChangeStatusError::AlreadyInProgress(_))
        ));

        let done = complete_job(&mut store, &storage, ChangeStatusParameters { job_number: a })
            .unwrap();
        assert!(done.completed_at.is_some());

        assert!(matches!(
            cancel_job(&mut store, &storage, ChangeStatusParameters { job_number: a }),
            Err(ChangeStatusError::Terminal { .. })
        ));
    }
}
