use jiff::civil::Date;
use thiserror::Error;
use uuid::Uuid;

use crate::{
    models::{job::Job, store::Store, technician::Technician},
    scheduling::{
        bucket::{BucketBoundaries, BucketKey, bucket_for_job},
        ordering::plan_append,
    },
    storage::{Storage, StorageError},
};

pub mod board;
pub mod dispatch;
pub mod jobs;
pub mod technicians;

#[derive(Debug, Error)]
pub enum TechnicianLookupError {
    #[error("Technician '{0}' not found")]
    NotFound(String),

    #[error("Technician name is ambiguous. Multiple technicians found: {}", .0.join(", "))]
    Ambiguous(Vec<String>),
}

pub fn resolve_technician<'a>(
    store: &'a Store,
    query: &str,
) -> Result<&'a Technician, TechnicianLookupError> {
    let matches = store.find_technicians(query);
    match matches.len() {
        0 => Err(TechnicianLookupError::NotFound(query.to_string())),
        1 => Ok(matches[0]),
        _ => Err(TechnicianLookupError::Ambiguous(
            matches.iter().map(|t| t.name.clone()).collect(),
        )),
    }
}

/// Zone + bucket column on one day of the board.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupKey {
    pub date: Option<Date>,
    pub zone: Option<String>,
    pub bucket: BucketKey,
}

impl GroupKey {
    pub fn of(job: &Job, boundaries: &BucketBoundaries) -> Self {
        Self {
            date: job.scheduled_date,
            zone: normalize_zone(job.zone.as_deref()),
            bucket: bucket_for_job(job, boundaries),
        }
    }
}

/// Zones compare case-insensitively and blank means none.
pub fn normalize_zone(zone: Option<&str>) -> Option<String> {
    zone.map(str::trim)
        .filter(|z| !z.is_empty())
        .map(str::to_lowercase)
}

/// Reorderable members of a column in display order: `(id, position)`.
/// Completed and cancelled jobs keep their positions and are left out.
pub fn group_members(
    store: &Store,
    key: &GroupKey,
    boundaries: &BucketBoundaries,
) -> Vec<(Uuid, i64)> {
    let mut members: Vec<&Job> = store
        .jobs
        .iter()
        .filter(|j| !j.is_terminal() && GroupKey::of(j, boundaries) == *key)
        .collect();
    members.sort_by_key(|j| (j.position, j.job_number));
    members.iter().map(|j| (j.id, j.position)).collect()
}

/// Puts job `id` last in `key`, renumbering the column if it has run out of
/// room. Returns the number of rows written.
pub fn append_to_group(
    store: &mut Store,
    key: &GroupKey,
    boundaries: &BucketBoundaries,
    id: Uuid,
) -> usize {
    let writes = plan_append(&group_members(store, key, boundaries), id);
    for (member, position) in &writes {
        if let Some(job) = store.get_job_mut(*member) {
            job.position = *position;
        }
    }
    writes.len()
}

/// Saves `candidate` and only then swaps it in, so a failed write leaves
/// `store` exactly as it was.
pub fn commit(
    store: &mut Store,
    storage: &impl Storage,
    candidate: Store,
) -> Result<(), StorageError> {
    storage.save(&candidate)?;
    *store = candidate;
    Ok(())
}

#[cfg(test)]
pub(crate) mod fixtures {
    use jiff::civil::{Date, Time, date, time};
    use uuid::Uuid;

    use crate::models::{
        job::{Job, JobStatus},
        store::Store,
        technician::Technician,
    };

    pub fn day() -> Date {
        date(2025, 3, 1)
    }

    pub fn at(hour: i8, minute: i8) -> Time {
        time(hour, minute, 0, 0)
    }

    pub fn technician(store: &mut Store, name: &str, zone: Option<&str>) -> Uuid {
        let technician = Technician {
            name: name.to_string(),
            slug: slug::slugify(name),
            zone: zone.map(String::from),
            ..Technician::default()
        };
        let id = technician.id;
        store.add_technician(technician);
        id
    }

    /// Books a job on `day()` and returns its job number.
    pub fn job(
        store: &mut Store,
        customer: &str,
        technician_id: Option<Uuid>,
        zone: Option<&str>,
        window: Option<(Time, Time)>,
        position: i64,
    ) -> u64 {
        store.add_job(Job {
            id: Uuid::new_v4(),
            customer_name: customer.to_string(),
            description: format!("Service call for {customer}"),
            technician_id,
            zone: zone.map(String::from),
            scheduled_date: Some(day()),
            start_time: window.map(|(start, _)| start),
            end_time: window.map(|(_, end)| end),
            status: JobStatus::Scheduled,
            position,
            created_at: jiff::Timestamp::now(),
            ..Job::default()
        })
    }

    pub fn set_status(store: &mut Store, job_number: u64, status: JobStatus) {
        let id = store.get_job_by_number(job_number).unwrap().id;
        store.get_job_mut(id).unwrap().status = status;
    }
}
