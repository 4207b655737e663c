use std::collections::BTreeMap;

use jiff::civil::Date;
use thiserror::Error;
use uuid::Uuid;

use crate::{
    models::{job::Job, store::Store},
    scheduling::bucket::{BucketBoundaries, BucketKey},
    services::{GroupKey, group_members, normalize_zone},
};

pub struct Column<'a> {
    pub bucket: BucketKey,
    pub jobs: Vec<&'a Job>,
}

pub struct Lane<'a> {
    /// Zone as first written on a job, `None` for jobs without a zone
    pub zone: Option<String>,
    pub columns: Vec<Column<'a>>,
}

/// The day's jobs as zone lanes, each split into the bucket columns in
/// board order. Jobs inside a column follow their manual position, with
/// completed and cancelled ones listed after the rest.
pub fn board<'a>(store: &'a Store, date: Date, boundaries: &BucketBoundaries) -> Vec<Lane<'a>> {
    let mut lanes: BTreeMap<(bool, Option<String>), (Option<String>, Vec<&'a Job>)> =
        BTreeMap::new();
    for job in store.jobs_on(date) {
        let key = normalize_zone(job.zone.as_deref());
        lanes
            .entry((key.is_none(), key))
            .or_insert_with(|| (job.zone.clone(), vec![]))
            .1
            .push(job);
    }

    lanes
        .into_values()
        .map(|(zone, jobs)| {
            let columns = BucketKey::ALL
                .iter()
                .map(|bucket| {
                    let mut column: Vec<&Job> = jobs
                        .iter()
                        .copied()
                        .filter(|j| GroupKey::of(j, boundaries).bucket == *bucket)
                        .collect();
                    column.sort_by_key(|j| (j.is_terminal(), j.position, j.job_number));
                    Column {
                        bucket: *bucket,
                        jobs: column,
                    }
                })
                .collect();
            Lane { zone, columns }
        })
        .collect()
}

/// One technician's bookings on a day, in time order, terminal ones included.
pub fn technician_schedule(store: &Store, technician_id: Uuid, date: Date) -> Vec<&Job> {
    let mut jobs: Vec<&Job> = store
        .jobs_on(date)
        .filter(|j| j.technician_id == Some(technician_id))
        .collect();
    jobs.sort_by_key(|j| (j.start_time, j.job_number));
    jobs
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    After(u64),
    Before(u64),
    Front,
    Back,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PlacementError {
    #[error("Job #{0} not found")]
    JobNotFound(u64),

    #[error("Job #{0} is not in the same zone and bucket")]
    NotInColumn(u64),
}

/// Turns a one-sided drop target into the `(after, before)` pair the
/// reorder operation expects, filling the other side from the column.
pub fn neighbours(
    store: &Store,
    boundaries: &BucketBoundaries,
    job_number: u64,
    placement: Placement,
) -> Result<(Option<u64>, Option<u64>), PlacementError> {
    let job = store
        .get_job_by_number(job_number)
        .ok_or(PlacementError::JobNotFound(job_number))?;
    let key = GroupKey::of(job, boundaries);
    let others: Vec<u64> = group_members(store, &key, boundaries)
        .into_iter()
        .filter(|(id, _)| *id != job.id)
        .filter_map(|(id, _)| store.get_job(id).map(|j| j.job_number))
        .collect();

    let index_of = |anchor: u64| {
        if store.get_job_by_number(anchor).is_none() {
            return Err(PlacementError::JobNotFound(anchor));
        }
        others
            .iter()
            .position(|n| *n == anchor)
            .ok_or(PlacementError::NotInColumn(anchor))
    };

    Ok(match placement {
        Placement::After(anchor) => {
            let i = index_of(anchor)?;
            (Some(anchor), others.get(i + 1).copied())
        }
        Placement::Before(anchor) => {
            let i = index_of(anchor)?;
            (i.checked_sub(1).map(|p| others[p]), Some(anchor))
        }
        Placement::Front => (None, others.first().copied()),
        Placement::Back => (others.last().copied(), None),
    })
}
