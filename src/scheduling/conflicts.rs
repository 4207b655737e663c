use jiff::civil::DateTime;
use serde::Serialize;
use uuid::Uuid;

use crate::{
    models::{job::JobStatus, store::Store},
    scheduling::interval::Interval,
};

/// An existing booking that overlaps a proposed window.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct Conflict {
    pub job_id: Uuid,
    pub job_number: u64,
    pub customer_name: String,
    pub start: DateTime,
    pub end: DateTime,
    pub status: JobStatus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConflictCheck {
    Clear,
    Conflicts(Vec<Conflict>),
}

impl ConflictCheck {
    pub fn is_clear(&self) -> bool {
        matches!(self, ConflictCheck::Clear)
    }
}

/// Every non-terminal job of `technician_id` on the interval's day that
/// overlaps it, ordered by start. `exclude` lets a job be re-checked
/// against its own day without colliding with itself.
pub fn find_conflicts(
    store: &Store,
    technician_id: Uuid,
    interval: &Interval,
    exclude: Option<Uuid>,
) -> Vec<Conflict> {
    let mut conflicts: Vec<Conflict> = store
        .jobs_for_technician_on(technician_id, interval.date())
        .filter(|job| Some(job.id) != exclude)
        .filter_map(|job| {
            let (start, end) = job.window()?;
            interval.overlaps(start, end).then(|| Conflict {
                job_id: job.id,
                job_number: job.job_number,
                customer_name: job.customer_name.clone(),
                start,
                end,
                status: job.status,
            })
        })
        .collect();

    conflicts.sort_by_key(|c| (c.start, c.job_number));
    conflicts
}

pub fn check(
    store: &Store,
    technician_id: Uuid,
    interval: &Interval,
    exclude: Option<Uuid>,
) -> ConflictCheck {
    let conflicts = find_conflicts(store, technician_id, interval, exclude);
    if conflicts.is_empty() {
        ConflictCheck::Clear
    } else {
        ConflictCheck::Conflicts(conflicts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::job::Job;
    use jiff::civil::{Date, date, time};

    fn booked(store: &mut Store, tech: Uuid, day: Date, from: (i8, i8), to: (i8, i8)) -> Uuid {
        let job = Job {
            id: Uuid::new_v4(),
            customer_name: String::from("Acme"),
            technician_id: Some(tech),
            scheduled_date: Some(day),
            start_time: Some(time(from.0, from.1, 0, 0)),
            end_time: Some(time(to.0, to.1, 0, 0)),
            ..Job::default()
        };
        let id = job.id;
        store.add_job(job);
        id
    }

    #[test]
    fn test_adjacent_booking_is_clear() {
        let tech = Uuid::new_v4();
        let day = date(2025, 3, 1);
        let mut store = Store::default();
        booked(&mut store, tech, day, (9, 0), (10, 0));

        let proposed = Interval::on(day, time(10, 0, 0, 0), time(11, 0, 0, 0)).unwrap();
        assert_eq!(check(&store, tech, &proposed, None), ConflictCheck::Clear);
    }

    #[test]
    fn test_overlapping_booking_is_reported() {
        let tech = Uuid::new_v4();
        let day = date(2025, 3, 1);
        let mut store = Store::default();
        let job_a = booked(&mut store, tech, day, (9, 0), (10, 30));

        let proposed = Interval::on(day, time(10, 0, 0, 0), time(11, 0, 0, 0)).unwrap();
        match check(&store, tech, &proposed, None) {
            ConflictCheck::Conflicts(conflicts) => {
                assert_eq!(conflicts.len(), 1);
                assert_eq!(conflicts[0].job_id, job_a);
                assert_eq!(conflicts[0].customer_name, "Acme");
                assert_eq!(conflicts[0].start, day.at(9, 0, 0, 0));
            }
            ConflictCheck::Clear => panic!("Expected a conflict with job A"),
        }
    }

    #[test]
    fn test_excluded_job_does_not_conflict_with_itself() {
        let tech = Uuid::new_v4();
        let day = date(2025, 3, 1);
        let mut store = Store::default();
        let job = booked(&mut store, tech, day, (9, 0), (10, 0));

        let same = Interval::on(day, time(9, 0, 0, 0), time(10, 0, 0, 0)).unwrap();
        assert!(check(&store, tech, &same, Some(job)).is_clear());
        assert!(!check(&store, tech, &same, None).is_clear());
    }

    #[test]
    fn test_terminal_other_tech_and_other_day_are_ignored() {
        let tech = Uuid::new_v4();
        let day = date(2025, 3, 1);
        let mut store = Store::default();
        let done = booked(&mut store, tech, day, (9, 0), (12, 0));
        store.get_job_mut(done).unwrap().status = JobStatus::Completed;
        let cancelled = booked(&mut store, tech, day, (9, 0), (12, 0));
        store.get_job_mut(cancelled).unwrap().status = JobStatus::Cancelled;
        booked(&mut store, Uuid::new_v4(), day, (9, 0), (12, 0));
        booked(&mut store, tech, date(2025, 3, 2), (9, 0), (12, 0));

        let proposed = Interval::on(day, time(10, 0, 0, 0), time(11, 0, 0, 0)).unwrap();
        assert!(check(&store, tech, &proposed, None).is_clear());
    }

    #[test]
    fn test_technician_without_jobs_is_clear() {
        let store = Store::default();
        let proposed =
            Interval::on(date(2025, 3, 1), time(8, 0, 0, 0), time(9, 0, 0, 0)).unwrap();
        assert!(check(&store, Uuid::new_v4(), &proposed, None).is_clear());
    }

    #[test]
    fn test_conflicts_sorted_by_start() {
        let tech = Uuid::new_v4();
        let day = date(2025, 3, 1);
        let mut store = Store::default();
        let late = booked(&mut store, tech, day, (11, 0), (12, 0));
        let early = booked(&mut store, tech, day, (8, 0), (9, 30));

        let proposed = Interval::on(day, time(9, 0, 0, 0), time(11, 30, 0, 0)).unwrap();
        let conflicts = find_conflicts(&store, tech, &proposed, None);
        let ids: Vec<Uuid> = conflicts.iter().map(|c| c.job_id).collect();
        assert_eq!(ids, vec![early, late]);
    }
}
