use jiff::civil::Date;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{job::Job, technician::Technician};

/// Current schema version
pub const CURRENT_VERSION: u32 = 1;

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Store {
    pub version: u32,
    pub jobs: Vec<Job>,
    pub technicians: Vec<Technician>,
}

impl Default for Store {
    fn default() -> Self {
        Self {
            version: CURRENT_VERSION,
            jobs: vec![],
            technicians: vec![],
        }
    }
}

impl Store {
    pub fn get_job(&self, id: Uuid) -> Option<&Job> {
        self.jobs.iter().find(|j| j.id == id)
    }

    pub fn get_job_mut(&mut self, id: Uuid) -> Option<&mut Job> {
        self.jobs.iter_mut().find(|j| j.id == id)
    }

    pub fn get_job_by_number(&self, job_number: u64) -> Option<&Job> {
        self.jobs.iter().find(|j| j.job_number == job_number)
    }

    pub fn next_job_number(&self) -> u64 {
        self.jobs.iter().map(|j| j.job_number).max().unwrap_or(0) + 1
    }

    /// Assigns the next job number and appends the job.
    pub fn add_job(&mut self, mut job: Job) -> u64 {
        job.job_number = self.next_job_number();
        let number = job.job_number;
        self.jobs.push(job);
        number
    }

    pub fn get_technician(&self, id: Uuid) -> Option<&Technician> {
        self.technicians.iter().find(|t| t.id == id)
    }

    pub fn get_technician_mut(&mut self, id: Uuid) -> Option<&mut Technician> {
        self.technicians.iter_mut().find(|t| t.id == id)
    }

    pub fn add_technician(&mut self, technician: Technician) {
        self.technicians.push(technician);
    }

    pub fn active_technicians(&self) -> impl Iterator<Item = &Technician> {
        self.technicians.iter().filter(|t| t.active)
    }

    /// Case-insensitive substring match on name, or exact slug match.
    pub fn find_technicians(&self, query: &str) -> Vec<&Technician> {
        let query_slug = slug::slugify(query);
        if let Some(exact) = self.technicians.iter().find(|t| t.slug == query_slug) {
            return vec![exact];
        }
        let needle = query.to_lowercase();
        self.technicians
            .iter()
            .filter(|t| t.name.to_lowercase().contains(&needle))
            .collect()
    }

    /// Non-terminal jobs of a technician on one calendar day.
    pub fn jobs_for_technician_on(
        &self,
        technician_id: Uuid,
        date: Date,
    ) -> impl Iterator<Item = &Job> {
        self.jobs.iter().filter(move |j| {
            j.technician_id == Some(technician_id)
                && j.scheduled_date == Some(date)
                && !j.is_terminal()
        })
    }

    pub fn jobs_on(&self, date: Date) -> impl Iterator<Item = &Job> {
        self.jobs
            .iter()
            .filter(move |j| j.scheduled_date == Some(date))
    }
}
