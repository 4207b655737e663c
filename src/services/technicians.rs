use slug::slugify;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use crate::{
    models::{store::Store, technician::Technician},
    services::{TechnicianLookupError, commit, resolve_technician},
    storage::{Storage, StorageError},
};

#[derive(Debug, Error)]
pub enum CreateTechnicianError {
    #[error("Technician name cannot be empty")]
    MissingName,

    #[error("Technician with name '{}' already exists", .0)]
    TechnicianAlreadyExists(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

pub struct CreateTechnicianParameters {
    pub name: String,
    pub zone: Option<String>,
}

pub fn create_technician(
    store: &mut Store,
    storage: &impl Storage,
    parameters: CreateTechnicianParameters,
) -> Result<Technician, CreateTechnicianError> {
    let name = parameters.name.trim().to_string();
    let technician_slug = slugify(&name);
    if technician_slug.is_empty() {
        return Err(CreateTechnicianError::MissingName);
    }
    if store.technicians.iter().any(|t| t.slug == technician_slug) {
        return Err(CreateTechnicianError::TechnicianAlreadyExists(name));
    }

    let technician = Technician {
        id: Uuid::new_v4(),
        name,
        slug: technician_slug,
        zone: parameters
            .zone
            .map(|z| z.trim().to_string())
            .filter(|z| !z.is_empty()),
        active: true,
        created_at: jiff::Timestamp::now(),
    };

    let mut candidate = store.clone();
    candidate.add_technician(technician.clone());
    commit(store, storage, candidate)?;

    info!(technician = %technician.slug, "Technician created");
    Ok(technician)
}

#[derive(Debug, Error)]
pub enum DeactivateTechnicianError {
    #[error(transparent)]
    Technician(#[from] TechnicianLookupError),

    #[error("Technician '{0}' is already inactive")]
    AlreadyInactive(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

pub struct DeactivateTechnicianParameters {
    pub name: String,
}

pub struct DeactivateTechnicianResult {
    pub technician: Technician,
    /// Non-terminal jobs still assigned, left for the dispatcher to reassign
    pub open_jobs: Vec<u64>,
}

pub fn deactivate_technician(
    store: &mut Store,
    storage: &impl Storage,
    parameters: DeactivateTechnicianParameters,
) -> Result<DeactivateTechnicianResult, DeactivateTechnicianError> {
    let technician = resolve_technician(store, &parameters.name)?;
    if !technician.active {
        return Err(DeactivateTechnicianError::AlreadyInactive(
            technician.name.clone(),
        ));
    }
    let id = technician.id;
    let mut open_jobs: Vec<u64> = store
        .jobs
        .iter()
        .filter(|j| j.technician_id == Some(id) && !j.is_terminal())
        .map(|j| j.job_number)
        .collect();
    open_jobs.sort_unstable();

    let mut candidate = store.clone();
    let Some(target) = candidate.get_technician_mut(id) else {
        return Err(TechnicianLookupError::NotFound(parameters.name).into());
    };
    target.active = false;
    let updated = target.clone();
    commit(store, storage, candidate)?;

    info!(technician = %updated.slug, open_jobs = open_jobs.len(), "Technician deactivated");
    Ok(DeactivateTechnicianResult {
        technician: updated,
        open_jobs,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        models::job::JobStatus,
        services::fixtures::{job, set_status, technician},
        storage::memory::MemoryStorage,
    };

    #[test]
    fn test_create_technician() {
        let mut store = Store::default();
        let storage = MemoryStorage::default();

        let ana = create_technician(
            &mut store,
            &storage,
            CreateTechnicianParameters {
                name: String::from("Ana Ruiz"),
                zone: Some(String::from("North")),
            },
        )
        .unwrap();

        assert_eq!(ana.slug, "ana-ruiz");
        assert!(ana.active);
        assert_eq!(storage.saved().unwrap().technicians.len(), 1);

        let duplicate = create_technician(
            &mut store,
            &storage,
            CreateTechnicianParameters {
                name: String::from("ana ruiz"),
                zone: None,
            },
        );
        assert!(matches!(
            duplicate,
            Err(CreateTechnicianError::TechnicianAlreadyExists(_))
        ));
    }

    #[test]
    fn test_deactivate_lists_open_jobs() {
        let mut store = Store::default();
        let ana = technician(&mut store, "Ana", None);
        let open = job(&mut store, "A", Some(ana), None, None, 0);
        let closed = job(&mut store, "B", Some(ana), None, None, 0);
        set_status(&mut store, closed, JobStatus::Completed);
        let storage = MemoryStorage::default();

        let result = deactivate_technician(
            &mut store,
            &storage,
            DeactivateTechnicianParameters {
                name: String::from("ana"),
            },
        )
        .unwrap();

        assert!(!result.technician.active);
        assert_eq!(result.open_jobs, vec![open]);
        assert!(matches!(
            deactivate_technician(
                &mut store,
                &storage,
                DeactivateTechnicianParameters {
                    name: String::from("ana"),
                },
            ),
            Err(DeactivateTechnicianError::AlreadyInactive(_))
        ));
    }
}
