use std::{
    fs::{self, File, OpenOptions, rename, write},
    path::{Path, PathBuf},
};

use fs2::FileExt;
use serde_json::to_string_pretty;
use uuid::Uuid;

use crate::{
    models::store::Store,
    storage::{Storage, StorageError},
};

const BACKUPS_KEPT: usize = 5;

/// Opens (creating if needed) and exclusively locks `path`.
fn lock_exclusive(path: &Path) -> std::io::Result<File> {
    let file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)?;
    file.lock_exclusive()?;
    Ok(file)
}

pub struct JsonFileStorage {
    path: PathBuf,
}

/// Held across a load → check → save sequence so that two dispatchers
/// cannot both pass a conflict check against the same stale schedule.
/// Released on drop.
pub struct SessionLock {
    file: File,
}

impl Drop for SessionLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}

impl JsonFileStorage {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Blocks until no other process holds the session lock.
    pub fn lock_session(&self) -> Result<SessionLock, StorageError> {
        let lock_path = self.path.with_extension("session.lock");
        let file = lock_exclusive(&lock_path).map_err(|e| StorageError::LockFailed {
            path: lock_path.clone(),
            source: e,
        })?;
        tracing::debug!(path = %lock_path.display(), "Session lock acquired");
        Ok(SessionLock { file })
    }

    fn create_backup_dir(&self) -> Result<(), StorageError> {
        let backups_dir = self.get_backup_dir();
        fs::create_dir(&backups_dir).map_err(|e| StorageError::BackupFailed {
            path: backups_dir,
            source: e,
        })?;
        Ok(())
    }

    fn create_backup(&self) -> Result<u64, StorageError> {
        let file_exists = fs::exists(&self.path).map_err(|e| StorageError::BackupFailed {
            path: self.path.clone(),
            source: e,
        })?;
        if !file_exists {
            return Ok(0);
        }

        let backup_path = self.get_backup_path();
        let copy_result = fs::copy(&self.path, &backup_path);
        match copy_result {
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                self.create_backup_dir()?;
                self.create_backup()
            }
            Err(e) => Err(StorageError::BackupFailed {
                path: backup_path,
                source: e,
            }),
            Ok(bytes) => Ok(bytes),
        }
    }

    fn cleanup_old_backups(&self) -> Result<(), StorageError> {
        let backup_dir = self.get_backup_dir();
        let backup_dir_exists =
            fs::exists(&backup_dir).map_err(|e| StorageError::CleanupFailed {
                dir: backup_dir.clone(),
                source: e,
            })?;
        if !backup_dir_exists {
            return Ok(());
        }

        let mut file_entries = fs::read_dir(&backup_dir)
            .map_err(|e| StorageError::CleanupFailed {
                dir: backup_dir.clone(),
                source: e,
            })?
            .flatten()
            .filter(|entry| entry.metadata().map(|m| m.is_file()).unwrap_or(false))
            .map(|entry| entry.path())
            .collect::<Vec<_>>();

        file_entries.sort();

        let number_of_files_to_delete = file_entries.len().saturating_sub(BACKUPS_KEPT);

        if number_of_files_to_delete == 0 {
            return Ok(());
        }

        tracing::debug!(count = number_of_files_to_delete, "Removing old backups");
        for file_path in &file_entries[0..number_of_files_to_delete] {
            fs::remove_file(file_path).map_err(|e| StorageError::CleanupFailed {
                dir: backup_dir.clone(),
                source: e,
            })?;
        }

        Ok(())
    }

    /// Backs up the current file and renames `temp_path` over it, all under
    /// the save lock.
    fn replace_with(&self, temp_path: &Path) -> Result<(), StorageError> {
        let lock_file_path = self.path.with_extension("lock");
        let lock_file = lock_exclusive(&lock_file_path).map_err(|e| StorageError::SaveFailed {
            path: lock_file_path.clone(),
            source: e,
        })?;

        self.create_backup()?;
        self.cleanup_old_backups()?;

        rename(temp_path, &self.path).map_err(|e| StorageError::SaveFailed {
            path: self.path.clone(),
            source: e,
        })?;

        lock_file.unlock().map_err(|e| StorageError::SaveFailed {
            path: self.path.clone(),
            source: e,
        })
    }

    fn get_backup_dir(&self) -> PathBuf {
        let parent_store_path = self.path.parent().unwrap_or(Path::new("."));
        parent_store_path.join("backups")
    }

    fn get_backup_path(&self) -> PathBuf {
        let backups_dir = self.get_backup_dir();

        // Fixed-width so backups sort by age.
        let timestamp = jiff::Timestamp::now().strftime("%Y%m%dT%H%M%S%.6fZ");
        let stem = self
            .path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| String::from("store.json"));
        let filename = format!("{stem}-{timestamp}");

        backups_dir.join(filename)
    }
}

impl Storage for JsonFileStorage {
    fn load(&self) -> Result<Store, StorageError> {
        use crate::models::store::CURRENT_VERSION;
        use crate::storage::migrations::{apply_migrations, detect_version};

        match std::fs::read_to_string(&self.path) {
            Ok(content) => {
                let file_version = detect_version(&content)?;

                if file_version > CURRENT_VERSION {
                    return Err(StorageError::FutureVersion(file_version));
                }

                let mut data: serde_json::Value =
                    serde_json::from_str(&content).map_err(|e| StorageError::ParseFailed {
                        path: self.path.clone(),
                        source: e,
                    })?;

                if file_version < CURRENT_VERSION {
                    tracing::info!(from = file_version, to = CURRENT_VERSION, "Migrating store");
                    data = apply_migrations(data, file_version, CURRENT_VERSION)?;
                }

                if let Some(obj) = data.as_object_mut() {
                    obj.insert("version".to_string(), serde_json::json!(CURRENT_VERSION));
                }

                let store: Store =
                    serde_json::from_value(data).map_err(|e| StorageError::ParseFailed {
                        path: self.path.clone(),
                        source: e,
                    })?;
                Ok(store)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Store::default()),
            Err(e) => Err(StorageError::LoadFailed {
                path: self.path.clone(),
                source: e,
            }),
        }
    }

    fn save(&self, store: &Store) -> Result<(), StorageError> {
        let json =
            to_string_pretty(store).map_err(|e| StorageError::SerializeFailed { source: e })?;

        let unique_temp = format!("{}.tmp.{}", self.path.display(), Uuid::new_v4());
        let temp_path = PathBuf::from(&unique_temp);
        write(&temp_path, json).map_err(|e| StorageError::SaveFailed {
            path: temp_path.clone(),
            source: e,
        })?;

        if let Err(e) = self.replace_with(&temp_path) {
            if let Err(cleanup) = fs::remove_file(&temp_path) {
                tracing::debug!(path = %temp_path.display(), error = %cleanup, "Temp file not removed");
            }
            return Err(e);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jiff::civil::{date, time};
    use tempfile::tempdir;

    use crate::models::{
        job::{Job, JobStatus},
        technician::Technician,
    };

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let technician = Technician {
            name: String::from("Ana Ruiz"),
            slug: String::from("ana-ruiz"),
            zone: Some(String::from("North")),
            ..Technician::default()
        };
        let job = Job {
            id: Uuid::new_v4(),
            job_number: 1,
            customer_name: String::from("Acme"),
            technician_id: Some(technician.id),
            scheduled_date: Some(date(2025, 3, 1)),
            start_time: Some(time(9, 0, 0, 0)),
            end_time: Some(time(10, 0, 0, 0)),
            status: JobStatus::InProgress,
            ..Job::default()
        };
        let store = Store {
            version: 1,
            jobs: vec![job],
            technicians: vec![technician],
        };
        let storage = JsonFileStorage::new(dir.path().join("store.json"));

        storage.save(&store).unwrap();
        let loaded = storage.load().unwrap();

        assert_eq!(loaded.technicians[0].id, store.technicians[0].id);
        assert_eq!(loaded.jobs[0].id, store.jobs[0].id);
        assert_eq!(loaded.jobs[0].status, JobStatus::InProgress);
        assert_eq!(loaded.jobs[0].start_time, Some(time(9, 0, 0, 0)));
    }

    #[test]
    fn test_load_missing_file_is_empty_store() {
        let dir = tempdir().unwrap();
        let storage = JsonFileStorage::new(dir.path().join("store.json"));
        let store = storage.load().unwrap();
        assert!(store.jobs.is_empty());
        assert!(store.technicians.is_empty());
    }

    #[test]
    fn test_load_invalid_json() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.json");
        std::fs::write(&path, "{ this is not valid json }").unwrap();

        let result = JsonFileStorage::new(path).load();

        assert!(matches!(result, Err(StorageError::ParseFailed { .. })));
    }

    #[test]
    fn test_load_v1_without_version_field() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.json");
        std::fs::write(&path, r#"{ "jobs": [], "technicians": [] }"#).unwrap();

        let store = JsonFileStorage::new(path).load().unwrap();

        assert_eq!(store.version, crate::models::store::CURRENT_VERSION);
    }

    #[test]
    fn test_load_future_version() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.json");
        std::fs::write(&path, r#"{ "version": 999, "jobs": [], "technicians": [] }"#).unwrap();

        let result = JsonFileStorage::new(path).load();

        assert!(matches!(result, Err(StorageError::FutureVersion(999))));
    }

    #[test]
    fn test_backup_creation_and_cleanup() {
        let dir = tempdir().unwrap();
        let storage = JsonFileStorage::new(dir.path().join("store.json"));

        for i in 1..=7 {
            let store = Store {
                version: i,
                ..Store::default()
            };
            storage.save(&store).unwrap();
            std::thread::sleep(std::time::Duration::from_millis(10));
        }

        let backup_count = fs::read_dir(dir.path().join("backups"))
            .unwrap()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.metadata().map(|m| m.is_file()).unwrap_or(false))
            .count();

        assert_eq!(backup_count, 5, "Should keep exactly 5 backups");
    }

    #[test]
    fn test_backup_directory_created_on_second_save() {
        let dir = tempdir().unwrap();
        let storage = JsonFileStorage::new(dir.path().join("store.json"));
        let backups_dir = dir.path().join("backups");

        storage.save(&Store::default()).unwrap();
        assert!(!backups_dir.exists(), "No backup for the very first save");

        storage.save(&Store::default()).unwrap();
        assert!(backups_dir.is_dir(), "Backups dir created on second save");
    }

    #[test]
    fn test_failed_backup_removes_temp_file() {
        let dir = tempdir().unwrap();
        let storage = JsonFileStorage::new(dir.path().join("store.json"));
        storage.save(&Store::default()).unwrap();
        // A plain file where the backups directory should be.
        std::fs::write(dir.path().join("backups"), "").unwrap();

        let result = storage.save(&Store::default());

        assert!(matches!(result, Err(StorageError::BackupFailed { .. })));
        let leftovers: Vec<String> = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.file_name().to_string_lossy().into_owned())
            .filter(|name| name.contains(".tmp."))
            .collect();
        assert!(leftovers.is_empty(), "Stray temp files: {:?}", leftovers);
    }

    #[test]
    fn test_session_lock_is_released_on_drop() {
        let dir = tempdir().unwrap();
        let storage = JsonFileStorage::new(dir.path().join("store.json"));

        let first = storage.lock_session().unwrap();
        drop(first);
        let second = storage.lock_session();

        assert!(second.is_ok());
        assert!(dir.path().join("store.session.lock").exists());
    }
}
