use std::cell::{Cell, RefCell};
use std::path::PathBuf;

use crate::{
    models::store::Store,
    storage::{Storage, StorageError},
};

/// Keeps the last saved store in memory; can be told to fail writes.
#[derive(Default)]
pub struct MemoryStorage {
    saved: RefCell<Option<Store>>,
    saves: Cell<usize>,
    fail_writes: bool,
}

impl MemoryStorage {
    pub fn failing() -> Self {
        Self {
            fail_writes: true,
            ..Self::default()
        }
    }

    pub fn save_count(&self) -> usize {
        self.saves.get()
    }

    pub fn saved(&self) -> Option<Store> {
        self.saved.borrow().clone()
    }
}

impl Storage for MemoryStorage {
    fn load(&self) -> Result<Store, StorageError> {
        Ok(self.saved.borrow().clone().unwrap_or_default())
    }

    fn save(&self, store: &Store) -> Result<(), StorageError> {
        if self.fail_writes {
            return Err(StorageError::SaveFailed {
                path: PathBuf::from("<memory>"),
                source: std::io::Error::other("disk unavailable"),
            });
        }
        self.saves.set(self.saves.get() + 1);
        *self.saved.borrow_mut() = Some(store.clone());
        Ok(())
    }
}
