use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use crate::error::CredentialStoreError;

/// Single-slot persistence medium for the raw credential blob.
pub trait CredentialStorage: Send + Sync {
    /// Returns the stored blob, or `None` when nothing is persisted.
    fn read(&self) -> Result<Option<String>, CredentialStoreError>;

    /// Replaces the stored blob.
    fn write(&self, raw: &str) -> Result<(), CredentialStoreError>;

    /// Removes the stored blob. Removing an absent blob succeeds.
    fn remove(&self) -> Result<(), CredentialStoreError>;
}

/// Stores the blob as one JSON file.
#[derive(Debug, Clone)]
pub struct FileStorage {
    path: PathBuf,
}

impl FileStorage {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|name| name.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl CredentialStorage for FileStorage {
    fn read(&self) -> Result<Option<String>, CredentialStoreError> {
        match fs::read_to_string(&self.path) {
            Ok(raw) => Ok(Some(raw)),
            Err(error) if error.kind() == ErrorKind::NotFound => Ok(None),
            Err(error) => Err(CredentialStoreError::io(
                "reading credential file",
                &self.path,
                error,
            )),
        }
    }

    fn write(&self, raw: &str) -> Result<(), CredentialStoreError> {
        if let Some(parent) = self.path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| {
                CredentialStoreError::io("creating credential directory", parent, source)
            })?;
        }

        let temp_path = self.temp_path();
        fs::write(&temp_path, raw).map_err(|source| {
            CredentialStoreError::io("writing credential temp file", &temp_path, source)
        })?;
        fs::rename(&temp_path, &self.path).map_err(|source| {
            CredentialStoreError::io("replacing credential file", &self.path, source)
        })
    }

    fn remove(&self) -> Result<(), CredentialStoreError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(error) if error.kind() == ErrorKind::NotFound => Ok(()),
            Err(error) => Err(CredentialStoreError::io(
                "removing credential file",
                &self.path,
                error,
            )),
        }
    }
}

/// In-process storage, used by tests and embedders without a filesystem.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    slot: Mutex<Option<String>>,
}

impl MemoryStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_record(raw: impl Into<String>) -> Self {
        Self {
            slot: Mutex::new(Some(raw.into())),
        }
    }

    /// Returns a copy of the stored blob.
    #[must_use]
    pub fn snapshot(&self) -> Option<String> {
        lock_unpoisoned(&self.slot).clone()
    }
}

impl CredentialStorage for MemoryStorage {
    fn read(&self) -> Result<Option<String>, CredentialStoreError> {
        Ok(self.snapshot())
    }

    fn write(&self, raw: &str) -> Result<(), CredentialStoreError> {
        *lock_unpoisoned(&self.slot) = Some(raw.to_string());
        Ok(())
    }

    fn remove(&self) -> Result<(), CredentialStoreError> {
        lock_unpoisoned(&self.slot).take();
        Ok(())
    }
}

fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
