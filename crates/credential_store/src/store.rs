use std::sync::Arc;

use tracing::{debug, warn};

use crate::clock::{Clock, SystemClock};
use crate::error::CredentialStoreError;
use crate::schema::{validate_record, Credential};
use crate::storage::CredentialStorage;

/// Self-healing accessor for the single persisted credential.
///
/// A record that fails any validity check is erased on read, so a corrupted or
/// stale blob never half-loads.
#[derive(Clone)]
pub struct CredentialStore {
    storage: Arc<dyn CredentialStorage>,
    clock: Arc<dyn Clock>,
}

impl CredentialStore {
    pub fn new(storage: Arc<dyn CredentialStorage>, clock: Arc<dyn Clock>) -> Self {
        Self { storage, clock }
    }

    pub fn with_system_clock(storage: Arc<dyn CredentialStorage>) -> Self {
        Self::new(storage, Arc::new(SystemClock))
    }

    #[must_use]
    pub fn now_ms(&self) -> i64 {
        self.clock.now_ms()
    }

    /// Reads and validates the persisted credential, erasing it when invalid.
    pub fn load(&self) -> Option<Credential> {
        let raw = match self.storage.read() {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(error) => {
                warn!(%error, "credential storage unreadable; treating as signed out");
                self.erase_quietly();
                return None;
            }
        };

        match validate_record(&raw, self.clock.now_ms()) {
            Ok(credential) => Some(credential),
            Err(rejection) => {
                warn!(reason = %rejection, "discarding persisted credential");
                self.erase_quietly();
                None
            }
        }
    }

    /// Overwrites the persisted record.
    pub fn save(&self, credential: &Credential) -> Result<(), CredentialStoreError> {
        let raw = serde_json::to_string(credential).map_err(CredentialStoreError::Serialize)?;
        self.storage.write(&raw)?;
        debug!(email = %credential.email, expires_at = credential.expires_at, "credential saved");
        Ok(())
    }

    pub fn clear(&self) -> Result<(), CredentialStoreError> {
        self.storage.remove()
    }

    fn erase_quietly(&self) {
        if let Err(error) = self.storage.remove() {
            warn!(%error, "failed to erase invalid credential record");
        }
    }
}
