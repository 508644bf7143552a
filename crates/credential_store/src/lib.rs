//! Persisted mailbox credential: record schema, validation, and storage media.
//!
//! The store never caches validity. Every [`CredentialStore::load`] re-reads the
//! persisted blob, re-checks every required field against the current clock, and
//! erases the record when any check fails.

mod callback;
mod clock;
mod error;
mod schema;
mod storage;
mod store;

pub use callback::CallbackParams;
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{CallbackError, CredentialStoreError};
pub use schema::{validate_record, Credential, RecordRejection, CREDENTIAL_STORAGE_KEY};
pub use storage::{CredentialStorage, FileStorage, MemoryStorage};
pub use store::CredentialStore;
