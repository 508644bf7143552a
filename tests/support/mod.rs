#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use credential_store::{Clock, CredentialStorage, CredentialStore, ManualClock, MemoryStorage};
use mail_chat::{ContextSynchronizer, Credential, SessionController, SyncError};
use serde_json::json;
use tokio::sync::Semaphore;
use turn_provider::TurnExecutor;

pub const NOW: i64 = 1_700_000_000_000;

/// Record that stays valid for one hour of `ManualClock` time.
pub fn valid_record() -> String {
    json!({
        "accessToken": "t1",
        "refreshToken": "r1",
        "email": "a@b.com",
        "expiresAt": NOW + 3_600_000,
    })
    .to_string()
}

#[derive(Default)]
pub struct RecordingSynchronizer {
    pub syncs: AtomicUsize,
    pub resets: AtomicUsize,
    fail: bool,
    gate: Option<Arc<Semaphore>>,
}

impl RecordingSynchronizer {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// Sync blocks until the returned semaphore receives a permit.
    pub fn gated() -> (Self, Arc<Semaphore>) {
        let gate = Arc::new(Semaphore::new(0));
        (
            Self {
                gate: Some(Arc::clone(&gate)),
                ..Self::default()
            },
            gate,
        )
    }

    pub fn syncs(&self) -> usize {
        self.syncs.load(Ordering::SeqCst)
    }

    pub fn resets(&self) -> usize {
        self.resets.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ContextSynchronizer for RecordingSynchronizer {
    async fn sync(&self, _credential: &Credential) -> Result<(), SyncError> {
        self.syncs.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            if let Ok(permit) = gate.acquire().await {
                permit.forget();
            }
        }
        if self.fail {
            return Err(SyncError::Other("sync backend down".to_string()));
        }
        Ok(())
    }

    async fn reset_context(&self, _credential: &Credential) -> Result<(), SyncError> {
        self.resets.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(SyncError::Other("context backend down".to_string()));
        }
        Ok(())
    }
}

pub struct Harness {
    pub controller: Arc<SessionController>,
    pub storage: Arc<MemoryStorage>,
    pub clock: Arc<ManualClock>,
    pub synchronizer: Arc<RecordingSynchronizer>,
}

pub fn harness_with(
    record: Option<String>,
    synchronizer: RecordingSynchronizer,
    executor: Arc<dyn TurnExecutor>,
    configure: impl FnOnce(SessionController) -> SessionController,
) -> Harness {
    let storage = Arc::new(match record {
        Some(raw) => MemoryStorage::with_record(raw),
        None => MemoryStorage::new(),
    });
    let clock = Arc::new(ManualClock::new(NOW));
    let store = CredentialStore::new(
        Arc::clone(&storage) as Arc<dyn CredentialStorage>,
        Arc::clone(&clock) as Arc<dyn Clock>,
    );
    let synchronizer = Arc::new(synchronizer);
    let controller = configure(SessionController::new(
        store,
        Arc::clone(&synchronizer) as Arc<dyn ContextSynchronizer>,
        executor,
    ));

    Harness {
        controller: Arc::new(controller),
        storage,
        clock,
        synchronizer,
    }
}

/// Signed-in harness that has already mounted.
pub async fn mounted(executor: Arc<dyn TurnExecutor>) -> Harness {
    let harness = harness_with(
        Some(valid_record()),
        RecordingSynchronizer::default(),
        executor,
        |controller| controller,
    );
    harness.controller.mount().await;
    harness
}

pub async fn wait_until(what: &str, mut condition: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

pub fn assistant_content(controller: &SessionController) -> Option<String> {
    controller
        .messages()
        .last()
        .map(|message| message.content.clone())
}
