//! Session-start context synchronization.

use async_trait::async_trait;
use credential_store::Credential;
use mail_agent_api::{MailAgentClient, MailAgentConfig, MailAgentError, DEFAULT_SYNC_MAX_FETCH};
use tracing::{info, warn};

use crate::error::SyncError;

/// Prepares the mail backend for a new session.
#[async_trait]
pub trait ContextSynchronizer: Send + Sync {
    /// Asks the backend to index recent mail.
    async fn sync(&self, credential: &Credential) -> Result<(), SyncError>;

    /// Drops conversational context left over from earlier sessions.
    async fn reset_context(&self, credential: &Credential) -> Result<(), SyncError>;
}

/// [`ContextSynchronizer`] backed by the mail agent HTTP API.
#[derive(Debug, Clone)]
pub struct MailAgentSynchronizer {
    client: MailAgentClient,
}

impl MailAgentSynchronizer {
    pub fn new(config: MailAgentConfig) -> Result<Self, MailAgentError> {
        Ok(Self::from_client(MailAgentClient::new(config)?))
    }

    #[must_use]
    pub fn from_client(client: MailAgentClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ContextSynchronizer for MailAgentSynchronizer {
    async fn sync(&self, credential: &Credential) -> Result<(), SyncError> {
        self.client
            .sync_emails(&credential.access_token, DEFAULT_SYNC_MAX_FETCH)
            .await?;
        Ok(())
    }

    async fn reset_context(&self, credential: &Credential) -> Result<(), SyncError> {
        self.client.clear_context(&credential.access_token).await?;
        Ok(())
    }
}

/// Outcome of one synchronization pass. Failures never propagate further.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncReport {
    pub synced: bool,
    pub context_reset: bool,
}

/// Runs sync and context reset concurrently, logging and swallowing failures.
pub async fn synchronize(
    synchronizer: &dyn ContextSynchronizer,
    credential: &Credential,
) -> SyncReport {
    let (synced, reset) = tokio::join!(
        synchronizer.sync(credential),
        synchronizer.reset_context(credential)
    );

    if let Err(error) = &synced {
        warn!(%error, "mailbox sync failed; continuing");
    }
    if let Err(error) = &reset {
        warn!(%error, "context reset failed; continuing");
    }

    let report = SyncReport {
        synced: synced.is_ok(),
        context_reset: reset.is_ok(),
    };
    info!(
        synced = report.synced,
        context_reset = report.context_reset,
        "session context synchronized"
    );
    report
}
