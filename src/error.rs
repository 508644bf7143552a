use credential_store::{CallbackError, CredentialStoreError};
use mail_agent_api::MailAgentError;
use thiserror::Error;
use turn_provider::ExecutorInitError;

/// Why a submission was refused. The message log is untouched in every case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SubmitError {
    #[error("message is empty")]
    Empty,

    #[error("not signed in")]
    Unauthenticated,

    #[error("mailbox sync in progress")]
    Syncing,

    #[error("a turn is already in flight")]
    TurnActive,

    #[error("credential expired; sign in again")]
    CredentialExpired,
}

#[derive(Debug, Error)]
pub enum AuthorizationError {
    #[error(transparent)]
    Callback(#[from] CallbackError),

    #[error("failed to persist credential: {0}")]
    Store(#[from] CredentialStoreError),
}

/// Failure of one context-synchronization request.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    MailAgent(#[from] MailAgentError),

    #[error("{0}")]
    Other(String),
}

/// Failure to assemble a controller from configuration.
#[derive(Debug, Error)]
pub enum ControllerInitError {
    #[error("MAIL_CHAT_API_KEY is required for the completion executor")]
    MissingApiKey,

    #[error("failed to build mail agent client: {0}")]
    MailAgent(#[from] MailAgentError),

    #[error("failed to build turn executor: {0}")]
    Executor(#[from] ExecutorInitError),
}
