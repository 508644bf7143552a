//! Provider-agnostic contract for executing one chat turn.
//!
//! A turn is one user utterance answered by one streamed assistant reply. This
//! crate defines the turn lifecycle events, the executor seam and the shared
//! cancellation primitives. Transport and session orchestration live elsewhere.

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use credential_store::Credential;
use uuid::Uuid;

/// Correlation id for one turn; also the id of the assistant message it fills.
pub type TurnId = Uuid;

/// Shared cancellation flag for a turn.
pub type CancelSignal = Arc<AtomicBool>;

/// Interval at which pending I/O re-checks the cancel signal.
pub const CANCEL_POLL_INTERVAL: Duration = Duration::from_millis(25);

#[must_use]
pub fn new_cancel_signal() -> CancelSignal {
    Arc::new(AtomicBool::new(false))
}

#[must_use]
pub fn is_cancelled(cancel: &CancelSignal) -> bool {
    cancel.load(Ordering::Acquire)
}

/// Awaits `future` unless `cancel` is raised first; `None` means cancelled.
pub async fn until_cancelled<F>(future: F, cancel: &CancelSignal) -> Option<F::Output>
where
    F: Future,
{
    let mut future = Box::pin(future);

    loop {
        if is_cancelled(cancel) {
            return None;
        }

        if let Ok(output) = tokio::time::timeout(CANCEL_POLL_INTERVAL, &mut future).await {
            return (!is_cancelled(cancel)).then_some(output);
        }
    }
}

/// Error returned while constructing an executor before any turn starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutorInitError {
    message: String,
}

impl ExecutorInitError {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for ExecutorInitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ExecutorInitError {}

impl From<String> for ExecutorInitError {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

/// Input required to start a turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnRequest {
    pub turn_id: TurnId,
    /// Credential re-validated by the caller immediately before the turn.
    pub credential: Credential,
    pub user_text: String,
}

/// Executor-emitted lifecycle event for a turn.
///
/// `Delta` carries the full text accumulated so far, never a fragment, so
/// applying the same delta twice is harmless.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnEvent {
    /// The completion stream opened.
    Started { turn_id: TurnId },
    Delta { turn_id: TurnId, text: String },
    Finished { turn_id: TurnId, text: String },
    Failed { turn_id: TurnId, error: String },
    Cancelled { turn_id: TurnId },
}

impl TurnEvent {
    #[must_use]
    pub fn turn_id(&self) -> TurnId {
        match self {
            Self::Started { turn_id }
            | Self::Delta { turn_id, .. }
            | Self::Finished { turn_id, .. }
            | Self::Failed { turn_id, .. }
            | Self::Cancelled { turn_id } => *turn_id,
        }
    }

    /// Returns true when this event terminates the turn lifecycle.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Finished { .. } | Self::Failed { .. } | Self::Cancelled { .. }
        )
    }
}

/// Appends text fragments and yields the cumulative value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeltaAccumulator {
    text: String,
}

impl DeltaAccumulator {
    /// Appends `fragment` and returns the full text so far.
    pub fn push(&mut self, fragment: &str) -> &str {
        self.text.push_str(fragment);
        &self.text
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub fn into_text(self) -> String {
        self.text
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

/// Immutable metadata describing a turn executor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderProfile {
    pub provider_id: String,
    pub model_id: String,
}

/// Executes single turns and reports their lifecycle.
#[async_trait]
pub trait TurnExecutor: Send + Sync + 'static {
    fn profile(&self) -> ProviderProfile;

    /// Runs one turn, emitting events in order.
    ///
    /// Implementations emit at most one terminal event and nothing after it.
    /// The cancel signal is checked between event deliveries and while awaiting
    /// I/O; a cancelled turn ends with `Cancelled` and never with `Finished`.
    /// `Err` is reserved for executor-level faults outside the turn lifecycle.
    async fn execute(
        &self,
        req: TurnRequest,
        cancel: CancelSignal,
        emit: &mut (dyn FnMut(TurnEvent) + Send),
    ) -> Result<(), String>;
}
