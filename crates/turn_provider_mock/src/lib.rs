//! Deterministic mock implementation of the `turn_provider` contract.
//!
//! Contains no transport logic. Used for local development and for session
//! tests that need precise control over when each delta arrives.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Semaphore;
use turn_provider::{
    is_cancelled, until_cancelled, CancelSignal, DeltaAccumulator, ProviderProfile, TurnEvent,
    TurnExecutor, TurnRequest,
};

/// Stable provider identifier.
pub const MOCK_PROVIDER_ID: &str = "mock";

/// How a scripted turn ends once every fragment has been delivered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptedEnding {
    /// `Finished`, with the given text or the accumulated fragments.
    Finish { output_text: Option<String> },
    /// `Failed` with the given message.
    Fail(String),
    /// Return without any terminal event.
    Silent,
    /// Return an executor-level error without any terminal event.
    Abort(String),
}

/// Releases gated fragments one at a time.
#[derive(Debug, Clone)]
pub struct TurnGate {
    permits: Arc<Semaphore>,
}

impl TurnGate {
    /// Lets the next `count` fragments (or the ending) through.
    pub fn release(&self, count: usize) {
        self.permits.add_permits(count);
    }

    pub fn release_one(&self) {
        self.release(1);
    }
}

/// Mock executor replaying scripted fragments as cumulative deltas.
#[derive(Debug)]
pub struct ScriptedTurnExecutor {
    fragments: Vec<String>,
    ending: ScriptedEnding,
    start_delay: Duration,
    fragment_delay: Duration,
    gate: Option<Arc<Semaphore>>,
    requests: Mutex<Vec<TurnRequest>>,
}

impl ScriptedTurnExecutor {
    #[must_use]
    pub fn new<I, S>(fragments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fragments: fragments.into_iter().map(Into::into).collect(),
            ending: ScriptedEnding::Finish { output_text: None },
            start_delay: Duration::ZERO,
            fragment_delay: Duration::ZERO,
            gate: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    #[must_use]
    pub fn finishing_with(mut self, output_text: impl Into<String>) -> Self {
        self.ending = ScriptedEnding::Finish {
            output_text: Some(output_text.into()),
        };
        self
    }

    #[must_use]
    pub fn ending(mut self, ending: ScriptedEnding) -> Self {
        self.ending = ending;
        self
    }

    #[must_use]
    pub fn with_delays(mut self, start_delay: Duration, fragment_delay: Duration) -> Self {
        self.start_delay = start_delay;
        self.fragment_delay = fragment_delay;
        self
    }

    /// Holds each fragment, and then the ending, until the returned gate
    /// releases it: one permit per fragment plus one for the ending.
    #[must_use]
    pub fn gated(mut self) -> (Self, TurnGate) {
        let permits = Arc::new(Semaphore::new(0));
        self.gate = Some(Arc::clone(&permits));
        (self, TurnGate { permits })
    }

    /// Requests received so far, in order.
    #[must_use]
    pub fn requests(&self) -> Vec<TurnRequest> {
        lock_unpoisoned(&self.requests).clone()
    }

    /// Waits for the configured delay and gate permit; `false` means cancelled.
    async fn pace(&self, delay: Duration, cancel: &CancelSignal) -> bool {
        if !delay.is_zero() && until_cancelled(tokio::time::sleep(delay), cancel).await.is_none() {
            return false;
        }

        if let Some(gate) = &self.gate {
            let Some(permit) = until_cancelled(gate.acquire(), cancel).await else {
                return false;
            };
            match permit {
                Ok(permit) => permit.forget(),
                Err(_) => return false,
            }
        }

        !is_cancelled(cancel)
    }
}

impl Default for ScriptedTurnExecutor {
    fn default() -> Self {
        Self::new([
            "You have ",
            "3 unread emails ",
            "from today.\n\n",
            "- **Alice**: quarterly report draft\n",
            "- **Bob**: lunch on Friday?\n",
            "- **Billing**: invoice #4821 is due next week\n",
        ])
        .with_delays(Duration::from_millis(200), Duration::from_millis(50))
    }
}

#[async_trait]
impl TurnExecutor for ScriptedTurnExecutor {
    fn profile(&self) -> ProviderProfile {
        ProviderProfile {
            provider_id: MOCK_PROVIDER_ID.to_string(),
            model_id: "mock".to_string(),
        }
    }

    async fn execute(
        &self,
        req: TurnRequest,
        cancel: CancelSignal,
        emit: &mut (dyn FnMut(TurnEvent) + Send),
    ) -> Result<(), String> {
        let turn_id = req.turn_id;
        lock_unpoisoned(&self.requests).push(req);

        if is_cancelled(&cancel) {
            emit(TurnEvent::Cancelled { turn_id });
            return Ok(());
        }

        emit(TurnEvent::Started { turn_id });
        if !self.start_delay.is_zero()
            && until_cancelled(tokio::time::sleep(self.start_delay), &cancel)
                .await
                .is_none()
        {
            emit(TurnEvent::Cancelled { turn_id });
            return Ok(());
        }

        let mut accumulator = DeltaAccumulator::default();
        for (index, fragment) in self.fragments.iter().enumerate() {
            let delay = if index == 0 {
                Duration::ZERO
            } else {
                self.fragment_delay
            };
            if !self.pace(delay, &cancel).await {
                emit(TurnEvent::Cancelled { turn_id });
                return Ok(());
            }

            emit(TurnEvent::Delta {
                turn_id,
                text: accumulator.push(fragment).to_string(),
            });
        }

        if !self.pace(self.fragment_delay, &cancel).await {
            emit(TurnEvent::Cancelled { turn_id });
            return Ok(());
        }

        match &self.ending {
            ScriptedEnding::Finish { output_text } => emit(TurnEvent::Finished {
                turn_id,
                text: output_text
                    .clone()
                    .unwrap_or_else(|| accumulator.into_text()),
            }),
            ScriptedEnding::Fail(error) => emit(TurnEvent::Failed {
                turn_id,
                error: error.clone(),
            }),
            ScriptedEnding::Silent => {}
            ScriptedEnding::Abort(error) => return Err(error.clone()),
        }

        Ok(())
    }
}

fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
