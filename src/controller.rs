use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use credential_store::{CallbackParams, CredentialStore, CredentialStoreError, FileStorage};
use mail_agent_api::MailAgentConfig;
use tracing::{info, warn};
use turn_provider::{new_cancel_signal, CancelSignal, TurnEvent, TurnExecutor, TurnId, TurnRequest};
use turn_provider_responses::{ResponsesExecutorConfig, ResponsesTurnExecutor};

use crate::config::SessionConfig;
use crate::error::{AuthorizationError, ControllerInitError, SubmitError};
use crate::message_log::Message;
use crate::session::{Session, SessionState};
use crate::sync::{synchronize, ContextSynchronizer, MailAgentSynchronizer};

pub const ERROR_NO_TERMINAL_EVENT: &str = "turn ended without a terminal event";

struct ActiveTurn {
    turn_id: TurnId,
    cancel: CancelSignal,
}

/// Drives one chat session: credential checks, context sync, and at most one
/// streamed turn at a time.
///
/// All methods take `&self`; wrap the controller in an `Arc` and call
/// [`SessionController::submit`] from a spawned task to keep
/// [`SessionController::cancel`] reachable while a turn streams.
pub struct SessionController {
    store: CredentialStore,
    synchronizer: Arc<dyn ContextSynchronizer>,
    executor: Arc<dyn TurnExecutor>,
    session: Mutex<Session>,
    active_turn: Mutex<Option<ActiveTurn>>,
    turn_timeout: Option<Duration>,
}

impl SessionController {
    pub fn new(
        store: CredentialStore,
        synchronizer: Arc<dyn ContextSynchronizer>,
        executor: Arc<dyn TurnExecutor>,
    ) -> Self {
        Self {
            store,
            synchronizer,
            executor,
            session: Mutex::new(Session::new()),
            active_turn: Mutex::new(None),
            turn_timeout: None,
        }
    }

    /// Builds the production wiring: file-backed credential store, mail agent
    /// synchronizer and the Responses API executor.
    pub fn from_config(config: &SessionConfig) -> Result<Self, ControllerInitError> {
        let api_key = config
            .api_key
            .clone()
            .ok_or(ControllerInitError::MissingApiKey)?;

        let store =
            CredentialStore::with_system_clock(Arc::new(FileStorage::new(&config.credential_path)));
        let synchronizer =
            MailAgentSynchronizer::new(MailAgentConfig::new(config.backend_url.clone()))?;
        let executor = ResponsesTurnExecutor::new(
            ResponsesExecutorConfig::new(api_key)
                .with_model(config.model.clone())
                .with_responses_base_url(config.responses_url.clone())
                .with_mail_agent_base_url(config.backend_url.clone()),
        )?;

        let controller = Self::new(store, Arc::new(synchronizer), Arc::new(executor));
        Ok(match config.turn_timeout {
            Some(timeout) => controller.with_turn_timeout(timeout),
            None => controller,
        })
    }

    /// Fails any turn still running after `timeout`.
    #[must_use]
    pub fn with_turn_timeout(mut self, timeout: Duration) -> Self {
        self.turn_timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        self.lock_session().state()
    }

    /// Snapshot of the message log in display order.
    #[must_use]
    pub fn messages(&self) -> Vec<Message> {
        self.lock_session().messages().to_vec()
    }

    #[must_use]
    pub fn streaming_message(&self) -> Option<Message> {
        self.lock_session().log().streaming_message().cloned()
    }

    #[must_use]
    pub fn accepts_input(&self) -> bool {
        self.lock_session().accepts_input() && self.lock_active_turn().is_none()
    }

    /// Validates the stored credential and, when valid, synchronizes the
    /// backend before input is enabled.
    ///
    /// Returns the state once synchronization has settled.
    pub async fn mount(&self) -> SessionState {
        let Some(credential) = self.store.load() else {
            self.end_session();
            return SessionState::Unauthenticated;
        };

        {
            let mut session = self.lock_session();
            session.authenticated();
            if !session.begin_sync() {
                return session.state();
            }
        }

        info!(email = %credential.email, "synchronizing mailbox context");
        synchronize(self.synchronizer.as_ref(), &credential).await;

        let mut session = self.lock_session();
        session.finish_sync();
        session.state()
    }

    /// Persists the credential handed back by the authorization service.
    pub fn complete_authorization(
        &self,
        params: CallbackParams,
    ) -> Result<SessionState, AuthorizationError> {
        let credential = params.into_credential(self.store.now_ms())?;
        self.store.save(&credential)?;
        info!(email = %credential.email, "signed in");

        let mut session = self.lock_session();
        session.authenticated();
        Ok(session.state())
    }

    /// Runs one turn to completion and returns its id.
    ///
    /// The credential is re-read first; when it is no longer valid the session
    /// ends and [`SubmitError::CredentialExpired`] is returned. Rejections leave
    /// the message log untouched.
    pub async fn submit(&self, text: &str) -> Result<TurnId, SubmitError> {
        let (request, cancel) = {
            let mut session = self.lock_session();
            let prompt = session.check_submit(text)?;

            let mut active_turn = self.lock_active_turn();
            if active_turn.is_some() {
                return Err(SubmitError::TurnActive);
            }

            let Some(credential) = self.store.load() else {
                drop(active_turn);
                session.sign_out();
                warn!("credential no longer valid; session ended");
                return Err(SubmitError::CredentialExpired);
            };

            let turn_id = session.begin_turn(prompt.clone());
            let cancel = new_cancel_signal();
            *active_turn = Some(ActiveTurn {
                turn_id,
                cancel: Arc::clone(&cancel),
            });

            (
                TurnRequest {
                    turn_id,
                    credential,
                    user_text: prompt,
                },
                cancel,
            )
        };

        let turn_id = request.turn_id;
        info!(%turn_id, provider = %self.executor.profile().provider_id, "turn started");
        self.run_turn(request, cancel).await;
        self.clear_active_turn_if_matching(turn_id);
        Ok(turn_id)
    }

    /// Stops the in-flight turn, keeping its partial text.
    ///
    /// Returns `false` when no turn was in flight.
    pub fn cancel(&self) -> bool {
        let Some(turn_id) = self.lock_session().cancel() else {
            return false;
        };

        self.signal_cancel(turn_id);
        info!(%turn_id, "turn cancelled");
        true
    }

    /// Cancels any in-flight turn, clears the log and erases the credential.
    pub fn logout(&self) -> Result<(), CredentialStoreError> {
        self.end_session();
        self.store.clear()?;
        info!("signed out");
        Ok(())
    }

    async fn run_turn(&self, request: TurnRequest, cancel: CancelSignal) {
        let turn_id = request.turn_id;
        let mut terminal_emitted = false;

        let outcome = {
            let mut emit = |event: TurnEvent| {
                if event.is_terminal() {
                    terminal_emitted = true;
                }
                self.apply_turn_event(event);
            };

            let run = self
                .executor
                .execute(request, Arc::clone(&cancel), &mut emit);
            match self.turn_timeout {
                Some(limit) => tokio::time::timeout(limit, run).await.map_err(|_| limit),
                None => Ok(run.await),
            }
        };

        let failure = match outcome {
            Ok(Ok(())) => None,
            Ok(Err(error)) => {
                warn!(%turn_id, %error, "turn executor failed");
                Some(error)
            }
            Err(limit) => {
                cancel.store(true, Ordering::Release);
                warn!(%turn_id, ?limit, "turn timed out");
                Some(format!("turn timed out after {limit:?}"))
            }
        };

        if terminal_emitted {
            return;
        }

        self.apply_turn_event(TurnEvent::Failed {
            turn_id,
            error: failure.unwrap_or_else(|| ERROR_NO_TERMINAL_EVENT.to_string()),
        });
    }

    fn apply_turn_event(&self, event: TurnEvent) {
        match &event {
            TurnEvent::Finished { turn_id, text } => {
                info!(%turn_id, chars = text.chars().count(), "turn finished");
            }
            TurnEvent::Failed { turn_id, error } => info!(%turn_id, %error, "turn failed"),
            TurnEvent::Cancelled { turn_id } => info!(%turn_id, "turn stopped"),
            TurnEvent::Started { .. } | TurnEvent::Delta { .. } => {}
        }

        self.lock_session().apply_turn_event(event);
    }

    fn end_session(&self) {
        let in_flight = self.lock_session().sign_out();
        if let Some(turn_id) = in_flight {
            self.signal_cancel(turn_id);
        }
    }

    fn signal_cancel(&self, turn_id: TurnId) {
        if let Some(active) = self.lock_active_turn().as_ref() {
            if active.turn_id == turn_id {
                active.cancel.store(true, Ordering::Release);
            }
        }
    }

    fn clear_active_turn_if_matching(&self, turn_id: TurnId) {
        let mut active_turn = self.lock_active_turn();
        if active_turn.as_ref().map(|active| active.turn_id) == Some(turn_id) {
            active_turn.take();
        }
    }

    fn lock_session(&self) -> MutexGuard<'_, Session> {
        lock_unpoisoned(&self.session)
    }

    fn lock_active_turn(&self) -> MutexGuard<'_, Option<ActiveTurn>> {
        lock_unpoisoned(&self.active_turn)
    }
}

fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
