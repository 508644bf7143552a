//! Session state machine.
//!
//! `Session` is pure state: it owns the message log and decides which turn
//! events may touch it. I/O and task orchestration live in
//! [`crate::controller`].

use tracing::debug;
use turn_provider::{TurnEvent, TurnId};

use crate::error::SubmitError;
use crate::message_log::{Message, MessageLog};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No valid credential. Input is refused until authorization completes.
    Unauthenticated,
    /// Credential valid, no turn in flight.
    Ready,
    /// Mailbox sync and context reset are running.
    Syncing,
    /// Turn accepted; context fetch and request construction in progress.
    Sending { turn_id: TurnId },
    /// The completion stream is open.
    Streaming { turn_id: TurnId },
}

impl SessionState {
    /// Id of the turn in flight, if any.
    #[must_use]
    pub fn turn_id(self) -> Option<TurnId> {
        match self {
            Self::Sending { turn_id } | Self::Streaming { turn_id } => Some(turn_id),
            Self::Unauthenticated | Self::Ready | Self::Syncing => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    state: SessionState,
    log: MessageLog,
    /// Turn the user walked away from whose executor has not reported a
    /// terminal event yet. Its remaining events are swallowed.
    cancelling_turn: Option<TurnId>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: SessionState::Unauthenticated,
            log: MessageLog::new(),
            cancelling_turn: None,
        }
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    #[must_use]
    pub fn log(&self) -> &MessageLog {
        &self.log
    }

    #[must_use]
    pub fn messages(&self) -> &[Message] {
        self.log.messages()
    }

    #[must_use]
    pub fn cancelling_turn(&self) -> Option<TurnId> {
        self.cancelling_turn
    }

    /// A valid credential is known; leaves `Unauthenticated`.
    pub fn authenticated(&mut self) {
        if self.state == SessionState::Unauthenticated {
            self.state = SessionState::Ready;
        }
    }

    /// Enters `Syncing` from `Ready`. Returns `false` in any other state.
    pub fn begin_sync(&mut self) -> bool {
        if self.state != SessionState::Ready {
            return false;
        }
        self.state = SessionState::Syncing;
        true
    }

    pub fn finish_sync(&mut self) {
        if self.state == SessionState::Syncing {
            self.state = SessionState::Ready;
        }
    }

    /// Trims `text` and checks that a turn may start now.
    pub fn check_submit(&self, text: &str) -> Result<String, SubmitError> {
        let prompt = text.trim();
        if prompt.is_empty() {
            return Err(SubmitError::Empty);
        }

        match self.state {
            SessionState::Unauthenticated => Err(SubmitError::Unauthenticated),
            SessionState::Syncing => Err(SubmitError::Syncing),
            SessionState::Sending { .. } | SessionState::Streaming { .. } => {
                Err(SubmitError::TurnActive)
            }
            SessionState::Ready if self.cancelling_turn.is_some() => Err(SubmitError::TurnActive),
            SessionState::Ready => Ok(prompt.to_string()),
        }
    }

    #[must_use]
    pub fn accepts_input(&self) -> bool {
        self.state == SessionState::Ready && self.cancelling_turn.is_none()
    }

    /// Appends the turn to the log and enters `Sending`.
    pub fn begin_turn(&mut self, prompt: impl Into<String>) -> TurnId {
        assert!(
            self.accepts_input(),
            "begin_turn requires Ready with no turn being cancelled, found {:?}",
            self.state
        );

        let turn_id = self.log.append_turn(prompt);
        self.state = SessionState::Sending { turn_id };
        turn_id
    }

    /// Applies one executor event. Events for any turn other than the active
    /// or cancelling one are dropped.
    pub fn apply_turn_event(&mut self, event: TurnEvent) {
        let turn_id = event.turn_id();
        if !self.should_apply_turn_event(turn_id) {
            debug!(%turn_id, "dropping event for inactive turn");
            return;
        }

        if self.is_cancelling(turn_id) {
            if event.is_terminal() {
                self.cancelling_turn = None;
            }
            return;
        }

        match event {
            TurnEvent::Started { turn_id } => {
                self.state = SessionState::Streaming { turn_id };
            }
            TurnEvent::Delta { turn_id, text } => {
                self.state = SessionState::Streaming { turn_id };
                self.log.replace_streaming_content(turn_id, &text);
            }
            TurnEvent::Finished { turn_id, text } => {
                self.log.finalize(turn_id, text);
                self.state = SessionState::Ready;
            }
            TurnEvent::Failed { turn_id, error } => {
                self.log.fail(turn_id, &error);
                self.state = SessionState::Ready;
            }
            TurnEvent::Cancelled { .. } => {
                self.log.cancel_streaming();
                self.state = SessionState::Ready;
            }
        }
    }

    /// Stops the in-flight turn from the user's side: streaming ends with the
    /// partial text kept and the session is immediately `Ready` again.
    ///
    /// Returns the cancelled turn id, or `None` when nothing was in flight.
    pub fn cancel(&mut self) -> Option<TurnId> {
        let turn_id = self.state.turn_id()?;
        self.cancelling_turn = Some(turn_id);
        self.log.cancel_streaming();
        self.state = SessionState::Ready;
        Some(turn_id)
    }

    /// Ends the session: the log is cleared and input refused.
    ///
    /// Returns the id of a turn that was in flight, which the caller must
    /// signal to stop.
    pub fn sign_out(&mut self) -> Option<TurnId> {
        let in_flight = self.state.turn_id();
        if in_flight.is_some() {
            self.cancelling_turn = in_flight;
        }
        self.log.clear();
        self.state = SessionState::Unauthenticated;
        in_flight
    }

    fn should_apply_turn_event(&self, turn_id: TurnId) -> bool {
        self.is_active_turn(turn_id) || self.is_cancelling(turn_id)
    }

    fn is_active_turn(&self, turn_id: TurnId) -> bool {
        self.state.turn_id() == Some(turn_id)
    }

    fn is_cancelling(&self, turn_id: TurnId) -> bool {
        self.cancelling_turn == Some(turn_id)
    }
}
