//! Session and streaming controller for a mailbox-aware chat assistant.
//!
//! The controller validates a locally persisted credential, synchronizes the
//! mail backend once per session, and runs one cancellable streamed turn at a
//! time into an ordered [`MessageLog`].
//!
//! # Public API Overview
//! - Build a [`SessionController`] from [`SessionConfig`] or from explicit
//!   parts (credential store, [`ContextSynchronizer`], `TurnExecutor`).
//! - Drive it with [`SessionController::mount`], [`SessionController::submit`],
//!   [`SessionController::cancel`] and [`SessionController::logout`].
//! - Observe [`SessionState`] and snapshots of the [`Message`] log.
//! - Install logging with [`logging::init`].

pub mod config;
pub mod controller;
pub mod error;
pub mod logging;
pub mod message_log;
pub mod session;
pub mod sync;

pub use config::{ConfigError, SessionConfig};
pub use controller::{SessionController, ERROR_NO_TERMINAL_EVENT};
pub use error::{AuthorizationError, ControllerInitError, SubmitError, SyncError};
pub use message_log::{Message, MessageId, MessageLog, Role, ERROR_PREFIX};
pub use session::{Session, SessionState};
pub use sync::{synchronize, ContextSynchronizer, MailAgentSynchronizer, SyncReport};

pub use credential_store::{CallbackParams, Credential, CredentialStore};
pub use turn_provider::{TurnEvent, TurnExecutor, TurnId};
