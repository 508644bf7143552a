//! HTTP transport for the mail agent backend.
//!
//! Covers the three bearer-authorized endpoints a chat session touches directly:
//! mailbox synchronization, conversation-context reset and context retrieval. The
//! tool server URL is exposed so completion requests can grant the assistant
//! access to the same backend.

pub mod client;
pub mod config;
pub mod context;
pub mod error;

pub use client::MailAgentClient;
pub use config::{
    MailAgentConfig, CONTEXT_CLEAR_PATH, CONTEXT_PATH, DEFAULT_MAIL_AGENT_BASE_URL,
    DEFAULT_SYNC_MAX_FETCH, MCP_PATH, MCP_SERVER_LABEL, SYNC_EMAILS_PATH,
};
pub use context::{ContextEntry, ContextFetch};
pub use error::MailAgentError;
