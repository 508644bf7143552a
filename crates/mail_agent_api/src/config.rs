use std::time::Duration;

pub const DEFAULT_MAIL_AGENT_BASE_URL: &str = "https://mail-agent.fastmcp.app";

pub const SYNC_EMAILS_PATH: &str = "/api/sync-emails";
pub const CONTEXT_CLEAR_PATH: &str = "/api/context/clear";
pub const CONTEXT_PATH: &str = "/api/context";
pub const MCP_PATH: &str = "/mcp";

/// Label the completion API shows for the backend's tool server.
pub const MCP_SERVER_LABEL: &str = "mail-agent";

/// Number of recent mails indexed at session start.
pub const DEFAULT_SYNC_MAX_FETCH: u32 = 50;

#[derive(Debug, Clone)]
pub struct MailAgentConfig {
    pub base_url: String,
    /// Optional per-request timeout.
    pub timeout: Option<Duration>,
}

impl Default for MailAgentConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_MAIL_AGENT_BASE_URL.to_string(),
            timeout: None,
        }
    }
}

impl MailAgentConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Joins `path` onto the base URL, tolerating a trailing slash and a blank base.
    #[must_use]
    pub fn endpoint(&self, path: &str) -> String {
        let base = match self.base_url.trim() {
            "" => DEFAULT_MAIL_AGENT_BASE_URL,
            trimmed => trimmed,
        };
        format!("{}{path}", base.trim_end_matches('/'))
    }

    #[must_use]
    pub fn mcp_server_url(&self) -> String {
        self.endpoint(MCP_PATH)
    }
}
