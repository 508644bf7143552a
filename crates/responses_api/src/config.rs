use std::time::Duration;

use crate::url::DEFAULT_RESPONSES_BASE_URL;

/// Transport configuration for completion requests.
#[derive(Clone)]
pub struct ResponsesApiConfig {
    /// Bearer key for the completion service.
    pub api_key: String,
    pub base_url: String,
    /// Optional connect-and-stream timeout.
    pub timeout: Option<Duration>,
}

impl Default for ResponsesApiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: DEFAULT_RESPONSES_BASE_URL.to_string(),
            timeout: None,
        }
    }
}

impl std::fmt::Debug for ResponsesApiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponsesApiConfig")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl ResponsesApiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            ..Self::default()
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}
