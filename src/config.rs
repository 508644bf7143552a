//! Environment configuration.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use mail_agent_api::DEFAULT_MAIL_AGENT_BASE_URL;
use thiserror::Error;
use turn_provider_responses::DEFAULT_MODEL;

pub const BACKEND_URL_ENV: &str = "MAIL_CHAT_BACKEND_URL";
pub const RESPONSES_URL_ENV: &str = "MAIL_CHAT_RESPONSES_URL";
pub const API_KEY_ENV: &str = "MAIL_CHAT_API_KEY";
pub const MODEL_ENV: &str = "MAIL_CHAT_MODEL";
pub const CREDENTIAL_PATH_ENV: &str = "MAIL_CHAT_CREDENTIAL_PATH";
pub const TURN_TIMEOUT_ENV: &str = "MAIL_CHAT_TURN_TIMEOUT_SEC";
pub const LOG_FILTER_ENV: &str = "MAIL_CHAT_LOG";

pub const DEFAULT_RESPONSES_URL: &str = "https://api.groq.com/openai/v1";
pub const DEFAULT_LOG_FILTER: &str = "mail_chat=info";

const CREDENTIAL_DIR: &str = "mail_chat";
const CREDENTIAL_FILE: &str = "gmail_user_info.json";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{key} must be a positive whole number of seconds, got '{value}'")]
    InvalidTimeout { key: &'static str, value: String },

    #[error("no platform config directory; set MAIL_CHAT_CREDENTIAL_PATH")]
    NoConfigDir,
}

#[derive(Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub backend_url: String,
    pub responses_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub credential_path: PathBuf,
    pub turn_timeout: Option<Duration>,
    pub log_filter: String,
}

impl std::fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionConfig")
            .field("backend_url", &self.backend_url)
            .field("responses_url", &self.responses_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("model", &self.model)
            .field("credential_path", &self.credential_path)
            .field("turn_timeout", &self.turn_timeout)
            .field("log_filter", &self.log_filter)
            .finish()
    }
}

impl SessionConfig {
    /// Defaults with the credential blob stored at `credential_path`.
    #[must_use]
    pub fn new(credential_path: impl Into<PathBuf>) -> Self {
        Self {
            backend_url: DEFAULT_MAIL_AGENT_BASE_URL.to_string(),
            responses_url: DEFAULT_RESPONSES_URL.to_string(),
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            credential_path: credential_path.into(),
            turn_timeout: None,
            log_filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        let credential_path = match env_string_opt(CREDENTIAL_PATH_ENV) {
            Some(path) => PathBuf::from(path),
            None => default_credential_path()?,
        };

        let mut config = Self::new(credential_path);
        if let Some(url) = env_string_opt(BACKEND_URL_ENV) {
            config.backend_url = url;
        }
        if let Some(url) = env_string_opt(RESPONSES_URL_ENV) {
            config.responses_url = url;
        }
        config.api_key = env_string_opt(API_KEY_ENV);
        if let Some(model) = env_string_opt(MODEL_ENV) {
            config.model = model;
        }
        config.turn_timeout = env_timeout_opt(TURN_TIMEOUT_ENV)?;
        if let Some(filter) = env_string_opt(LOG_FILTER_ENV) {
            config.log_filter = filter;
        }

        Ok(config)
    }

    #[must_use]
    pub fn with_backend_url(mut self, url: impl Into<String>) -> Self {
        self.backend_url = url.into();
        self
    }

    #[must_use]
    pub fn with_responses_url(mut self, url: impl Into<String>) -> Self {
        self.responses_url = url.into();
        self
    }

    #[must_use]
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    #[must_use]
    pub fn with_turn_timeout(mut self, timeout: Duration) -> Self {
        self.turn_timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn with_log_filter(mut self, filter: impl Into<String>) -> Self {
        self.log_filter = filter.into();
        self
    }
}

fn default_credential_path() -> Result<PathBuf, ConfigError> {
    dirs::config_dir()
        .map(|dir| dir.join(CREDENTIAL_DIR).join(CREDENTIAL_FILE))
        .ok_or(ConfigError::NoConfigDir)
}

fn env_string_opt(key: &str) -> Option<String> {
    env::var(key).ok().and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

fn env_timeout_opt(key: &'static str) -> Result<Option<Duration>, ConfigError> {
    let Some(value) = env_string_opt(key) else {
        return Ok(None);
    };

    match value.parse::<u64>() {
        Ok(seconds) if seconds > 0 => Ok(Some(Duration::from_secs(seconds))),
        _ => Err(ConfigError::InvalidTimeout { key, value }),
    }
}
