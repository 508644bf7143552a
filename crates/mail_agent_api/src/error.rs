use reqwest::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MailAgentError {
    #[error("access token is required")]
    MissingAccessToken,

    #[error("request to {endpoint} failed: {source}")]
    Request {
        endpoint: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("{endpoint} returned HTTP {status}: {message}")]
    Status {
        endpoint: &'static str,
        status: StatusCode,
        message: String,
    },

    #[error("malformed response from {endpoint}: {source}")]
    MalformedBody {
        endpoint: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}

impl MailAgentError {
    /// HTTP status carried by a non-success response, if any.
    #[must_use]
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Short human-readable reason for a failed response body.
pub(crate) fn status_message(status: StatusCode, body: &str) -> String {
    let body = body.trim();
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        let detail = value
            .get("detail")
            .or_else(|| value.get("error"))
            .or_else(|| value.get("message"))
            .and_then(serde_json::Value::as_str);
        if let Some(detail) = detail.filter(|detail| !detail.is_empty()) {
            return detail.to_string();
        }
    }

    if body.is_empty() {
        status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string()
    } else {
        body.to_string()
    }
}
