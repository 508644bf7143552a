use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ResponsesApiError {
    #[error("API key is required")]
    MissingApiKey,

    #[error("invalid header: {0}")]
    InvalidHeader(String),

    #[error("request error: {0}")]
    Request(#[from] reqwest::Error),

    #[error("HTTP {status} {message}")]
    Status { status: StatusCode, message: String },

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("{}", stream_failure_text(code.as_deref(), message))]
    StreamFailed {
        code: Option<String>,
        message: String,
    },

    #[error("stream ended before completion")]
    Incomplete,

    #[error("request was cancelled")]
    Cancelled,
}

impl ResponsesApiError {
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

fn stream_failure_text(code: Option<&str>, message: &str) -> String {
    match code {
        Some(code) if !code.trim().is_empty() => format!("stream failed ({code}): {message}"),
        _ => format!("stream failed: {message}"),
    }
}

#[derive(Debug, Deserialize)]
struct ErrorPayload {
    error: Option<ErrorPayloadFields>,
}

#[derive(Debug, Deserialize)]
struct ErrorPayloadFields {
    message: Option<String>,
}

/// Extracts `error.message` from an error body, falling back to the raw body or
/// the status reason.
pub fn parse_error_message(status: StatusCode, body: &str) -> String {
    let explicit = serde_json::from_str::<ErrorPayload>(body)
        .ok()
        .and_then(|payload| payload.error)
        .and_then(|error| error.message)
        .filter(|message| !message.trim().is_empty());
    if let Some(message) = explicit {
        return message;
    }

    if body.trim().is_empty() {
        status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string()
    } else {
        body.trim().to_string()
    }
}
