use serde::{Deserialize, Serialize};

/// Terminal state reported by a completion event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseStatus {
    Completed,
    Incomplete,
    Failed,
    Cancelled,
    Queued,
    InProgress,
}

impl ResponseStatus {
    pub fn parse(value: &str) -> Option<Self> {
        Some(match value {
            "completed" => Self::Completed,
            "incomplete" => Self::Incomplete,
            "failed" => Self::Failed,
            "cancelled" => Self::Cancelled,
            "queued" => Self::Queued,
            "in_progress" => Self::InProgress,
            _ => return None,
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Incomplete => "incomplete",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
            Self::Queued => "queued",
            Self::InProgress => "in_progress",
        }
    }
}

/// Stream event emitted by the parser after normalization.
///
/// Event kinds the session has no use for (tool-call progress, reasoning, item
/// bookkeeping) are dropped by the parser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseStreamEvent {
    OutputTextDelta {
        delta: String,
    },
    ResponseCompleted {
        status: Option<ResponseStatus>,
        /// Assistant text assembled by the service, when the event carries it.
        output_text: Option<String>,
    },
    ResponseFailed {
        message: Option<String>,
    },
    Error {
        code: Option<String>,
        message: Option<String>,
    },
}
