use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One stored conversation entry as returned by the backend.
///
/// `role` and `content` are kept loosely typed; normalization into completion
/// input happens on the provider side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextEntry {
    #[serde(default)]
    pub role: Value,
    #[serde(default)]
    pub content: Value,
}

impl ContextEntry {
    pub fn new(role: impl Into<String>, content: impl Into<Value>) -> Self {
        Self {
            role: Value::String(role.into()),
            content: content.into(),
        }
    }

    /// Lenient conversion: non-object entries keep a null role so they are
    /// dropped during normalization instead of failing the whole fetch.
    #[must_use]
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(mut fields) => Self {
                role: fields.remove("role").unwrap_or(Value::Null),
                content: fields.remove("content").unwrap_or(Value::Null),
            },
            _ => Self {
                role: Value::Null,
                content: Value::Null,
            },
        }
    }
}

/// Outcome of a context fetch.
#[derive(Debug, Clone, PartialEq)]
pub enum ContextFetch {
    Entries(Vec<ContextEntry>),
    /// The backend answered with a non-success status; the turn proceeds without history.
    Unavailable { status: u16 },
}

impl ContextFetch {
    #[must_use]
    pub fn into_entries(self) -> Vec<ContextEntry> {
        match self {
            Self::Entries(entries) => entries,
            Self::Unavailable { .. } => Vec::new(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ContextEnvelope {
    #[serde(default)]
    pub context: Option<Vec<Value>>,
}
