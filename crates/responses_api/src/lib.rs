//! Streaming client for an OpenAI-compatible Responses endpoint.
//!
//! This crate owns request building, SSE framing and event normalization only.
//! It holds no user credentials of its own: the API key is explicit configuration
//! and per-user tool authorization travels inside each request.
//!
//! Requests are sent exactly once. A failed request or stream is reported to the
//! caller, never retried.

pub mod client;
pub mod config;
pub mod error;
pub mod events;
pub mod payload;
pub mod sse;
pub mod url;

pub use client::{CancellationSignal, ResponseStream, ResponsesApiClient};
pub use config::ResponsesApiConfig;
pub use error::ResponsesApiError;
pub use events::{ResponseStatus, ResponseStreamEvent};
pub use payload::{InputMessage, McpTool, ResponsesRequest};
pub use sse::SseStreamParser;
pub use url::{normalize_responses_url, DEFAULT_RESPONSES_BASE_URL};
