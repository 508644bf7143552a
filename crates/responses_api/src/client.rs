use std::collections::VecDeque;
use std::future::Future;
use std::sync::{atomic::AtomicBool, atomic::Ordering, Arc};
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, Response};
use tracing::debug;

use crate::config::ResponsesApiConfig;
use crate::error::{parse_error_message, ResponsesApiError};
use crate::events::ResponseStreamEvent;
use crate::payload::ResponsesRequest;
use crate::sse::SseStreamParser;
use crate::url::normalize_responses_url;

/// Cancellation signal shared across request and stream loops.
pub type CancellationSignal = Arc<AtomicBool>;

const CANCEL_POLL_INTERVAL: Duration = Duration::from_millis(25);

#[derive(Debug)]
pub struct ResponsesApiClient {
    http: Client,
    config: ResponsesApiConfig,
}

impl ResponsesApiClient {
    pub fn new(config: ResponsesApiConfig) -> Result<Self, ResponsesApiError> {
        if config.api_key.trim().is_empty() {
            return Err(ResponsesApiError::MissingApiKey);
        }

        let mut builder = Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build()?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &ResponsesApiConfig {
        &self.config
    }

    pub fn normalized_endpoint(&self) -> String {
        normalize_responses_url(&self.config.base_url)
    }

    pub fn build_headers(&self) -> Result<HeaderMap, ResponsesApiError> {
        let mut headers = HeaderMap::new();
        let bearer = format!("Bearer {}", self.config.api_key.trim());
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&bearer)
                .map_err(|_| ResponsesApiError::InvalidHeader("authorization".to_owned()))?,
        );
        headers.insert(ACCEPT, HeaderValue::from_static("text/event-stream"));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        Ok(headers)
    }

    pub fn build_request(
        &self,
        request: &ResponsesRequest,
    ) -> Result<reqwest::RequestBuilder, ResponsesApiError> {
        let mut payload = request.clone();
        payload.stream = true;

        Ok(self
            .http
            .post(self.normalized_endpoint())
            .headers(self.build_headers()?)
            .json(&payload))
    }

    /// Sends the request once and returns the open response stream.
    pub async fn send(
        &self,
        request: &ResponsesRequest,
        cancellation: Option<&CancellationSignal>,
    ) -> Result<Response, ResponsesApiError> {
        if is_cancelled(cancellation) {
            return Err(ResponsesApiError::Cancelled);
        }

        let response =
            await_or_cancel(self.build_request(request)?.send(), cancellation).await??;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = await_or_cancel(response.text(), cancellation)
            .await?
            .unwrap_or_default();
        Err(ResponsesApiError::Status {
            status,
            message: parse_error_message(status, &body),
        })
    }

    /// Sends the request and wraps the open body as an event stream.
    pub async fn open(
        &self,
        request: &ResponsesRequest,
        cancellation: Option<&CancellationSignal>,
    ) -> Result<ResponseStream, ResponsesApiError> {
        let response = self.send(request, cancellation).await?;
        Ok(ResponseStream::new(response))
    }
}

/// Open response body decoded into normalized events.
///
/// Pulls chunks only when the buffered events run out, so a caller that stops
/// calling [`ResponseStream::next_event`] leaves the rest of the body unread.
#[derive(Debug)]
pub struct ResponseStream {
    response: Response,
    parser: SseStreamParser,
    pending: VecDeque<ResponseStreamEvent>,
    exhausted: bool,
}

impl ResponseStream {
    fn new(response: Response) -> Self {
        Self {
            response,
            parser: SseStreamParser::default(),
            pending: VecDeque::new(),
            exhausted: false,
        }
    }

    /// Next event in arrival order, or `None` once the body closes.
    ///
    /// The cancel signal is checked before every returned event and while
    /// awaiting body chunks. `response.failed` and `error` events are turned
    /// into [`ResponsesApiError::StreamFailed`].
    pub async fn next_event(
        &mut self,
        cancellation: Option<&CancellationSignal>,
    ) -> Result<Option<ResponseStreamEvent>, ResponsesApiError> {
        loop {
            if is_cancelled(cancellation) {
                return Err(ResponsesApiError::Cancelled);
            }

            if let Some(event) = self.pending.pop_front() {
                if let Some(error) = stream_failure_from_event(&event) {
                    return Err(error);
                }
                return Ok(Some(event));
            }

            if self.exhausted {
                return Ok(None);
            }

            match await_or_cancel(self.response.chunk(), cancellation).await?? {
                Some(chunk) => self.pending.extend(self.parser.feed(&chunk)),
                None => {
                    debug!("response body closed");
                    self.exhausted = true;
                }
            }
        }
    }
}

fn stream_failure_from_event(event: &ResponseStreamEvent) -> Option<ResponsesApiError> {
    match event {
        ResponseStreamEvent::ResponseFailed { message } => Some(ResponsesApiError::StreamFailed {
            code: None,
            message: message
                .clone()
                .unwrap_or_else(|| "response failed".to_owned()),
        }),
        ResponseStreamEvent::Error { code, message } => Some(ResponsesApiError::StreamFailed {
            code: code.clone(),
            message: message
                .clone()
                .or_else(|| code.clone())
                .unwrap_or_else(|| "unknown error".to_owned()),
        }),
        _ => None,
    }
}

fn is_cancelled(cancel: Option<&CancellationSignal>) -> bool {
    cancel.is_some_and(|token| token.load(Ordering::Acquire))
}

async fn await_or_cancel<F>(
    future: F,
    cancellation: Option<&CancellationSignal>,
) -> Result<F::Output, ResponsesApiError>
where
    F: Future,
{
    if cancellation.is_none() {
        return Ok(future.await);
    }

    let mut future = Box::pin(future);

    loop {
        if is_cancelled(cancellation) {
            return Err(ResponsesApiError::Cancelled);
        }

        if let Ok(output) = tokio::time::timeout(CANCEL_POLL_INTERVAL, &mut future).await {
            if is_cancelled(cancellation) {
                return Err(ResponsesApiError::Cancelled);
            }
            return Ok(output);
        }
    }
}
