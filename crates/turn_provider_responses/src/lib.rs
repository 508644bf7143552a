//! Responses API-backed implementation of the `turn_provider` contract.
//!
//! One turn fetches the stored conversation context from the mail backend,
//! appends the user's utterance and streams a completion in which the model may
//! call the backend's tool server with the user's access token. Stream events
//! are folded into cumulative `TurnEvent::Delta`s.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use mail_agent_api::{ContextEntry, MailAgentClient, MailAgentConfig, MCP_SERVER_LABEL};
use responses_api::{
    InputMessage, McpTool, ResponseStatus, ResponseStream, ResponseStreamEvent,
    ResponsesApiClient, ResponsesApiConfig, ResponsesApiError, ResponsesRequest,
};
use serde_json::Value;
use tracing::{debug, info, warn};
use turn_provider::{
    is_cancelled, until_cancelled, CancelSignal, DeltaAccumulator, ExecutorInitError,
    ProviderProfile, TurnEvent, TurnExecutor, TurnId, TurnRequest,
};

pub const RESPONSES_PROVIDER_ID: &str = "responses-api";

pub const DEFAULT_MODEL: &str = "moonshotai/kimi-k2-instruct-0905";

/// Runtime configuration for the Responses executor.
#[derive(Clone)]
pub struct ResponsesExecutorConfig {
    pub api_key: String,
    pub model: String,
    pub responses_base_url: Option<String>,
    pub mail_agent_base_url: Option<String>,
    pub timeout: Option<Duration>,
}

impl std::fmt::Debug for ResponsesExecutorConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponsesExecutorConfig")
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("responses_base_url", &self.responses_base_url)
            .field("mail_agent_base_url", &self.mail_agent_base_url)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl ResponsesExecutorConfig {
    #[must_use]
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            responses_base_url: None,
            mail_agent_base_url: None,
            timeout: None,
        }
    }

    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    #[must_use]
    pub fn with_responses_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.responses_base_url = Some(base_url.into());
        self
    }

    #[must_use]
    pub fn with_mail_agent_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.mail_agent_base_url = Some(base_url.into());
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    fn responses_api_config(&self) -> ResponsesApiConfig {
        let mut config = ResponsesApiConfig::new(self.api_key.clone());
        if let Some(base_url) = &self.responses_base_url {
            config = config.with_base_url(base_url.clone());
        }
        if let Some(timeout) = self.timeout {
            config = config.with_timeout(timeout);
        }
        config
    }

    fn mail_agent_config(&self) -> MailAgentConfig {
        let mut config = match &self.mail_agent_base_url {
            Some(base_url) => MailAgentConfig::new(base_url.clone()),
            None => MailAgentConfig::default(),
        };
        if let Some(timeout) = self.timeout {
            config = config.with_timeout(timeout);
        }
        config
    }
}

#[async_trait]
trait ContextSource: Send + Sync {
    async fn fetch(&self, access_token: &str) -> Result<Vec<ContextEntry>, String>;
}

struct MailAgentContextSource {
    client: MailAgentClient,
}

#[async_trait]
impl ContextSource for MailAgentContextSource {
    async fn fetch(&self, access_token: &str) -> Result<Vec<ContextEntry>, String> {
        self.client
            .fetch_context(access_token)
            .await
            .map(|fetched| fetched.into_entries())
            .map_err(|error| format!("failed to fetch context: {error}"))
    }
}

#[async_trait]
trait EventStream: Send {
    async fn next_event(
        &mut self,
        cancel: &CancelSignal,
    ) -> Result<Option<ResponseStreamEvent>, ResponsesApiError>;
}

#[async_trait]
impl EventStream for ResponseStream {
    async fn next_event(
        &mut self,
        cancel: &CancelSignal,
    ) -> Result<Option<ResponseStreamEvent>, ResponsesApiError> {
        ResponseStream::next_event(self, Some(cancel)).await
    }
}

#[async_trait]
trait StreamClient: Send + Sync {
    async fn open(
        &self,
        request: &ResponsesRequest,
        cancel: &CancelSignal,
    ) -> Result<Box<dyn EventStream>, ResponsesApiError>;
}

struct DefaultStreamClient {
    client: ResponsesApiClient,
}

#[async_trait]
impl StreamClient for DefaultStreamClient {
    async fn open(
        &self,
        request: &ResponsesRequest,
        cancel: &CancelSignal,
    ) -> Result<Box<dyn EventStream>, ResponsesApiError> {
        let stream = self.client.open(request, Some(cancel)).await?;
        Ok(Box::new(stream))
    }
}

/// `TurnExecutor` backed by the mail backend and a Responses endpoint.
pub struct ResponsesTurnExecutor {
    model: String,
    mcp_server_url: String,
    context_source: Arc<dyn ContextSource>,
    stream_client: Arc<dyn StreamClient>,
}

impl ResponsesTurnExecutor {
    pub fn new(config: ResponsesExecutorConfig) -> Result<Self, ExecutorInitError> {
        let mail_agent_config = config.mail_agent_config();
        let mcp_server_url = mail_agent_config.mcp_server_url();
        let context_client = MailAgentClient::new(mail_agent_config).map_err(|error| {
            ExecutorInitError::new(format!("failed to initialize mail agent client: {error}"))
        })?;
        let stream_client = ResponsesApiClient::new(config.responses_api_config()).map_err(|error| {
            ExecutorInitError::new(format!("failed to initialize responses client: {error}"))
        })?;

        Ok(Self {
            model: sanitize_model(config.model),
            mcp_server_url,
            context_source: Arc::new(MailAgentContextSource {
                client: context_client,
            }),
            stream_client: Arc::new(DefaultStreamClient {
                client: stream_client,
            }),
        })
    }

    fn build_request(
        &self,
        context: Vec<ContextEntry>,
        user_text: String,
        access_token: &str,
    ) -> ResponsesRequest {
        let mut input = normalize_context(context);
        input.push(InputMessage::user(user_text));

        ResponsesRequest::new(self.model.clone(), input).with_tool(
            McpTool::auto_approved(MCP_SERVER_LABEL, self.mcp_server_url.clone())
                .with_authorization(access_token),
        )
    }

    async fn consume(
        &self,
        turn_id: TurnId,
        mut stream: Box<dyn EventStream>,
        cancel: &CancelSignal,
        emit: &mut (dyn FnMut(TurnEvent) + Send),
    ) {
        let mut accumulator = DeltaAccumulator::default();

        loop {
            let event = match stream.next_event(cancel).await {
                Ok(Some(event)) => event,
                Ok(None) => {
                    emit(TurnEvent::Failed {
                        turn_id,
                        error: ResponsesApiError::Incomplete.to_string(),
                    });
                    return;
                }
                Err(ResponsesApiError::Cancelled) => {
                    emit(TurnEvent::Cancelled { turn_id });
                    return;
                }
                Err(error) => {
                    warn!(%turn_id, %error, "completion stream failed");
                    emit(TurnEvent::Failed {
                        turn_id,
                        error: error.to_string(),
                    });
                    return;
                }
            };

            match event {
                ResponseStreamEvent::OutputTextDelta { delta } => {
                    if delta.is_empty() {
                        continue;
                    }
                    emit(TurnEvent::Delta {
                        turn_id,
                        text: accumulator.push(&delta).to_string(),
                    });
                }
                ResponseStreamEvent::ResponseCompleted {
                    status: Some(ResponseStatus::Failed),
                    ..
                } => {
                    emit(TurnEvent::Failed {
                        turn_id,
                        error: "response ended with status 'failed'".to_string(),
                    });
                    return;
                }
                ResponseStreamEvent::ResponseCompleted { output_text, .. } => {
                    let text = output_text.unwrap_or_else(|| accumulator.into_text());
                    debug!(%turn_id, chars = text.len(), "turn finished");
                    emit(TurnEvent::Finished { turn_id, text });
                    return;
                }
                ResponseStreamEvent::ResponseFailed { .. } | ResponseStreamEvent::Error { .. } => {}
            }
        }
    }

    #[cfg(test)]
    fn with_sources_for_tests(
        context_source: Arc<dyn ContextSource>,
        stream_client: Arc<dyn StreamClient>,
    ) -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            mcp_server_url: MailAgentConfig::default().mcp_server_url(),
            context_source,
            stream_client,
        }
    }
}

#[async_trait]
impl TurnExecutor for ResponsesTurnExecutor {
    fn profile(&self) -> ProviderProfile {
        ProviderProfile {
            provider_id: RESPONSES_PROVIDER_ID.to_string(),
            model_id: self.model.clone(),
        }
    }

    async fn execute(
        &self,
        req: TurnRequest,
        cancel: CancelSignal,
        emit: &mut (dyn FnMut(TurnEvent) + Send),
    ) -> Result<(), String> {
        let TurnRequest {
            turn_id,
            credential,
            user_text,
        } = req;

        if is_cancelled(&cancel) {
            emit(TurnEvent::Cancelled { turn_id });
            return Ok(());
        }

        info!(%turn_id, model = %self.model, "turn started");
        let fetch = self.context_source.fetch(&credential.access_token);
        let context = match until_cancelled(fetch, &cancel).await {
            None => {
                emit(TurnEvent::Cancelled { turn_id });
                return Ok(());
            }
            Some(Err(error)) => {
                warn!(%turn_id, %error, "context fetch failed");
                emit(TurnEvent::Failed { turn_id, error });
                return Ok(());
            }
            Some(Ok(context)) => context,
        };

        let request = self.build_request(context, user_text, &credential.access_token);
        let stream = match self.stream_client.open(&request, &cancel).await {
            Ok(stream) => stream,
            Err(ResponsesApiError::Cancelled) => {
                emit(TurnEvent::Cancelled { turn_id });
                return Ok(());
            }
            Err(error) => {
                warn!(%turn_id, %error, "completion request failed");
                emit(TurnEvent::Failed {
                    turn_id,
                    error: error.to_string(),
                });
                return Ok(());
            }
        };

        emit(TurnEvent::Started { turn_id });
        self.consume(turn_id, stream, &cancel, emit).await;
        Ok(())
    }
}

/// Converts stored context into completion input.
///
/// Entries without a string role are dropped. String content is used as is,
/// `null` becomes empty and any other value is rendered as compact JSON.
#[must_use]
pub fn normalize_context(entries: Vec<ContextEntry>) -> Vec<InputMessage> {
    entries
        .into_iter()
        .filter_map(|entry| {
            let Value::String(role) = entry.role else {
                return None;
            };
            let content = match entry.content {
                Value::String(text) => text,
                Value::Null => String::new(),
                other => other.to_string(),
            };
            Some(InputMessage { role, content })
        })
        .collect()
}

fn sanitize_model(model: String) -> String {
    let trimmed = model.trim();
    if trimmed.is_empty() {
        DEFAULT_MODEL.to_string()
    } else {
        trimmed.to_string()
    }
}
