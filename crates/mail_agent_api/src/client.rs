use reqwest::{Client, RequestBuilder, Response};
use serde::Serialize;
use tracing::{debug, warn};

use crate::config::{MailAgentConfig, CONTEXT_CLEAR_PATH, CONTEXT_PATH, SYNC_EMAILS_PATH};
use crate::context::{ContextEntry, ContextEnvelope, ContextFetch};
use crate::error::{status_message, MailAgentError};

#[derive(Debug, Serialize)]
struct SyncEmailsBody {
    max_fetch: u32,
}

/// Bearer-authorized client for the mail agent backend.
///
/// The access token is passed per call; the client never caches credentials.
#[derive(Debug, Clone)]
pub struct MailAgentClient {
    http: Client,
    config: MailAgentConfig,
}

impl MailAgentClient {
    pub fn new(config: MailAgentConfig) -> Result<Self, MailAgentError> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build().map_err(MailAgentError::Client)?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &MailAgentConfig {
        &self.config
    }

    /// Asks the backend to index the most recent `max_fetch` mails.
    pub async fn sync_emails(
        &self,
        access_token: &str,
        max_fetch: u32,
    ) -> Result<(), MailAgentError> {
        let request = self
            .post(SYNC_EMAILS_PATH, access_token)?
            .json(&SyncEmailsBody { max_fetch });
        let response = send(request, SYNC_EMAILS_PATH).await?;
        ensure_success(response, SYNC_EMAILS_PATH).await?;
        debug!(max_fetch, "mail sync accepted");
        Ok(())
    }

    /// Drops the backend's stored conversation context.
    pub async fn clear_context(&self, access_token: &str) -> Result<(), MailAgentError> {
        let request = self.post(CONTEXT_CLEAR_PATH, access_token)?;
        let response = send(request, CONTEXT_CLEAR_PATH).await?;
        ensure_success(response, CONTEXT_CLEAR_PATH).await?;
        debug!("conversation context cleared");
        Ok(())
    }

    /// Fetches stored conversation context.
    ///
    /// A non-success status is not an error: it yields [`ContextFetch::Unavailable`].
    /// Transport failures and undecodable bodies are errors.
    pub async fn fetch_context(&self, access_token: &str) -> Result<ContextFetch, MailAgentError> {
        let token = require_token(access_token)?;
        let request = self
            .http
            .get(self.config.endpoint(CONTEXT_PATH))
            .bearer_auth(token);
        let response = send(request, CONTEXT_PATH).await?;

        let status = response.status();
        if !status.is_success() {
            warn!(status = status.as_u16(), "context fetch failed; continuing without history");
            return Ok(ContextFetch::Unavailable {
                status: status.as_u16(),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|source| MailAgentError::Request {
                endpoint: CONTEXT_PATH,
                source,
            })?;
        let envelope: ContextEnvelope =
            serde_json::from_slice(&body).map_err(|source| MailAgentError::MalformedBody {
                endpoint: CONTEXT_PATH,
                source,
            })?;

        let entries: Vec<_> = envelope
            .context
            .unwrap_or_default()
            .into_iter()
            .map(ContextEntry::from_value)
            .collect();
        debug!(entries = entries.len(), "context fetched");
        Ok(ContextFetch::Entries(entries))
    }

    fn post(
        &self,
        path: &'static str,
        access_token: &str,
    ) -> Result<RequestBuilder, MailAgentError> {
        let token = require_token(access_token)?;
        Ok(self.http.post(self.config.endpoint(path)).bearer_auth(token))
    }
}

fn require_token(access_token: &str) -> Result<&str, MailAgentError> {
    let token = access_token.trim();
    if token.is_empty() {
        return Err(MailAgentError::MissingAccessToken);
    }
    Ok(token)
}

async fn send(request: RequestBuilder, endpoint: &'static str) -> Result<Response, MailAgentError> {
    request
        .send()
        .await
        .map_err(|source| MailAgentError::Request { endpoint, source })
}

async fn ensure_success(response: Response, endpoint: &'static str) -> Result<(), MailAgentError> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }

    let body = response.text().await.unwrap_or_default();
    Err(MailAgentError::Status {
        endpoint,
        status,
        message: status_message(status, &body),
    })
}
