use mail_agent_api::{
    ContextEntry, ContextFetch, MailAgentClient, MailAgentConfig, MailAgentError,
    DEFAULT_SYNC_MAX_FETCH,
};
use scripted_http::{response_json, ScriptedResponse, ScriptedServer};
use serde_json::json;

fn client_for(server: &ScriptedServer) -> MailAgentClient {
    MailAgentClient::new(MailAgentConfig::new(server.base_url.clone()))
        .expect("client should build")
}

#[tokio::test]
async fn sync_emails_posts_max_fetch_with_bearer_token() {
    let server = ScriptedServer::builder()
        .route("POST", "/api/sync-emails", response_json(200, r#"{"status":"ok"}"#))
        .start()
        .await;

    client_for(&server)
        .sync_emails("t1", DEFAULT_SYNC_MAX_FETCH)
        .await
        .expect("sync should succeed");

    let requests = server.requests_to("POST", "/api/sync-emails");
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].header("authorization"), Some("Bearer t1"));
    assert_eq!(requests[0].body_json(), Some(json!({"max_fetch": 50})));
}

#[tokio::test]
async fn sync_emails_reports_non_success_status() {
    let server = ScriptedServer::builder()
        .route(
            "POST",
            "/api/sync-emails",
            response_json(401, r#"{"detail":"invalid token"}"#),
        )
        .start()
        .await;

    let error = client_for(&server)
        .sync_emails("t1", 50)
        .await
        .expect_err("401 must be an error");

    assert_eq!(error.status().map(|status| status.as_u16()), Some(401));
    assert!(error.to_string().contains("invalid token"));
}

#[tokio::test]
async fn clear_context_posts_without_body() {
    let server = ScriptedServer::builder()
        .route("POST", "/api/context/clear", response_json(200, "{}"))
        .start()
        .await;

    client_for(&server)
        .clear_context("t1")
        .await
        .expect("clear should succeed");

    let requests = server.requests_to("POST", "/api/context/clear");
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].header("authorization"), Some("Bearer t1"));
    assert!(requests[0].body.is_empty());
}

#[tokio::test]
async fn fetch_context_returns_entries() {
    let server = ScriptedServer::builder()
        .route(
            "GET",
            "/api/context",
            response_json(
                200,
                r#"{"context":[{"role":"user","content":"hi"},{"role":"assistant","content":{"k":1}},"junk"]}"#,
            ),
        )
        .start()
        .await;

    let fetched = client_for(&server)
        .fetch_context("t1")
        .await
        .expect("fetch should succeed");

    let ContextFetch::Entries(entries) = fetched else {
        panic!("expected entries, got {fetched:?}");
    };
    assert_eq!(entries.len(), 3);
    assert_eq!(entries[0], ContextEntry::new("user", "hi"));
    assert_eq!(entries[1].content, json!({"k": 1}));
    assert!(entries[2].role.is_null());
}

#[tokio::test]
async fn fetch_context_degrades_to_empty_on_server_error() {
    let server = ScriptedServer::builder()
        .route("GET", "/api/context", response_json(500, r#"{"detail":"boom"}"#))
        .start()
        .await;

    let fetched = client_for(&server)
        .fetch_context("t1")
        .await
        .expect("non-success status is not an error");

    assert_eq!(fetched, ContextFetch::Unavailable { status: 500 });
    assert!(fetched.into_entries().is_empty());
}

#[tokio::test]
async fn fetch_context_missing_field_is_empty() {
    let server = ScriptedServer::builder()
        .route("GET", "/api/context", response_json(200, "{}"))
        .start()
        .await;

    let fetched = client_for(&server)
        .fetch_context("t1")
        .await
        .expect("fetch should succeed");
    assert_eq!(fetched, ContextFetch::Entries(Vec::new()));
}

#[tokio::test]
async fn fetch_context_rejects_malformed_body() {
    let server = ScriptedServer::builder()
        .route("GET", "/api/context", response_json(200, "not json"))
        .start()
        .await;

    let error = client_for(&server)
        .fetch_context("t1")
        .await
        .expect_err("malformed body must fail");
    assert!(matches!(error, MailAgentError::MalformedBody { .. }));
}

#[tokio::test]
async fn dropped_connection_is_a_request_error() {
    let server = ScriptedServer::builder()
        .route("GET", "/api/context", ScriptedResponse::Reset)
        .start()
        .await;

    let error = client_for(&server)
        .fetch_context("t1")
        .await
        .expect_err("reset must fail");
    assert!(matches!(error, MailAgentError::Request { .. }));
}

#[tokio::test]
async fn blank_access_token_is_rejected_before_any_request() {
    let server = ScriptedServer::builder().start().await;

    let error = client_for(&server)
        .clear_context("  ")
        .await
        .expect_err("blank token must fail");
    assert!(matches!(error, MailAgentError::MissingAccessToken));
    assert!(server.requests().is_empty());
}
