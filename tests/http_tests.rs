// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

use std::sync::Arc;

use composer::api::{ComposerApi, HttpComposerApi, SessionId};
use composer::artifact::{VersionId, VersionSelection};
use composer::chat::{ChatTurn, ComposerEngine, EditingContext, Role};
use composer::config::ServerConfig;
use composer::editor::EditorMode;
use composer::error::ComposerError;
use composer::history::SessionHistory;
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn mount_create_session(server: &MockServer, id: &str) {
    Mock::given(method("POST"))
        .and(path("/api/chat-sessions"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": id, "title": ""})))
        .expect(1)
        .mount(server)
        .await;
}

fn api_for(server: &MockServer) -> Arc<dyn ComposerApi> {
    let config = ServerConfig {
        base_url: server.uri(),
        ..ServerConfig::default()
    };
    Arc::new(HttpComposerApi::from_config(&config).unwrap())
}

#[tokio::test]
async fn test_send_over_http() {
    let server = MockServer::start().await;
    mount_create_session(&server, "abc").await;

    let reply = "{\"message\":\"Tightened the intro.\"}\r\n{\"artifact\":\"<p>Short.</p>\"}\r\n";
    Mock::given(method("POST"))
        .and(path("/api/chat-sessions/abc/messages"))
        .and(body_partial_json(json!({
            "content": "make it shorter",
            "artifact": "<p>A long intro.</p>",
            "isDocumentEditor": true
        })))
        .respond_with(ResponseTemplate::new(200).set_body_string(reply))
        .expect(2)
        .mount(&server)
        .await;

    let engine = ComposerEngine::with_context(
        api_for(&server),
        EditingContext::with_artifact(EditorMode::Document, "<p>A long intro.</p>"),
    );

    let report = engine.send_message("make it shorter", None).await.unwrap();
    assert_eq!(report.session_id, Some(SessionId::new("abc")));
    assert_eq!(report.versions_appended.len(), 1);
    assert_eq!(engine.artifact().await, "<p>Short.</p>");
    assert_eq!(
        engine.transcript().await,
        vec![
            ChatTurn::human("make it shorter"),
            ChatTurn::assistant("Tightened the intro.")
        ]
    );

    // A second send reuses the session; create is expected once.
    engine
        .select_version(VersionSelection::Pinned(VersionId::new(1)))
        .await
        .unwrap();
    engine.send_message("make it shorter", None).await.unwrap();
}

#[tokio::test]
async fn test_server_error_on_send_commits_nothing() {
    let server = MockServer::start().await;
    mount_create_session(&server, "abc").await;
    Mock::given(method("POST"))
        .and(path("/api/chat-sessions/abc/messages"))
        .respond_with(ResponseTemplate::new(502).set_body_string("upstream model unavailable"))
        .mount(&server)
        .await;

    let engine = ComposerEngine::new(api_for(&server), EditorMode::Code);
    let err = engine.send_message("hello", None).await.unwrap_err();

    assert!(matches!(err, ComposerError::TransportFailure(_)));
    assert!(err.to_string().contains("upstream model unavailable"));
    assert!(engine.transcript().await.is_empty());
    assert!(engine.versions().await.is_empty());
}

#[tokio::test]
async fn test_restore_stored_session() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/chat-sessions/s9"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "s9",
            "title": "Launch post",
            "created_at": "2024-11-02T10:00:00Z"
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/chat-sessions/s9/messages"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": "1", "role": "human", "content": "draft a post", "doc": "", "selectedText": ""},
            {"id": "2", "role": "ai", "content": "Here is a draft", "doc": "<p>Draft</p>"},
            {"id": "3", "role": "human", "content": "more upbeat", "doc": "<p>Draft!</p>", "selectedText": "Draft"}
        ])))
        .mount(&server)
        .await;

    let history = SessionHistory::new(api_for(&server));
    let session = history.get(&SessionId::new("s9")).await.unwrap();
    assert_eq!(session.display_title(), "Launch post");

    let ctx = history
        .restore(&SessionId::new("s9"), EditorMode::Document)
        .await
        .unwrap();
    let roles: Vec<Role> = ctx.transcript.all().iter().map(|t| t.role).collect();
    assert_eq!(roles, vec![Role::Human, Role::Assistant, Role::Human]);
    assert_eq!(ctx.versions.len(), 3);
    assert_eq!(ctx.artifact(), "<p>Draft!</p>");
}

#[tokio::test]
async fn test_empty_history_is_null() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/chat-sessions"))
        .respond_with(ResponseTemplate::new(200).set_body_string("null"))
        .mount(&server)
        .await;

    let history = SessionHistory::new(api_for(&server));
    assert!(history.list().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_health() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/healthz"))
        .respond_with(ResponseTemplate::new(200).set_body_string("OK"))
        .mount(&server)
        .await;

    assert!(api_for(&server).health().await.unwrap());
}
