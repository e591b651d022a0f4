// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! HTTP client for the Composer server
//!
//! Implements `ComposerApi` over the server's JSON endpoints. The reply to a
//! message is returned as a raw byte stream for the frame decoder.

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;

use crate::api::{ComposerApi, MessageRequest, Session, SessionId, StoredMessage};
use crate::config::ServerConfig;
use crate::error::{ApiError, ComposerError, Result};
use crate::protocol::ByteStream;

/// Default server address
pub const DEFAULT_BASE_URL: &str = "http://localhost:9081";

/// `ComposerApi` over HTTP
#[derive(Debug, Clone)]
pub struct HttpComposerApi {
    client: Client,
    base_url: String,
}

impl HttpComposerApi {
    /// Create a client for the default base URL
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    /// Create a client for a custom base URL
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: normalize_base_url(base_url.into()),
        }
    }

    /// Create a client from settings, applying the configured timeouts
    pub fn from_config(config: &ServerConfig) -> Result<Self> {
        let mut builder =
            Client::builder().connect_timeout(Duration::from_secs(config.connect_timeout_secs));
        if let Some(secs) = config.request_timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = builder
            .build()
            .map_err(|e| ComposerError::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: normalize_base_url(config.base_url.clone()),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn session_url(&self, id: &SessionId) -> String {
        self.url(&format!("/api/chat-sessions/{}", id))
    }

    /// Turn a non-success response into an error
    async fn check_status(response: Response, what: &str) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let code = status.as_u16();
        let body = response.text().await.unwrap_or_default();
        if code == 404 {
            return Err(ComposerError::Api(ApiError::NotFound(what.to_string())));
        }
        Err(ComposerError::Api(ApiError::ServerError {
            status: code,
            message: if body.trim().is_empty() {
                format!("{} failed", what)
            } else {
                body
            },
        }))
    }

    async fn parse_json<T: DeserializeOwned>(response: Response) -> Result<T> {
        let body = response.text().await.map_err(network_error)?;
        serde_json::from_str(&body).map_err(|e| {
            ComposerError::Api(ApiError::InvalidResponse(format!("{}: {}", e, body)))
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str, what: &str) -> Result<T> {
        let response = self.client.get(url).send().await.map_err(network_error)?;
        let response = Self::check_status(response, what).await?;
        Self::parse_json(response).await
    }

    async fn put_json<B: Serialize + Sync, T: DeserializeOwned>(
        &self,
        url: &str,
        body: &B,
        what: &str,
    ) -> Result<T> {
        let response = self
            .client
            .put(url)
            .json(body)
            .send()
            .await
            .map_err(network_error)?;
        let response = Self::check_status(response, what).await?;
        Self::parse_json(response).await
    }
}

impl Default for HttpComposerApi {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ComposerApi for HttpComposerApi {
    async fn create_session(&self) -> Result<Session> {
        let url = self.url("/api/chat-sessions");
        let response = self
            .client
            .post(&url)
            .send()
            .await
            .map_err(|e| ComposerError::SessionUnavailable(describe_reqwest_error(&e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ComposerError::SessionUnavailable(format!(
                "server returned {}: {}",
                status.as_u16(),
                body.trim()
            )));
        }

        Self::parse_json(response)
            .await
            .map_err(|e| ComposerError::SessionUnavailable(e.to_string()))
    }

    async fn list_sessions(&self) -> Result<Vec<Session>> {
        // The server encodes an empty list as `null`.
        let sessions: Option<Vec<Session>> = self
            .get_json(&self.url("/api/chat-sessions"), "list sessions")
            .await?;
        Ok(sessions.unwrap_or_default())
    }

    async fn get_session(&self, id: &SessionId) -> Result<Session> {
        self.get_json(&self.session_url(id), &format!("session {}", id))
            .await
    }

    async fn rename_session(&self, id: &SessionId, title: &str) -> Result<Session> {
        let body = serde_json::json!({ "title": title });
        self.put_json(&self.session_url(id), &body, &format!("session {}", id))
            .await
    }

    async fn delete_session(&self, id: &SessionId) -> Result<()> {
        let response = self
            .client
            .delete(self.session_url(id))
            .send()
            .await
            .map_err(network_error)?;
        Self::check_status(response, &format!("session {}", id)).await?;
        Ok(())
    }

    async fn list_messages(&self, id: &SessionId) -> Result<Vec<StoredMessage>> {
        let url = format!("{}/messages", self.session_url(id));
        let messages: Option<Vec<StoredMessage>> = self
            .get_json(&url, &format!("messages of session {}", id))
            .await?;
        Ok(messages.unwrap_or_default())
    }

    async fn send_message(&self, id: &SessionId, request: &MessageRequest) -> Result<ByteStream> {
        let url = format!("{}/messages", self.session_url(id));
        let response = self
            .client
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|e| ComposerError::TransportFailure(describe_reqwest_error(&e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ComposerError::TransportFailure(format!(
                "server returned {}: {}",
                status.as_u16(),
                body.trim()
            )));
        }

        let bytes = response.bytes_stream().map(|chunk| {
            chunk
                .map(|bytes| bytes.to_vec())
                .map_err(|e| ComposerError::TransportFailure(describe_reqwest_error(&e)))
        });
        Ok(Box::pin(bytes))
    }

    async fn health(&self) -> Result<bool> {
        let url = self.url("/api/v1/healthz");
        match self.client.get(&url).send().await {
            Ok(response) => Ok(response.status().is_success()),
            Err(e) if e.is_connect() => Ok(false),
            Err(e) => Err(network_error(e)),
        }
    }
}

fn normalize_base_url(base_url: String) -> String {
    base_url.trim_end_matches('/').to_string()
}

fn describe_reqwest_error(e: &reqwest::Error) -> String {
    if e.is_connect() {
        format!("could not connect to server: {}", e)
    } else if e.is_timeout() {
        format!("request timed out: {}", e)
    } else {
        e.to_string()
    }
}

fn network_error(e: reqwest::Error) -> ComposerError {
    ComposerError::Api(ApiError::Network(describe_reqwest_error(&e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::editor::EditorMode;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_normalize_base_url() {
        let api = HttpComposerApi::with_base_url("http://host:9081/");
        assert_eq!(api.base_url(), "http://host:9081");
        assert_eq!(HttpComposerApi::new().base_url(), DEFAULT_BASE_URL);
    }

    #[tokio::test]
    async fn test_create_session() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat-sessions"))
            .respond_with(
                ResponseTemplate::new(201).set_body_json(serde_json::json!({"id": "s1", "title": ""})),
            )
            .mount(&server)
            .await;

        let api = HttpComposerApi::with_base_url(server.uri());
        let session = api.create_session().await.unwrap();
        assert_eq!(session.id.as_str(), "s1");
    }

    #[tokio::test]
    async fn test_create_session_failure_is_session_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat-sessions"))
            .respond_with(ResponseTemplate::new(500).set_body_string("db down"))
            .mount(&server)
            .await;

        let api = HttpComposerApi::with_base_url(server.uri());
        let err = api.create_session().await.unwrap_err();
        assert!(matches!(err, ComposerError::SessionUnavailable(_)));
        assert!(err.to_string().contains("db down"));
    }

    #[tokio::test]
    async fn test_list_sessions_null_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/chat-sessions"))
            .respond_with(ResponseTemplate::new(200).set_body_string("null"))
            .mount(&server)
            .await;

        let api = HttpComposerApi::with_base_url(server.uri());
        assert!(api.list_sessions().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_get_session_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/chat-sessions/missing"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let api = HttpComposerApi::with_base_url(server.uri());
        let err = api.get_session(&SessionId::new("missing")).await.unwrap_err();
        assert!(matches!(err, ComposerError::Api(ApiError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_send_message_posts_wire_body() {
        let server = MockServer::start().await;
        let request = MessageRequest::new("hello", "<p>x</p>", "", EditorMode::Document);
        Mock::given(method("POST"))
            .and(path("/api/chat-sessions/s1/messages"))
            .and(body_json(serde_json::to_value(&request).unwrap()))
            .respond_with(ResponseTemplate::new(200).set_body_string("{\"message\":\"hi\"}\r\n"))
            .mount(&server)
            .await;

        let api = HttpComposerApi::with_base_url(server.uri());
        let stream = api
            .send_message(&SessionId::new("s1"), &request)
            .await
            .unwrap();
        let chunks: Vec<Vec<u8>> = stream.map(|chunk| chunk.unwrap()).collect().await;
        assert_eq!(chunks.concat(), b"{\"message\":\"hi\"}\r\n".to_vec());
    }

    #[tokio::test]
    async fn test_send_message_failure_is_transport_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat-sessions/s1/messages"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;

        let api = HttpComposerApi::with_base_url(server.uri());
        let request = MessageRequest::new("hello", "", "", EditorMode::Code);
        let err = match api.send_message(&SessionId::new("s1"), &request).await {
            Err(e) => e,
            Ok(_) => panic!("expected send to fail"),
        };
        assert!(matches!(err, ComposerError::TransportFailure(_)));
    }

    #[tokio::test]
    async fn test_rename_and_delete_session() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/api/chat-sessions/s1"))
            .and(body_json(serde_json::json!({"title": "Plan"})))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": "s1", "title": "Plan"})),
            )
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/api/chat-sessions/s1"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        let api = HttpComposerApi::with_base_url(server.uri());
        let id = SessionId::new("s1");
        assert_eq!(api.rename_session(&id, "Plan").await.unwrap().title, "Plan");
        api.delete_session(&id).await.unwrap();
    }

    #[tokio::test]
    async fn test_list_messages() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/chat-sessions/s1/messages"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"id": "1", "role": "human", "content": "write", "doc": "", "selectedText": ""},
                {"id": "2", "role": "ai", "content": "done", "doc": "<p>x</p>", "selectedText": ""}
            ])))
            .mount(&server)
            .await;

        let api = HttpComposerApi::with_base_url(server.uri());
        let messages = api.list_messages(&SessionId::new("s1")).await.unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].doc, "<p>x</p>");
    }

    #[tokio::test]
    async fn test_health() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/healthz"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"Result": true})))
            .mount(&server)
            .await;

        let api = HttpComposerApi::with_base_url(server.uri());
        assert!(api.health().await.unwrap());
    }
}
