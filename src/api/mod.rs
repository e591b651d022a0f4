// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Composer server API
//!
//! Defines the wire records exchanged with the server and the `ComposerApi`
//! trait. `http` talks to a real server; `mock` is a scripted stand-in.

pub mod http;
pub mod mock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::chat::transcript::Role;
use crate::editor::EditorMode;
use crate::error::Result;
use crate::protocol::ByteStream;

pub use http::HttpComposerApi;
pub use mock::{MockComposerApi, MockReply};

/// Opaque server-issued session identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for SessionId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// A chat session record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    /// Generated by the server after the first message; empty until then
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl Session {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: SessionId::new(id),
            title: String::new(),
            created_at: None,
        }
    }

    /// Title for listings, falling back to the id for untitled sessions
    pub fn display_title(&self) -> &str {
        let title = self.title.trim();
        if title.is_empty() {
            self.id.as_str()
        } else {
            title
        }
    }
}

/// A message as the server stores it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredMessage {
    #[serde(default)]
    pub id: String,
    pub role: Role,
    #[serde(default)]
    pub content: String,
    /// Artifact attached to the message: the human's snapshot or the assistant's output
    #[serde(default)]
    pub doc: String,
    #[serde(default, rename = "selectedText")]
    pub selected_text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

/// Body of the send-message request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRequest {
    pub content: String,
    /// Full artifact content at the moment the message was submitted
    pub artifact: String,
    #[serde(rename = "selectedText")]
    pub selected_text: String,
    #[serde(rename = "isDocumentEditor")]
    pub is_document_editor: bool,
}

impl MessageRequest {
    pub fn new(
        content: impl Into<String>,
        artifact: impl Into<String>,
        selected_text: impl Into<String>,
        mode: EditorMode,
    ) -> Self {
        Self {
            content: content.into(),
            artifact: artifact.into(),
            selected_text: selected_text.into(),
            is_document_editor: mode.is_document(),
        }
    }

    pub fn editor_mode(&self) -> EditorMode {
        if self.is_document_editor {
            EditorMode::Document
        } else {
            EditorMode::Code
        }
    }
}

/// Server operations used by the core
#[async_trait]
pub trait ComposerApi: Send + Sync {
    /// Create a new session. Failures surface as `SessionUnavailable`.
    async fn create_session(&self) -> Result<Session>;

    /// All sessions, in the order the server returns them
    async fn list_sessions(&self) -> Result<Vec<Session>>;

    async fn get_session(&self, id: &SessionId) -> Result<Session>;

    async fn rename_session(&self, id: &SessionId, title: &str) -> Result<Session>;

    async fn delete_session(&self, id: &SessionId) -> Result<()>;

    /// Stored messages of a session, oldest first
    async fn list_messages(&self, id: &SessionId) -> Result<Vec<StoredMessage>>;

    /// Submit a message and return the reply byte stream.
    /// Failures surface as `TransportFailure`.
    async fn send_message(&self, id: &SessionId, request: &MessageRequest) -> Result<ByteStream>;

    /// Whether the server reports itself healthy
    async fn health(&self) -> Result<bool>;
}
