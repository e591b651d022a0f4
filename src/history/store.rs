// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Server-backed session history

use std::sync::Arc;

use crate::api::{ComposerApi, Session, SessionId};
use crate::chat::context::EditingContext;
use crate::chat::engine::ComposerEngine;
use crate::editor::EditorMode;
use crate::error::{ComposerError, Result};

use super::restore::restore_context;

/// Browse, restore and maintain sessions stored on the server
pub struct SessionHistory {
    api: Arc<dyn ComposerApi>,
}

impl SessionHistory {
    pub fn new(api: Arc<dyn ComposerApi>) -> Self {
        Self { api }
    }

    /// All stored sessions, newest first when timestamps are known
    pub async fn list(&self) -> Result<Vec<Session>> {
        let mut sessions = self.api.list_sessions().await?;
        sessions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(sessions)
    }

    pub async fn get(&self, id: &SessionId) -> Result<Session> {
        self.api.get_session(id).await
    }

    /// Rebuild the editing context of a stored session
    pub async fn restore(&self, id: &SessionId, editor_mode: EditorMode) -> Result<EditingContext> {
        let messages = self.api.list_messages(id).await?;
        tracing::info!(target: "composer.session", id = %id, messages = messages.len(), "restoring session");
        Ok(restore_context(&messages, editor_mode))
    }

    /// Restore a stored session into an engine bound to it, ready for new sends
    pub async fn resume(&self, id: &SessionId, editor_mode: EditorMode) -> Result<ComposerEngine> {
        let session = self.api.get_session(id).await?;
        let context = self.restore(id, editor_mode).await?;
        ComposerEngine::resume(self.api.clone(), session, context)
    }

    pub async fn rename(&self, id: &SessionId, title: &str) -> Result<Session> {
        let title = title.trim();
        if title.is_empty() {
            return Err(ComposerError::InvalidInput("session title is empty".to_string()));
        }
        self.api.rename_session(id, title).await
    }

    pub async fn delete(&self, id: &SessionId) -> Result<()> {
        self.api.delete_session(id).await?;
        tracing::info!(target: "composer.session", id = %id, "session deleted");
        Ok(())
    }
}
