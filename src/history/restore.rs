// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Rebuilding an editing context from stored messages

use crate::api::StoredMessage;
use crate::chat::context::EditingContext;
use crate::chat::transcript::{ChatTurn, Role};
use crate::editor::EditorMode;

/// Rebuild transcript and versions from a session's stored messages.
///
/// Every human message carried a snapshot when it was sent, so it always
/// yields a version, even an empty one. Assistant messages yield a version
/// only when they produced an artifact. The live artifact ends up at the
/// latest version.
pub fn restore_context(messages: &[StoredMessage], editor_mode: EditorMode) -> EditingContext {
    let mut ctx = EditingContext::new(editor_mode);

    for message in messages {
        match message.role {
            Role::Human => {
                ctx.versions.append(message.doc.clone(), Role::Human);
                ctx.transcript.append(ChatTurn::human(message.content.clone()));
            }
            Role::Assistant => {
                if !message.doc.is_empty() {
                    ctx.versions.append(message.doc.clone(), Role::Assistant);
                }
                if !message.content.is_empty() {
                    ctx.transcript.append(ChatTurn::assistant(message.content.clone()));
                }
            }
        }
    }

    if let Some(latest) = ctx.versions.latest() {
        let content = latest.content.clone();
        ctx.set_artifact(content);
    }

    tracing::debug!(
        target: "composer.session",
        turns = ctx.transcript.len(),
        versions = ctx.versions.len(),
        "restored editing context"
    );
    ctx
}
