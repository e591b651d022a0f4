// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Session-scoped editing state
//!
//! One `EditingContext` exists per editing surface. It is created empty when
//! the editing session starts and dropped when it ends; nothing in it is
//! shared with other sessions.

use crate::artifact::{ArtifactVersionStore, VersionSelection};
use crate::chat::transcript::TranscriptLog;
use crate::editor::{EditorMode, SurfaceChange};
use crate::error::Result;

/// Everything the dispatcher and engine mutate for one editing session
#[derive(Debug, Clone, Default)]
pub struct EditingContext {
    /// Chat turns, human and assistant
    pub transcript: TranscriptLog,
    /// Artifact snapshots and the displayed-version pointer
    pub versions: ArtifactVersionStore,
    /// Content currently shown in the editing surface (may hold unsaved user edits)
    artifact: String,
    /// Last selection reported by the editing surface
    selected_text: String,
    editor_mode: EditorMode,
}

impl EditingContext {
    pub fn new(editor_mode: EditorMode) -> Self {
        Self {
            editor_mode,
            ..Self::default()
        }
    }

    /// Start from an existing artifact, e.g. a file opened for editing
    pub fn with_artifact(editor_mode: EditorMode, artifact: impl Into<String>) -> Self {
        Self {
            artifact: artifact.into(),
            editor_mode,
            ..Self::default()
        }
    }

    pub fn artifact(&self) -> &str {
        &self.artifact
    }

    pub fn set_artifact(&mut self, content: impl Into<String>) {
        self.artifact = content.into();
    }

    pub fn selected_text(&self) -> &str {
        &self.selected_text
    }

    pub fn editor_mode(&self) -> EditorMode {
        self.editor_mode
    }

    pub fn set_editor_mode(&mut self, mode: EditorMode) {
        self.editor_mode = mode;
    }

    /// Apply a notification from the editing surface
    pub fn apply_surface_change(&mut self, change: SurfaceChange) {
        match change {
            SurfaceChange::Edited(content) => self.artifact = content,
            SurfaceChange::Selected(text) => self.selected_text = text,
        }
    }

    /// Display another version; the store itself is left untouched
    pub fn select_version(&mut self, selection: VersionSelection) -> Result<&str> {
        let content = self.versions.select(selection)?.to_string();
        self.artifact = content;
        Ok(&self.artifact)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::VersionId;
    use crate::chat::transcript::Role;

    #[test]
    fn test_new_context_is_empty() {
        let ctx = EditingContext::new(EditorMode::Code);
        assert!(ctx.transcript.is_empty());
        assert!(ctx.versions.is_empty());
        assert_eq!(ctx.artifact(), "");
        assert_eq!(ctx.editor_mode(), EditorMode::Code);
    }

    #[test]
    fn test_surface_changes() {
        let mut ctx = EditingContext::with_artifact(EditorMode::Document, "<p>a</p>");
        ctx.apply_surface_change(SurfaceChange::Edited("<p>b</p>".to_string()));
        ctx.apply_surface_change(SurfaceChange::Selected("b".to_string()));
        assert_eq!(ctx.artifact(), "<p>b</p>");
        assert_eq!(ctx.selected_text(), "b");
    }

    #[test]
    fn test_select_version_updates_display_only() {
        let mut ctx = EditingContext::new(EditorMode::Document);
        ctx.versions.append("one", Role::Human);
        ctx.versions.append("two", Role::Assistant);
        ctx.set_artifact("two");

        assert_eq!(
            ctx.select_version(VersionSelection::Pinned(VersionId::new(1))).unwrap(),
            "one"
        );
        assert_eq!(ctx.versions.len(), 2);
        assert_eq!(ctx.select_version(VersionSelection::Latest).unwrap(), "two");
    }

    #[test]
    fn test_select_unknown_version_keeps_artifact() {
        let mut ctx = EditingContext::with_artifact(EditorMode::Document, "draft");
        assert!(ctx
            .select_version(VersionSelection::Pinned(VersionId::new(9)))
            .is_err());
        assert_eq!(ctx.artifact(), "draft");
    }
}
