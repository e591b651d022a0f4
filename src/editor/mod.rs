// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Editing surface boundary
//!
//! The rich-text and code editors are opaque components. The core only needs
//! to read and replace their full content, read the current selection, and
//! hear about edits and selections as they happen.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{ComposerError, Result};

/// Which editing surface is active
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EditorMode {
    /// Rich-text document (the assistant produces HTML)
    #[default]
    Document,
    /// Code editor (the assistant produces Markdown)
    Code,
}

impl EditorMode {
    pub fn is_document(self) -> bool {
        self == EditorMode::Document
    }

    pub fn toggle(self) -> Self {
        match self {
            EditorMode::Document => EditorMode::Code,
            EditorMode::Code => EditorMode::Document,
        }
    }
}

impl fmt::Display for EditorMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EditorMode::Document => write!(f, "document"),
            EditorMode::Code => write!(f, "code"),
        }
    }
}

impl FromStr for EditorMode {
    type Err = ComposerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "document" | "doc" => Ok(EditorMode::Document),
            "code" => Ok(EditorMode::Code),
            other => Err(ComposerError::InvalidInput(format!(
                "unknown editor mode '{}', expected 'document' or 'code'",
                other
            ))),
        }
    }
}

/// Notification from an editing surface
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SurfaceChange {
    /// The user changed the content; carries the full new content
    Edited(String),
    /// The user selected text
    Selected(String),
}

/// An editing surface the core can drive
pub trait EditingSurface {
    /// Full current content
    fn content(&self) -> String;

    /// Replace the full content
    fn set_content(&mut self, content: &str) -> Result<()>;

    /// Currently selected text, empty when nothing is selected
    fn selection(&self) -> String;

    /// Drain change notifications accumulated since the last call
    fn take_changes(&mut self) -> Vec<SurfaceChange>;
}

/// In-memory surface, useful for embedding and tests
#[derive(Debug, Clone, Default)]
pub struct BufferSurface {
    content: String,
    selection: String,
    changes: Vec<SurfaceChange>,
}

impl BufferSurface {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Self::default()
        }
    }

    /// Simulate a user edit
    pub fn edit(&mut self, content: impl Into<String>) {
        self.content = content.into();
        self.changes.push(SurfaceChange::Edited(self.content.clone()));
    }

    /// Simulate a user selection
    pub fn select(&mut self, text: impl Into<String>) {
        self.selection = text.into();
        self.changes.push(SurfaceChange::Selected(self.selection.clone()));
    }
}

impl EditingSurface for BufferSurface {
    fn content(&self) -> String {
        self.content.clone()
    }

    fn set_content(&mut self, content: &str) -> Result<()> {
        // Programmatic replacement is not a user edit.
        self.content = content.to_string();
        Ok(())
    }

    fn selection(&self) -> String {
        self.selection.clone()
    }

    fn take_changes(&mut self) -> Vec<SurfaceChange> {
        std::mem::take(&mut self.changes)
    }
}

/// Surface backed by a file on disk; edits made by other programs are
/// picked up by [`FileSurface::refresh`]
#[derive(Debug, Clone)]
pub struct FileSurface {
    path: PathBuf,
    content: String,
    selection: String,
    changes: Vec<SurfaceChange>,
}

impl FileSurface {
    /// Open a file; a missing file starts out empty
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let content = if path.exists() {
            std::fs::read_to_string(&path)?
        } else {
            String::new()
        };
        Ok(Self {
            path,
            content,
            selection: String::new(),
            changes: Vec::new(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Re-read the file and record an edit if it changed
    pub fn refresh(&mut self) -> Result<bool> {
        let on_disk = if self.path.exists() {
            std::fs::read_to_string(&self.path)?
        } else {
            String::new()
        };
        if on_disk == self.content {
            return Ok(false);
        }
        self.content = on_disk;
        self.changes.push(SurfaceChange::Edited(self.content.clone()));
        Ok(true)
    }

    /// Record a selection made outside the file (e.g. passed on the command line)
    pub fn select(&mut self, text: impl Into<String>) {
        self.selection = text.into();
        self.changes.push(SurfaceChange::Selected(self.selection.clone()));
    }
}

impl EditingSurface for FileSurface {
    fn content(&self) -> String {
        self.content.clone()
    }

    fn set_content(&mut self, content: &str) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(&self.path, content)?;
        self.content = content.to_string();
        Ok(())
    }

    fn selection(&self) -> String {
        self.selection.clone()
    }

    fn take_changes(&mut self) -> Vec<SurfaceChange> {
        std::mem::take(&mut self.changes)
    }
}
