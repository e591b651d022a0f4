// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Artifact version store
//!
//! A single linear log of immutable artifact snapshots. Identifiers start at 1
//! and grow by exactly one per append; version 0 stands for "no artifact yet".
//! Selecting an older version changes only what is displayed, never the log.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::chat::transcript::Role;
use crate::error::{ComposerError, Result};

/// Identifier of an artifact version
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VersionId(u64);

impl VersionId {
    /// The implicit empty version that exists before any append
    pub const EMPTY: VersionId = VersionId(0);

    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn get(self) -> u64 {
        self.0
    }

    fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for VersionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An immutable snapshot of the artifact
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactVersion {
    pub version: VersionId,
    pub created_by: Role,
    pub content: String,
}

/// Which version is displayed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VersionSelection {
    /// Follow the most recent append
    #[default]
    Latest,
    /// Frozen on one version until re-selected
    Pinned(VersionId),
}

impl FromStr for VersionSelection {
    type Err = ComposerError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("latest") {
            return Ok(VersionSelection::Latest);
        }
        s.parse::<u64>()
            .map(|id| VersionSelection::Pinned(VersionId(id)))
            .map_err(|_| {
                ComposerError::InvalidInput(format!(
                    "expected a version number or 'latest', got '{}'",
                    s
                ))
            })
    }
}

impl fmt::Display for VersionSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VersionSelection::Latest => write!(f, "latest"),
            VersionSelection::Pinned(id) => write!(f, "{}", id),
        }
    }
}

/// Append-only store of artifact versions plus the displayed-version pointer
#[derive(Debug, Clone, Default)]
pub struct ArtifactVersionStore {
    versions: Vec<ArtifactVersion>,
    selection: VersionSelection,
}

impl ArtifactVersionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a snapshot and return its identifier (one above the highest so far)
    pub fn append(&mut self, content: impl Into<String>, created_by: Role) -> VersionId {
        let version = self.latest_id().next();
        self.versions.push(ArtifactVersion {
            version,
            created_by,
            content: content.into(),
        });
        version
    }

    /// Identifier of the newest version, `VersionId::EMPTY` when nothing was appended
    pub fn latest_id(&self) -> VersionId {
        self.versions
            .last()
            .map(|v| v.version)
            .unwrap_or(VersionId::EMPTY)
    }

    pub fn latest(&self) -> Option<&ArtifactVersion> {
        self.versions.last()
    }

    pub fn get(&self, id: VersionId) -> Option<&ArtifactVersion> {
        self.versions
            .binary_search_by_key(&id, |v| v.version)
            .ok()
            .map(|idx| &self.versions[idx])
    }

    /// Move the displayed-version pointer and return the displayed content
    pub fn select(&mut self, selection: VersionSelection) -> Result<&str> {
        if let VersionSelection::Pinned(id) = selection {
            if id != VersionId::EMPTY && self.get(id).is_none() {
                return Err(ComposerError::VersionNotFound(id.get()));
            }
        }
        self.selection = selection;
        Ok(self.current())
    }

    pub fn selection(&self) -> VersionSelection {
        self.selection
    }

    /// Content of the selected version (empty for version 0)
    pub fn current(&self) -> &str {
        let version = match self.selection {
            VersionSelection::Latest => self.latest(),
            VersionSelection::Pinned(id) => self.get(id),
        };
        version.map(|v| v.content.as_str()).unwrap_or("")
    }

    /// Identifier of the selected version
    pub fn current_id(&self) -> VersionId {
        match self.selection {
            VersionSelection::Latest => self.latest_id(),
            VersionSelection::Pinned(id) => id,
        }
    }

    pub fn versions(&self) -> &[ArtifactVersion] {
        &self.versions
    }

    pub fn len(&self) -> usize {
        self.versions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }

    /// Human-readable label, e.g. `latest (assistant)` or `Version 2 (human)`
    pub fn label(&self, id: VersionId) -> Option<String> {
        let version = self.get(id)?;
        let name = if id == self.latest_id() {
            "latest".to_string()
        } else {
            format!("Version {}", id)
        };
        Some(format!("{} ({})", name, version.created_by))
    }
}
