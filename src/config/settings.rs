// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Settings management for Composer
//!
//! Handles loading and saving settings from ~/.composer/settings.json

use serde::{Deserialize, Serialize};

use crate::editor::EditorMode;
use crate::protocol::DEFAULT_MAX_PENDING_BYTES;

mod io;
mod validation;

pub use validation::BASE_URL_ENV;

/// Main settings structure, stored in ~/.composer/settings.json
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Settings {
    /// Composer server connection
    #[serde(default)]
    pub server: ServerConfig,

    /// Editing surface preferences
    #[serde(default)]
    pub editor: EditorConfig,

    /// Reply stream decoding limits
    #[serde(default)]
    pub stream: StreamConfig,
}

/// Server connection settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerConfig {
    /// Base URL of the Composer server
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Whole-request timeout; none means the stream may stay open indefinitely
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_timeout_secs: Option<u64>,

    /// Connection timeout
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout_secs: None,
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}

/// Editing surface settings
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct EditorConfig {
    /// Last used editor mode
    #[serde(default)]
    pub mode: EditorMode,
}

/// Reply stream settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StreamConfig {
    /// Largest fragment buffered while waiting for the rest of a frame
    #[serde(default = "default_max_pending_bytes")]
    pub max_pending_bytes: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            max_pending_bytes: default_max_pending_bytes(),
        }
    }
}

fn default_base_url() -> String {
    crate::api::http::DEFAULT_BASE_URL.to_string()
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_max_pending_bytes() -> usize {
    DEFAULT_MAX_PENDING_BYTES
}
