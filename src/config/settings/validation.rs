// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

use crate::error::{ComposerError, Result};

use super::Settings;

/// Environment variable that overrides the configured server URL.
pub const BASE_URL_ENV: &str = "COMPOSER_BASE_URL";

impl Settings {
    /// Get the server base URL, checking env var first.
    pub fn base_url(&self) -> String {
        // Priority: env var > config file.
        std::env::var(BASE_URL_ENV)
            .ok()
            .filter(|url| !url.trim().is_empty())
            .unwrap_or_else(|| self.server.base_url.clone())
    }

    /// Apply environment overrides in place.
    pub fn apply_env_overrides(&mut self) {
        self.server.base_url = self.base_url();
    }

    /// Reject settings the client cannot run with.
    pub fn validate(&self) -> Result<()> {
        let url = self.server.base_url.trim();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ComposerError::Config(format!(
                "server.base_url must start with http:// or https://, got '{}'",
                self.server.base_url
            )));
        }
        if self.server.connect_timeout_secs == 0 {
            return Err(ComposerError::Config(
                "server.connect_timeout_secs must be greater than zero".to_string(),
            ));
        }
        if self.server.request_timeout_secs == Some(0) {
            return Err(ComposerError::Config(
                "server.request_timeout_secs must be greater than zero".to_string(),
            ));
        }
        if self.stream.max_pending_bytes == 0 {
            return Err(ComposerError::Config(
                "stream.max_pending_bytes must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}
