// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Error types for Composer
//!
//! This module defines all error types used throughout the application.
//! Fragmented or malformed stream frames are not errors: the frame decoder
//! buffers or drops them and reports them through diagnostics only.

use thiserror::Error;

/// Main error type for Composer operations
#[derive(Error, Debug)]
pub enum ComposerError {
    /// Session creation failed; nothing is cached and the next call retries
    #[error("Session unavailable: {0}")]
    SessionUnavailable(String),

    /// The send call or the response stream failed at the network layer
    #[error("Transport failure: {0}")]
    TransportFailure(String),

    /// Other server endpoint errors
    #[error("API error: {0}")]
    Api(#[from] ApiError),

    /// Requested artifact version was never appended
    #[error("Version not found: {0}")]
    VersionNotFound(u64),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Server endpoint error types
#[derive(Error, Debug)]
pub enum ApiError {
    /// Network connectivity error
    #[error("Network error: {0}")]
    Network(String),

    /// Requested resource does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid response from the server
    #[error("Invalid API response: {0}")]
    InvalidResponse(String),

    /// Server returned an error
    #[error("API error ({status}): {message}")]
    ServerError { status: u16, message: String },
}

impl ComposerError {
    /// Whether retrying the same user action may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ComposerError::SessionUnavailable(_)
                | ComposerError::TransportFailure(_)
                | ComposerError::Api(ApiError::Network(_))
        )
    }
}

/// Result type alias for Composer operations
pub type Result<T> = std::result::Result<T, ComposerError>;
