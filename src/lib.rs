// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Composer - co-edit a document or code artifact with an AI assistant.
//!
//! This crate exposes the client core used by the `composer` CLI
//! (`src/main.rs`) and by any other front end that hosts an editing surface.
//!
//! Architecture highlights:
//! - `protocol`: CRLF-delimited JSON frame decoding over arbitrary chunking
//! - `session`: lazy, single-flight session creation
//! - `chat`: transcript, editing context, stream dispatcher and send engine
//! - `artifact`: versioned artifact snapshots and the displayed-version pointer
//! - `api`: server operations, over HTTP or a scripted mock
//! - `history`: listing and restoring stored sessions
//! - `editor`: the editing-surface boundary

pub mod api;
pub mod artifact;
pub mod chat;
pub mod cli;
pub mod config;
pub mod editor;
pub mod error;
pub mod history;
pub mod protocol;
pub mod session;

pub use error::{ComposerError, Result};
