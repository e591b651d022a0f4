// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Chat and artifact state for one editing session
//!
//! This module provides the transcript, the session-scoped editing context,
//! the dispatcher applying reply frames to it, and the engine driving sends.

pub mod context;
pub mod dispatcher;
pub mod engine;
pub mod input_parser;
pub mod transcript;

pub use context::EditingContext;
pub use dispatcher::{ComposerEvent, DispatchOutcome, StreamDispatcher};
pub use engine::{CancellationSignal, ComposerEngine, SendReport};
pub use input_parser::{ReplInput, REPL_HELP};
pub use transcript::{ChatTurn, Role, TranscriptLog};
