// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Input parsing for the interactive editing loop
//!
//! Lines starting with ':' are commands; everything else is a chat message.
//! Parsing is pure so the loop itself stays thin.

use crate::artifact::VersionSelection;
use crate::editor::EditorMode;

/// One line of user input, classified
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplInput {
    /// Blank line
    Empty,
    /// Chat message to send
    Message(String),
    /// List artifact versions
    Versions,
    /// Show the transcript
    Transcript,
    /// Display a version
    Select(VersionSelection),
    /// Switch editor mode; `None` toggles
    Mode(Option<EditorMode>),
    /// Use this text as the selection for the next message
    Selection(String),
    Help,
    Quit,
    /// A command that could not be parsed, with the reason
    Invalid(String),
}

impl ReplInput {
    pub fn parse(line: &str) -> Self {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return ReplInput::Empty;
        }

        let Some(command) = trimmed.strip_prefix(':') else {
            return ReplInput::Message(trimmed.to_string());
        };

        let (name, arg) = match command.split_once(char::is_whitespace) {
            Some((name, arg)) => (name, arg.trim()),
            None => (command, ""),
        };

        match name.to_lowercase().as_str() {
            "q" | "quit" | "exit" => ReplInput::Quit,
            "h" | "help" => ReplInput::Help,
            "versions" | "v" => ReplInput::Versions,
            "transcript" | "t" => ReplInput::Transcript,
            "select" | "s" => match arg.parse::<VersionSelection>() {
                Ok(selection) => ReplInput::Select(selection),
                Err(e) => ReplInput::Invalid(e.to_string()),
            },
            "mode" | "m" => {
                if arg.is_empty() {
                    ReplInput::Mode(None)
                } else {
                    match arg.parse::<EditorMode>() {
                        Ok(mode) => ReplInput::Mode(Some(mode)),
                        Err(e) => ReplInput::Invalid(e.to_string()),
                    }
                }
            }
            "sel" | "selection" => ReplInput::Selection(arg.to_string()),
            other => ReplInput::Invalid(format!("unknown command ':{}'", other)),
        }
    }
}

/// Help text for the interactive loop
pub const REPL_HELP: &str = "\
Type a message and press enter to send it.
  :versions            list artifact versions
  :select <n|latest>   display a version
  :mode [document|code] switch or toggle the editor mode
  :sel <text>          set the selection sent with the next message
  :transcript          show the chat so far
  :quit                leave";
