// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! CLI argument definitions using Clap
//!
//! Defines all command-line arguments and subcommands for Composer.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::editor::EditorMode;

/// Composer - co-edit a document or code with an AI assistant
#[derive(Parser, Debug)]
#[command(name = "composer")]
#[command(version, about = "Co-edit a document or code with an AI assistant")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Config file path
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Server base URL (overrides config and COMPOSER_BASE_URL)
    #[arg(long, global = true)]
    pub server: Option<String>,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Edit a file interactively with the assistant
    Edit(EditArgs),

    /// Send a single message about a file and apply the reply
    Ask(AskArgs),

    /// List stored sessions
    #[command(alias = "ls")]
    Sessions,

    /// Show the transcript and versions of a stored session
    Show(ShowArgs),

    /// Rename a stored session
    Rename(RenameArgs),

    /// Delete a stored session
    #[command(alias = "rm")]
    Delete(DeleteArgs),

    /// Check that the server is reachable
    Health,
}

/// Arguments for the edit subcommand
#[derive(clap::Args, Debug)]
pub struct EditArgs {
    /// File holding the artifact
    pub file: PathBuf,

    /// Editor mode (defaults to the last one used)
    #[arg(short, long)]
    pub mode: Option<EditorMode>,

    /// Continue a stored session instead of starting a new one
    #[arg(short, long)]
    pub resume: Option<String>,
}

/// Arguments for the ask subcommand
#[derive(clap::Args, Debug)]
pub struct AskArgs {
    /// File holding the artifact
    pub file: PathBuf,

    /// The message to send
    pub message: String,

    /// Editor mode (defaults to the last one used)
    #[arg(short, long)]
    pub mode: Option<EditorMode>,

    /// Text the message refers to
    #[arg(short, long)]
    pub selection: Option<String>,

    /// Print the reply without writing the file
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(clap::Args, Debug)]
pub struct ShowArgs {
    /// Session id
    pub id: String,

    /// Print the content of this version instead of the summary
    #[arg(id = "number", short = 'n', long = "number")]
    pub version: Option<u64>,
}

#[derive(clap::Args, Debug)]
pub struct RenameArgs {
    /// Session id
    pub id: String,

    /// New title
    pub title: String,
}

#[derive(clap::Args, Debug)]
pub struct DeleteArgs {
    /// Session id
    pub id: String,
}
