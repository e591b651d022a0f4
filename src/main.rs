// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Composer - co-edit a document or code with an AI assistant
//!
//! Entry point for the Composer CLI application.

use std::sync::Arc;

use clap::Parser;

use composer::api::{ComposerApi, HttpComposerApi};
use composer::cli::{Cli, Commands};
use composer::config::Settings;
use composer::error::Result;

#[path = "main/commands.rs"]
mod commands;

use commands::{
    run_ask, run_delete, run_edit, run_health, run_rename, run_sessions, run_show, SettingsHandle,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Initialize tracing
    let mut env_filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(tracing::Level::WARN.into());

    // `-v` enables client diagnostics without requiring users to know target
    // names up front. `RUST_LOG` still takes precedence.
    if cli.verbose > 0 {
        let level = if cli.verbose > 1 { "trace" } else { "debug" };
        for target in [
            "composer.protocol",
            "composer.session",
            "composer.dispatch",
            "composer.engine",
            "composer.config",
            "composer.cli",
        ] {
            if let Ok(parsed) = format!("{}={}", target, level).parse() {
                env_filter = env_filter.add_directive(parsed);
            }
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    // Load settings
    let settings_path = cli.config.clone().unwrap_or_else(Settings::default_path);
    let mut settings = Settings::load_from(&settings_path)?;
    settings.apply_env_overrides();
    if let Some(server) = cli.server.clone() {
        settings.server.base_url = server;
    }
    settings.validate()?;

    let api: Arc<dyn ComposerApi> = Arc::new(HttpComposerApi::from_config(&settings.server)?);
    let settings = SettingsHandle::new(settings, settings_path);

    // Dispatch to appropriate command
    match cli.command {
        Commands::Edit(args) => run_edit(args, settings, api).await?,
        Commands::Ask(args) => run_ask(args, &settings, api).await?,
        Commands::Sessions => run_sessions(api).await?,
        Commands::Show(args) => run_show(args, &settings, api).await?,
        Commands::Rename(args) => run_rename(args, api).await?,
        Commands::Delete(args) => run_delete(args, api).await?,
        Commands::Health => run_health(api).await?,
    }

    Ok(())
}
