// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;

use composer::api::{ComposerApi, SessionId};
use composer::artifact::VersionId;
use composer::chat::{
    ComposerEngine, ComposerEvent, EditingContext, ReplInput, Role, SendReport, REPL_HELP,
};
use composer::cli::{AskArgs, DeleteArgs, EditArgs, RenameArgs, ShowArgs};
use composer::config::Settings;
use composer::editor::{EditingSurface, EditorMode, FileSurface, SurfaceChange};
use composer::error::{ApiError, ComposerError, Result};
use composer::history::SessionHistory;

/// Loaded settings plus the file they came from, so mode changes persist
pub(super) struct SettingsHandle {
    settings: Settings,
    path: PathBuf,
}

impl SettingsHandle {
    pub(super) fn new(settings: Settings, path: PathBuf) -> Self {
        Self { settings, path }
    }

    fn editor_mode(&self, requested: Option<EditorMode>) -> EditorMode {
        requested.unwrap_or(self.settings.editor.mode)
    }

    /// Remember the editor mode for the next run
    fn persist_mode(&mut self, mode: EditorMode) {
        if self.settings.editor.mode == mode {
            return;
        }
        self.settings.editor.mode = mode;
        if let Err(e) = self.settings.save_to(&self.path) {
            tracing::warn!(
                target: "composer.config",
                path = %self.path.display(),
                error = %e,
                "could not save editor mode"
            );
        }
    }
}

/// Build the engine for `edit`/`ask`: a fresh context seeded with the file, or
/// a restored session whose latest version is written back to the file
async fn open_engine(
    api: Arc<dyn ComposerApi>,
    settings: &SettingsHandle,
    surface: &mut FileSurface,
    mode: EditorMode,
    resume: Option<&str>,
) -> Result<ComposerEngine> {
    let max_pending = settings.settings.stream.max_pending_bytes;
    let engine = match resume {
        Some(id) => {
            let engine = SessionHistory::new(api)
                .resume(&SessionId::new(id), mode)
                .await?
                .with_max_pending_bytes(max_pending);
            if engine.versions().await.is_empty() {
                engine
                    .apply_surface_change(SurfaceChange::Edited(surface.content()))
                    .await;
            } else {
                engine.push_to_surface(surface).await?;
            }
            engine
        }
        None => {
            let context = EditingContext::with_artifact(mode, surface.content());
            ComposerEngine::with_context(api, context).with_max_pending_bytes(max_pending)
        }
    };
    Ok(engine)
}

/// Print assistant messages as they arrive
fn spawn_event_printer(engine: &ComposerEngine) -> tokio::task::JoinHandle<()> {
    let mut events = engine.subscribe();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(ComposerEvent::AssistantApplied { turn, version }) => {
                    if let Some(turn) = turn {
                        println!("assistant> {}", turn.content);
                    }
                    if let Some(version) = version {
                        println!("[artifact updated to version {}]", version.version);
                    }
                }
                Ok(ComposerEvent::StreamEnded { cancelled: true }) => println!("[cancelled]"),
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!(target: "composer.cli", skipped, "event printer lagged");
                }
                Err(RecvError::Closed) => break,
            }
        }
    })
}

/// Send one message, letting Ctrl-C cancel the reply stream.
///
/// The request itself is not interrupted, so a second Ctrl-C exits.
async fn send_with_interrupt(
    engine: &ComposerEngine,
    message: &str,
    selection: Option<&str>,
) -> Result<SendReport> {
    let signal = engine.cancellation_signal();
    let watcher = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            signal.store(true, Ordering::Release);
            if tokio::signal::ctrl_c().await.is_ok() {
                std::process::exit(130);
            }
        }
    });
    let result = engine.send_message(message, selection).await;
    watcher.abort();
    result
}

fn print_report(report: &SendReport) {
    if report.dropped_fragment {
        eprintln!("warning: the reply ended with an incomplete frame, which was discarded");
    }
    if report.decoder_stats.fragments_dropped > 0 {
        eprintln!(
            "warning: {} oversized fragment(s) were discarded",
            report.decoder_stats.fragments_dropped
        );
    }
}

async fn print_versions(engine: &ComposerEngine) {
    let context = engine.context();
    let ctx = context.read().await;
    if ctx.versions.is_empty() {
        println!("No versions yet.");
        return;
    }
    let current = ctx.versions.current_id();
    for version in ctx.versions.versions() {
        let marker = if version.version == current { "*" } else { " " };
        let label = ctx
            .versions
            .label(version.version)
            .unwrap_or_else(|| version.version.to_string());
        println!("{} {:>3}  {}", marker, version.version.get(), label);
    }
}

async fn print_transcript(engine: &ComposerEngine) {
    for turn in engine.transcript().await {
        let who = match turn.role {
            Role::Human => "you",
            Role::Assistant => "assistant",
        };
        println!("{}> {}", who, turn.content);
    }
}

/// Run the interactive editing loop
pub(super) async fn run_edit(
    args: EditArgs,
    mut settings: SettingsHandle,
    api: Arc<dyn ComposerApi>,
) -> Result<()> {
    let mode = settings.editor_mode(args.mode);
    settings.persist_mode(mode);

    let mut surface = FileSurface::open(&args.file)?;
    let engine = open_engine(api, &settings, &mut surface, mode, args.resume.as_deref()).await?;
    let printer = spawn_event_printer(&engine);

    println!(
        "Editing {} in {} mode. Type :help for commands.",
        surface.path().display(),
        mode
    );

    let mut pending_selection: Option<String> = None;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("> ");
        io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };

        // Pick up edits made to the file since the last prompt.
        surface.refresh()?;
        engine.pull_surface_changes(&mut surface).await;

        match ReplInput::parse(&line) {
            ReplInput::Empty => {}
            ReplInput::Quit => break,
            ReplInput::Help => println!("{}", REPL_HELP),
            ReplInput::Invalid(reason) => eprintln!("{}", reason),
            ReplInput::Versions => print_versions(&engine).await,
            ReplInput::Transcript => print_transcript(&engine).await,
            ReplInput::Selection(text) => {
                pending_selection = if text.is_empty() { None } else { Some(text) };
            }
            ReplInput::Mode(requested) => {
                let next = requested.unwrap_or(engine.editor_mode().await.toggle());
                engine.set_editor_mode(next).await;
                settings.persist_mode(next);
                println!("Editor mode: {}", next);
            }
            ReplInput::Select(selection) => match engine.select_version(selection).await {
                Ok(_) => {
                    engine.push_to_surface(&mut surface).await?;
                    println!("Displaying {}", selection);
                }
                Err(e) => eprintln!("{}", e),
            },
            ReplInput::Message(message) => {
                match send_with_interrupt(&engine, &message, pending_selection.as_deref()).await {
                    Ok(report) => {
                        print_report(&report);
                        pending_selection = None;
                    }
                    Err(e) => eprintln!("error: {}", e),
                }
                engine.push_to_surface(&mut surface).await?;
            }
        }
    }

    if let Some(session) = engine.session() {
        println!("Session {} saved. Resume with --resume {}", session.id, session.id);
    }
    drop(engine);
    let _ = printer.await;
    Ok(())
}

/// Send a single message about a file
pub(super) async fn run_ask(
    args: AskArgs,
    settings: &SettingsHandle,
    api: Arc<dyn ComposerApi>,
) -> Result<()> {
    let mode = settings.editor_mode(args.mode);
    let mut surface = FileSurface::open(&args.file)?;
    let engine = open_engine(api, settings, &mut surface, mode, None).await?;

    let report = send_with_interrupt(&engine, &args.message, args.selection.as_deref()).await?;
    print_report(&report);

    for turn in engine.transcript().await.iter().skip(1) {
        println!("{}", turn.content);
    }

    if report.versions_appended.is_empty() {
        return Ok(());
    }
    if args.dry_run {
        println!("{}", engine.artifact().await);
    } else {
        engine.push_to_surface(&mut surface).await?;
        eprintln!("Updated {}", surface.path().display());
    }
    Ok(())
}

pub(super) async fn run_sessions(api: Arc<dyn ComposerApi>) -> Result<()> {
    let sessions = SessionHistory::new(api).list().await?;
    if sessions.is_empty() {
        println!("No sessions found.");
        return Ok(());
    }

    println!("{:<38} {:<20} TITLE", "ID", "CREATED");
    for session in sessions {
        let created = session
            .created_at
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "-".to_string());
        println!("{:<38} {:<20} {}", session.id, created, session.display_title());
    }
    Ok(())
}

pub(super) async fn run_show(
    args: ShowArgs,
    settings: &SettingsHandle,
    api: Arc<dyn ComposerApi>,
) -> Result<()> {
    let history = SessionHistory::new(api);
    let id = SessionId::new(args.id);
    let session = history.get(&id).await?;
    let ctx = history.restore(&id, settings.editor_mode(None)).await?;

    if let Some(number) = args.version {
        let version = ctx
            .versions
            .get(VersionId::new(number))
            .ok_or(ComposerError::VersionNotFound(number))?;
        println!("{}", version.content);
        return Ok(());
    }

    println!("{}", session.display_title());
    println!();
    for turn in ctx.transcript.all() {
        println!("{}> {}", turn.role, turn.content);
    }
    println!();
    for version in ctx.versions.versions() {
        if let Some(label) = ctx.versions.label(version.version) {
            println!(
                "  {:>3}  {} ({} bytes)",
                version.version.get(),
                label,
                version.content.len()
            );
        }
    }
    Ok(())
}

pub(super) async fn run_rename(args: RenameArgs, api: Arc<dyn ComposerApi>) -> Result<()> {
    let session = SessionHistory::new(api)
        .rename(&SessionId::new(args.id), &args.title)
        .await?;
    println!("Renamed {} to '{}'", session.id, session.display_title());
    Ok(())
}

pub(super) async fn run_delete(args: DeleteArgs, api: Arc<dyn ComposerApi>) -> Result<()> {
    let id = SessionId::new(args.id);
    SessionHistory::new(api).delete(&id).await?;
    println!("Deleted {}", id);
    Ok(())
}

pub(super) async fn run_health(api: Arc<dyn ComposerApi>) -> Result<()> {
    if api.health().await? {
        println!("ok");
        Ok(())
    } else {
        Err(ComposerError::Api(ApiError::ServerError {
            status: 503,
            message: "server reported unhealthy".to_string(),
        }))
    }
}
