// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Composer engine
//!
//! Ties the session controller, frame decoder and stream dispatcher together
//! for one editing context. A send:
//! 1. captures the live artifact, selection and editor mode,
//! 2. ensures a session exists and submits the request,
//! 3. once the server accepts it, commits the human's artifact snapshot and
//!    chat turn (in that order),
//! 4. applies every decoded frame, one transport chunk at a time.
//!
//! Nothing is committed when step 2 fails. Sends on one engine are queued so
//! that at most one reply stream is consumed at a time.

use futures::StreamExt;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Mutex, RwLock};
use uuid::Uuid;

use crate::api::{ComposerApi, MessageRequest, Session, SessionId};
use crate::artifact::{ArtifactVersion, VersionId, VersionSelection};
use crate::chat::context::EditingContext;
use crate::chat::dispatcher::{ComposerEvent, StreamDispatcher};
use crate::chat::transcript::{ChatTurn, Role};
use crate::config::Settings;
use crate::editor::{EditingSurface, EditorMode, SurfaceChange};
use crate::error::{ComposerError, Result};
use crate::protocol::{decode_frames, DecodeItem, DecoderStats, FrameDecoder, DEFAULT_MAX_PENDING_BYTES};
use crate::session::SessionController;

/// Shared flag that aborts the reply stream currently being consumed
pub type CancellationSignal = Arc<AtomicBool>;

const CANCEL_POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Summary of one completed (or cancelled) send
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SendReport {
    /// Correlation id used in logs
    pub exchange_id: Uuid,
    pub session_id: Option<SessionId>,
    /// Version holding the human's pre-reply snapshot
    pub human_version: Option<VersionId>,
    /// Stream events consumed, including empty ones
    pub events_applied: usize,
    pub turns_appended: usize,
    pub versions_appended: Vec<VersionId>,
    /// True when the stream ended with a fragment that never parsed
    pub dropped_fragment: bool,
    pub cancelled: bool,
    pub decoder_stats: DecoderStats,
}

/// Drives the editing session for one editing surface
pub struct ComposerEngine {
    sessions: SessionController,
    context: Arc<RwLock<EditingContext>>,
    dispatcher: StreamDispatcher,
    /// Serializes sends
    send_lock: Mutex<()>,
    cancel: CancellationSignal,
    max_pending_bytes: usize,
}

impl ComposerEngine {
    pub fn new(api: Arc<dyn ComposerApi>, editor_mode: EditorMode) -> Self {
        Self::with_context(api, EditingContext::new(editor_mode))
    }

    /// Build an engine around an existing context (an opened file, a restored session)
    pub fn with_context(api: Arc<dyn ComposerApi>, context: EditingContext) -> Self {
        Self {
            sessions: SessionController::new(api),
            context: Arc::new(RwLock::new(context)),
            dispatcher: StreamDispatcher::new(),
            send_lock: Mutex::new(()),
            cancel: Arc::new(AtomicBool::new(false)),
            max_pending_bytes: DEFAULT_MAX_PENDING_BYTES,
        }
    }

    /// Build an engine using the editor mode and stream limits from settings
    pub fn from_settings(api: Arc<dyn ComposerApi>, settings: &Settings) -> Self {
        Self::new(api, settings.editor.mode).with_max_pending_bytes(settings.stream.max_pending_bytes)
    }

    /// Continue a session picked from history
    pub fn resume(api: Arc<dyn ComposerApi>, session: Session, context: EditingContext) -> Result<Self> {
        let engine = Self::with_context(api, context);
        engine.sessions.adopt(session)?;
        Ok(engine)
    }

    pub fn with_max_pending_bytes(mut self, max_pending_bytes: usize) -> Self {
        self.max_pending_bytes = max_pending_bytes;
        self
    }

    pub fn sessions(&self) -> &SessionController {
        &self.sessions
    }

    pub fn session(&self) -> Option<Session> {
        self.sessions.session().cloned()
    }

    /// Shared handle to the editing context for observers
    pub fn context(&self) -> Arc<RwLock<EditingContext>> {
        self.context.clone()
    }

    /// Notifications for every committed change
    pub fn subscribe(&self) -> broadcast::Receiver<ComposerEvent> {
        self.dispatcher.subscribe()
    }

    /// Signal that can be handed to another task to cancel the running send
    pub fn cancellation_signal(&self) -> CancellationSignal {
        self.cancel.clone()
    }

    /// Stop consuming the reply currently being streamed.
    ///
    /// Raised while no send is running, it applies to the next send. The
    /// signal is lowered when the send it stopped ends.
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Release);
    }

    pub async fn transcript(&self) -> Vec<ChatTurn> {
        self.context.read().await.transcript.all().to_vec()
    }

    pub async fn versions(&self) -> Vec<ArtifactVersion> {
        self.context.read().await.versions.versions().to_vec()
    }

    /// Content currently shown in the editing surface
    pub async fn artifact(&self) -> String {
        self.context.read().await.artifact().to_string()
    }

    pub async fn editor_mode(&self) -> EditorMode {
        self.context.read().await.editor_mode()
    }

    pub async fn set_editor_mode(&self, mode: EditorMode) {
        self.context.write().await.set_editor_mode(mode);
    }

    /// Display a version; returns the displayed content
    pub async fn select_version(&self, selection: VersionSelection) -> Result<String> {
        let mut ctx = self.context.write().await;
        ctx.select_version(selection).map(str::to_string)
    }

    pub async fn apply_surface_change(&self, change: SurfaceChange) {
        self.context.write().await.apply_surface_change(change);
    }

    /// Pull pending notifications from an editing surface into the context
    pub async fn pull_surface_changes(&self, surface: &mut dyn EditingSurface) {
        let changes = surface.take_changes();
        if changes.is_empty() {
            return;
        }
        let mut ctx = self.context.write().await;
        for change in changes {
            ctx.apply_surface_change(change);
        }
    }

    /// Push the displayed artifact into an editing surface
    pub async fn push_to_surface(&self, surface: &mut dyn EditingSurface) -> Result<()> {
        let artifact = self.artifact().await;
        if surface.content() != artifact {
            surface.set_content(&artifact)?;
        }
        Ok(())
    }

    /// Send a message and apply the streamed reply.
    ///
    /// `selection` overrides the last selection reported by the surface, as
    /// when commenting on a highlighted passage.
    pub async fn send_message(&self, content: &str, selection: Option<&str>) -> Result<SendReport> {
        if content.trim().is_empty() {
            return Err(ComposerError::InvalidInput("message is empty".to_string()));
        }

        let _guard = self.send_lock.lock().await;
        let _reset = CancelReset(&self.cancel);

        let mut report = SendReport {
            exchange_id: Uuid::new_v4(),
            ..SendReport::default()
        };

        let (snapshot, request) = {
            let ctx = self.context.read().await;
            let selected = selection.unwrap_or_else(|| ctx.selected_text()).to_string();
            let snapshot = ctx.artifact().to_string();
            let request = MessageRequest::new(content, snapshot.clone(), selected, ctx.editor_mode());
            (snapshot, request)
        };

        let session_id = self.sessions.ensure_session().await?;
        report.session_id = Some(session_id.clone());
        tracing::debug!(
            target: "composer.engine",
            exchange = %report.exchange_id,
            session = %session_id,
            "submitting message"
        );

        if is_cancelled(&self.cancel) {
            report.cancelled = true;
            tracing::info!(target: "composer.engine", exchange = %report.exchange_id, "send cancelled before submitting");
            self.dispatcher.notify(ComposerEvent::StreamEnded { cancelled: true });
            return Ok(report);
        }

        // Not raced against the signal: once the request is out the server may
        // store the message, so the local commit follows its answer.
        let bytes = self.sessions.send_message(&session_id, &request).await?;

        report.human_version = Some(self.commit_human(snapshot, content).await);

        let decoder = FrameDecoder::with_max_pending(self.max_pending_bytes);
        let mut frames = decode_frames(bytes, decoder);

        loop {
            let item = match await_or_cancel(frames.next(), &self.cancel).await {
                Some(Some(item)) => item,
                Some(None) => break,
                None => {
                    report.cancelled = true;
                    break;
                }
            };

            match item {
                Ok(DecodeItem::Batch(events)) => {
                    if is_cancelled(&self.cancel) {
                        report.cancelled = true;
                        break;
                    }
                    // One write lock per chunk: observers never see half a batch.
                    let mut ctx = self.context.write().await;
                    for outcome in self.dispatcher.apply_batch(&events, &mut ctx) {
                        report.events_applied += 1;
                        if outcome.turn_appended {
                            report.turns_appended += 1;
                        }
                        if let Some(version) = outcome.version {
                            report.versions_appended.push(version);
                        }
                    }
                }
                Ok(DecodeItem::End {
                    dropped_fragment,
                    stats,
                }) => {
                    report.dropped_fragment = dropped_fragment.is_some();
                    report.decoder_stats = stats;
                }
                Err(e) => {
                    tracing::warn!(
                        target: "composer.engine",
                        exchange = %report.exchange_id,
                        error = %e,
                        applied = report.events_applied,
                        "reply stream failed"
                    );
                    self.dispatcher.notify(ComposerEvent::StreamEnded { cancelled: false });
                    return Err(e);
                }
            }
        }

        if report.cancelled {
            tracing::info!(
                target: "composer.engine",
                exchange = %report.exchange_id,
                applied = report.events_applied,
                "reply stream cancelled"
            );
        } else {
            tracing::debug!(
                target: "composer.engine",
                exchange = %report.exchange_id,
                applied = report.events_applied,
                versions = report.versions_appended.len(),
                dropped_fragment = report.dropped_fragment,
                "reply stream finished"
            );
        }
        self.dispatcher.notify(ComposerEvent::StreamEnded {
            cancelled: report.cancelled,
        });
        Ok(report)
    }

    /// Commit the human's pre-reply snapshot followed by the human turn
    async fn commit_human(&self, snapshot: String, content: &str) -> VersionId {
        let mut ctx = self.context.write().await;
        let version = ctx.versions.append(snapshot, Role::Human);
        let turn = ChatTurn::human(content);
        ctx.transcript.append(turn.clone());

        if let Some(committed) = ctx.versions.get(version).cloned() {
            self.dispatcher.notify(ComposerEvent::HumanCommitted {
                version: committed,
                turn,
            });
        }
        version
    }
}

/// Lowers the signal when a send ends, while the send lock is still held
struct CancelReset<'a>(&'a CancellationSignal);

impl Drop for CancelReset<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

fn is_cancelled(signal: &CancellationSignal) -> bool {
    signal.load(Ordering::Acquire)
}

/// Await `future`, giving up (with `None`) as soon as the signal is raised
async fn await_or_cancel<F>(future: F, signal: &CancellationSignal) -> Option<F::Output>
where
    F: Future,
{
    tokio::pin!(future);
    loop {
        if is_cancelled(signal) {
            return None;
        }
        if let Ok(output) = tokio::time::timeout(CANCEL_POLL_INTERVAL, &mut future).await {
            if is_cancelled(signal) {
                return None;
            }
            return Some(output);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{MockComposerApi, MockReply};
    use crate::editor::BufferSurface;

    fn engine_with(api: MockComposerApi) -> (Arc<MockComposerApi>, ComposerEngine) {
        let api = Arc::new(api);
        let engine = ComposerEngine::with_context(
            api.clone(),
            EditingContext::with_artifact(EditorMode::Document, "<p>draft</p>"),
        );
        (api, engine)
    }

    #[tokio::test]
    async fn test_send_commits_human_then_assistant() {
        let (api, engine) = engine_with(MockComposerApi::new().with_reply(MockReply::chunks([
            "{\"message\":\"rewrote it\",\"artifact\":\"<p>final</p>\"}\r\n",
        ])));

        let report = engine.send_message("polish this", None).await.unwrap();
        assert_eq!(report.human_version, Some(VersionId::new(1)));
        assert_eq!(report.versions_appended, vec![VersionId::new(2)]);
        assert_eq!(report.turns_appended, 1);

        let transcript = engine.transcript().await;
        assert_eq!(
            transcript,
            vec![ChatTurn::human("polish this"), ChatTurn::assistant("rewrote it")]
        );
        let versions = engine.versions().await;
        assert_eq!(versions[0].created_by, Role::Human);
        assert_eq!(versions[0].content, "<p>draft</p>");
        assert_eq!(versions[1].created_by, Role::Assistant);
        assert_eq!(engine.artifact().await, "<p>final</p>");

        let requests = api.recorded_requests();
        let request = &requests[0].1;
        assert_eq!(request.artifact, "<p>draft</p>");
        assert!(request.is_document_editor);
    }

    #[tokio::test]
    async fn test_empty_message_is_rejected() {
        let (api, engine) = engine_with(MockComposerApi::new());
        let err = engine.send_message("   ", None).await.unwrap_err();
        assert!(matches!(err, ComposerError::InvalidInput(_)));
        assert_eq!(api.create_calls(), 0);
    }

    #[tokio::test]
    async fn test_session_failure_commits_nothing() {
        let (_, engine) = engine_with(MockComposerApi::new().with_create_failures(1));
        let err = engine.send_message("hello", None).await.unwrap_err();
        assert!(matches!(err, ComposerError::SessionUnavailable(_)));
        assert!(engine.transcript().await.is_empty());
        assert!(engine.versions().await.is_empty());
    }

    #[tokio::test]
    async fn test_rejected_send_commits_nothing() {
        let (_, engine) = engine_with(MockComposerApi::new().with_reply(MockReply::Reject("503".into())));
        let err = engine.send_message("hello", None).await.unwrap_err();
        assert!(matches!(err, ComposerError::TransportFailure(_)));
        assert!(engine.transcript().await.is_empty());
        assert!(engine.versions().await.is_empty());
    }

    #[tokio::test]
    async fn test_stream_failure_keeps_applied_state() {
        let (_, engine) = engine_with(MockComposerApi::new().with_reply(MockReply::Broken {
            chunks: vec![b"{\"message\":\"first\"}\r\n".to_vec()],
            error: "connection reset".into(),
        }));

        let err = engine.send_message("hello", None).await.unwrap_err();
        assert!(matches!(err, ComposerError::TransportFailure(_)));
        let transcript = engine.transcript().await;
        assert_eq!(transcript.len(), 2);
        assert_eq!(transcript[1].content, "first");
    }

    #[tokio::test]
    async fn test_selection_override_and_surface_selection() {
        let (api, engine) = engine_with(
            MockComposerApi::new()
                .with_reply(MockReply::default())
                .with_reply(MockReply::default()),
        );
        engine
            .apply_surface_change(SurfaceChange::Selected("draft".to_string()))
            .await;

        engine.send_message("one", None).await.unwrap();
        engine.send_message("two", Some("comment target")).await.unwrap();

        let requests = api.recorded_requests();
        assert_eq!(requests[0].1.selected_text, "draft");
        assert_eq!(requests[1].1.selected_text, "comment target");
    }

    #[tokio::test]
    async fn test_session_reused_across_sends() {
        let (api, engine) = engine_with(
            MockComposerApi::new()
                .with_reply(MockReply::default())
                .with_reply(MockReply::default()),
        );
        let first = engine.send_message("one", None).await.unwrap();
        let second = engine.send_message("two", None).await.unwrap();
        assert_eq!(first.session_id, second.session_id);
        assert_eq!(api.create_calls(), 1);
        assert_eq!(second.human_version, Some(VersionId::new(2)));
    }

    #[tokio::test]
    async fn test_cancel_stops_stalled_stream() {
        let (_, engine) = engine_with(MockComposerApi::new().with_reply(MockReply::Stalled(vec![
            b"{\"message\":\"working\"}\r\n".to_vec(),
        ])));
        let engine = Arc::new(engine);
        let signal = engine.cancellation_signal();

        let task = {
            let engine = engine.clone();
            tokio::spawn(async move { engine.send_message("go", None).await })
        };
        tokio::time::sleep(Duration::from_millis(100)).await;
        signal.store(true, Ordering::Release);

        let report = task.await.unwrap().unwrap();
        assert!(report.cancelled);
        assert_eq!(report.turns_appended, 1);
        assert_eq!(engine.transcript().await.len(), 2);
    }

    #[tokio::test]
    async fn test_cancel_raised_between_sends_applies_to_next() {
        let (api, engine) = engine_with(
            MockComposerApi::new().with_reply(MockReply::chunks(["{\"message\":\"hi\"}\r\n"])),
        );
        engine.cancel();

        let report = engine.send_message("one", None).await.unwrap();
        assert!(report.cancelled);
        assert!(report.human_version.is_none());
        assert!(api.recorded_requests().is_empty());
        assert!(engine.transcript().await.is_empty());

        // The signal was lowered when the cancelled send ended.
        let report = engine.send_message("two", None).await.unwrap();
        assert!(!report.cancelled);
        assert_eq!(engine.transcript().await.len(), 2);
    }

    #[tokio::test]
    async fn test_cancel_while_request_in_flight_keeps_human_commit() {
        let (api, engine) = engine_with(
            MockComposerApi::new()
                .with_send_delay(Duration::from_millis(100))
                .with_reply(MockReply::chunks(["{\"message\":\"late\"}\r\n"])),
        );
        let engine = Arc::new(engine);
        let signal = engine.cancellation_signal();

        let task = {
            let engine = engine.clone();
            tokio::spawn(async move { engine.send_message("go", None).await })
        };
        tokio::time::sleep(Duration::from_millis(30)).await;
        signal.store(true, Ordering::Release);

        let report = task.await.unwrap().unwrap();
        assert!(report.cancelled);
        assert_eq!(api.recorded_requests().len(), 1);
        // The server accepted the message, so the local context records it too.
        assert_eq!(report.human_version, Some(VersionId::new(1)));
        assert_eq!(engine.transcript().await, vec![ChatTurn::human("go")]);
        assert_eq!(report.events_applied, 0);
    }

    #[tokio::test]
    async fn test_events_are_published() {
        let (_, engine) = engine_with(MockComposerApi::new().with_reply(MockReply::chunks([
            "{\"artifact\":\"<p>new</p>\"}\r\n",
        ])));
        let mut rx = engine.subscribe();

        engine.send_message("update", None).await.unwrap();

        assert!(matches!(rx.recv().await.unwrap(), ComposerEvent::HumanCommitted { .. }));
        match rx.recv().await.unwrap() {
            ComposerEvent::AssistantApplied { turn, version } => {
                assert!(turn.is_none());
                assert_eq!(version.unwrap().content, "<p>new</p>");
            }
            other => panic!("unexpected event: {:?}", other),
        }
        assert_eq!(
            rx.recv().await.unwrap(),
            ComposerEvent::StreamEnded { cancelled: false }
        );
    }

    #[tokio::test]
    async fn test_surface_roundtrip() {
        let (api, engine) = engine_with(MockComposerApi::new().with_reply(MockReply::chunks([
            "{\"artifact\":\"<p>from ai</p>\"}\r\n",
        ])));
        let mut surface = BufferSurface::new("<p>draft</p>");
        surface.edit("<p>user edit</p>");
        engine.pull_surface_changes(&mut surface).await;

        engine.send_message("go", None).await.unwrap();
        engine.push_to_surface(&mut surface).await.unwrap();

        assert_eq!(api.recorded_requests()[0].1.artifact, "<p>user edit</p>");
        assert_eq!(surface.content(), "<p>from ai</p>");
    }

    #[tokio::test]
    async fn test_select_version_and_latest() {
        let (_, engine) = engine_with(MockComposerApi::new().with_reply(MockReply::chunks([
            "{\"artifact\":\"v2\"}\r\n{\"artifact\":\"v3\"}\r\n",
        ])));
        engine.send_message("go", None).await.unwrap();

        assert_eq!(
            engine
                .select_version(VersionSelection::Pinned(VersionId::new(1)))
                .await
                .unwrap(),
            "<p>draft</p>"
        );
        assert_eq!(engine.select_version(VersionSelection::Latest).await.unwrap(), "v3");
    }

    #[tokio::test]
    async fn test_resume_reuses_session() {
        let api = Arc::new(
            MockComposerApi::new()
                .with_session(Session::new("past"), Vec::new())
                .with_reply(MockReply::default()),
        );
        let engine = ComposerEngine::resume(
            api.clone(),
            Session::new("past"),
            EditingContext::new(EditorMode::Code),
        )
        .unwrap();

        let report = engine.send_message("continue", None).await.unwrap();
        assert_eq!(report.session_id.unwrap().as_str(), "past");
        assert_eq!(api.create_calls(), 0);
        assert!(!api.recorded_requests()[0].1.is_document_editor);
    }
}
