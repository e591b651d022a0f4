// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Stream dispatcher
//!
//! Applies decoded stream events to the editing context strictly in the order
//! they were decoded. Both effects of one event land in the same step and are
//! announced to observers as a single notification.

use tokio::sync::broadcast;

use crate::artifact::{ArtifactVersion, VersionId, VersionSelection};
use crate::chat::context::EditingContext;
use crate::chat::transcript::{ChatTurn, Role};
use crate::protocol::StreamEvent;

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Notification published after the context changed
#[derive(Debug, Clone, PartialEq)]
pub enum ComposerEvent {
    /// The human's pre-reply snapshot and message were committed
    HumanCommitted {
        version: ArtifactVersion,
        turn: ChatTurn,
    },
    /// One stream event was applied; either part may be absent
    AssistantApplied {
        turn: Option<ChatTurn>,
        version: Option<ArtifactVersion>,
    },
    /// The reply stream finished
    StreamEnded { cancelled: bool },
}

/// What a single `apply` appended
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchOutcome {
    pub turn_appended: bool,
    pub version: Option<VersionId>,
}

impl DispatchOutcome {
    pub fn is_noop(&self) -> bool {
        !self.turn_appended && self.version.is_none()
    }
}

/// Applies stream events to an `EditingContext`
#[derive(Debug, Clone)]
pub struct StreamDispatcher {
    notifier: broadcast::Sender<ComposerEvent>,
}

impl Default for StreamDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamDispatcher {
    pub fn new() -> Self {
        let (notifier, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { notifier }
    }

    /// Receive notifications for every change applied from now on
    pub fn subscribe(&self) -> broadcast::Receiver<ComposerEvent> {
        self.notifier.subscribe()
    }

    /// Publish a notification; having no subscribers is fine
    pub fn notify(&self, event: ComposerEvent) {
        let _ = self.notifier.send(event);
    }

    /// Apply one event. The caller holds exclusive access to `ctx`, so no
    /// observer can see the artifact update without the message update.
    pub fn apply(&self, event: &StreamEvent, ctx: &mut EditingContext) -> DispatchOutcome {
        let mut outcome = DispatchOutcome::default();
        let mut applied_version = None;
        let mut applied_turn = None;

        if let Some(artifact) = &event.artifact {
            let id = ctx.versions.append(artifact.clone(), Role::Assistant);
            // Latest now points at the new version, so this cannot fail.
            let _ = ctx.versions.select(VersionSelection::Latest);
            ctx.set_artifact(artifact.clone());
            outcome.version = Some(id);
            applied_version = ctx.versions.get(id).cloned();
        }

        if let Some(message) = &event.message {
            let turn = ChatTurn::assistant(message.clone());
            ctx.transcript.append(turn.clone());
            outcome.turn_appended = true;
            applied_turn = Some(turn);
        }

        if outcome.is_noop() {
            tracing::trace!(target: "composer.dispatch", "event carried no update");
            return outcome;
        }

        tracing::debug!(
            target: "composer.dispatch",
            version = ?outcome.version,
            turn = outcome.turn_appended,
            "applied stream event"
        );
        self.notify(ComposerEvent::AssistantApplied {
            turn: applied_turn,
            version: applied_version,
        });
        outcome
    }

    /// Apply a batch of events decoded from one chunk, in order
    pub fn apply_batch(&self, events: &[StreamEvent], ctx: &mut EditingContext) -> Vec<DispatchOutcome> {
        events.iter().map(|event| self.apply(event, ctx)).collect()
    }
}
