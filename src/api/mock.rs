// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Mock Composer server for testing
//!
//! Provides a scripted, in-memory implementation of the `ComposerApi` trait
//! that can be used in tests without a running server.

use async_trait::async_trait;
use futures::stream;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::api::{ComposerApi, MessageRequest, Session, SessionId, StoredMessage};
use crate::error::{ApiError, ComposerError, Result};
use crate::protocol::ByteStream;

/// A scripted reply to one `send_message` call
#[derive(Debug, Clone)]
pub enum MockReply {
    /// Stream these chunks, then end
    Chunks(Vec<Vec<u8>>),
    /// Refuse the send before any byte is streamed
    Reject(String),
    /// Stream these chunks, then fail with a transport error
    Broken { chunks: Vec<Vec<u8>>, error: String },
    /// Stream these chunks, then hang until the consumer gives up
    Stalled(Vec<Vec<u8>>),
}

impl MockReply {
    /// Reply with string chunks exactly as given
    pub fn chunks<I, S>(chunks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        MockReply::Chunks(
            chunks
                .into_iter()
                .map(|c| c.as_ref().as_bytes().to_vec())
                .collect(),
        )
    }
}

impl Default for MockReply {
    fn default() -> Self {
        MockReply::Chunks(Vec::new())
    }
}

/// A mock Composer server
#[derive(Clone, Default)]
pub struct MockComposerApi {
    /// Replies handed out in order; an exhausted queue yields empty streams
    replies: Arc<Mutex<VecDeque<MockReply>>>,
    sessions: Arc<Mutex<Vec<Session>>>,
    messages: Arc<Mutex<HashMap<SessionId, Vec<StoredMessage>>>>,
    /// Number of upcoming `create_session` calls that fail
    create_failures: Arc<AtomicUsize>,
    create_delay: Option<Duration>,
    /// Time the server takes to accept a send
    send_delay: Option<Duration>,
    create_calls: Arc<AtomicUsize>,
    recorded_requests: Arc<Mutex<Vec<(SessionId, MessageRequest)>>>,
}

impl MockComposerApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a reply for the next send
    pub fn with_reply(self, reply: MockReply) -> Self {
        self.push_reply(reply);
        self
    }

    /// Make the next `count` session creations fail
    pub fn with_create_failures(self, count: usize) -> Self {
        self.create_failures.store(count, Ordering::SeqCst);
        self
    }

    /// Delay every session creation, to widen race windows in tests
    pub fn with_create_delay(mut self, delay: Duration) -> Self {
        self.create_delay = Some(delay);
        self
    }

    /// Delay every send before its reply starts
    pub fn with_send_delay(mut self, delay: Duration) -> Self {
        self.send_delay = Some(delay);
        self
    }

    /// Pre-populate a stored session and its messages
    pub fn with_session(self, session: Session, messages: Vec<StoredMessage>) -> Self {
        self.insert_session(session, messages);
        self
    }

    pub fn push_reply(&self, reply: MockReply) {
        lock(&self.replies).push_back(reply);
    }

    pub fn insert_session(&self, session: Session, messages: Vec<StoredMessage>) {
        lock(&self.messages).insert(session.id.clone(), messages);
        lock(&self.sessions).push(session);
    }

    /// How many times `create_session` was called
    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    /// Every request passed to `send_message`, in order
    pub fn recorded_requests(&self) -> Vec<(SessionId, MessageRequest)> {
        lock(&self.recorded_requests).clone()
    }

    fn find_session(&self, id: &SessionId) -> Result<Session> {
        lock(&self.sessions)
            .iter()
            .find(|s| &s.id == id)
            .cloned()
            .ok_or_else(|| ComposerError::Api(ApiError::NotFound(format!("session {}", id))))
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait]
impl ComposerApi for MockComposerApi {
    async fn create_session(&self) -> Result<Session> {
        let call = self.create_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(delay) = self.create_delay {
            tokio::time::sleep(delay).await;
        }

        let failing = self
            .create_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(ComposerError::SessionUnavailable(
                "mock server refused to create a session".to_string(),
            ));
        }

        let session = Session::new(format!("mock-session-{}", call));
        self.insert_session(session.clone(), Vec::new());
        Ok(session)
    }

    async fn list_sessions(&self) -> Result<Vec<Session>> {
        Ok(lock(&self.sessions).clone())
    }

    async fn get_session(&self, id: &SessionId) -> Result<Session> {
        self.find_session(id)
    }

    async fn rename_session(&self, id: &SessionId, title: &str) -> Result<Session> {
        let mut sessions = lock(&self.sessions);
        let session = sessions
            .iter_mut()
            .find(|s| &s.id == id)
            .ok_or_else(|| ComposerError::Api(ApiError::NotFound(format!("session {}", id))))?;
        session.title = title.to_string();
        Ok(session.clone())
    }

    async fn delete_session(&self, id: &SessionId) -> Result<()> {
        self.find_session(id)?;
        lock(&self.sessions).retain(|s| &s.id != id);
        lock(&self.messages).remove(id);
        Ok(())
    }

    async fn list_messages(&self, id: &SessionId) -> Result<Vec<StoredMessage>> {
        self.find_session(id)?;
        Ok(lock(&self.messages).get(id).cloned().unwrap_or_default())
    }

    async fn send_message(&self, id: &SessionId, request: &MessageRequest) -> Result<ByteStream> {
        lock(&self.recorded_requests).push((id.clone(), request.clone()));
        if let Some(delay) = self.send_delay {
            tokio::time::sleep(delay).await;
        }
        let reply = lock(&self.replies).pop_front().unwrap_or_default();

        let stream: ByteStream = match reply {
            MockReply::Chunks(chunks) => Box::pin(stream::iter(chunks.into_iter().map(Ok))),
            MockReply::Reject(reason) => return Err(ComposerError::TransportFailure(reason)),
            MockReply::Broken { chunks, error } => {
                let items = chunks
                    .into_iter()
                    .map(Ok)
                    .chain(std::iter::once(Err(ComposerError::TransportFailure(error))));
                Box::pin(stream::iter(items))
            }
            MockReply::Stalled(chunks) => {
                use futures::StreamExt;
                Box::pin(stream::iter(chunks.into_iter().map(Ok)).chain(stream::pending()))
            }
        };
        Ok(stream)
    }

    async fn health(&self) -> Result<bool> {
        Ok(true)
    }
}
