// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Session controller

use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt, Shared};
use tokio::sync::{Mutex, OnceCell};

use crate::api::{ComposerApi, MessageRequest, Session, SessionId};
use crate::error::{ComposerError, Result};
use crate::protocol::ByteStream;

/// A create-session call that every concurrent caller awaits
type Creation = Shared<BoxFuture<'static, std::result::Result<Session, String>>>;

/// Owns the session of one editing context and issues sends against it.
///
/// Creation is single-flight: callers that arrive while a creation is in
/// progress wait for it and share its result, success or failure. A failed
/// creation caches nothing, so only a later call tries again.
pub struct SessionController {
    api: Arc<dyn ComposerApi>,
    session: OnceCell<Session>,
    in_flight: Mutex<Option<Creation>>,
}

impl SessionController {
    pub fn new(api: Arc<dyn ComposerApi>) -> Self {
        Self {
            api,
            session: OnceCell::new(),
            in_flight: Mutex::new(None),
        }
    }

    pub fn api(&self) -> &Arc<dyn ComposerApi> {
        &self.api
    }

    /// The session, if one has been created or adopted
    pub fn session(&self) -> Option<&Session> {
        self.session.get()
    }

    /// Return the session id, creating the session on first use
    pub async fn ensure_session(&self) -> Result<SessionId> {
        if let Some(session) = self.session.get() {
            return Ok(session.id.clone());
        }

        let creation = {
            let mut in_flight = self.in_flight.lock().await;
            if let Some(session) = self.session.get() {
                return Ok(session.id.clone());
            }
            in_flight
                .get_or_insert_with(|| self.start_creation())
                .clone()
        };

        let outcome = creation.clone().await;

        let mut in_flight = self.in_flight.lock().await;
        if in_flight
            .as_ref()
            .is_some_and(|current| current.ptr_eq(&creation))
        {
            *in_flight = None;
        }

        match outcome {
            Ok(session) => match self.session.get() {
                Some(existing) => Ok(existing.id.clone()),
                None => {
                    let id = session.id.clone();
                    // Only fails if adopt() won the race; that session stands.
                    let _ = self.session.set(session);
                    Ok(self.session.get().map_or(id, |s| s.id.clone()))
                }
            },
            Err(message) => Err(ComposerError::SessionUnavailable(message)),
        }
    }

    fn start_creation(&self) -> Creation {
        let api = Arc::clone(&self.api);
        async move {
            tracing::debug!(target: "composer.session", "creating session");
            match api.create_session().await {
                Ok(session) => {
                    tracing::info!(target: "composer.session", id = %session.id, "session created");
                    Ok(session)
                }
                Err(e) => {
                    let message = match e {
                        ComposerError::SessionUnavailable(message) => message,
                        other => other.to_string(),
                    };
                    tracing::warn!(target: "composer.session", error = %message, "session creation failed");
                    Err(message)
                }
            }
        }
        .boxed()
        .shared()
    }

    /// Reuse an existing session, e.g. one picked from history.
    ///
    /// Fails if this controller already holds a different session.
    pub fn adopt(&self, session: Session) -> Result<()> {
        if let Some(existing) = self.session.get() {
            if existing.id == session.id {
                return Ok(());
            }
            return Err(ComposerError::InvalidInput(format!(
                "editing context is already bound to session {}",
                existing.id
            )));
        }
        let id = session.id.clone();
        self.session.set(session).map_err(|_| {
            ComposerError::InvalidInput("session was created concurrently".to_string())
        })?;
        tracing::debug!(target: "composer.session", id = %id, "adopted session");
        Ok(())
    }

    /// Submit a message and return the reply byte stream
    pub async fn send_message(
        &self,
        session_id: &SessionId,
        request: &MessageRequest,
    ) -> Result<ByteStream> {
        tracing::debug!(
            target: "composer.session",
            id = %session_id,
            artifact_bytes = request.artifact.len(),
            "sending message"
        );
        self.api
            .send_message(session_id, request)
            .await
            .map_err(|e| match e {
                ComposerError::TransportFailure(_) => e,
                other => ComposerError::TransportFailure(other.to_string()),
            })
    }
}
