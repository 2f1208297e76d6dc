// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Session store: restore, validate, sign in, log out.
//!
//! The session lives in a `watch` channel together with an epoch counter.
//! Every state change bumps the epoch; async work captures the epoch it
//! started under and only applies its result if the epoch is unchanged, so a
//! logout always beats a late response.

use crate::error::{ClientError, Result};
use crate::models::{Session, SignInRequest, User};
use crate::services::backend::Backend;
use crate::services::storage::{keys, KeyValueStore};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use validator::Validate;

/// Published session state.
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    pub epoch: u64,
    pub session: Option<Session>,
}

/// Credentials captured for one request, tagged with the epoch they came from.
#[derive(Debug, Clone)]
pub struct SessionTicket {
    pub epoch: u64,
    pub token: String,
    pub user_id: String,
}

pub struct SessionService {
    backend: Arc<dyn Backend>,
    store: Arc<dyn KeyValueStore>,
    state: watch::Sender<SessionState>,
    disposed: AtomicBool,
}

impl SessionService {
    pub fn new(backend: Arc<dyn Backend>, store: Arc<dyn KeyValueStore>) -> Self {
        let (state, _) = watch::channel(SessionState::default());
        Self {
            backend,
            store,
            state,
            disposed: AtomicBool::new(false),
        }
    }

    /// Restore the persisted session without touching the network.
    ///
    /// A token without a user snapshot (or the reverse, or a snapshot that no
    /// longer parses) counts as logged out and both keys are removed.
    pub fn restore(&self) -> Option<Session> {
        let token = self.store.get(keys::TOKEN).filter(|t| !t.is_empty());
        let user = self
            .store
            .get(keys::USER)
            .and_then(|raw| serde_json::from_str::<User>(&raw).ok());

        let session = match (token, user) {
            (Some(token), Some(user)) => Some(Session::new(user, token)),
            (None, None) => None,
            _ => {
                tracing::warn!("Discarding partial persisted session");
                if let Err(e) = self.store.remove_many(&[keys::TOKEN, keys::USER]) {
                    tracing::warn!(error = %e, "Failed to clear partial session");
                }
                None
            }
        };

        self.state.send_modify(|state| {
            state.epoch += 1;
            state.session = session.clone();
        });
        session
    }

    /// Restore, publish optimistically, then validate against the backend.
    pub async fn init(&self) -> Option<Session> {
        let restored = self.restore()?;
        let epoch = self.epoch();

        tracing::debug!(user_id = %restored.user_id, "Validating restored session");

        match self.backend.profile(&restored.auth_token).await {
            Ok(user) => {
                let applied = self.state.send_if_modified(|state| {
                    if state.epoch != epoch {
                        return false;
                    }
                    let session = Session::new(user.clone(), restored.auth_token.clone());
                    if let Err(e) = self.persist(&session) {
                        tracing::warn!(error = %e, "Failed to persist refreshed profile");
                    }
                    state.session = Some(session);
                    true
                });
                if !applied {
                    tracing::debug!("Session changed during validation; profile discarded");
                }
            }
            Err(e) if e.is_transport() => {
                tracing::warn!(error = %e, "Session validation unreachable; keeping session");
            }
            Err(e) => {
                tracing::info!(error = %e, "Stored session rejected; clearing");
                self.clear_if(epoch);
            }
        }

        self.current()
    }

    /// Exchange credentials for a session. Invalid input never hits the network.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Session> {
        let request = SignInRequest {
            email: email.trim().to_string(),
            password: password.to_string(),
        };
        request
            .validate()
            .map_err(|e| ClientError::Validation(e.to_string()))?;

        let epoch = self.epoch();
        let response = self.backend.sign_in(&request).await?;
        let session = Session::new(response.user, response.access.access_token);

        let mut persist_result = Ok(());
        let applied = self.state.send_if_modified(|state| {
            if state.epoch != epoch {
                return false;
            }
            persist_result = self.persist(&session);
            state.epoch += 1;
            state.session = Some(session.clone());
            true
        });

        if !applied {
            return Err(ClientError::Stale);
        }
        persist_result?;

        tracing::info!(user_id = %session.user_id, "Signed in");
        Ok(session)
    }

    /// Clear the session locally first, then tell the backend (best effort).
    pub async fn logout(&self) {
        let mut previous = None;
        self.state.send_modify(|state| {
            state.epoch += 1;
            previous = state.session.take();
        });
        if let Err(e) = self.store.remove_many(&[keys::TOKEN, keys::USER]) {
            tracing::warn!(error = %e, "Failed to clear persisted session");
        }

        if let Some(session) = previous {
            if let Err(e) = self.backend.logout(&session.auth_token).await {
                tracing::warn!(error = %e, "Backend logout failed");
            }
            tracing::info!(user_id = %session.user_id, "Logged out");
        }
    }

    /// Drop the session if it is still the one captured at `epoch`.
    ///
    /// Used when a request made with that session's token was rejected.
    pub fn invalidate(&self, epoch: u64) -> bool {
        self.clear_if(epoch)
    }

    /// End the service lifecycle; in-flight results are discarded.
    pub fn dispose(&self) {
        self.disposed.store(true, Ordering::SeqCst);
        self.state.send_modify(|state| state.epoch += 1);
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    pub fn current(&self) -> Option<Session> {
        self.state.borrow().session.clone()
    }

    pub fn epoch(&self) -> u64 {
        self.state.borrow().epoch
    }

    pub fn is_current(&self, epoch: u64) -> bool {
        !self.is_disposed() && self.epoch() == epoch
    }

    /// Credentials for a request, or `NotAuthenticated`.
    pub fn ticket(&self) -> Result<SessionTicket> {
        if self.is_disposed() {
            return Err(ClientError::NotAuthenticated);
        }
        let state = self.state.borrow();
        state
            .session
            .as_ref()
            .map(|s| SessionTicket {
                epoch: state.epoch,
                token: s.auth_token.clone(),
                user_id: s.user_id.clone(),
            })
            .ok_or(ClientError::NotAuthenticated)
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    fn persist(&self, session: &Session) -> Result<()> {
        let user = serde_json::to_string(&session.user)
            .map_err(|e| ClientError::Storage(e.to_string()))?;
        self.store
            .set_many(&[(keys::TOKEN, &session.auth_token), (keys::USER, &user)])
    }

    fn clear_if(&self, epoch: u64) -> bool {
        let cleared = self.state.send_if_modified(|state| {
            if state.epoch != epoch || state.session.is_none() {
                return false;
            }
            state.epoch += 1;
            state.session = None;
            true
        });
        if cleared {
            if let Err(e) = self.store.remove_many(&[keys::TOKEN, keys::USER]) {
                tracing::warn!(error = %e, "Failed to clear persisted session");
            }
        }
        cleared
    }
}
