//! The session provider contract and the in-process implementation.
//!
//! The provider is always injected as `Arc<dyn SessionProvider>` with an
//! explicit subscribe lifecycle, never reached through a global, so tests
//! can drive synchronizers with controlled sessions.

use std::sync::Mutex;

use tandem_shared::constants::SESSION_EVENT_CAPACITY;
use tandem_shared::UserId;
use tokio::sync::broadcast;
use tracing::info;
use uuid::Uuid;

use crate::error::{Result, SyncError};

/// An established session: the stable user id plus the contact it was
/// opened with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub user_id: UserId,
    pub email: Option<String>,
}

/// Session lifecycle notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    SignedIn,
    SignedOut,
}

/// Capability yielding the current session and session-change events.
///
/// `sign_in_with_challenge` has no synchronous success: it only confirms a
/// challenge was dispatched.  Completion arrives later through the event
/// stream.
pub trait SessionProvider: Send + Sync {
    fn current_session(&self) -> Option<Session>;

    /// Dispatch a passwordless challenge to `contact`.
    fn sign_in_with_challenge(&self, contact: &str) -> Result<()>;

    /// End the current session, if any.
    fn sign_out(&self);

    /// Subscribe to session-change notifications.
    fn subscribe(&self) -> broadcast::Receiver<SessionEvent>;
}

// ---------------------------------------------------------------------------
// In-process provider
// ---------------------------------------------------------------------------

struct PendingChallenge {
    contact: String,
    token: String,
}

struct Inner {
    session: Option<Session>,
    pending: Option<PendingChallenge>,
}

/// In-process session provider.
///
/// Models the passwordless flow without a remote auth backend: a dispatched
/// challenge stays pending until [`LocalSessions::complete_challenge`] is
/// called with its token (the step a user would perform from the emailed
/// link).  The user id derives from the normalized contact, so repeat
/// sign-ins with the same address yield the same identity.
pub struct LocalSessions {
    inner: Mutex<Inner>,
    events: broadcast::Sender<SessionEvent>,
}

impl LocalSessions {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(SESSION_EVENT_CAPACITY);
        Self {
            inner: Mutex::new(Inner {
                session: None,
                pending: None,
            }),
            events,
        }
    }

    /// The token of the pending challenge, if one was dispatched.
    pub fn pending_token(&self) -> Option<String> {
        let inner = self.inner.lock().ok()?;
        inner.pending.as_ref().map(|p| p.token.clone())
    }

    /// Complete a pending challenge, establishing the session.
    pub fn complete_challenge(&self, token: &str) -> Result<Session> {
        let session = {
            let mut inner = self.inner.lock().map_err(|_| SyncError::Poisoned)?;
            let pending = match inner.pending.take() {
                Some(p) if p.token == token => p,
                other => {
                    inner.pending = other;
                    return Err(SyncError::UnknownChallenge);
                }
            };

            let session = Session {
                user_id: UserId::new(pending.contact.clone()),
                email: Some(pending.contact),
            };
            inner.session = Some(session.clone());
            session
        };

        info!(user = %session.user_id, "session established");
        let _ = self.events.send(SessionEvent::SignedIn);
        Ok(session)
    }
}

impl SessionProvider for LocalSessions {
    fn current_session(&self) -> Option<Session> {
        self.inner.lock().ok()?.session.clone()
    }

    fn sign_in_with_challenge(&self, contact: &str) -> Result<()> {
        let normalized = contact.trim().to_lowercase();
        if normalized.is_empty() {
            return Err(SyncError::EmptyContact);
        }

        let token = Uuid::new_v4().to_string();
        {
            let mut inner = self.inner.lock().map_err(|_| SyncError::Poisoned)?;
            inner.pending = Some(PendingChallenge {
                contact: normalized.clone(),
                token,
            });
        }

        info!(contact = %normalized, "sign-in challenge dispatched");
        Ok(())
    }

    fn sign_out(&self) {
        let had_session = {
            let mut inner = match self.inner.lock() {
                Ok(inner) => inner,
                Err(_) => return,
            };
            inner.session.take().is_some()
        };

        if had_session {
            info!("session ended");
            let _ = self.events.send(SessionEvent::SignedOut);
        }
    }

    fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }
}

impl Default for LocalSessions {
    fn default() -> Self {
        Self::new()
    }
}
