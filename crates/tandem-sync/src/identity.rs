//! The identity resolver.
//!
//! Turns the opaque session into a stable `(user id, display name)` pair and
//! keeps it current: the published identity is re-derived once at startup and
//! again on every session-change notification.  A session without a profile
//! row resolves with no display name rather than an error.

use std::sync::{Arc, Mutex};

use chrono::Utc;
use tandem_shared::Identity;
use tandem_store::{Database, Profile};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{Result, SyncError};
use crate::session::SessionProvider;

/// Owns the resolver task and the published identity read model.
pub struct IdentityResolver {
    sessions: Arc<dyn SessionProvider>,
    db: Arc<Mutex<Database>>,
    identity_tx: Arc<watch::Sender<Option<Identity>>>,
    identity_rx: watch::Receiver<Option<Identity>>,
    task: JoinHandle<()>,
}

impl IdentityResolver {
    /// Derive the initial identity and spawn the task that tracks session
    /// changes.
    pub fn spawn(sessions: Arc<dyn SessionProvider>, db: Arc<Mutex<Database>>) -> Self {
        // Subscribe before the initial derivation so a session change landing
        // in between is not missed.
        let mut events = sessions.subscribe();
        let (identity_tx, identity_rx) = watch::channel(derive_identity(&sessions, &db));
        let identity_tx = Arc::new(identity_tx);

        let task = {
            let sessions = Arc::clone(&sessions);
            let db = Arc::clone(&db);
            let identity_tx = Arc::clone(&identity_tx);

            tokio::spawn(async move {
                loop {
                    match events.recv().await {
                        Ok(event) => {
                            debug!(?event, "session changed, re-deriving identity");
                            identity_tx.send_replace(derive_identity(&sessions, &db));
                        }
                        Err(tokio::sync::broadcast::error::RecvError::Lagged(missed)) => {
                            warn!(missed, "missed session events, re-deriving identity");
                            identity_tx.send_replace(derive_identity(&sessions, &db));
                        }
                        Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                    }
                }
            })
        };

        Self {
            sessions,
            db,
            identity_tx,
            identity_rx,
            task,
        }
    }

    /// The reactive identity read model.
    pub fn watch(&self) -> watch::Receiver<Option<Identity>> {
        self.identity_rx.clone()
    }

    /// The identity as of now.
    pub fn current(&self) -> Option<Identity> {
        self.identity_rx.borrow().clone()
    }

    /// Idempotently upsert the profile display name and republish the
    /// identity.  Fails with a caller-visible notice when no identity is
    /// present; a name that trims empty is a silent no-op.
    pub fn update_display_name(&self, name: &str) -> Result<()> {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Ok(());
        }

        let session = self
            .sessions
            .current_session()
            .ok_or(SyncError::NoIdentity)?;

        {
            let db = self.db.lock().map_err(|_| SyncError::Poisoned)?;
            db.upsert_profile(&Profile {
                user_id: session.user_id.clone(),
                display_name: Some(trimmed.to_string()),
                updated_at: Utc::now(),
            })?;
        }

        info!(user = %session.user_id, "display name updated");
        self.identity_tx
            .send_replace(derive_identity(&self.sessions, &self.db));
        Ok(())
    }

    /// Stop tracking session changes.
    pub fn shutdown(&self) {
        self.task.abort();
    }
}

impl Drop for IdentityResolver {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Read the session's user id, then look the display name up in the profile
/// row.  Lookup failures degrade to an identity without a name.
fn derive_identity(
    sessions: &Arc<dyn SessionProvider>,
    db: &Arc<Mutex<Database>>,
) -> Option<Identity> {
    let session = sessions.current_session()?;

    let display_name = match db.lock() {
        Ok(db) => match db.get_profile(&session.user_id) {
            Ok(profile) => profile.and_then(|p| p.display_name),
            Err(e) => {
                warn!(user = %session.user_id, error = %e, "profile lookup failed");
                None
            }
        },
        Err(_) => {
            warn!("storage handle poisoned during identity derivation");
            None
        }
    };

    Some(Identity {
        user_id: session.user_id,
        email: session.email,
        display_name,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::LocalSessions;
    use tandem_shared::UserId;

    fn open_db(dir: &tempfile::TempDir) -> Arc<Mutex<Database>> {
        Arc::new(Mutex::new(
            Database::open_at(&dir.path().join("test.db")).unwrap(),
        ))
    }

    fn signed_in_sessions(contact: &str) -> Arc<LocalSessions> {
        let sessions = Arc::new(LocalSessions::new());
        sessions.sign_in_with_challenge(contact).unwrap();
        let token = sessions.pending_token().unwrap();
        sessions.complete_challenge(&token).unwrap();
        sessions
    }

    #[tokio::test]
    async fn session_without_profile_resolves_without_a_name() {
        let dir = tempfile::tempdir().unwrap();
        let db = open_db(&dir);
        let sessions = signed_in_sessions("ada@example.com");

        let resolver = IdentityResolver::spawn(sessions, db);
        let identity = resolver.current().expect("identity should be present");
        assert_eq!(identity.user_id, UserId::new("ada@example.com"));
        assert!(identity.display_name.is_none());
    }

    #[tokio::test]
    async fn display_name_update_is_observed() {
        let dir = tempfile::tempdir().unwrap();
        let db = open_db(&dir);
        let sessions = signed_in_sessions("ada@example.com");

        let resolver = IdentityResolver::spawn(sessions, db);
        resolver.update_display_name("  Ada  ").unwrap();

        let identity = resolver.current().unwrap();
        assert_eq!(identity.display_name.as_deref(), Some("Ada"));
    }

    #[tokio::test]
    async fn update_without_identity_is_a_visible_failure() {
        let dir = tempfile::tempdir().unwrap();
        let db = open_db(&dir);
        let sessions: Arc<LocalSessions> = Arc::new(LocalSessions::new());

        let resolver = IdentityResolver::spawn(sessions, db);
        assert!(matches!(
            resolver.update_display_name("Ada"),
            Err(SyncError::NoIdentity)
        ));
    }

    #[tokio::test]
    async fn sign_out_clears_the_identity() {
        let dir = tempfile::tempdir().unwrap();
        let db = open_db(&dir);
        let sessions = signed_in_sessions("ada@example.com");

        let resolver = IdentityResolver::spawn(sessions.clone(), db);
        assert!(resolver.current().is_some());

        let mut rx = resolver.watch();
        sessions.sign_out();
        tokio::time::timeout(std::time::Duration::from_secs(2), rx.changed())
            .await
            .expect("resolver should observe the sign-out")
            .unwrap();
        assert!(rx.borrow().is_none());
    }
}
