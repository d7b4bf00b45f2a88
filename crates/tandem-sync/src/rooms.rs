//! Room membership: idempotent create-or-join by code.

use std::sync::{Arc, Mutex};

use chrono::Utc;
use tandem_shared::constants::LOCAL_KEY_ROOM_CODE;
use tandem_shared::RoomCode;
use tandem_store::{Database, Membership, Room};
use tracing::{info, warn};

use crate::error::{Result, SyncError};
use crate::session::SessionProvider;

/// Create the room if needed and attach the current user as a member.
///
/// The user id is resolved from the session provider at call time, never
/// from a cached identity.  A code that trims empty is a silent no-op
/// (`Ok(None)`).  The room and membership upserts are both idempotent, so
/// retrying after a partial failure converges to the same joined state;
/// a room left behind by a failed membership write is accepted as-is.
///
/// On success the code is remembered in the local cache so it survives
/// restarts.
pub fn join_or_create_room(
    sessions: &Arc<dyn SessionProvider>,
    db: &Arc<Mutex<Database>>,
    raw_code: &str,
) -> Result<Option<RoomCode>> {
    let code = match RoomCode::parse(raw_code) {
        Some(code) => code,
        None => return Ok(None),
    };

    let session = sessions.current_session().ok_or(SyncError::NoIdentity)?;

    let db = db.lock().map_err(|_| SyncError::Poisoned)?;

    db.upsert_room(&Room {
        code: code.clone(),
        created_at: Utc::now(),
    })?;

    db.upsert_membership(&Membership {
        room_code: code.clone(),
        user_id: session.user_id.clone(),
        joined_at: Utc::now(),
    })?;

    // The cache is a convenience, not part of the join: losing it only costs
    // the automatic re-mount on next start.
    if let Err(e) = db.local_set(LOCAL_KEY_ROOM_CODE, &code) {
        warn!(room = %code, error = %e, "failed to remember room code");
    }

    info!(room = %code, user = %session.user_id, "joined room");
    Ok(Some(code))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::LocalSessions;

    fn open_db(dir: &tempfile::TempDir) -> Arc<Mutex<Database>> {
        Arc::new(Mutex::new(
            Database::open_at(&dir.path().join("test.db")).unwrap(),
        ))
    }

    fn signed_in_sessions(contact: &str) -> Arc<dyn SessionProvider> {
        let sessions = LocalSessions::new();
        sessions.sign_in_with_challenge(contact).unwrap();
        let token = sessions.pending_token().unwrap();
        sessions.complete_challenge(&token).unwrap();
        Arc::new(sessions)
    }

    #[test]
    fn joining_twice_leaves_one_membership() {
        let dir = tempfile::tempdir().unwrap();
        let db = open_db(&dir);
        let sessions = signed_in_sessions("ada@example.com");

        let first = join_or_create_room(&sessions, &db, "our-room").unwrap();
        let second = join_or_create_room(&sessions, &db, "our-room")
            .expect("second join must not error");
        assert_eq!(first, second);

        let code = first.unwrap();
        let members = db.lock().unwrap().members_of(&code).unwrap();
        assert_eq!(members.len(), 1);
    }

    #[test]
    fn blank_code_is_a_silent_noop() {
        let dir = tempfile::tempdir().unwrap();
        let db = open_db(&dir);
        let sessions = signed_in_sessions("ada@example.com");

        assert!(join_or_create_room(&sessions, &db, "   ").unwrap().is_none());
    }

    #[test]
    fn joining_without_identity_fails_visibly() {
        let dir = tempfile::tempdir().unwrap();
        let db = open_db(&dir);
        let sessions: Arc<dyn SessionProvider> = Arc::new(LocalSessions::new());

        assert!(matches!(
            join_or_create_room(&sessions, &db, "our-room"),
            Err(SyncError::NoIdentity)
        ));
    }

    #[test]
    fn the_room_code_is_remembered() {
        let dir = tempfile::tempdir().unwrap();
        let db = open_db(&dir);
        let sessions = signed_in_sessions("ada@example.com");

        join_or_create_room(&sessions, &db, "  our-room  ").unwrap();

        let cached: Option<RoomCode> = db
            .lock()
            .unwrap()
            .local_get(LOCAL_KEY_ROOM_CODE)
            .unwrap();
        assert_eq!(cached, RoomCode::parse("our-room"));
    }

    #[test]
    fn both_partners_can_join_the_same_room() {
        let dir = tempfile::tempdir().unwrap();
        let db = open_db(&dir);

        let ada = signed_in_sessions("ada@example.com");
        let ben = signed_in_sessions("ben@example.com");

        let code = join_or_create_room(&ada, &db, "our-room").unwrap().unwrap();
        join_or_create_room(&ben, &db, "our-room").unwrap();

        let members = db.lock().unwrap().members_of(&code).unwrap();
        assert_eq!(members.len(), 2);
    }
}
