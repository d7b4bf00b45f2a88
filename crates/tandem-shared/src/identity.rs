use serde::{Deserialize, Serialize};

use crate::types::UserId;

/// The resolved identity of the signed-in user.
///
/// Produced by the identity resolver from the current session plus the
/// profile row; absent entirely when no session exists.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Identity {
    /// Stable identifier from the session provider.
    pub user_id: UserId,
    /// Contact address the session was established with, when known.
    pub email: Option<String>,
    /// Display name from the profile row; `None` until the user sets one.
    pub display_name: Option<String>,
}

impl Identity {
    /// The name to show for this user locally: the profile display name,
    /// or the empty string when none is set yet.
    pub fn local_name(&self) -> String {
        self.display_name.clone().unwrap_or_default()
    }
}
