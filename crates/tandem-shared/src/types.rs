use serde::{Deserialize, Serialize};

/// Opaque stable user identifier handed out by the session provider.
///
/// Tandem never inspects the contents; it only stores and compares it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct UserId(pub String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A room code: the flat namespace key two partners share.
///
/// Construction trims surrounding whitespace; a code that trims empty is not
/// a valid room and [`RoomCode::parse`] returns `None` for it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct RoomCode(pub String);

impl RoomCode {
    /// Trim and validate a user-supplied code. Empty after trimming → `None`.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RoomCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn room_code_trims_whitespace() {
        let code = RoomCode::parse("  our-room  ").unwrap();
        assert_eq!(code.as_str(), "our-room");
    }

    #[test]
    fn blank_room_code_is_rejected() {
        assert!(RoomCode::parse("").is_none());
        assert!(RoomCode::parse("   ").is_none());
    }

    #[test]
    fn user_id_round_trips_through_display() {
        let id = UserId::new("user-1");
        assert_eq!(id.to_string(), "user-1");
    }
}
