//! # tandem-shared
//!
//! Plain types shared across the Tandem crates: opaque identifiers, the
//! resolved user identity, and workspace-wide constants.  No I/O lives here.

pub mod constants;
pub mod identity;
pub mod types;

pub use identity::Identity;
pub use types::{RoomCode, UserId};
