use thiserror::Error;

use tandem_store::StoreError;

/// Errors surfaced to callers of the sync layer.
///
/// Precondition failures (`NoIdentity`, `NoRoom`, `EmptyContact`) are
/// user-visible notices; `Store` carries the storage layer's rejection
/// verbatim.  None of these are fatal to the process.
#[derive(Error, Debug)]
pub enum SyncError {
    /// The operation requires a signed-in user.
    #[error("no identity is present; sign in first")]
    NoIdentity,

    /// The operation requires a joined room.
    #[error("no room has been joined")]
    NoRoom,

    /// Sign-in was requested without a contact address.
    #[error("a contact address is required to sign in")]
    EmptyContact,

    /// A challenge completion did not match the pending challenge.
    #[error("no matching sign-in challenge is pending")]
    UnknownChallenge,

    /// The storage layer rejected the operation.
    #[error("storage rejected the operation: {0}")]
    Store(#[from] StoreError),

    /// A shared handle was poisoned by a crashed thread.
    #[error("internal state is poisoned by a crashed thread")]
    Poisoned,

    /// The list engine's task has stopped.
    #[error("the sync engine is no longer running")]
    EngineClosed,
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, SyncError>;
