//! Session token storage trait.

use crate::error::PersistenceError;
use std::future::Future;

/// Key the session token is stored under
pub const SESSION_TOKEN_KEY: &str = "session_token";

/// Scoped, durable key-value storage.
///
/// Written after a successful sign-in or sign-up. Reading happens at
/// application start, outside the stores; an absent value means a fresh,
/// unauthenticated session.
pub trait SessionPersistence: Send + Sync {
    /// Store `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// The write did not reach durable storage.
    fn save(
        &self,
        key: &str,
        value: &str,
    ) -> impl Future<Output = Result<(), PersistenceError>> + Send;

    /// Value stored under `key`, if any.
    ///
    /// # Errors
    ///
    /// The storage could not be read or is corrupt.
    fn load(
        &self,
        key: &str,
    ) -> impl Future<Output = Result<Option<String>, PersistenceError>> + Send;
}
