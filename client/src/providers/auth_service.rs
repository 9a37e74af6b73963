//! Remote authentication service trait.

use crate::actions::{AuthResponse, SignInRequest, SignUpRequest};
use crate::error::TransportError;
use std::future::Future;

/// Account registration and login.
///
/// Responses are returned raw; a response without a token is normalized into
/// a failure by the session reducer, not by the adapter.
pub trait AuthService: Send + Sync {
    /// Register a new account.
    ///
    /// # Errors
    ///
    /// Transport failure, e.g. the email is already registered.
    fn sign_up(
        &self,
        request: &SignUpRequest,
    ) -> impl Future<Output = Result<AuthResponse, TransportError>> + Send;

    /// Log into an existing account.
    ///
    /// # Errors
    ///
    /// Transport failure, e.g. wrong credentials.
    fn sign_in(
        &self,
        request: &SignInRequest,
    ) -> impl Future<Output = Result<AuthResponse, TransportError>> + Send;
}
