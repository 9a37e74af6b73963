//! Mock authentication service.

use super::lock;
use crate::actions::{AuthResponse, SignInRequest, SignUpRequest};
use crate::error::TransportError;
use crate::providers::AuthService;
use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Clone)]
struct Account {
    name: String,
    password: String,
}

#[derive(Debug, Default)]
struct Inner {
    accounts: HashMap<String, Account>,
    scripted: VecDeque<Result<AuthResponse, TransportError>>,
    delays: VecDeque<Duration>,
    sign_ins: usize,
    sign_ups: usize,
    issued: usize,
}

/// Mock authentication service.
///
/// Keeps registered accounts in memory and issues tokens `token-1`,
/// `token-2`, ... Responses can also be scripted, which bypasses the
/// account logic for that call.
#[derive(Debug, Clone, Default)]
pub struct MockAuthService {
    inner: Arc<Mutex<Inner>>,
}

impl MockAuthService {
    /// Service without accounts
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an account that can sign in
    #[must_use]
    pub fn with_account(self, name: &str, email: &str, password: &str) -> Self {
        lock(&self.inner).accounts.insert(
            email.to_string(),
            Account {
                name: name.to_string(),
                password: password.to_string(),
            },
        );
        self
    }

    /// Answers the next call with `response`
    pub fn respond_next(&self, response: Result<AuthResponse, TransportError>) {
        lock(&self.inner).scripted.push_back(response);
    }

    /// Delays the response to the next call by `delay`
    pub fn delay_next(&self, delay: Duration) {
        lock(&self.inner).delays.push_back(delay);
    }

    /// Number of `sign_in` calls received
    #[must_use]
    pub fn sign_in_calls(&self) -> usize {
        lock(&self.inner).sign_ins
    }

    /// Number of `sign_up` calls received
    #[must_use]
    pub fn sign_up_calls(&self) -> usize {
        lock(&self.inner).sign_ups
    }

    fn respond<F>(
        &self,
        apply: F,
    ) -> impl Future<Output = Result<AuthResponse, TransportError>> + Send + use<F>
    where
        F: FnOnce(&mut Inner) -> Result<AuthResponse, TransportError>,
    {
        let (delay, outcome) = {
            let mut inner = lock(&self.inner);
            let delay = inner.delays.pop_front();
            let outcome = match inner.scripted.pop_front() {
                Some(scripted) => scripted,
                None => apply(&mut inner),
            };
            (delay, outcome)
        };

        async move {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            outcome
        }
    }
}

impl Inner {
    fn issue(&mut self, name: &str, email: &str) -> AuthResponse {
        self.issued += 1;
        AuthResponse::with_token(format!("token-{}", self.issued))
            .with_user(Some(name), Some(email))
    }
}

impl AuthService for MockAuthService {
    fn sign_up(
        &self,
        request: &SignUpRequest,
    ) -> impl Future<Output = Result<AuthResponse, TransportError>> + Send {
        let request = request.clone();
        lock(&self.inner).sign_ups += 1;
        self.respond(move |inner| {
            if inner.accounts.contains_key(&request.email) {
                return Err(TransportError::Status {
                    status: 400,
                    message: None,
                });
            }
            inner.accounts.insert(
                request.email.clone(),
                Account {
                    name: request.name.clone(),
                    password: request.password.expose().to_string(),
                },
            );
            Ok(inner.issue(&request.name, &request.email))
        })
    }

    fn sign_in(
        &self,
        request: &SignInRequest,
    ) -> impl Future<Output = Result<AuthResponse, TransportError>> + Send {
        let request = request.clone();
        lock(&self.inner).sign_ins += 1;
        self.respond(move |inner| {
            let name = match inner.accounts.get(&request.email) {
                Some(account) if account.password == request.password.expose() => {
                    account.name.clone()
                },
                _ => {
                    return Err(TransportError::Status {
                        status: 401,
                        message: None,
                    });
                },
            };
            Ok(inner.issue(&name, &request.email))
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn registered_accounts_can_sign_in() {
        let auth = MockAuthService::new();
        auth.sign_up(&SignUpRequest::new("Jo", "jo@example.com", "secret1"))
            .await
            .unwrap();

        let response = auth
            .sign_in(&SignInRequest::new("jo@example.com", "secret1"))
            .await
            .unwrap();
        assert_eq!(response.token.unwrap().expose(), "token-2");
        assert_eq!(auth.sign_up_calls(), 1);
        assert_eq!(auth.sign_in_calls(), 1);
    }

    #[tokio::test]
    async fn wrong_password_and_duplicates_are_rejected() {
        let auth = MockAuthService::new().with_account("Jo", "jo@example.com", "secret1");
        assert!(auth.sign_in(&SignInRequest::new("jo@example.com", "nope123")).await.is_err());
        assert!(
            auth.sign_up(&SignUpRequest::new("Jo", "jo@example.com", "secret1"))
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn scripted_response_wins() {
        let auth = MockAuthService::new();
        auth.respond_next(Ok(AuthResponse::with_token("abc")));
        let response = auth
            .sign_in(&SignInRequest::new("anyone@example.com", "whatever"))
            .await
            .unwrap();
        assert_eq!(response, AuthResponse::with_token("abc"));
    }
}
