//! Session Store reducer.
//!
//! Sign-in and sign-up share one lifecycle. On success the session is updated
//! first, then a follow-up effect mirrors the token into
//! [`SessionPersistence`]; the operation is complete once that effect reports
//! [`SessionAction::TokenPersisted`] or [`SessionAction::TokenPersistFailed`].
//! A failed attempt keeps whatever credentials the session already held and
//! never touches persistence.

use crate::actions::{AuthenticatedUser, SessionAction, SignIn, SignUp};
use crate::environment::SessionEnvironment;
use crate::error::{FailureText, TransportError};
use crate::providers::{AuthService, SESSION_TOKEN_KEY, SessionPersistence};
use crate::state::Session;
use tasksync_core::effect::Effect;
use tasksync_core::environment::Clock;
use tasksync_core::operation::{Phase, RequestId};
use tasksync_core::reducer::Reducer;
use tasksync_core::{SmallVec, smallvec};

/// Reducer for [`Session`].
#[derive(Debug, Clone)]
pub struct SessionReducer<A, P> {
    _phantom: std::marker::PhantomData<(A, P)>,
}

impl<A, P> SessionReducer<A, P> {
    /// Creates the reducer
    #[must_use]
    pub const fn new() -> Self {
        Self {
            _phantom: std::marker::PhantomData,
        }
    }
}

impl<A, P> Default for SessionReducer<A, P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A, P> SessionReducer<A, P>
where
    A: AuthService + Clone + 'static,
    P: SessionPersistence + Clone + 'static,
{
    fn authenticated(
        state: &mut Session,
        env: &SessionEnvironment<A, P>,
        request: RequestId,
        user: AuthenticatedUser,
    ) -> Effect<SessionAction> {
        state.token = Some(user.token.clone());
        state.name = Some(user.name.clone());
        state.email = Some(user.email.clone());
        state.signed_in_at = Some(env.clock.now());
        state.request.succeed();
        tracing::info!(%request, email = %user.email, "Session established");

        let persistence = env.persistence.clone();
        Effect::future(async move {
            let saved = persistence.save(SESSION_TOKEN_KEY, user.token.expose()).await;
            match saved {
                Ok(()) => Some(SessionAction::TokenPersisted { request, user }),
                Err(error) => {
                    tracing::error!(%request, %error, "Failed to persist session token");
                    Some(SessionAction::TokenPersistFailed { request, error })
                },
            }
        })
    }

    fn failed(state: &mut Session, request: RequestId, kind: &'static str, message: String) {
        tracing::warn!(%request, kind, %message, "Authentication failed");
        state.request.fail(message);
    }

    fn sign_in(
        state: &mut Session,
        op: SignIn,
        env: &SessionEnvironment<A, P>,
    ) -> Effect<SessionAction> {
        let request = op.request;
        match op.phase {
            Phase::Pending(credentials) => {
                state.request.start(request);
                tracing::debug!(%request, "Sign-in started");
                let auth = env.auth.clone();
                SignIn::perform(
                    request,
                    async move {
                        auth.sign_in(&credentials)
                            .await?
                            .into_signed_in(&credentials)
                    },
                    SessionAction::SignIn,
                    |error: &TransportError| error.describe(&FailureText::SIGN_IN),
                )
            },
            Phase::Ok(user) => Self::authenticated(state, env, request, user),
            Phase::Err(message) => {
                Self::failed(state, request, "sign_in", message);
                Effect::None
            },
        }
    }

    fn sign_up(
        state: &mut Session,
        op: SignUp,
        env: &SessionEnvironment<A, P>,
    ) -> Effect<SessionAction> {
        let request = op.request;
        match op.phase {
            Phase::Pending(registration) => {
                state.request.start(request);
                tracing::debug!(%request, "Sign-up started");
                let auth = env.auth.clone();
                SignUp::perform(
                    request,
                    async move {
                        auth.sign_up(&registration)
                            .await?
                            .into_signed_up(&registration)
                    },
                    SessionAction::SignUp,
                    |error: &TransportError| error.describe(&FailureText::SIGN_UP),
                )
            },
            Phase::Ok(user) => Self::authenticated(state, env, request, user),
            Phase::Err(message) => {
                Self::failed(state, request, "sign_up", message);
                Effect::None
            },
        }
    }
}

impl<A, P> Reducer for SessionReducer<A, P>
where
    A: AuthService + Clone + 'static,
    P: SessionPersistence + Clone + 'static,
{
    type State = Session;
    type Action = SessionAction;
    type Environment = SessionEnvironment<A, P>;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        let effect = match action {
            SessionAction::SignIn(op) => Self::sign_in(state, op, env),
            SessionAction::SignUp(op) => Self::sign_up(state, op, env),
            SessionAction::ClearError => {
                state.request.clear_error();
                Effect::None
            },
            SessionAction::TokenPersisted { request, .. } => {
                tracing::debug!(%request, "Session token persisted");
                Effect::None
            },
            // Already logged by the effect; the in-memory session stays valid.
            SessionAction::TokenPersistFailed { .. } => Effect::None,
        };
        smallvec![effect]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::{AuthResponse, SignInRequest, SignUpRequest};
    use crate::error::PersistenceError;
    use crate::mocks::MockAuthService;
    use crate::persistence::MemorySessionPersistence;
    use crate::state::AuthToken;
    use std::sync::Arc;
    use tasksync_core::operation::Status;
    use tasksync_testing::{ReducerTest, assertions, test_clock};

    type TestReducer = SessionReducer<MockAuthService, MemorySessionPersistence>;
    type TestEnv = SessionEnvironment<MockAuthService, MemorySessionPersistence>;

    fn env(auth: MockAuthService, persistence: MemorySessionPersistence) -> TestEnv {
        SessionEnvironment::new(auth, persistence).with_clock(Arc::new(test_clock()))
    }

    fn request() -> RequestId {
        RequestId::new(1)
    }

    fn user(token: &str) -> AuthenticatedUser {
        AuthenticatedUser {
            token: AuthToken::new(token),
            name: "Jo".to_string(),
            email: "jo@example.com".to_string(),
        }
    }

    fn signed_in(token: &str) -> Session {
        let mut session = Session::new();
        session.token = Some(AuthToken::new(token));
        session.name = Some("Old".to_string());
        session.email = Some("old@example.com".to_string());
        session.request.succeed();
        session
    }

    #[test]
    fn sign_in_start_feeds_back_normalized_user() {
        let auth = MockAuthService::new();
        auth.respond_next(Ok(AuthResponse::with_token("abc").with_user(Some("Jo"), None)));

        ReducerTest::new(TestReducer::new())
            .with_env(env(auth.clone(), MemorySessionPersistence::new()))
            .given_state(Session::new())
            .when_action(SessionAction::SignIn(SignIn::pending(
                request(),
                SignInRequest::new("jo@example.com", "secret1"),
            )))
            .then_state(|state| {
                assert_eq!(state.status(), Status::Loading);
                assert!(!state.is_authenticated());
            })
            .then_feedback(|actions| {
                assert_eq!(actions, [SessionAction::SignIn(SignIn::ok(request(), user("abc")))]);
            })
            .run();

        assert_eq!(auth.sign_in_calls(), 1);
    }

    #[test]
    fn missing_token_becomes_failure_message() {
        let auth = MockAuthService::new();
        auth.respond_next(Ok(AuthResponse::default()));

        ReducerTest::new(TestReducer::new())
            .with_env(env(auth, MemorySessionPersistence::new()))
            .given_state(Session::new())
            .when_action(SessionAction::SignUp(SignUp::pending(
                request(),
                SignUpRequest::new("Jo", "jo@example.com", "secret1"),
            )))
            .then_feedback(|actions| {
                assert_eq!(
                    actions,
                    [SessionAction::SignUp(SignUp::err(request(), "Registration failed"))]
                );
            })
            .run();
    }

    #[test]
    fn success_sets_credentials_then_persists() {
        let persistence = MemorySessionPersistence::new();

        ReducerTest::new(TestReducer::new())
            .with_env(env(MockAuthService::new(), persistence.clone()))
            .given_state(Session::new())
            .when_action(SessionAction::SignIn(SignIn::ok(request(), user("abc"))))
            .then_state(|state| {
                assert_eq!(state.token().map(AuthToken::expose), Some("abc"));
                assert_eq!(state.name(), Some("Jo"));
                assert_eq!(state.email(), Some("jo@example.com"));
                assert_eq!(state.status(), Status::Succeeded);
                assert_eq!(state.error(), None);
                assert_eq!(state.signed_in_at(), Some(test_clock().now()));
            })
            .then_effects(assertions::assert_has_future_effect)
            .then_feedback(|actions| {
                assert_eq!(
                    actions,
                    [SessionAction::TokenPersisted {
                        request: request(),
                        user: user("abc")
                    }]
                );
            })
            .run();

        assert_eq!(
            persistence.saves(),
            vec![(SESSION_TOKEN_KEY.to_string(), "abc".to_string())]
        );
    }

    #[test]
    fn persistence_failure_is_reported_not_fatal() {
        let persistence = MemorySessionPersistence::new();
        persistence.fail_next_save(PersistenceError::Io("read-only".to_string()));

        ReducerTest::new(TestReducer::new())
            .with_env(env(MockAuthService::new(), persistence))
            .given_state(Session::new())
            .when_action(SessionAction::SignUp(SignUp::ok(request(), user("abc"))))
            .then_state(|state| assert!(state.is_authenticated()))
            .then_feedback(|actions| {
                assert_eq!(
                    actions,
                    [SessionAction::TokenPersistFailed {
                        request: request(),
                        error: PersistenceError::Io("read-only".to_string())
                    }]
                );
            })
            .run();
    }

    #[test]
    fn failure_keeps_existing_session_and_skips_persistence() {
        let persistence = MemorySessionPersistence::new();

        ReducerTest::new(TestReducer::new())
            .with_env(env(MockAuthService::new(), persistence.clone()))
            .given_state(signed_in("old-token"))
            .when_action(SessionAction::SignIn(SignIn::err(request(), "Invalid credentials")))
            .then_state(|state| {
                assert_eq!(state.status(), Status::Failed);
                assert_eq!(state.error(), Some("Invalid credentials"));
                assert_eq!(state.token().map(AuthToken::expose), Some("old-token"));
                assert_eq!(state.name(), Some("Old"));
            })
            .then_effects(assertions::assert_no_effects)
            .run();

        assert!(persistence.saves().is_empty());
    }

    #[test]
    fn clear_error_only_drops_message() {
        let mut failed = signed_in("t");
        failed.request.fail("Invalid credentials");

        ReducerTest::new(TestReducer::new())
            .with_env(env(MockAuthService::new(), MemorySessionPersistence::new()))
            .given_state(failed)
            .when_action(SessionAction::ClearError)
            .then_state(|state| {
                assert_eq!(state.error(), None);
                assert_eq!(state.status(), Status::Failed);
                assert!(state.is_authenticated());
            })
            .then_effects(assertions::assert_no_effects)
            .run();
    }

    #[test]
    fn persistence_reports_do_not_change_state() {
        let state = signed_in("t");
        let expected = state.clone();

        ReducerTest::new(TestReducer::new())
            .with_env(env(MockAuthService::new(), MemorySessionPersistence::new()))
            .given_state(state)
            .when_action(SessionAction::TokenPersisted {
                request: request(),
                user: user("t"),
            })
            .then_state(move |state| assert_eq!(state, &expected))
            .run();
    }
}
