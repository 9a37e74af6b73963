//! Actions of the two stores, and the payloads they carry.
//!
//! Every remote action is one [`Operation`] variant. The runner dispatches
//! the `Pending` phase; the reducer's effect dispatches `Ok` or `Err`.

use crate::error::{PersistenceError, TransportError};
use crate::state::{AuthToken, Todo, TodoId};
use serde::{Deserialize, Serialize};
use std::fmt;
use tasksync_core::operation::{Operation, Phase, RequestId};

/// Fetch the whole list
pub type FetchTodos = Operation<(), Vec<Todo>>;
/// Create a todo from a description
pub type AddTodo = Operation<String, Todo>;
/// Replace a todo's description
pub type UpdateTodo = Operation<TodoUpdate, Todo>;
/// Delete a todo
pub type RemoveTodo = Operation<TodoId, TodoId>;
/// Authenticate an existing account
pub type SignIn = Operation<SignInRequest, AuthenticatedUser>;
/// Register and authenticate
pub type SignUp = Operation<SignUpRequest, AuthenticatedUser>;

/// New description for an existing todo.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TodoUpdate {
    /// Todo to change
    pub id: TodoId,
    /// Replacement description
    pub description: String,
}

/// Todo Store actions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TodoAction {
    /// Fetch phases
    Fetch(FetchTodos),
    /// Add phases
    Add(AddTodo),
    /// Update phases
    Update(UpdateTodo),
    /// Remove phases
    Remove(RemoveTodo),
}

impl TodoAction {
    /// Request the action belongs to
    #[must_use]
    pub const fn request(&self) -> RequestId {
        match self {
            Self::Fetch(op) => op.request,
            Self::Add(op) => op.request,
            Self::Update(op) => op.request,
            Self::Remove(op) => op.request,
        }
    }

    /// Whether this is the success or failure phase of `request`
    #[must_use]
    pub const fn completes(&self, request: RequestId) -> bool {
        let terminal = match self {
            Self::Fetch(op) => op.is_terminal(),
            Self::Add(op) => op.is_terminal(),
            Self::Update(op) => op.is_terminal(),
            Self::Remove(op) => op.is_terminal(),
        };
        terminal && self.request().generation() == request.generation()
    }

    /// Failure message carried by an `Err` phase
    #[must_use]
    pub fn into_failure(self) -> Option<String> {
        match self {
            Self::Fetch(Operation {
                phase: Phase::Err(message),
                ..
            })
            | Self::Add(Operation {
                phase: Phase::Err(message),
                ..
            })
            | Self::Update(Operation {
                phase: Phase::Err(message),
                ..
            })
            | Self::Remove(Operation {
                phase: Phase::Err(message),
                ..
            }) => Some(message),
            _ => None,
        }
    }
}

/// Login password.
///
/// Serialized as a plain string; `Debug` redacts it.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Password(String);

impl Password {
    /// Wraps a raw password
    #[must_use]
    pub fn new(password: impl Into<String>) -> Self {
        Self(password.into())
    }

    /// The raw password
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Password {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Password(<redacted>)")
    }
}

/// Sign-in credentials.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignInRequest {
    /// Account email
    pub email: String,
    /// Account password
    pub password: Password,
}

impl SignInRequest {
    /// Builds credentials from raw strings
    #[must_use]
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: Password::new(password),
        }
    }
}

/// Registration data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignUpRequest {
    /// Display name
    pub name: String,
    /// Account email
    pub email: String,
    /// Account password
    pub password: Password,
}

impl SignUpRequest {
    /// Builds registration data from raw strings
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        email: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            password: Password::new(password),
        }
    }
}

/// User block of an authentication response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    /// Display name
    #[serde(default)]
    pub name: Option<String>,
    /// Account email
    #[serde(default)]
    pub email: Option<String>,
}

/// Raw authentication response, before normalization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthResponse {
    /// Session credential; absent or empty means failure
    #[serde(default)]
    pub token: Option<AuthToken>,
    /// Account details, when the service sends them
    #[serde(default)]
    pub user: Option<UserProfile>,
}

impl AuthResponse {
    /// Successful response carrying `token`
    #[must_use]
    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: Some(AuthToken::new(token)),
            user: None,
        }
    }

    /// Attaches a user block
    #[must_use]
    pub fn with_user(mut self, name: Option<&str>, email: Option<&str>) -> Self {
        self.user = Some(UserProfile {
            name: name.map(str::to_string),
            email: email.map(str::to_string),
        });
        self
    }

    fn token(self) -> Result<(AuthToken, UserProfile), TransportError> {
        match self.token {
            Some(token) if !token.expose().is_empty() => Ok((token, self.user.unwrap_or_default())),
            _ => Err(TransportError::MissingToken),
        }
    }

    /// Normalizes a sign-in response.
    ///
    /// The name falls back to an empty string; the email is always the one
    /// that was submitted.
    ///
    /// # Errors
    ///
    /// [`TransportError::MissingToken`] if no usable token was returned.
    pub fn into_signed_in(
        self,
        request: &SignInRequest,
    ) -> Result<AuthenticatedUser, TransportError> {
        let (token, user) = self.token()?;
        Ok(AuthenticatedUser {
            token,
            name: user.name.unwrap_or_default(),
            email: request.email.clone(),
        })
    }

    /// Normalizes a sign-up response.
    ///
    /// Missing user fields fall back to the submitted values.
    ///
    /// # Errors
    ///
    /// [`TransportError::MissingToken`] if no usable token was returned.
    pub fn into_signed_up(
        self,
        request: &SignUpRequest,
    ) -> Result<AuthenticatedUser, TransportError> {
        let (token, user) = self.token()?;
        Ok(AuthenticatedUser {
            token,
            name: user.name.unwrap_or_else(|| request.name.clone()),
            email: user.email.unwrap_or_else(|| request.email.clone()),
        })
    }
}

/// Normalized authentication result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthenticatedUser {
    /// Session credential, never empty
    pub token: AuthToken,
    /// Display name, possibly empty
    pub name: String,
    /// Account email
    pub email: String,
}

/// Session Store actions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionAction {
    /// Sign-in phases
    SignIn(SignIn),
    /// Sign-up phases
    SignUp(SignUp),
    /// Drop an acknowledged error message
    ClearError,
    /// The token obtained by `request` was persisted
    TokenPersisted {
        /// Sign-in or sign-up that produced the token
        request: RequestId,
        /// The authenticated user
        user: AuthenticatedUser,
    },
    /// The token obtained by `request` could not be persisted
    TokenPersistFailed {
        /// Sign-in or sign-up that produced the token
        request: RequestId,
        /// Why the write failed
        error: PersistenceError,
    },
}

impl SessionAction {
    /// Whether this action finishes the sign-in or sign-up `request`.
    ///
    /// Success is only final once persistence reported back.
    #[must_use]
    pub fn completes(&self, request: RequestId) -> bool {
        match self {
            Self::SignIn(op) => op.request == request && matches!(op.phase, Phase::Err(_)),
            Self::SignUp(op) => op.request == request && matches!(op.phase, Phase::Err(_)),
            Self::TokenPersisted { request: done, .. }
            | Self::TokenPersistFailed { request: done, .. } => *done == request,
            Self::ClearError => false,
        }
    }
}
