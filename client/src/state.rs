//! State owned by the two stores.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tasksync_core::operation::{RequestStatus, Status};

/// Identifier assigned to a todo by the remote service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TodoId(i64);

impl TodoId {
    /// Wraps a raw id
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    /// The raw id
    #[must_use]
    pub const fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for TodoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A to-do item as returned by the remote service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Todo {
    /// Remote identity
    pub id: TodoId,
    /// What needs doing
    pub description: String,
    /// Done or not
    #[serde(default)]
    pub completed: bool,
}

impl Todo {
    /// A todo that is not completed yet
    #[must_use]
    pub fn new(id: TodoId, description: impl Into<String>) -> Self {
        Self {
            id,
            description: description.into(),
            completed: false,
        }
    }
}

/// Todo Store state.
///
/// `items` keeps fetch/add order. Only the todo reducer changes it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TodoState {
    pub(crate) items: Vec<Todo>,
    pub(crate) request: RequestStatus,
    pub(crate) last_synced_at: Option<DateTime<Utc>>,
}

impl TodoState {
    /// Empty, idle state
    #[must_use]
    pub const fn new() -> Self {
        Self {
            items: Vec::new(),
            request: RequestStatus::new(),
            last_synced_at: None,
        }
    }

    /// State holding `items`, as if freshly fetched
    #[must_use]
    pub fn with_items(items: Vec<Todo>) -> Self {
        Self {
            items,
            ..Self::new()
        }
    }

    /// Cached items, in order
    #[must_use]
    pub fn items(&self) -> &[Todo] {
        &self.items
    }

    /// Looks a todo up by id
    #[must_use]
    pub fn get(&self, id: TodoId) -> Option<&Todo> {
        self.items.iter().find(|todo| todo.id == id)
    }

    /// Number of cached items
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the cache is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Number of completed items
    #[must_use]
    pub fn completed_count(&self) -> usize {
        self.items.iter().filter(|todo| todo.completed).count()
    }

    /// Request bookkeeping
    #[must_use]
    pub const fn request(&self) -> &RequestStatus {
        &self.request
    }

    /// Lifecycle status of the last operation
    #[must_use]
    pub const fn status(&self) -> Status {
        self.request.status()
    }

    /// Last failure message
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.request.error()
    }

    /// Whether an operation is in flight
    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.request.is_loading()
    }

    /// When an operation last succeeded
    #[must_use]
    pub const fn last_synced_at(&self) -> Option<DateTime<Utc>> {
        self.last_synced_at
    }
}

/// Opaque session credential.
///
/// `Debug` never prints the value.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AuthToken(String);

impl AuthToken {
    /// Wraps a raw token
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// The raw token, for persistence and request headers
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AuthToken(<redacted>)")
    }
}

/// Session Store state.
///
/// A failed attempt leaves `token`, `name` and `email` as they were.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub(crate) token: Option<AuthToken>,
    pub(crate) name: Option<String>,
    pub(crate) email: Option<String>,
    pub(crate) request: RequestStatus,
    pub(crate) signed_in_at: Option<DateTime<Utc>>,
}

impl Session {
    /// Unauthenticated, idle session
    #[must_use]
    pub const fn new() -> Self {
        Self {
            token: None,
            name: None,
            email: None,
            request: RequestStatus::new(),
            signed_in_at: None,
        }
    }

    /// Current credential
    #[must_use]
    pub const fn token(&self) -> Option<&AuthToken> {
        self.token.as_ref()
    }

    /// Display name of the signed-in user
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Email of the signed-in user
    #[must_use]
    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }

    /// Whether a token is held
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    /// Request bookkeeping
    #[must_use]
    pub const fn request(&self) -> &RequestStatus {
        &self.request
    }

    /// Lifecycle status of the last attempt
    #[must_use]
    pub const fn status(&self) -> Status {
        self.request.status()
    }

    /// Last failure message
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.request.error()
    }

    /// Whether an attempt is in flight
    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.request.is_loading()
    }

    /// When the current token was obtained
    #[must_use]
    pub const fn signed_in_at(&self) -> Option<DateTime<Utc>> {
        self.signed_in_at
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn todo_deserializes_without_completed() {
        let todo: Todo = serde_json::from_str(r#"{"id":3,"description":"walk"}"#).unwrap();
        assert_eq!(todo, Todo::new(TodoId::new(3), "walk"));
    }

    #[test]
    fn selectors() {
        let mut done = Todo::new(TodoId::new(2), "b");
        done.completed = true;
        let state = TodoState::with_items(vec![Todo::new(TodoId::new(1), "a"), done]);

        assert_eq!(state.len(), 2);
        assert_eq!(state.completed_count(), 1);
        assert_eq!(state.get(TodoId::new(2)).map(|t| t.description.as_str()), Some("b"));
        assert!(state.get(TodoId::new(9)).is_none());
        assert_eq!(state.status(), Status::Idle);
    }

    #[test]
    fn token_is_redacted() {
        let session = Session {
            token: Some(AuthToken::new("s3cret")),
            ..Session::new()
        };
        let printed = format!("{session:?}");
        assert!(!printed.contains("s3cret"));
        assert!(session.is_authenticated());
    }
}
