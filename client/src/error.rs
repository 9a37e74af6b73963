//! Error types for the sync client.
//!
//! Adapters fail with [`TransportError`] or [`PersistenceError`]. Stores never
//! keep those errors; they record the user-facing message produced by
//! [`TransportError::describe`]. Callers of [`SyncClient`](crate::SyncClient)
//! see [`ClientError`].

use serde::{Deserialize, Serialize};
use tasksync_runtime::StoreError;
use thiserror::Error;

/// Input rejected before any request was issued.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValidationError {
    /// The description is empty or only whitespace.
    #[error("Please enter a task description")]
    EmptyDescription,

    /// The description exceeds the accepted length.
    #[error("Task description is too long ({len} characters, at most {max})")]
    DescriptionTooLong {
        /// Length of the rejected description, in characters
        len: usize,
        /// Maximum accepted length
        max: usize,
    },

    /// A required field is empty.
    #[error("Please fill all fields ({0} is required)")]
    MissingField(&'static str),

    /// The email does not look like `local@domain.tld`.
    #[error("Invalid email address")]
    InvalidEmail,

    /// The password is too short.
    #[error("Password must be at least {min} characters")]
    PasswordTooShort {
        /// Minimum accepted length
        min: usize,
    },
}

/// Failure reported by a remote adapter.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransportError {
    /// The server answered with a non-success status.
    #[error("server responded with status {status}")]
    Status {
        /// HTTP status code
        status: u16,
        /// `message` field of the response body, when present
        message: Option<String>,
    },

    /// No response was received.
    #[error("request failed: {0}")]
    Network(String),

    /// A response was received but could not be decoded.
    #[error("malformed response: {0}")]
    Decode(String),

    /// An authentication response carried no token.
    #[error("authentication response carried no token")]
    MissingToken,
}

impl TransportError {
    /// Non-empty message supplied by the server, if any.
    #[must_use]
    pub fn server_message(&self) -> Option<&str> {
        match self {
            Self::Status {
                message: Some(message),
                ..
            } if !message.trim().is_empty() => Some(message),
            _ => None,
        }
    }

    /// Whether the server produced a response at all.
    #[must_use]
    pub const fn has_response(&self) -> bool {
        !matches!(self, Self::Network(_))
    }

    /// User-facing message for this failure.
    ///
    /// Preference order: the server's message, then the operation's fallback
    /// for a missing token, an error response, or no response.
    #[must_use]
    pub fn describe(&self, text: &FailureText) -> String {
        if let Some(message) = self.server_message() {
            return message.to_string();
        }
        let fallback = match self {
            Self::MissingToken => text.missing_token,
            Self::Network(_) => text.unreachable,
            Self::Status { .. } | Self::Decode(_) => text.rejected,
        };
        fallback.to_string()
    }
}

/// Fallback messages of one operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FailureText {
    /// The server responded but gave no usable message
    pub rejected: &'static str,
    /// No response was received
    pub unreachable: &'static str,
    /// A success response without a token (authentication only)
    pub missing_token: &'static str,
}

impl FailureText {
    /// Fetching the list
    pub const FETCH: Self = Self::uniform("Failed to fetch todos");
    /// Adding a todo
    pub const ADD: Self = Self::uniform("Failed to add task");
    /// Updating a todo
    pub const UPDATE: Self = Self::uniform("Failed to update task");
    /// Removing a todo
    pub const REMOVE: Self = Self::uniform("Failed to delete task");

    /// Signing in
    pub const SIGN_IN: Self = Self {
        rejected: "Invalid credentials",
        unreachable: "An error occurred during login",
        missing_token: "Login failed. No token received.",
    };

    /// Signing up
    pub const SIGN_UP: Self = Self {
        rejected: "User is already registered",
        unreachable: "An error occurred during registration",
        missing_token: "Registration failed",
    };

    const fn uniform(message: &'static str) -> Self {
        Self {
            rejected: message,
            unreachable: message,
            missing_token: message,
        }
    }
}

/// Failure of the session persistence adapter.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PersistenceError {
    /// Reading or writing the backing storage failed.
    #[error("session storage I/O failed: {0}")]
    Io(String),

    /// The backing storage holds something unreadable.
    #[error("session storage is corrupt: {0}")]
    Corrupt(String),
}

impl From<std::io::Error> for PersistenceError {
    fn from(error: std::io::Error) -> Self {
        Self::Io(error.to_string())
    }
}

impl From<serde_json::Error> for PersistenceError {
    fn from(error: serde_json::Error) -> Self {
        Self::Corrupt(error.to_string())
    }
}

/// Error returned by [`SyncClient`](crate::SyncClient) operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    /// Input was rejected locally; no request was issued.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The operation completed with a failure; the message is also recorded
    /// in the owning store.
    #[error("{message}")]
    Rejected {
        /// User-facing failure message
        message: String,
    },

    /// Signed in, but the token could not be persisted.
    #[error("session token could not be saved: {0}")]
    Persistence(#[from] PersistenceError),

    /// The store could not run the operation.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ClientError {
    /// User-facing message, when the failure has one
    #[must_use]
    pub fn rejection(&self) -> Option<&str> {
        match self {
            Self::Rejected { message } => Some(message),
            _ => None,
        }
    }
}
