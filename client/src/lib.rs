//! # Tasksync Client
//!
//! Keeps a local cache of to-do items and an authenticated session in step
//! with a remote service, and publishes both as immutable snapshots.
//!
//! ## Architecture
//!
//! Two independent stores, each a [`tasksync_runtime::Store`] driven by a
//! reducer:
//!
//! - **Todo Store** ([`TodoState`], [`TodoReducer`]): fetch, add, update, remove
//! - **Session Store** ([`Session`], [`SessionReducer`]): sign-in, sign-up,
//!   clearing the error; successful authentication is mirrored into
//!   [`SessionPersistence`]
//!
//! Remote work happens only in effects, against injected adapters
//! ([`TodoService`], [`AuthService`]). [`SyncClient`] is the surface screens
//! call: it validates input, starts an operation and returns its outcome.
//!
//! ```text
//! SyncClient ──Pending──▶ Store ──reduce──▶ Effect ──adapter call──▶ Ok | Err
//!      ▲                                                               │
//!      └──────────────── completion (already applied) ◀────────────────┘
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use tasksync_client::{ClientConfig, SignInRequest, SyncClient};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = SyncClient::from_config(&ClientConfig::from_env())?;
//! client.sign_in(SignInRequest::new("jo@example.com", "secret1")).await?;
//!
//! let todos = client.fetch_todos().await?;
//! let mut snapshots = client.subscribe_todos();
//! client.add_todo("buy milk").await?;
//! assert_eq!(snapshots.borrow_and_update().len(), todos.len() + 1);
//! # Ok(())
//! # }
//! ```

pub mod actions;
pub mod client;
pub mod config;
pub mod environment;
pub mod error;
pub mod http;
pub mod mocks;
pub mod persistence;
pub mod providers;
pub mod reducers;
pub mod state;
pub mod validation;

pub use actions::{
    AuthResponse, AuthenticatedUser, SessionAction, SignInRequest, SignUpRequest, TodoAction,
    TodoUpdate,
};
pub use client::{SyncClient, SyncClientBuilder};
pub use config::ClientConfig;
pub use error::{ClientError, PersistenceError, TransportError, ValidationError};
pub use http::HttpService;
pub use persistence::{FileSessionPersistence, MemorySessionPersistence};
pub use providers::{AuthService, SESSION_TOKEN_KEY, SessionPersistence, TodoService};
pub use reducers::{SessionReducer, TodoReducer};
pub use state::{AuthToken, Session, Todo, TodoId, TodoState};
pub use tasksync_core::operation::{RequestId, Status};
