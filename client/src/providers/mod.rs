//! Adapter contracts.
//!
//! Reducers depend on these traits only. [`HttpService`](crate::http::HttpService)
//! implements the remote ones; [`crate::persistence`] and [`crate::mocks`]
//! provide the rest.
//!
//! Futures are `Send` so effects can run on the tokio runtime.

pub mod auth_service;
pub mod session_persistence;
pub mod todo_service;

pub use auth_service::AuthService;
pub use session_persistence::{SESSION_TOKEN_KEY, SessionPersistence};
pub use todo_service::TodoService;
