//! In-memory adapters for tests and the offline demo.
//!
//! Each mock keeps its data behind `Arc<Mutex<_>>`, so clones share state and
//! a test can inspect what a store's effects did.

pub mod auth_service;
pub mod todo_service;

pub use auth_service::MockAuthService;
pub use todo_service::{MockTodoService, TodoCall};

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Locks a mock's state; a panicked holder does not make the data unusable.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
