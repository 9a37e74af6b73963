//! Remote to-do service trait.

use crate::error::TransportError;
use crate::state::{Todo, TodoId};
use std::future::Future;

/// To-do CRUD against the remote service.
///
/// Every call fails with a [`TransportError`], which may carry a message
/// supplied by the server.
pub trait TodoService: Send + Sync {
    /// All todos, in server order.
    ///
    /// # Errors
    ///
    /// Transport failure.
    fn list(&self) -> impl Future<Output = Result<Vec<Todo>, TransportError>> + Send;

    /// Create a todo; the service assigns the id.
    ///
    /// # Errors
    ///
    /// Transport failure.
    fn create(
        &self,
        description: &str,
    ) -> impl Future<Output = Result<Todo, TransportError>> + Send;

    /// Replace the description of `id`.
    ///
    /// # Errors
    ///
    /// Transport failure, including an unknown id.
    fn update(
        &self,
        id: TodoId,
        description: &str,
    ) -> impl Future<Output = Result<Todo, TransportError>> + Send;

    /// Delete `id`, returning the id that was deleted.
    ///
    /// # Errors
    ///
    /// Transport failure.
    fn delete(&self, id: TodoId) -> impl Future<Output = Result<TodoId, TransportError>> + Send;
}
