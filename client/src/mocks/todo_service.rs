//! Mock to-do service.

use super::lock;
use crate::error::TransportError;
use crate::providers::TodoService;
use crate::state::{Todo, TodoId};
use std::collections::VecDeque;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// A call received by [`MockTodoService`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TodoCall {
    /// `list()`
    List,
    /// `create(description)`
    Create(String),
    /// `update(id, description)`
    Update(TodoId, String),
    /// `delete(id)`
    Delete(TodoId),
}

#[derive(Debug, Default)]
struct Inner {
    todos: Vec<Todo>,
    next_id: i64,
    calls: Vec<TodoCall>,
    failures: VecDeque<TransportError>,
    delays: VecDeque<Duration>,
}

/// Mock to-do service.
///
/// Holds a server-side list and assigns increasing ids. Failures and delays
/// can be scripted for upcoming calls.
#[derive(Debug, Clone)]
pub struct MockTodoService {
    inner: Arc<Mutex<Inner>>,
}

impl Default for MockTodoService {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTodoService {
    /// Empty service; the first created todo gets id 1
    #[must_use]
    pub fn new() -> Self {
        Self::with_todos(Vec::new())
    }

    /// Service already holding `todos`
    #[must_use]
    pub fn with_todos(todos: Vec<Todo>) -> Self {
        let next_id = todos.iter().map(|t| t.id.get()).max().unwrap_or(0) + 1;
        Self {
            inner: Arc::new(Mutex::new(Inner {
                todos,
                next_id,
                ..Inner::default()
            })),
        }
    }

    /// Makes the next call fail with `error`
    pub fn fail_next(&self, error: TransportError) {
        lock(&self.inner).failures.push_back(error);
    }

    /// Delays the response to the next call by `delay`
    pub fn delay_next(&self, delay: Duration) {
        lock(&self.inner).delays.push_back(delay);
    }

    /// Replaces the server-side list
    pub fn set_todos(&self, todos: Vec<Todo>) {
        lock(&self.inner).todos = todos;
    }

    /// Server-side list
    #[must_use]
    pub fn todos(&self) -> Vec<Todo> {
        lock(&self.inner).todos.clone()
    }

    /// Calls received so far, in order
    #[must_use]
    pub fn calls(&self) -> Vec<TodoCall> {
        lock(&self.inner).calls.clone()
    }

    /// Records `call` and computes its outcome under one lock.
    fn respond<T, F>(
        &self,
        call: TodoCall,
        apply: F,
    ) -> impl Future<Output = Result<T, TransportError>> + Send + use<T, F>
    where
        T: Send + 'static,
        F: FnOnce(&mut Inner) -> Result<T, TransportError>,
    {
        let (delay, outcome) = {
            let mut inner = lock(&self.inner);
            inner.calls.push(call);
            let delay = inner.delays.pop_front();
            let outcome = match inner.failures.pop_front() {
                Some(error) => Err(error),
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

fn not_found(id: TodoId) -> TransportError {
    TransportError::Status {
        status: 404,
        message: Some(format!("Todo {id} not found")),
    }
}

impl TodoService for MockTodoService {
    fn list(&self) -> impl Future<Output = Result<Vec<Todo>, TransportError>> + Send {
        self.respond(TodoCall::List, |inner| Ok(inner.todos.clone()))
    }

    fn create(
        &self,
        description: &str,
    ) -> impl Future<Output = Result<Todo, TransportError>> + Send {
        let description = description.to_string();
        self.respond(TodoCall::Create(description.clone()), move |inner| {
            let todo = Todo::new(TodoId::new(inner.next_id), description);
            inner.next_id += 1;
            inner.todos.push(todo.clone());
            Ok(todo)
        })
    }

    fn update(
        &self,
        id: TodoId,
        description: &str,
    ) -> impl Future<Output = Result<Todo, TransportError>> + Send {
        let description = description.to_string();
        self.respond(TodoCall::Update(id, description.clone()), move |inner| {
            let todo = inner
                .todos
                .iter_mut()
                .find(|todo| todo.id == id)
                .ok_or_else(|| not_found(id))?;
            todo.description = description;
            Ok(todo.clone())
        })
    }

    fn delete(&self, id: TodoId) -> impl Future<Output = Result<TodoId, TransportError>> + Send {
        self.respond(TodoCall::Delete(id), move |inner| {
            let before = inner.todos.len();
            inner.todos.retain(|todo| todo.id != id);
            if inner.todos.len() == before {
                return Err(not_found(id));
            }
            Ok(id)
        })
    }
}
