//! Todo Store reducer.
//!
//! # Reconciliation
//!
//! | Completed operation | Effect on `items` |
//! |---------------------|-------------------|
//! | fetch | replaced wholesale |
//! | add | returned todo appended |
//! | update | matching entry replaced in place; unknown id is a no-op |
//! | remove | matching entry filtered out and the result stored |
//!
//! Failures leave `items` untouched so the last known list stays visible.
//! Completions are applied in arrival order, whichever request they belong to.

use crate::actions::{AddTodo, FetchTodos, RemoveTodo, TodoAction, TodoUpdate, UpdateTodo};
use crate::environment::TodoEnvironment;
use crate::error::{FailureText, TransportError};
use crate::providers::TodoService;
use crate::state::{Todo, TodoId, TodoState};
use tasksync_core::effect::Effect;
use tasksync_core::environment::Clock;
use tasksync_core::operation::{Phase, RequestId};
use tasksync_core::reducer::Reducer;
use tasksync_core::{SmallVec, smallvec};

/// Reducer for [`TodoState`].
#[derive(Debug, Clone)]
pub struct TodoReducer<T> {
    _phantom: std::marker::PhantomData<T>,
}

impl<T> TodoReducer<T> {
    /// Creates the reducer
    #[must_use]
    pub const fn new() -> Self {
        Self {
            _phantom: std::marker::PhantomData,
        }
    }
}

impl<T> Default for TodoReducer<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> TodoReducer<T>
where
    T: TodoService + Clone + 'static,
{
    fn start(state: &mut TodoState, request: RequestId, kind: &'static str) {
        state.request.start(request);
        tracing::debug!(%request, kind, "Todo operation started");
    }

    fn succeed(
        state: &mut TodoState,
        env: &TodoEnvironment<T>,
        request: RequestId,
        kind: &'static str,
    ) {
        state.request.succeed();
        state.last_synced_at = Some(env.clock.now());
        if !state.request.is_latest(request) {
            tracing::debug!(%request, kind, "Applied completion of a superseded request");
        }
        tracing::debug!(%request, kind, items = state.items.len(), "Todo operation succeeded");
    }

    fn fail(state: &mut TodoState, request: RequestId, kind: &'static str, message: String) {
        tracing::warn!(%request, kind, %message, "Todo operation failed");
        state.request.fail(message);
    }

    fn fetch(
        state: &mut TodoState,
        phase: Phase<(), Vec<Todo>>,
        request: RequestId,
        env: &TodoEnvironment<T>,
    ) -> Effect<TodoAction> {
        match phase {
            Phase::Pending(()) => {
                Self::start(state, request, "fetch");
                let service = env.service.clone();
                FetchTodos::perform(
                    request,
                    async move { service.list().await },
                    TodoAction::Fetch,
                    |error: &TransportError| error.describe(&FailureText::FETCH),
                )
            },
            Phase::Ok(items) => {
                state.items = items;
                Self::succeed(state, env, request, "fetch");
                Effect::None
            },
            Phase::Err(message) => {
                Self::fail(state, request, "fetch", message);
                Effect::None
            },
        }
    }

    fn add(
        state: &mut TodoState,
        phase: Phase<String, Todo>,
        request: RequestId,
        env: &TodoEnvironment<T>,
    ) -> Effect<TodoAction> {
        match phase {
            Phase::Pending(description) => {
                Self::start(state, request, "add");
                let service = env.service.clone();
                AddTodo::perform(
                    request,
                    async move { service.create(&description).await },
                    TodoAction::Add,
                    |error: &TransportError| error.describe(&FailureText::ADD),
                )
            },
            Phase::Ok(todo) => {
                state.items.push(todo);
                Self::succeed(state, env, request, "add");
                Effect::None
            },
            Phase::Err(message) => {
                Self::fail(state, request, "add", message);
                Effect::None
            },
        }
    }

    fn update(
        state: &mut TodoState,
        phase: Phase<TodoUpdate, Todo>,
        request: RequestId,
        env: &TodoEnvironment<T>,
    ) -> Effect<TodoAction> {
        match phase {
            Phase::Pending(TodoUpdate { id, description }) => {
                Self::start(state, request, "update");
                let service = env.service.clone();
                UpdateTodo::perform(
                    request,
                    async move { service.update(id, &description).await },
                    TodoAction::Update,
                    |error: &TransportError| error.describe(&FailureText::UPDATE),
                )
            },
            Phase::Ok(todo) => {
                match state.items.iter_mut().find(|item| item.id == todo.id) {
                    Some(slot) => *slot = todo,
                    None => {
                        tracing::debug!(
                            id = %todo.id,
                            "Updated todo is not cached; nothing to replace"
                        );
                    },
                }
                Self::succeed(state, env, request, "update");
                Effect::None
            },
            Phase::Err(message) => {
                Self::fail(state, request, "update", message);
                Effect::None
            },
        }
    }

    fn remove(
        state: &mut TodoState,
        phase: Phase<TodoId, TodoId>,
        request: RequestId,
        env: &TodoEnvironment<T>,
    ) -> Effect<TodoAction> {
        match phase {
            Phase::Pending(id) => {
                Self::start(state, request, "remove");
                let service = env.service.clone();
                RemoveTodo::perform(
                    request,
                    async move { service.delete(id).await },
                    TodoAction::Remove,
                    |error: &TransportError| error.describe(&FailureText::REMOVE),
                )
            },
            Phase::Ok(id) => {
                state.items = state
                    .items
                    .drain(..)
                    .filter(|item| item.id != id)
                    .collect();
                Self::succeed(state, env, request, "remove");
                Effect::None
            },
            Phase::Err(message) => {
                Self::fail(state, request, "remove", message);
                Effect::None
            },
        }
    }
}

impl<T> Reducer for TodoReducer<T>
where
    T: TodoService + Clone + 'static,
{
    type State = TodoState;
    type Action = TodoAction;
    type Environment = TodoEnvironment<T>;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        let effect = match action {
            TodoAction::Fetch(op) => Self::fetch(state, op.phase, op.request, env),
            TodoAction::Add(op) => Self::add(state, op.phase, op.request, env),
            TodoAction::Update(op) => Self::update(state, op.phase, op.request, env),
            TodoAction::Remove(op) => Self::remove(state, op.phase, op.request, env),
        };
        smallvec![effect]
    }
}
