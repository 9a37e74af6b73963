//! Async operation runner.
//!
//! [`SyncClient`] owns one store per aggregate and exposes the operations
//! screens call. Each operation follows the same template: validate, take a
//! request id, dispatch the `Pending` phase, and wait for the matching
//! completion the reducer's effect feeds back. The store already reflects
//! the completion when the call returns.

use crate::actions::{
    AddTodo, AuthenticatedUser, FetchTodos, RemoveTodo, SessionAction, SignIn, SignInRequest,
    SignUp, SignUpRequest, TodoAction, TodoUpdate, UpdateTodo,
};
use crate::config::ClientConfig;
use crate::environment::{SessionEnvironment, TodoEnvironment};
use crate::error::{ClientError, TransportError};
use crate::http::HttpService;
use crate::persistence::FileSessionPersistence;
use crate::providers::{AuthService, SESSION_TOKEN_KEY, SessionPersistence, TodoService};
use crate::reducers::{SessionReducer, TodoReducer};
use crate::state::{Session, Todo, TodoId, TodoState};
use crate::validation;
use std::sync::Arc;
use std::time::Duration;
use tasksync_core::environment::{Clock, SystemClock};
use tasksync_core::operation::{Operation, Phase, RequestId, RequestIds};
use tasksync_runtime::Store;
use tokio::sync::{broadcast, watch};

/// Store holding the to-do cache
pub type TodoStore<T> = Store<TodoState, TodoAction, TodoEnvironment<T>, TodoReducer<T>>;

/// Store holding the session
pub type SessionStore<A, P> =
    Store<Session, SessionAction, SessionEnvironment<A, P>, SessionReducer<A, P>>;

/// How long an operation may take before the runner gives up waiting
pub const DEFAULT_OPERATION_TIMEOUT: Duration = Duration::from_secs(60);

/// Consumer-facing surface over the Todo and Session stores.
///
/// Cloning is cheap; clones share the stores.
///
/// # Type Parameters
///
/// - `T`: remote to-do service
/// - `A`: remote authentication service
/// - `P`: session token storage
pub struct SyncClient<T, A, P>
where
    T: TodoService + Clone + 'static,
    A: AuthService + Clone + 'static,
    P: SessionPersistence + Clone + 'static,
{
    todos: TodoStore<T>,
    session: SessionStore<A, P>,
    todo_requests: Arc<RequestIds>,
    session_requests: Arc<RequestIds>,
    operation_timeout: Duration,
}

impl<T, A, P> Clone for SyncClient<T, A, P>
where
    T: TodoService + Clone + 'static,
    A: AuthService + Clone + 'static,
    P: SessionPersistence + Clone + 'static,
{
    fn clone(&self) -> Self {
        Self {
            todos: self.todos.clone(),
            session: self.session.clone(),
            todo_requests: Arc::clone(&self.todo_requests),
            session_requests: Arc::clone(&self.session_requests),
            operation_timeout: self.operation_timeout,
        }
    }
}

impl SyncClient<HttpService, HttpService, FileSessionPersistence> {
    /// Client talking HTTP to the configured service and persisting the
    /// session to the configured file.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Network`] if the HTTP client cannot be built.
    pub fn from_config(config: &ClientConfig) -> Result<Self, TransportError> {
        let http = HttpService::from_config(config)?;
        let persistence = FileSessionPersistence::new(&config.session_file);
        Ok(SyncClientBuilder::new(http.clone(), http, persistence)
            .operation_timeout(config.operation_timeout)
            .broadcast_capacity(config.broadcast_capacity)
            .build())
    }
}

impl<T, A, P> SyncClient<T, A, P>
where
    T: TodoService + Clone + 'static,
    A: AuthService + Clone + 'static,
    P: SessionPersistence + Clone + 'static,
{
    /// Client with default settings and the wall clock
    #[must_use]
    pub fn new(todo_service: T, auth: A, persistence: P) -> Self {
        SyncClientBuilder::new(todo_service, auth, persistence).build()
    }

    /// Starts a builder for custom settings
    #[must_use]
    pub fn builder(todo_service: T, auth: A, persistence: P) -> SyncClientBuilder<T, A, P> {
        SyncClientBuilder::new(todo_service, auth, persistence)
    }

    /// The Todo Store
    #[must_use]
    pub const fn todo_store(&self) -> &TodoStore<T> {
        &self.todos
    }

    /// The Session Store
    #[must_use]
    pub const fn session_store(&self) -> &SessionStore<A, P> {
        &self.session
    }

    /// Latest to-do snapshot
    #[must_use]
    pub fn todos(&self) -> TodoState {
        self.todos.snapshot()
    }

    /// Latest session snapshot
    #[must_use]
    pub fn session(&self) -> Session {
        self.session.snapshot()
    }

    /// Notified with every new to-do snapshot
    #[must_use]
    pub fn subscribe_todos(&self) -> watch::Receiver<TodoState> {
        self.todos.subscribe()
    }

    /// Notified with every new session snapshot
    #[must_use]
    pub fn subscribe_session(&self) -> watch::Receiver<Session> {
        self.session.subscribe()
    }

    /// Completion actions of the Todo Store, as they are applied
    #[must_use]
    pub fn todo_actions(&self) -> broadcast::Receiver<TodoAction> {
        self.todos.subscribe_actions()
    }

    /// Replaces the cache with the remote list.
    ///
    /// # Errors
    ///
    /// [`ClientError::Rejected`] with the recorded message if the call failed.
    #[tracing::instrument(skip(self))]
    pub async fn fetch_todos(&self) -> Result<Vec<Todo>, ClientError> {
        let request = self.todo_requests.next();
        let action = TodoAction::Fetch(FetchTodos::pending(request, ()));
        match self.run_todo(action).await? {
            TodoAction::Fetch(Operation {
                phase: Phase::Ok(items),
                ..
            }) => Ok(items),
            other => Err(rejected(other.into_failure())),
        }
    }

    /// Creates a todo and appends it to the cache.
    ///
    /// # Errors
    ///
    /// [`ClientError::Validation`] for a blank or oversized description,
    /// otherwise [`ClientError::Rejected`] if the call failed.
    #[tracing::instrument(skip(self, description))]
    pub async fn add_todo(&self, description: &str) -> Result<Todo, ClientError> {
        let description = validated(validation::description(description))?;
        let request = self.todo_requests.next();
        let action = TodoAction::Add(AddTodo::pending(request, description));
        match self.run_todo(action).await? {
            TodoAction::Add(Operation {
                phase: Phase::Ok(todo),
                ..
            }) => Ok(todo),
            other => Err(rejected(other.into_failure())),
        }
    }

    /// Changes a todo's description and replaces the cached entry.
    ///
    /// # Errors
    ///
    /// [`ClientError::Validation`] for a blank or oversized description,
    /// otherwise [`ClientError::Rejected`] if the call failed.
    #[tracing::instrument(skip(self, description))]
    pub async fn update_todo(&self, id: TodoId, description: &str) -> Result<Todo, ClientError> {
        let description = validated(validation::description(description))?;
        let request = self.todo_requests.next();
        let update = TodoUpdate { id, description };
        let action = TodoAction::Update(UpdateTodo::pending(request, update));
        match self.run_todo(action).await? {
            TodoAction::Update(Operation {
                phase: Phase::Ok(todo),
                ..
            }) => Ok(todo),
            other => Err(rejected(other.into_failure())),
        }
    }

    /// Deletes a todo and drops it from the cache.
    ///
    /// # Errors
    ///
    /// [`ClientError::Rejected`] if the call failed.
    #[tracing::instrument(skip(self))]
    pub async fn remove_todo(&self, id: TodoId) -> Result<TodoId, ClientError> {
        let request = self.todo_requests.next();
        let action = TodoAction::Remove(RemoveTodo::pending(request, id));
        match self.run_todo(action).await? {
            TodoAction::Remove(Operation {
                phase: Phase::Ok(id),
                ..
            }) => Ok(id),
            other => Err(rejected(other.into_failure())),
        }
    }

    /// Authenticates and persists the session token.
    ///
    /// # Errors
    ///
    /// - [`ClientError::Validation`]: missing field, malformed email, short password
    /// - [`ClientError::Rejected`]: the service refused or was unreachable
    /// - [`ClientError::Persistence`]: signed in, but the token was not saved
    #[tracing::instrument(skip(self, request), fields(email = %request.email))]
    pub async fn sign_in(&self, request: SignInRequest) -> Result<AuthenticatedUser, ClientError> {
        validated(validation::sign_in(&request))?;
        let id = self.session_requests.next();
        self.run_session(id, SessionAction::SignIn(SignIn::pending(id, request)))
            .await
    }

    /// Registers, authenticates and persists the session token.
    ///
    /// # Errors
    ///
    /// - [`ClientError::Validation`]: missing field, malformed email, short password
    /// - [`ClientError::Rejected`]: the service refused or was unreachable
    /// - [`ClientError::Persistence`]: signed up, but the token was not saved
    #[tracing::instrument(skip(self, request), fields(email = %request.email))]
    pub async fn sign_up(&self, request: SignUpRequest) -> Result<AuthenticatedUser, ClientError> {
        validated(validation::sign_up(&request))?;
        let id = self.session_requests.next();
        self.run_session(id, SessionAction::SignUp(SignUp::pending(id, request)))
            .await
    }

    /// Drops the session's error message, keeping status and credentials.
    ///
    /// # Errors
    ///
    /// [`ClientError::Store`] if the store is shutting down.
    pub async fn clear_auth_error(&self) -> Result<(), ClientError> {
        self.session.send(SessionAction::ClearError).await?;
        Ok(())
    }

    /// Token saved by the last successful authentication, if any.
    ///
    /// Meant for rehydration at application start.
    ///
    /// # Errors
    ///
    /// [`ClientError::Persistence`] if the storage cannot be read.
    pub async fn persisted_token(&self) -> Result<Option<String>, ClientError> {
        Ok(self
            .session
            .environment()
            .persistence
            .load(SESSION_TOKEN_KEY)
            .await?)
    }

    /// Stops both stores and waits for in-flight effects.
    ///
    /// # Errors
    ///
    /// [`ClientError::Store`] if effects are still running after `timeout`.
    pub async fn shutdown(&self, timeout: Duration) -> Result<(), ClientError> {
        self.todos.shutdown(timeout).await?;
        self.session.shutdown(timeout).await?;
        Ok(())
    }

    async fn run_todo(&self, action: TodoAction) -> Result<TodoAction, ClientError> {
        let request = action.request();
        let completion = self
            .todos
            .send_and_wait_for(
                action,
                move |done| done.completes(request),
                self.operation_timeout,
            )
            .await?;
        Ok(completion)
    }

    /// Runs a sign-in or sign-up dispatched as `request`.
    async fn run_session(
        &self,
        request: RequestId,
        action: SessionAction,
    ) -> Result<AuthenticatedUser, ClientError> {
        let completion = self
            .session
            .send_and_wait_for(
                action,
                move |done| done.completes(request),
                self.operation_timeout,
            )
            .await?;

        match completion {
            SessionAction::TokenPersisted { user, .. } => Ok(user),
            SessionAction::TokenPersistFailed { error, .. } => Err(ClientError::Persistence(error)),
            SessionAction::SignIn(Operation {
                phase: Phase::Err(message),
                ..
            })
            | SessionAction::SignUp(Operation {
                phase: Phase::Err(message),
                ..
            }) => Err(rejected(Some(message))),
            _ => Err(rejected(None)),
        }
    }
}

fn validated<T>(result: Result<T, crate::error::ValidationError>) -> Result<T, ClientError> {
    result.map_err(|error| {
        tracing::debug!(%error, "Input rejected before dispatch");
        metrics::counter!("client.validation.rejected").increment(1);
        ClientError::Validation(error)
    })
}

fn rejected(message: Option<String>) -> ClientError {
    metrics::counter!("client.operations.failed").increment(1);
    ClientError::Rejected {
        message: message.unwrap_or_else(|| "Operation did not complete".to_string()),
    }
}

/// Builder for [`SyncClient`].
pub struct SyncClientBuilder<T, A, P> {
    todo_service: T,
    auth: A,
    persistence: P,
    clock: Arc<dyn Clock>,
    operation_timeout: Duration,
    broadcast_capacity: usize,
}

impl<T, A, P> SyncClientBuilder<T, A, P>
where
    T: TodoService + Clone + 'static,
    A: AuthService + Clone + 'static,
    P: SessionPersistence + Clone + 'static,
{
    /// Builder with the wall clock and default limits
    #[must_use]
    pub fn new(todo_service: T, auth: A, persistence: P) -> Self {
        Self {
            todo_service,
            auth,
            persistence,
            clock: Arc::new(SystemClock),
            operation_timeout: DEFAULT_OPERATION_TIMEOUT,
            broadcast_capacity: tasksync_runtime::store::DEFAULT_BROADCAST_CAPACITY,
        }
    }

    /// Time source for sync and sign-in timestamps
    #[must_use]
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// How long to wait for an operation to complete
    #[must_use]
    pub const fn operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = timeout;
        self
    }

    /// Capacity of each store's completion broadcast
    #[must_use]
    pub const fn broadcast_capacity(mut self, capacity: usize) -> Self {
        self.broadcast_capacity = capacity;
        self
    }

    /// Builds the client with idle, empty stores
    #[must_use]
    pub fn build(self) -> SyncClient<T, A, P> {
        let todo_env = TodoEnvironment::new(self.todo_service).with_clock(Arc::clone(&self.clock));
        let session_env =
            SessionEnvironment::new(self.auth, self.persistence).with_clock(self.clock);

        SyncClient {
            todos: Store::with_broadcast_capacity(
                TodoState::new(),
                TodoReducer::new(),
                todo_env,
                self.broadcast_capacity,
            ),
            session: Store::with_broadcast_capacity(
                Session::new(),
                SessionReducer::new(),
                session_env,
                self.broadcast_capacity,
            ),
            todo_requests: Arc::new(RequestIds::new()),
            session_requests: Arc::new(RequestIds::new()),
            operation_timeout: self.operation_timeout,
        }
    }
}
