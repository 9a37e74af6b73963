//! Environments injected into the reducers.

use crate::providers::{AuthService, SessionPersistence, TodoService};
use std::sync::Arc;
use tasksync_core::environment::{Clock, SystemClock};

/// Dependencies of the todo reducer.
#[derive(Clone)]
pub struct TodoEnvironment<T>
where
    T: TodoService + Clone,
{
    /// Remote to-do service
    pub service: T,
    /// Time source for `last_synced_at`
    pub clock: Arc<dyn Clock>,
}

impl<T> TodoEnvironment<T>
where
    T: TodoService + Clone,
{
    /// Environment using the wall clock
    #[must_use]
    pub fn new(service: T) -> Self {
        Self {
            service,
            clock: Arc::new(SystemClock),
        }
    }

    /// Replaces the clock
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }
}

/// Dependencies of the session reducer.
///
/// # Type Parameters
///
/// - `A`: remote authentication service
/// - `P`: session token storage
#[derive(Clone)]
pub struct SessionEnvironment<A, P>
where
    A: AuthService + Clone,
    P: SessionPersistence + Clone,
{
    /// Remote authentication service
    pub auth: A,
    /// Where the token is mirrored after success
    pub persistence: P,
    /// Time source for `signed_in_at`
    pub clock: Arc<dyn Clock>,
}

impl<A, P> SessionEnvironment<A, P>
where
    A: AuthService + Clone,
    P: SessionPersistence + Clone,
{
    /// Environment using the wall clock
    #[must_use]
    pub fn new(auth: A, persistence: P) -> Self {
        Self {
            auth,
            persistence,
            clock: Arc::new(SystemClock),
        }
    }

    /// Replaces the clock
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }
}
