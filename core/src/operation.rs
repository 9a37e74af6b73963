//! Three-phase operations.
//!
//! Every remote action a store knows about (fetching the list, adding a todo,
//! signing in, ...) goes through the same lifecycle: it is started
//! ([`Phase::Pending`]), and later completes either with a payload
//! ([`Phase::Ok`]) or with a human readable message ([`Phase::Err`]).
//!
//! [`Operation`] tags a phase with the [`RequestId`] of the call that produced
//! it, and [`RequestStatus`] holds the status/error bookkeeping both stores
//! share, so the transition rules are written exactly once.

use crate::effect::Effect;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};

/// Identifier of one issued request.
///
/// Request ids are generations: each store hands out strictly increasing
/// values, so a completion can be compared against the most recently started
/// request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RequestId(u64);

impl RequestId {
    /// Creates a request id from a raw generation number
    #[must_use]
    pub const fn new(generation: u64) -> Self {
        Self(generation)
    }

    /// Returns the raw generation number
    #[must_use]
    pub const fn generation(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Monotonic source of [`RequestId`]s.
#[derive(Debug, Default)]
pub struct RequestIds(AtomicU64);

impl RequestIds {
    /// Creates a generator whose first id is `#1`
    #[must_use]
    pub const fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    /// Hands out the next generation
    pub fn next(&self) -> RequestId {
        RequestId(self.0.fetch_add(1, Ordering::Relaxed) + 1)
    }
}

/// The phase an operation is in.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase<I, O> {
    /// Started; carries the validated input
    Pending(I),
    /// Completed with the remote result
    Ok(O),
    /// Completed with a user-facing failure message
    Err(String),
}

/// A phase tagged with the request it belongs to.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operation<I, O> {
    /// The request this phase belongs to
    pub request: RequestId,
    /// Where the request is in its lifecycle
    pub phase: Phase<I, O>,
}

impl<I, O> Operation<I, O> {
    /// Start phase
    #[must_use]
    pub const fn pending(request: RequestId, input: I) -> Self {
        Self {
            request,
            phase: Phase::Pending(input),
        }
    }

    /// Success phase
    #[must_use]
    pub const fn ok(request: RequestId, output: O) -> Self {
        Self {
            request,
            phase: Phase::Ok(output),
        }
    }

    /// Failure phase
    #[must_use]
    pub fn err(request: RequestId, message: impl Into<String>) -> Self {
        Self {
            request,
            phase: Phase::Err(message.into()),
        }
    }

    /// Whether this is a success or failure phase
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        !matches!(self.phase, Phase::Pending(_))
    }

    /// Builds the effect that awaits a remote call and completes `request`.
    ///
    /// `wrap` lifts the completed operation into the store's action type and
    /// `describe` turns a failure into the message recorded by the store.
    pub fn perform<A, E, F, W, D>(request: RequestId, call: F, wrap: W, describe: D) -> Effect<A>
    where
        F: Future<Output = Result<O, E>> + Send + 'static,
        W: FnOnce(Self) -> A + Send + 'static,
        D: FnOnce(&E) -> String + Send + 'static,
        A: Send + 'static,
        I: 'static,
        O: 'static,
    {
        Effect::future(async move {
            let completion = match call.await {
                Ok(output) => Self::ok(request, output),
                Err(error) => Self::err(request, describe(&error)),
            };
            Some(wrap(completion))
        })
    }
}

/// Request lifecycle status.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Status {
    /// Nothing has been requested yet
    #[default]
    Idle,
    /// A request is in flight
    Loading,
    /// The last completed request succeeded
    Succeeded,
    /// The last completed request failed
    Failed,
}

/// Status and error bookkeeping shared by every store.
///
/// `error` is present exactly when `status` is [`Status::Failed`], except
/// after [`clear_error`](Self::clear_error), which drops an acknowledged
/// message without forgetting that the last request failed.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestStatus {
    status: Status,
    error: Option<String>,
    latest: Option<RequestId>,
}

impl RequestStatus {
    /// Idle, no error
    #[must_use]
    pub const fn new() -> Self {
        Self {
            status: Status::Idle,
            error: None,
            latest: None,
        }
    }

    /// Marks `request` in flight and clears the previous error
    pub fn start(&mut self, request: RequestId) {
        self.status = Status::Loading;
        self.error = None;
        if self.latest.is_none_or(|latest| request > latest) {
            self.latest = Some(request);
        }
    }

    /// Records a success
    pub fn succeed(&mut self) {
        self.status = Status::Succeeded;
        self.error = None;
    }

    /// Records a failure message
    pub fn fail(&mut self, message: impl Into<String>) {
        self.status = Status::Failed;
        self.error = Some(message.into());
    }

    /// Drops the error message; the status is left alone
    pub fn clear_error(&mut self) {
        self.error = None;
    }

    /// Current status
    #[must_use]
    pub const fn status(&self) -> Status {
        self.status
    }

    /// Last failure message, if not yet cleared
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Whether a request is in flight
    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.status == Status::Loading
    }

    /// The most recently started request
    #[must_use]
    pub const fn latest(&self) -> Option<RequestId> {
        self.latest
    }

    /// Whether `request` is the most recently started one.
    ///
    /// Completions of older requests are still applied; this only reports it.
    #[must_use]
    pub fn is_latest(&self, request: RequestId) -> bool {
        self.latest == Some(request)
    }
}
