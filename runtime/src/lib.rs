//! # Tasksync Runtime
//!
//! The [`Store`] is the observable state container every screen holds a
//! reference to.
//!
//! ## Core Components
//!
//! - **Store**: owns one aggregate's state, serializes reducer execution and
//!   publishes an immutable snapshot after every transition
//! - **Effect Executor**: runs effect descriptions on the tokio runtime and
//!   feeds the actions they produce back into the reducer
//! - **Observers**: snapshot subscribers (`watch`) and action observers
//!   (`broadcast`)
//! - **Waiters**: request/response callers of
//!   [`Store::send_and_wait_for`], each answered through its own `oneshot`
//!
//! ## Example
//!
//! ```ignore
//! use tasksync_runtime::Store;
//!
//! let store = Store::new(initial_state, my_reducer, environment);
//!
//! // Send an action
//! store.send(Action::DoSomething).await?;
//!
//! // Read state through a selector
//! let value = store.state(|s| s.some_field).await;
//!
//! // Or follow every snapshot
//! let mut snapshots = store.subscribe();
//! snapshots.changed().await?;
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tasksync_core::{effect::Effect, reducer::Reducer};
use tokio::sync::{RwLock, watch};

/// Error types for the Store runtime
pub mod error {
    use thiserror::Error;

    /// Errors that can occur during Store operations
    #[derive(Error, Debug, Clone, PartialEq, Eq)]
    pub enum StoreError {
        /// Store is shutting down and not accepting new actions
        #[error("Store is shutting down")]
        ShutdownInProgress,

        /// Shutdown timed out waiting for effects to complete
        #[error("Shutdown timed out with {0} effects still running")]
        ShutdownTimeout(usize),

        /// Timeout waiting for a terminal action
        ///
        /// Returned by `send_and_wait_for` when the timeout expires before
        /// a matching action is received.
        #[error("Timeout waiting for action")]
        Timeout,

        /// Action broadcast channel closed
        #[error("Action broadcast channel closed")]
        ChannelClosed,
    }
}

pub use error::StoreError;

/// Handle for tracking effect completion
///
/// Returned by [`Store::send()`]. Waiting on it returns once every effect the
/// action spawned directly has finished; effects spawned by the actions those
/// effects feed back are not tracked.
#[derive(Clone)]
pub struct EffectHandle {
    effects: Arc<AtomicUsize>,
    completion: watch::Receiver<()>,
}

impl EffectHandle {
    fn new() -> (Self, EffectTracking) {
        let counter = Arc::new(AtomicUsize::new(0));
        let (tx, rx) = watch::channel(());

        let handle = Self {
            effects: Arc::clone(&counter),
            completion: rx,
        };
        let tracking = EffectTracking {
            counter,
            notifier: tx,
        };

        (handle, tracking)
    }

    /// Create a handle that's already complete
    #[must_use]
    pub fn completed() -> Self {
        let (_, rx) = watch::channel(());

        Self {
            effects: Arc::new(AtomicUsize::new(0)),
            completion: rx,
        }
    }

    /// Number of effects still running
    #[must_use]
    pub fn pending(&self) -> usize {
        self.effects.load(Ordering::SeqCst)
    }

    /// Wait for all effects to complete
    pub async fn wait(&mut self) {
        while self.effects.load(Ordering::SeqCst) > 0 {
            if self.completion.changed().await.is_err() {
                break;
            }
        }
    }

    /// Wait for all effects to complete with a timeout
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Timeout`] if the timeout expires first.
    pub async fn wait_with_timeout(&mut self, timeout: Duration) -> Result<(), StoreError> {
        tokio::time::timeout(timeout, self.wait())
            .await
            .map_err(|_| StoreError::Timeout)
    }
}

impl std::fmt::Debug for EffectHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EffectHandle")
            .field("pending_effects", &self.effects.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

/// Internal: effect counter shared between a handle and its running effects
#[derive(Clone)]
struct EffectTracking {
    counter: Arc<AtomicUsize>,
    notifier: watch::Sender<()>,
}

impl EffectTracking {
    fn increment(&self) {
        self.counter.fetch_add(1, Ordering::SeqCst);
    }

    fn decrement(&self) {
        if self.counter.fetch_sub(1, Ordering::SeqCst) == 1 {
            // Counter reached zero, notify waiters
            let _ = self.notifier.send(());
        }
    }
}

/// Internal: RAII guard that decrements the effect counter on drop
///
/// The counter is decremented even if the effect panics.
struct DecrementGuard(EffectTracking);

impl Drop for DecrementGuard {
    fn drop(&mut self) {
        self.0.decrement();
    }
}

/// Guard that decrements an atomic counter on drop (for shutdown tracking)
struct AtomicCounterGuard(Arc<AtomicUsize>);

impl Drop for AtomicCounterGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Store runtime for coordinating reducer execution and effect handling.
pub mod store {
    use super::{
        Arc, AtomicBool, AtomicCounterGuard, AtomicUsize, DecrementGuard, Duration, Effect,
        EffectHandle, EffectTracking, Ordering, Reducer, RwLock, StoreError,
    };
    use std::sync::{Mutex, MutexGuard, PoisonError};
    use tokio::sync::{broadcast, oneshot, watch};

    /// Default capacity of the action broadcast channel
    pub const DEFAULT_BROADCAST_CAPACITY: usize = 64;

    type Predicate<A> = Box<dyn Fn(&A) -> bool + Send + Sync>;

    struct Waiter<A> {
        id: u64,
        predicate: Predicate<A>,
        reply: oneshot::Sender<A>,
    }

    /// Callers of `send_and_wait_for` that have not been answered yet
    struct Waiters<A> {
        next_id: u64,
        pending: Vec<Waiter<A>>,
    }

    impl<A> Waiters<A> {
        const fn new() -> Self {
            Self {
                next_id: 0,
                pending: Vec::new(),
            }
        }
    }

    /// The Store - runtime coordinator for a reducer
    ///
    /// The Store manages:
    /// 1. State (behind `RwLock`; the reducer runs under the write lock)
    /// 2. Reducer (state transitions)
    /// 3. Environment (injected dependencies)
    /// 4. Effect execution (with feedback loop)
    /// 5. Snapshot publication to subscribers
    ///
    /// # Type Parameters
    ///
    /// - `S`: State type
    /// - `A`: Action type
    /// - `E`: Environment type
    /// - `R`: Reducer implementation
    pub struct Store<S, A, E, R>
    where
        R: Reducer<State = S, Action = A, Environment = E>,
    {
        state: Arc<RwLock<S>>,
        reducer: R,
        environment: E,
        shutdown: Arc<AtomicBool>,
        pending_effects: Arc<AtomicUsize>,
        /// Latest committed snapshot, replaced after every reducer run.
        snapshots: Arc<watch::Sender<S>>,
        /// Actions produced by effects, broadcast after they were reduced.
        action_broadcast: broadcast::Sender<A>,
        /// Request/response callers, answered after their action was reduced.
        waiters: Arc<Mutex<Waiters<A>>>,
    }

    impl<S, A, E, R> Store<S, A, E, R>
    where
        R: Reducer<State = S, Action = A, Environment = E> + Clone + Send + Sync + 'static,
        A: Clone + Send + 'static,
        S: Clone + Send + Sync + 'static,
        E: Clone + Send + Sync + 'static,
    {
        /// Create a new store with initial state, reducer, and environment
        #[must_use]
        pub fn new(initial_state: S, reducer: R, environment: E) -> Self {
            Self::with_broadcast_capacity(
                initial_state,
                reducer,
                environment,
                DEFAULT_BROADCAST_CAPACITY,
            )
        }

        /// Create a store with a custom action broadcast capacity
        ///
        /// Observers that fall more than `capacity` actions behind lose the
        /// oldest ones.
        #[must_use]
        pub fn with_broadcast_capacity(
            initial_state: S,
            reducer: R,
            environment: E,
            capacity: usize,
        ) -> Self {
            let (action_broadcast, _) = broadcast::channel(capacity.max(1));
            let (snapshots, _) = watch::channel(initial_state.clone());

            Self {
                state: Arc::new(RwLock::new(initial_state)),
                reducer,
                environment,
                shutdown: Arc::new(AtomicBool::new(false)),
                pending_effects: Arc::new(AtomicUsize::new(0)),
                snapshots: Arc::new(snapshots),
                action_broadcast,
                waiters: Arc::new(Mutex::new(Waiters::new())),
            }
        }

        /// Send an action to the store
        ///
        /// 1. Acquires the write lock on state
        /// 2. Runs the reducer
        /// 3. Publishes the new snapshot (still under the lock)
        /// 4. Starts executing the returned effects
        ///
        /// `send()` returns once effects have started, not finished. Use the
        /// returned [`EffectHandle`] to wait for them.
        ///
        /// # Errors
        ///
        /// Returns [`StoreError::ShutdownInProgress`] if the store is shutting down.
        #[tracing::instrument(skip(self, action), name = "store_send")]
        pub async fn send(&self, action: A) -> Result<EffectHandle, StoreError> {
            self.send_internal(action).await
        }

        async fn send_internal(&self, action: A) -> Result<EffectHandle, StoreError> {
            if self.shutdown.load(Ordering::Acquire) {
                tracing::warn!("Rejected action: store is shutting down");
                metrics::counter!("store.shutdown.rejected_actions").increment(1);
                return Err(StoreError::ShutdownInProgress);
            }

            Ok(self.dispatch(action).await)
        }

        /// Applies an action produced by an effect, then answers waiters and
        /// observers.
        ///
        /// The effect was accepted before any shutdown began, so its action is
        /// applied even while the store is shutting down.
        async fn send_feedback(&self, action: A) {
            if self.shutdown.load(Ordering::Acquire) {
                tracing::debug!("Applying effect completion during shutdown");
            }
            let _ = self.dispatch(action.clone()).await;
            self.notify_waiters(&action);
            // No receivers is fine
            let _ = self.action_broadcast.send(action);
        }

        async fn dispatch(&self, action: A) -> EffectHandle {
            metrics::counter!("store.actions.total").increment(1);

            let (handle, tracking) = EffectHandle::new();

            let effects = {
                let mut state = self.state.write().await;

                let start = std::time::Instant::now();
                let effects = self.reducer.reduce(&mut state, action, &self.environment);
                metrics::histogram!("store.reducer.duration_seconds")
                    .record(start.elapsed().as_secs_f64());

                // Publish before releasing the lock so snapshots are observed in
                // the same order the transitions were applied.
                self.snapshots.send_replace(state.clone());

                tracing::trace!("Reducer completed, returned {} effects", effects.len());
                effects
            };

            for effect in effects {
                self.execute_effect_internal(effect, tracking.clone());
            }

            handle
        }

        fn waiters(&self) -> MutexGuard<'_, Waiters<A>> {
            self.waiters.lock().unwrap_or_else(PoisonError::into_inner)
        }

        fn register_waiter(&self, predicate: Predicate<A>, reply: oneshot::Sender<A>) -> u64 {
            let mut waiters = self.waiters();
            let id = waiters.next_id;
            waiters.next_id += 1;
            waiters.pending.push(Waiter {
                id,
                predicate,
                reply,
            });
            id
        }

        fn cancel_waiter(&self, id: u64) {
            self.waiters().pending.retain(|waiter| waiter.id != id);
        }

        /// Answers every waiter whose predicate matches `action`.
        ///
        /// Waiters whose caller went away are dropped on the way.
        fn notify_waiters(&self, action: &A) {
            let ready: Vec<Waiter<A>> = {
                let mut waiters = self.waiters();
                let (ready, waiting) = std::mem::take(&mut waiters.pending)
                    .into_iter()
                    .filter(|waiter| !waiter.reply.is_closed())
                    .partition(|waiter| (waiter.predicate)(action));
                waiters.pending = waiting;
                ready
            };
            for waiter in ready {
                let _ = waiter.reply.send(action.clone());
            }
        }

        /// Send an action and wait for a matching result action
        ///
        /// Registers a waiter before sending, then returns the first
        /// effect-produced action matching `predicate`. The waiter is answered
        /// through its own channel after the action was reduced, so the store
        /// already reflects the returned action and no amount of concurrent
        /// traffic can make the caller miss it.
        ///
        /// Concurrent callers should match on a request identifier carried by
        /// the action.
        ///
        /// # Errors
        ///
        /// - [`StoreError::Timeout`]: no matching action within `timeout`
        /// - [`StoreError::ChannelClosed`]: the store went away first
        /// - [`StoreError::ShutdownInProgress`]: the store is shutting down
        pub async fn send_and_wait_for<F>(
            &self,
            action: A,
            predicate: F,
            timeout: Duration,
        ) -> Result<A, StoreError>
        where
            F: Fn(&A) -> bool + Send + Sync + 'static,
        {
            // Register BEFORE sending so a fast completion cannot be missed
            let (reply, response) = oneshot::channel();
            let waiter = self.register_waiter(Box::new(predicate), reply);

            if let Err(error) = self.send(action).await {
                self.cancel_waiter(waiter);
                return Err(error);
            }

            match tokio::time::timeout(timeout, response).await {
                Ok(Ok(action)) => Ok(action),
                Ok(Err(_)) => Err(StoreError::ChannelClosed),
                Err(_) => {
                    self.cancel_waiter(waiter);
                    Err(StoreError::Timeout)
                },
            }
        }

        /// Subscribe to actions produced by effects
        ///
        /// Actions sent directly through [`send`](Self::send) are not broadcast.
        /// Observers more than the broadcast capacity behind lose the oldest
        /// actions; [`send_and_wait_for`](Self::send_and_wait_for) does not
        /// depend on this channel.
        #[must_use]
        pub fn subscribe_actions(&self) -> broadcast::Receiver<A> {
            self.action_broadcast.subscribe()
        }

        /// Subscribe to state snapshots
        ///
        /// The receiver starts at the current snapshot and is notified after
        /// every reducer run.
        #[must_use]
        pub fn subscribe(&self) -> watch::Receiver<S> {
            self.snapshots.subscribe()
        }

        /// Latest committed snapshot
        #[must_use]
        pub fn snapshot(&self) -> S {
            self.snapshots.borrow().clone()
        }

        /// Read current state via a selector closure
        ///
        /// ```ignore
        /// let count = store.state(|s| s.items.len()).await;
        /// ```
        pub async fn state<F, T>(&self, f: F) -> T
        where
            F: FnOnce(&S) -> T,
        {
            let state = self.state.read().await;
            f(&state)
        }

        /// The injected environment
        #[must_use]
        pub const fn environment(&self) -> &E {
            &self.environment
        }

        /// Stop accepting actions and wait for in-flight effects
        ///
        /// Actions produced by effects that were already running are still
        /// applied, and their waiters answered.
        ///
        /// # Errors
        ///
        /// Returns [`StoreError::ShutdownTimeout`] if effects are still running
        /// when `timeout` expires.
        pub async fn shutdown(&self, timeout: Duration) -> Result<(), StoreError> {
            tracing::info!("Initiating graceful shutdown");
            self.shutdown.store(true, Ordering::Release);

            let start = std::time::Instant::now();
            let poll_interval = Duration::from_millis(10);

            loop {
                let pending = self.pending_effects.load(Ordering::Acquire);
                if pending == 0 {
                    tracing::info!("All effects completed, shutdown successful");
                    return Ok(());
                }
                if start.elapsed() >= timeout {
                    tracing::error!(pending_effects = pending, "Shutdown timed out");
                    return Err(StoreError::ShutdownTimeout(pending));
                }
                tokio::time::sleep(poll_interval).await;
            }
        }

        /// Execute an effect with tracking
        ///
        /// - `None`: No-op
        /// - `Future`: Awaits the computation; a produced action is reduced,
        ///   then handed to waiters and observers
        /// - `Parallel`: Executes effects concurrently
        /// - `Sequential`: Executes effects in order, waiting for each to complete
        ///
        /// Effect failures are not fatal to the store: a panicking effect task
        /// is dropped and [`DecrementGuard`] still releases its slot.
        #[allow(clippy::needless_pass_by_value)] // tracking is cloned into tasks
        fn execute_effect_internal(&self, effect: Effect<A>, tracking: EffectTracking) {
            match effect {
                Effect::None => {
                    metrics::counter!("store.effects.executed", "type" => "none").increment(1);
                },
                Effect::Future(fut) => {
                    metrics::counter!("store.effects.executed", "type" => "future").increment(1);
                    tracking.increment();

                    self.pending_effects.fetch_add(1, Ordering::SeqCst);
                    let pending_guard = AtomicCounterGuard(Arc::clone(&self.pending_effects));

                    let tracking_clone = tracking.clone();
                    let store = self.clone();

                    tokio::spawn(async move {
                        let _guard = DecrementGuard(tracking_clone);
                        let _pending_guard = pending_guard;

                        if let Some(action) = fut.await {
                            tracing::trace!("Effect::Future produced an action, feeding it back");
                            store.send_feedback(action).await;
                        }
                    });
                },
                Effect::Parallel(effects) => {
                    metrics::counter!("store.effects.executed", "type" => "parallel").increment(1);
                    for effect in effects {
                        self.execute_effect_internal(effect, tracking.clone());
                    }
                },
                Effect::Sequential(effects) => {
                    metrics::counter!("store.effects.executed", "type" => "sequential")
                        .increment(1);
                    tracking.increment();

                    self.pending_effects.fetch_add(1, Ordering::SeqCst);
                    let pending_guard = AtomicCounterGuard(Arc::clone(&self.pending_effects));

                    let tracking_clone = tracking.clone();
                    let store = self.clone();

                    tokio::spawn(async move {
                        let _guard = DecrementGuard(tracking_clone);
                        let _pending_guard = pending_guard;

                        for effect in effects {
                            let (mut sub_handle, sub_tracking) = EffectHandle::new();
                            store.execute_effect_internal(effect, sub_tracking);
                            sub_handle.wait().await;
                        }
                    });
                },
            }
        }
    }

    impl<S, A, E, R> Clone for Store<S, A, E, R>
    where
        R: Reducer<State = S, Action = A, Environment = E> + Clone,
        E: Clone,
    {
        fn clone(&self) -> Self {
            Self {
                state: Arc::clone(&self.state),
                reducer: self.reducer.clone(),
                environment: self.environment.clone(),
                shutdown: Arc::clone(&self.shutdown),
                pending_effects: Arc::clone(&self.pending_effects),
                snapshots: Arc::clone(&self.snapshots),
                action_broadcast: self.action_broadcast.clone(),
                waiters: Arc::clone(&self.waiters),
            }
        }
    }
}

// Re-export for convenience
pub use store::Store;
