//! Integration tests for Store action broadcasting
//!
//! Callers that share a store correlate their results by request id, the
//! way `SyncClient` waits for its completions.

// Test code can use unwrap/expect/panic
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::time::Duration;
use tasksync_core::operation::{Operation, Phase, RequestId, RequestIds, RequestStatus, Status};
use tasksync_core::{SmallVec, effect::Effect, reducer::Reducer, smallvec};
use tasksync_runtime::{Store, StoreError};

// ============================================================================
// Test Fixtures
// ============================================================================

type Lookup = Operation<u64, String>;

#[derive(Debug, Clone, PartialEq)]
enum TestAction {
    Lookup(Lookup),
}

impl TestAction {
    const fn completes(&self, request: RequestId) -> bool {
        let Self::Lookup(op) = self;
        op.request.generation() == request.generation() && op.is_terminal()
    }
}

#[derive(Debug, Clone, Default)]
struct TestState {
    values: Vec<String>,
    request: RequestStatus,
}

#[derive(Debug, Clone)]
struct TestEnv;

#[derive(Debug, Clone)]
struct TestReducer;

impl Reducer for TestReducer {
    type State = TestState;
    type Action = TestAction;
    type Environment = TestEnv;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        _env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        let TestAction::Lookup(Operation { request, phase }) = action;
        match phase {
            Phase::Pending(key) => {
                state.request.start(request);
                smallvec![Lookup::perform(
                    request,
                    async move {
                        // Higher keys answer sooner
                        tokio::time::sleep(Duration::from_millis(40_u64.saturating_sub(key * 10)))
                            .await;
                        if key == 0 {
                            Err("no such key".to_string())
                        } else {
                            Ok(format!("value-{key}"))
                        }
                    },
                    TestAction::Lookup,
                    |error: &String| error.clone(),
                )]
            },
            Phase::Ok(value) => {
                state.values.push(value);
                state.request.succeed();
                smallvec![Effect::None]
            },
            Phase::Err(message) => {
                state.request.fail(message);
                smallvec![Effect::None]
            },
        }
    }
}

fn store() -> Store<TestState, TestAction, TestEnv, TestReducer> {
    Store::new(TestState::default(), TestReducer, TestEnv)
}

async fn lookup(
    store: &Store<TestState, TestAction, TestEnv, TestReducer>,
    ids: &RequestIds,
    key: u64,
) -> Result<TestAction, StoreError> {
    let request = ids.next();
    store
        .send_and_wait_for(
            TestAction::Lookup(Lookup::pending(request, key)),
            move |action| action.completes(request),
            Duration::from_secs(1),
        )
        .await
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn concurrent_waiters_receive_their_own_completion() {
    let store = store();
    let ids = RequestIds::new();

    let (first, second, third) = tokio::join!(
        lookup(&store, &ids, 1),
        lookup(&store, &ids, 2),
        lookup(&store, &ids, 3),
    );

    for (result, key) in [(first, 1), (second, 2), (third, 3)] {
        match result.unwrap() {
            TestAction::Lookup(Operation {
                phase: Phase::Ok(value),
                ..
            }) => assert_eq!(value, format!("value-{key}")),
            other => panic!("unexpected completion: {other:?}"),
        }
    }

    // Completions were applied in arrival order
    assert_eq!(store.snapshot().values, vec!["value-3", "value-2", "value-1"]);
}

#[tokio::test]
async fn failure_is_delivered_to_waiter() {
    let store = store();
    let ids = RequestIds::new();

    let result = lookup(&store, &ids, 0).await.unwrap();

    assert!(matches!(
        result,
        TestAction::Lookup(Operation {
            phase: Phase::Err(ref message),
            ..
        }) if message == "no such key"
    ));
    let snapshot = store.snapshot();
    assert_eq!(snapshot.request.status(), Status::Failed);
    assert_eq!(snapshot.request.error(), Some("no such key"));
}

#[tokio::test]
async fn state_reflects_completion_before_waiter_resumes() {
    let store = store();
    let ids = RequestIds::new();

    let _ = lookup(&store, &ids, 2).await.unwrap();

    assert_eq!(store.state(|s| s.values.clone()).await, vec!["value-2"]);
    assert_eq!(store.snapshot().request.status(), Status::Succeeded);
}

#[tokio::test]
async fn observers_see_completions_but_not_requests() {
    let store = store();
    let ids = RequestIds::new();
    let mut observer = store.subscribe_actions();

    let _ = lookup(&store, &ids, 1).await.unwrap();

    let seen = observer.try_recv().unwrap();
    assert!(matches!(
        seen,
        TestAction::Lookup(Operation {
            phase: Phase::Ok(_),
            ..
        })
    ));
    assert!(observer.try_recv().is_err());
}

#[tokio::test]
async fn lagging_observer_skips_oldest_actions() {
    let store = Store::with_broadcast_capacity(TestState::default(), TestReducer, TestEnv, 1);
    let ids = RequestIds::new();
    let mut observer = store.subscribe_actions();

    let _ = lookup(&store, &ids, 1).await.unwrap();
    let _ = lookup(&store, &ids, 2).await.unwrap();

    assert!(matches!(
        observer.try_recv(),
        Err(tokio::sync::broadcast::error::TryRecvError::Lagged(1))
    ));
    assert!(observer.try_recv().is_ok());
}

#[tokio::test]
async fn shutdown_waits_for_in_flight_effects() {
    let store = store();
    let _ = store
        .send(TestAction::Lookup(Lookup::pending(RequestId::new(1), 1)))
        .await
        .unwrap();

    assert_eq!(
        store.shutdown(Duration::from_millis(1)).await,
        Err(StoreError::ShutdownTimeout(1))
    );
    tokio::time::sleep(Duration::from_millis(60)).await;
    assert_eq!(store.shutdown(Duration::from_millis(10)).await, Ok(()));

    // The accepted lookup still completed
    let snapshot = store.snapshot();
    assert_eq!(snapshot.values, vec!["value-1"]);
    assert_eq!(snapshot.request.status(), Status::Succeeded);
}

#[tokio::test]
async fn waiter_is_answered_when_shutdown_starts_mid_flight() {
    let store = store();
    let ids = RequestIds::new();

    let (result, shutdown) = tokio::join!(lookup(&store, &ids, 1), async {
        tokio::time::sleep(Duration::from_millis(5)).await;
        store.shutdown(Duration::from_secs(1)).await
    });

    assert_eq!(shutdown, Ok(()));
    assert!(matches!(
        result.unwrap(),
        TestAction::Lookup(Operation {
            phase: Phase::Ok(_),
            ..
        })
    ));
    assert_eq!(store.snapshot().request.status(), Status::Succeeded);
    assert_eq!(
        lookup(&store, &ids, 2).await,
        Err(StoreError::ShutdownInProgress)
    );
}

#[tokio::test]
async fn waiters_do_not_depend_on_broadcast_capacity() {
    let store = Store::with_broadcast_capacity(TestState::default(), TestReducer, TestEnv, 1);
    let ids = RequestIds::new();

    let results = tokio::join!(
        lookup(&store, &ids, 1),
        lookup(&store, &ids, 2),
        lookup(&store, &ids, 3),
        lookup(&store, &ids, 4),
    );

    assert!(results.0.is_ok());
    assert!(results.1.is_ok());
    assert!(results.2.is_ok());
    assert!(results.3.is_ok());
    assert_eq!(store.snapshot().values.len(), 4);
}

#[tokio::test]
async fn timed_out_waiter_does_not_block_later_requests() {
    let store = store();
    let ids = RequestIds::new();

    let request = ids.next();
    let timed_out = store
        .send_and_wait_for(
            TestAction::Lookup(Lookup::pending(request, 0)),
            move |action| action.completes(request),
            Duration::from_millis(5),
        )
        .await;
    assert_eq!(timed_out, Err(StoreError::Timeout));

    assert!(lookup(&store, &ids, 3).await.is_ok());
}
