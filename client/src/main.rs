//! `tasksync` demo.
//!
//! Signs in, lists the to-dos and walks one through add, update and remove
//! while printing every snapshot the Todo Store publishes.
//!
//! ```text
//! tasksync              # against TASKSYNC_BASE_URL, credentials from
//!                       # TASKSYNC_EMAIL / TASKSYNC_PASSWORD
//! tasksync --offline    # against in-memory services
//! ```

use anyhow::Context;
use std::time::Duration;
use tasksync_client::mocks::{MockAuthService, MockTodoService};
use tasksync_client::{
    AuthService, ClientConfig, MemorySessionPersistence, SessionPersistence, SignInRequest,
    SyncClient, Todo, TodoId, TodoService, TodoState,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const OFFLINE_EMAIL: &str = "demo@example.com";
const OFFLINE_PASSWORD: &str = "demo-password";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env file is fine
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tasksync_client=info,tasksync_runtime=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let offline = std::env::args().skip(1).any(|arg| arg == "--offline");

    if offline {
        tracing::info!("Running against in-memory services");
        let todos = MockTodoService::with_todos(vec![
            Todo::new(TodoId::new(1), "buy milk"),
            Todo::new(TodoId::new(2), "water the plants"),
        ]);
        let auth = MockAuthService::new().with_account("Demo", OFFLINE_EMAIL, OFFLINE_PASSWORD);
        let client = SyncClient::new(todos, auth, MemorySessionPersistence::new());
        run(&client, SignInRequest::new(OFFLINE_EMAIL, OFFLINE_PASSWORD)).await
    } else {
        let config = ClientConfig::from_env();
        tracing::info!(base_url = %config.base_url, "Running against remote service");
        let email = std::env::var("TASKSYNC_EMAIL").context("TASKSYNC_EMAIL is not set")?;
        let password = std::env::var("TASKSYNC_PASSWORD").context("TASKSYNC_PASSWORD is not set")?;
        let client = SyncClient::from_config(&config)?;

        if client.persisted_token().await?.is_some() {
            tracing::info!(
                file = %config.session_file.display(),
                "Found a persisted session token"
            );
        }
        run(&client, SignInRequest::new(email, password)).await
    }
}

async fn run<T, A, P>(
    client: &SyncClient<T, A, P>,
    credentials: SignInRequest,
) -> anyhow::Result<()>
where
    T: TodoService + Clone + 'static,
    A: AuthService + Clone + 'static,
    P: SessionPersistence + Clone + 'static,
{
    let mut snapshots = client.subscribe_todos();
    let printer = tokio::spawn(async move {
        while snapshots.changed().await.is_ok() {
            let state = snapshots.borrow_and_update().clone();
            print_snapshot(&state);
        }
    });

    let user = client.sign_in(credentials).await.context("sign-in failed")?;
    println!("Signed in as {} <{}>", user.name, user.email);

    let items = client.fetch_todos().await.context("fetching todos failed")?;
    println!("Fetched {} todo(s)", items.len());

    let todo = client.add_todo("try tasksync").await?;
    client.update_todo(todo.id, "try tasksync again").await?;
    client.remove_todo(todo.id).await?;

    if let Err(error) = client.add_todo("   ").await {
        println!("Rejected as expected: {error}");
    }

    client.shutdown(Duration::from_secs(5)).await?;
    printer.abort();
    Ok(())
}

fn print_snapshot(state: &TodoState) {
    let status = format!("{:?}", state.status());
    match state.error() {
        Some(error) => println!("[{status}] {} item(s), error: {error}", state.len()),
        None => println!("[{status}] {} item(s)", state.len()),
    }
    for todo in state.items() {
        let mark = if todo.completed { 'x' } else { ' ' };
        println!("  [{mark}] {:>4} {}", todo.id.get(), todo.description);
    }
}
