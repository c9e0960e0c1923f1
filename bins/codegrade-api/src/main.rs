mod handlers;
mod metrics;
mod queue;
mod routes;


use anyhow::Context;
use axum::Router;
use codegrade_common::store::{RedisStore, SubmissionStore};
use queue::{JobQueue, RedisQueue};
use redis::aio::ConnectionManager;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

pub struct AppState {
    pub queue: Arc<dyn JobQueue>,
    pub store: Arc<dyn SubmissionStore>,
}

pub fn app(state: Arc<AppState>) -> Router {
    Router::new().merge(routes::routes()).with_state(state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    info!("CodeGrade API booting...");

    // Connect to Redis
    let redis_url =
        std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string());
    let client = redis::Client::open(redis_url.as_str()).context("Failed to create Redis client")?;
    let redis_conn = ConnectionManager::new(client)
        .await
        .context("Failed to connect to Redis")?;
    info!("Connected to Redis: {}", redis_url);

    let state = Arc::new(AppState {
        queue: Arc::new(RedisQueue::new(redis_conn.clone())),
        store: Arc::new(RedisStore::new(redis_conn)),
    });

    let addr = std::env::var("API_BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    info!("HTTP server listening on {}", addr);
    info!("Ready to accept grading jobs");

    axum::serve(listener, app(state)).await.context("Server error")?;
    Ok(())
}
