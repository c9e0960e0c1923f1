mod config;
mod dispatcher;
mod evaluator;
mod executor;

#[cfg(test)]
mod dispatcher_tests;
#[cfg(test)]
mod executor_tests;

use codegrade_common::config::EngineConfig;
use codegrade_common::redis;
use codegrade_common::store::RedisStore;
use config::{GradingDefaults, LanguageConfigManager};
use dispatcher::Judge0Client;
use executor::Grader;
use std::sync::Arc;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_thread_ids(true)
        .with_line_number(true)
        .init();

    info!("CodeGrade Worker booting...");

    let languages = match LanguageConfigManager::load_default() {
        Ok(manager) => manager,
        Err(e) => {
            warn!(error = %e, "Falling back to built-in language table");
            LanguageConfigManager::builtin()
        }
    };
    info!("Loaded language configurations for: {:?}", languages.list_languages());

    let engine = EngineConfig::from_env();
    if engine.requires_key() && engine.api_key.is_none() {
        anyhow::bail!(
            "JUDGE0_API_KEY must be set for key-authenticated endpoint {}",
            engine.api_url
        );
    }
    info!(
        api_url = %engine.api_url,
        auth_mode = ?engine.auth_mode,
        poll_interval_ms = engine.poll_interval.as_millis() as u64,
        max_poll_attempts = engine.max_poll_attempts,
        "Execution engine configured"
    );

    let defaults = GradingDefaults::from_env();
    info!(
        default_function = %defaults.harness.function_name,
        max_parallel_tests = defaults.max_parallel_tests,
        "Grading defaults"
    );

    // Connect to Redis
    let redis_url =
        std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string());
    let client = ::redis::Client::open(redis_url.as_str())?;
    let mut redis_conn = ::redis::aio::ConnectionManager::new(client).await?;
    info!("Connected to Redis: {}", redis_url);

    let grader = Grader::new(
        Arc::new(Judge0Client::new(engine, languages.clone())),
        Arc::new(RedisStore::new(redis_conn.clone())),
        languages,
        defaults,
    );

    // Setup graceful shutdown: the first signal stops intake, a second one
    // cancels the job in flight
    let shutdown = CancellationToken::new();
    let cancel = CancellationToken::new();
    let signals = {
        let shutdown = shutdown.clone();
        let cancel = cancel.clone();
        async move {
            if let Err(e) = signal::ctrl_c().await {
                error!(error = %e, "Failed to listen for shutdown signal");
                return;
            }
            warn!("Received shutdown signal, finishing current job...");
            shutdown.cancel();

            if signal::ctrl_c().await.is_ok() {
                warn!("Received second shutdown signal, cancelling current job...");
                cancel.cancel();
            }
        }
    };
    tokio::spawn(signals);

    worker_loop(&mut redis_conn, &grader, &shutdown, &cancel).await;

    info!("Worker shutdown complete");
    Ok(())
}

#[instrument(skip_all)]
async fn worker_loop(
    redis_conn: &mut ::redis::aio::ConnectionManager,
    grader: &Grader,
    shutdown: &CancellationToken,
    cancel: &CancellationToken,
) {
    while !shutdown.is_cancelled() {
        // BLPOP with 5 second timeout for graceful shutdown
        match redis::pop_job(redis_conn, 5.0).await {
            Ok(Some(job)) => {
                let job_id = job.id;
                info!(
                    job_id = %job_id,
                    mode = ?job.mode,
                    task_id = job.task_id,
                    student_id = job.student_id,
                    language = %job.task.language,
                    test_cases = job.test_cases.len(),
                    source_size = job.submission.code_content.len(),
                    "Received job"
                );

                let result = grader.run_job(&job, cancel).await;
                if let Some(report) = &result.report {
                    for row in &report.per_test {
                        debug!(
                            job_id = %job_id,
                            test_case_id = row.test_case_id,
                            passed = row.passed,
                            error_kind = ?row.error_kind,
                            execution_time = row.execution_time,
                            "Test result"
                        );
                    }
                }

                // Persist result to Redis
                match redis::store_result(redis_conn, &result).await {
                    Ok(_) => info!(job_id = %job_id, status = ?result.status, "Result persisted to Redis"),
                    Err(e) => error!(job_id = %job_id, error = %e, "Failed to persist result"),
                }
            }
            Ok(None) => continue,
            Err(e) => {
                error!(error = %e, "Redis error");
                tokio::time::sleep(tokio::time::Duration::from_secs(1)).await;
            }
        }
    }
}
