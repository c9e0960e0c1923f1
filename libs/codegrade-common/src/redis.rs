use crate::types::{GradingJob, JobResult};
use redis::{AsyncCommands, RedisResult};

/// Redis key semantics shared by the API and the worker, so neither side
/// drifts on where jobs, results and submissions live.

pub const QUEUE_NAME: &str = "codegrade:queue:grading";
pub const RESULT_PREFIX: &str = "codegrade:result";
pub const STATUS_PREFIX: &str = "codegrade:status";
pub const SUBMISSION_PREFIX: &str = "codegrade:submission";
pub const ATTEMPTS_PREFIX: &str = "codegrade:attempts";
pub const HISTORY_PREFIX: &str = "codegrade:history";

/// Job results expire after a day
pub const RESULT_TTL_SECS: u64 = 86400;

pub fn result_key(job_id: &uuid::Uuid) -> String {
    format!("{}:{}", RESULT_PREFIX, job_id)
}

pub fn status_key(job_id: &uuid::Uuid) -> String {
    format!("{}:{}", STATUS_PREFIX, job_id)
}

pub fn submission_key(task_id: u64, student_id: u64) -> String {
    format!("{}:{}:{}", SUBMISSION_PREFIX, task_id, student_id)
}

pub fn attempts_key(task_id: u64, student_id: u64) -> String {
    format!("{}:{}:{}", ATTEMPTS_PREFIX, task_id, student_id)
}

pub fn history_key(task_id: u64, student_id: u64) -> String {
    format!("{}:{}:{}", HISTORY_PREFIX, task_id, student_id)
}

pub(crate) fn serialization_error(what: &'static str, e: serde_json::Error) -> redis::RedisError {
    redis::RedisError::from((redis::ErrorKind::TypeError, what, e.to_string()))
}

/// Push a grading job on the queue (RPUSH, FIFO with BLPOP)
pub async fn push_job(
    conn: &mut redis::aio::ConnectionManager,
    job: &GradingJob,
) -> RedisResult<()> {
    let payload = serde_json::to_string(job)
        .map_err(|e| serialization_error("serialization error", e))?;

    conn.rpush(QUEUE_NAME, payload).await
}

/// Pop a grading job, blocking up to `timeout_seconds` so callers can
/// notice shutdown between jobs
pub async fn pop_job(
    conn: &mut redis::aio::ConnectionManager,
    timeout_seconds: f64,
) -> RedisResult<Option<GradingJob>> {
    let result: Option<(String, String)> = conn.blpop(QUEUE_NAME, timeout_seconds).await?;

    match result {
        Some((_key, payload)) => {
            let job: GradingJob = serde_json::from_str(&payload)
                .map_err(|e| serialization_error("deserialization error", e))?;
            Ok(Some(job))
        }
        None => Ok(None),
    }
}

/// Store a job result with a 24-hour TTL, plus its status for quick lookup
pub async fn store_result(
    conn: &mut redis::aio::ConnectionManager,
    result: &JobResult,
) -> RedisResult<()> {
    let payload = serde_json::to_string(result)
        .map_err(|e| serialization_error("serialization error", e))?;
    let _: () = conn.set_ex(result_key(&result.job_id), payload, RESULT_TTL_SECS).await?;

    let status = serde_json::to_string(&result.status)
        .map_err(|e| serialization_error("serialization error", e))?;
    let _: () = conn.set_ex(status_key(&result.job_id), status, RESULT_TTL_SECS).await?;

    Ok(())
}

pub async fn get_result(
    conn: &mut redis::aio::ConnectionManager,
    job_id: &uuid::Uuid,
) -> RedisResult<Option<JobResult>> {
    let payload: Option<String> = conn.get(result_key(job_id)).await?;

    match payload {
        Some(data) => {
            let result: JobResult = serde_json::from_str(&data)
                .map_err(|e| serialization_error("deserialization error", e))?;
            Ok(Some(result))
        }
        None => Ok(None),
    }
}
