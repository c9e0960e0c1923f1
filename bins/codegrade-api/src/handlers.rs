// HTTP route handlers for the CodeGrade API

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use chrono::Utc;
use codegrade_common::types::{GradeMode, GradingJob, SubmissionInput, TaskConfig, TestCaseSpec};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::metrics::{JOBS_QUEUED, SUBMISSIONS_REJECTED};
use crate::AppState;

/// Body of `POST /tasks/{task_id}/test` and `POST /tasks/{task_id}/submit`
#[derive(Debug, Deserialize)]
pub struct GradeBody {
    pub student_id: u64,
    pub task: TaskConfig,
    pub test_cases: Vec<TestCaseSpec>,
    pub code_content: String,
    pub language: String,
}

#[derive(Debug, Serialize)]
pub struct QueuedResponse {
    pub job_id: String,
}

fn error_response(status: StatusCode, message: String) -> Response {
    (status, Json(serde_json::json!({ "error": message }))).into_response()
}

/// POST /tasks/{task_id}/test
pub async fn test_submission(
    State(state): State<Arc<AppState>>,
    Path(task_id): Path<u64>,
    Json(body): Json<GradeBody>,
) -> Response {
    enqueue(state, GradeMode::Test, task_id, body).await
}

/// POST /tasks/{task_id}/submit
pub async fn submit_submission(
    State(state): State<Arc<AppState>>,
    Path(task_id): Path<u64>,
    Json(body): Json<GradeBody>,
) -> Response {
    enqueue(state, GradeMode::Submit, task_id, body).await
}

async fn enqueue(state: Arc<AppState>, mode: GradeMode, task_id: u64, body: GradeBody) -> Response {
    if !body.language.trim().eq_ignore_ascii_case(body.task.language.trim()) {
        warn!(
            task_id,
            student_id = body.student_id,
            submitted = %body.language,
            expected = %body.task.language,
            "Language mismatch"
        );
        SUBMISSIONS_REJECTED.with_label_values(&["language_mismatch"]).inc();
        return error_response(
            StatusCode::BAD_REQUEST,
            format!(
                "submission language '{}' does not match task language '{}'",
                body.language, body.task.language
            ),
        );
    }

    let job = GradingJob {
        id: Uuid::new_v4(),
        mode,
        task_id,
        student_id: body.student_id,
        task: body.task,
        test_cases: body.test_cases,
        submission: SubmissionInput {
            code_content: body.code_content,
            language: body.language,
        },
        created_at: Utc::now(),
    };

    match state.queue.push(&job).await {
        Ok(()) => {
            let mode_label = match mode {
                GradeMode::Test => "test",
                GradeMode::Submit => "submit",
            };
            JOBS_QUEUED.with_label_values(&[mode_label]).inc();
            info!(
                job_id = %job.id,
                mode = ?mode,
                task_id,
                student_id = job.student_id,
                test_cases = job.test_cases.len(),
                "Job queued"
            );
            (
                StatusCode::CREATED,
                Json(QueuedResponse {
                    job_id: job.id.to_string(),
                }),
            )
                .into_response()
        }
        Err(e) => {
            error!(job_id = %job.id, error = %e, "Failed to queue job");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to queue job: {}", e),
            )
        }
    }
}

/// GET /jobs/{job_id}
pub async fn get_job_result(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<String>,
) -> Response {
    let job_uuid = match Uuid::parse_str(&job_id) {
        Ok(id) => id,
        Err(_) => {
            return error_response(StatusCode::BAD_REQUEST, "Invalid job ID format".to_string())
        }
    };

    match state.queue.result(&job_uuid).await {
        Ok(Some(result)) => {
            info!(job_id = %job_id, status = ?result.status, "Job result retrieved");
            (StatusCode::OK, Json(result)).into_response()
        }
        Ok(None) => (
            StatusCode::ACCEPTED,
            Json(serde_json::json!({
                "job_id": job_id,
                "status": "pending",
                "message": "Job is queued or still grading"
            })),
        )
            .into_response(),
        Err(e) => {
            error!(job_id = %job_id, error = %e, "Failed to fetch job result");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to query job status: {}", e),
            )
        }
    }
}

/// GET /tasks/{task_id}/submissions/{student_id}
pub async fn get_submission(
    State(state): State<Arc<AppState>>,
    Path((task_id, student_id)): Path<(u64, u64)>,
) -> Response {
    match state.store.load_submission(task_id, student_id).await {
        Ok(Some(submission)) => (StatusCode::OK, Json(submission)).into_response(),
        Ok(None) => error_response(
            StatusCode::NOT_FOUND,
            format!("No submission for task {} and student {}", task_id, student_id),
        ),
        Err(e) => {
            error!(task_id, student_id, error = %e, "Failed to load submission");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to load submission: {}", e),
            )
        }
    }
}

/// GET /tasks/{task_id}/attempts/{student_id} - attempt history, oldest first
pub async fn get_attempts(
    State(state): State<Arc<AppState>>,
    Path((task_id, student_id)): Path<(u64, u64)>,
) -> Response {
    match state.store.load_attempts(task_id, student_id).await {
        Ok(attempts) => (StatusCode::OK, Json(attempts)).into_response(),
        Err(e) => {
            error!(task_id, student_id, error = %e, "Failed to load attempts");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to load attempts: {}", e),
            )
        }
    }
}

/// GET /status - Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// GET /metrics
pub async fn metrics() -> Response {
    match crate::metrics::render() {
        Ok(text) => (StatusCode::OK, text).into_response(),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}
