use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;

use crate::handlers;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/tasks/:task_id/test", post(handlers::test_submission))
        .route("/tasks/:task_id/submit", post(handlers::submit_submission))
        .route(
            "/tasks/:task_id/submissions/:student_id",
            get(handlers::get_submission),
        )
        .route(
            "/tasks/:task_id/attempts/:student_id",
            get(handlers::get_attempts),
        )
        .route("/jobs/:job_id", get(handlers::get_job_result))
        .route("/status", get(handlers::health_check))
        .route("/metrics", get(handlers::metrics))
}
