// Job queue seam between the HTTP handlers and Redis

use async_trait::async_trait;
use codegrade_common::redis;
use codegrade_common::types::{GradingJob, JobResult};
use ::redis::aio::ConnectionManager;
use ::redis::RedisResult;
use uuid::Uuid;

#[async_trait]
pub trait JobQueue: Send + Sync {
    async fn push(&self, job: &GradingJob) -> RedisResult<()>;

    /// `None` while the job is queued or still being graded
    async fn result(&self, job_id: &Uuid) -> RedisResult<Option<JobResult>>;
}

#[derive(Clone)]
pub struct RedisQueue {
    conn: ConnectionManager,
}

impl RedisQueue {
    pub fn new(conn: ConnectionManager) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl JobQueue for RedisQueue {
    async fn push(&self, job: &GradingJob) -> RedisResult<()> {
        let mut conn = self.conn.clone();
        redis::push_job(&mut conn, job).await
    }

    async fn result(&self, job_id: &Uuid) -> RedisResult<Option<JobResult>> {
        let mut conn = self.conn.clone();
        redis::get_result(&mut conn, job_id).await
    }
}
