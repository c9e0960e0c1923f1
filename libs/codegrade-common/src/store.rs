/// Submission storage boundary
///
/// One stored submission per (task, student) pair. Saving replaces the
/// previous submission and its per-test rows wholesale. Every counted grading
/// call is also appended to the pair's attempt history; the attempt counter
/// lives beside it and only ever grows.
use crate::redis::{attempts_key, history_key, submission_key};
use crate::types::{AttemptRecord, StoredSubmission};
use async_trait::async_trait;
use redis::AsyncCommands;
use std::collections::HashMap;
use tokio::sync::Mutex;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[async_trait]
pub trait SubmissionStore: Send + Sync {
    /// Append to the pair's history, then bump and return its attempt counter
    async fn record_attempt(&self, attempt: &AttemptRecord) -> Result<u64, StoreError>;

    /// Attempts counted so far, without counting a new one
    async fn attempt_count(&self, task_id: u64, student_id: u64) -> Result<u64, StoreError>;

    /// Oldest first
    async fn load_attempts(
        &self,
        task_id: u64,
        student_id: u64,
    ) -> Result<Vec<AttemptRecord>, StoreError>;

    /// Replace whatever submission the pair had
    async fn save_submission(&self, submission: &StoredSubmission) -> Result<(), StoreError>;

    async fn load_submission(
        &self,
        task_id: u64,
        student_id: u64,
    ) -> Result<Option<StoredSubmission>, StoreError>;
}

/// Redis-backed store used by the worker and the API
#[derive(Clone)]
pub struct RedisStore {
    conn: redis::aio::ConnectionManager,
}

impl RedisStore {
    pub fn new(conn: redis::aio::ConnectionManager) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl SubmissionStore for RedisStore {
    async fn record_attempt(&self, attempt: &AttemptRecord) -> Result<u64, StoreError> {
        let mut conn = self.conn.clone();
        let payload = serde_json::to_string(attempt)?;
        let _: u64 = conn
            .rpush(history_key(attempt.task_id, attempt.student_id), payload)
            .await?;
        let count: u64 = conn
            .incr(attempts_key(attempt.task_id, attempt.student_id), 1u64)
            .await?;
        Ok(count)
    }

    async fn attempt_count(&self, task_id: u64, student_id: u64) -> Result<u64, StoreError> {
        let mut conn = self.conn.clone();
        let count: Option<u64> = conn.get(attempts_key(task_id, student_id)).await?;
        Ok(count.unwrap_or(0))
    }

    async fn load_attempts(
        &self,
        task_id: u64,
        student_id: u64,
    ) -> Result<Vec<AttemptRecord>, StoreError> {
        let mut conn = self.conn.clone();
        let payloads: Vec<String> = conn.lrange(history_key(task_id, student_id), 0, -1).await?;
        payloads
            .iter()
            .map(|data| serde_json::from_str(data).map_err(StoreError::from))
            .collect()
    }

    async fn save_submission(&self, submission: &StoredSubmission) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let payload = serde_json::to_string(submission)?;
        let _: () = conn
            .set(submission_key(submission.task_id, submission.student_id), payload)
            .await?;
        Ok(())
    }

    async fn load_submission(
        &self,
        task_id: u64,
        student_id: u64,
    ) -> Result<Option<StoredSubmission>, StoreError> {
        let mut conn = self.conn.clone();
        let payload: Option<String> = conn.get(submission_key(task_id, student_id)).await?;
        match payload {
            Some(data) => Ok(Some(serde_json::from_str(&data)?)),
            None => Ok(None),
        }
    }
}

/// In-process store for tests and local tooling
#[derive(Default)]
pub struct MemoryStore {
    attempts: Mutex<HashMap<(u64, u64), Vec<AttemptRecord>>>,
    submissions: Mutex<HashMap<(u64, u64), StoredSubmission>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn submission_count(&self) -> usize {
        self.submissions.lock().await.len()
    }
}

#[async_trait]
impl SubmissionStore for MemoryStore {
    async fn record_attempt(&self, attempt: &AttemptRecord) -> Result<u64, StoreError> {
        let mut attempts = self.attempts.lock().await;
        let history = attempts
            .entry((attempt.task_id, attempt.student_id))
            .or_default();
        history.push(attempt.clone());
        Ok(history.len() as u64)
    }

    async fn attempt_count(&self, task_id: u64, student_id: u64) -> Result<u64, StoreError> {
        let attempts = self.attempts.lock().await;
        Ok(attempts.get(&(task_id, student_id)).map_or(0, |h| h.len() as u64))
    }

    async fn load_attempts(
        &self,
        task_id: u64,
        student_id: u64,
    ) -> Result<Vec<AttemptRecord>, StoreError> {
        let attempts = self.attempts.lock().await;
        Ok(attempts.get(&(task_id, student_id)).cloned().unwrap_or_default())
    }

    async fn save_submission(&self, submission: &StoredSubmission) -> Result<(), StoreError> {
        self.submissions
            .lock()
            .await
            .insert((submission.task_id, submission.student_id), submission.clone());
        Ok(())
    }

    async fn load_submission(
        &self,
        task_id: u64,
        student_id: u64,
    ) -> Result<Option<StoredSubmission>, StoreError> {
        Ok(self.submissions.lock().await.get(&(task_id, student_id)).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{GradeMode, GradingReport};
    use chrono::Utc;

    fn submission(task_id: u64, student_id: u64, score: f64) -> StoredSubmission {
        StoredSubmission {
            task_id,
            student_id,
            code_content: "return 1".to_string(),
            language: "python".to_string(),
            report: GradingReport {
                mode: GradeMode::Submit,
                per_test: vec![],
                score,
                passed_count: 0,
                total_count: 0,
                test_count: 1,
                total_time: 0.0,
            },
            updated_at: Utc::now(),
        }
    }

    fn attempt(task_id: u64, student_id: u64, code: &str) -> AttemptRecord {
        AttemptRecord {
            task_id,
            student_id,
            mode: GradeMode::Test,
            code_content: code.to_string(),
            language: "python".to_string(),
            per_test: vec![],
            score: 0.0,
            passed_count: 0,
            total_count: 0,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_attempts_are_per_pair() {
        let store = MemoryStore::new();
        assert_eq!(store.record_attempt(&attempt(1, 1, "a")).await.unwrap(), 1);
        assert_eq!(store.record_attempt(&attempt(1, 1, "b")).await.unwrap(), 2);
        assert_eq!(store.record_attempt(&attempt(1, 2, "c")).await.unwrap(), 1);
        assert_eq!(store.attempt_count(1, 1).await.unwrap(), 2);
        assert_eq!(store.attempt_count(2, 1).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_history_keeps_each_attempt_in_order() {
        let store = MemoryStore::new();
        store.record_attempt(&attempt(6, 2, "return 1")).await.unwrap();
        store.record_attempt(&attempt(6, 2, "return 2")).await.unwrap();

        let history = store.load_attempts(6, 2).await.unwrap();
        let codes: Vec<_> = history.iter().map(|a| a.code_content.as_str()).collect();
        assert_eq!(codes, vec!["return 1", "return 2"]);
        assert!(store.load_attempts(2, 6).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_save_replaces_previous_submission() {
        let store = MemoryStore::new();
        store.save_submission(&submission(3, 9, 50.0)).await.unwrap();
        store.save_submission(&submission(3, 9, 100.0)).await.unwrap();

        assert_eq!(store.submission_count().await, 1);
        let stored = store.load_submission(3, 9).await.unwrap().unwrap();
        assert_eq!(stored.report.score, 100.0);
        assert!(store.load_submission(9, 3).await.unwrap().is_none());
    }

    #[tokio::test]
    #[ignore = "needs a Redis server at REDIS_URL"]
    async fn test_redis_store_round_trip() {
        let url = std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string());
        let client = redis::Client::open(url.as_str()).unwrap();
        let conn = redis::aio::ConnectionManager::new(client).await.unwrap();
        let store = RedisStore::new(conn);

        let task_id = uuid::Uuid::new_v4().as_u128() as u64;
        assert_eq!(store.attempt_count(task_id, 1).await.unwrap(), 0);
        assert_eq!(store.record_attempt(&attempt(task_id, 1, "a")).await.unwrap(), 1);
        assert_eq!(store.record_attempt(&attempt(task_id, 1, "b")).await.unwrap(), 2);
        assert_eq!(store.attempt_count(task_id, 1).await.unwrap(), 2);
        assert_eq!(store.load_attempts(task_id, 1).await.unwrap().len(), 2);

        store.save_submission(&submission(task_id, 1, 40.0)).await.unwrap();
        store.save_submission(&submission(task_id, 1, 80.0)).await.unwrap();
        let stored = store.load_submission(task_id, 1).await.unwrap().unwrap();
        assert_eq!(stored.report.score, 80.0);
    }
}
