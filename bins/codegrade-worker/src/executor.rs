/// Grading Orchestrator
///
/// **Responsibility:**
/// Run every selected test case through synthesis and the execution engine,
/// then score, record the attempt and (in submit mode) persist the report.
///
/// **Architecture:**
/// 1. Select test cases (test mode: visible only) and sort them by `order`
/// 2. Per test case: parse input → synthesize → execute (dispatcher.rs)
/// 3. Rows → weighted score (evaluator.rs)
/// 4. Attempt history and submission replacement (SubmissionStore)
///
/// A cancelled call is neither counted nor persisted.
///
/// Test cases run through an order-preserving buffered stream, so rows come
/// back in test-case order whatever the completion order. Only configuration
/// errors abort the batch; every other failure lands in its own row.

use crate::config::{GradingDefaults, LanguageConfigManager};
use crate::dispatcher::{DispatchError, ExecutionBackend, ExecutionRequest};
use crate::evaluator::{failure_row, report_row, weighted_score};
use chrono::Utc;
use codegrade_common::store::{StoreError, SubmissionStore};
use codegrade_common::types::{
    AttemptRecord, ErrorKind, GradeMode, GradingJob, GradingReport, JobResult, JobStatus, Language, SolutionMode,
    StoredSubmission, SubmissionInput, TaskConfig, TestCaseReport, TestCaseSpec,
};
use codegrade_harness::{input, synthesize, HarnessRequest};
use futures_util::stream::{self, StreamExt, TryStreamExt};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

#[derive(Debug, thiserror::Error)]
pub enum GradeError {
    #[error("task has no test cases to run")]
    NoTestCases,

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("submission store error: {0}")]
    Store(#[from] StoreError),
}

impl GradeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            GradeError::NoTestCases => ErrorKind::NoTestCases,
            GradeError::Configuration(_) => ErrorKind::ConfigurationError,
            GradeError::Store(_) => ErrorKind::StorageError,
        }
    }
}

/// One grading call
#[derive(Debug, Clone, Copy)]
pub struct GradeRequest<'a> {
    pub mode: GradeMode,
    pub task_id: u64,
    pub student_id: u64,
    pub task: &'a TaskConfig,
    pub test_cases: &'a [TestCaseSpec],
    pub submission: &'a SubmissionInput,
}

impl<'a> From<&'a GradingJob> for GradeRequest<'a> {
    fn from(job: &'a GradingJob) -> Self {
        Self {
            mode: job.mode,
            task_id: job.task_id,
            student_id: job.student_id,
            task: &job.task,
            test_cases: &job.test_cases,
            submission: &job.submission,
        }
    }
}

pub struct Grader {
    backend: Arc<dyn ExecutionBackend>,
    store: Arc<dyn SubmissionStore>,
    languages: LanguageConfigManager,
    defaults: GradingDefaults,
}

impl Grader {
    pub fn new(
        backend: Arc<dyn ExecutionBackend>,
        store: Arc<dyn SubmissionStore>,
        languages: LanguageConfigManager,
        defaults: GradingDefaults,
    ) -> Self {
        Self {
            backend,
            store,
            languages,
            defaults,
        }
    }

    #[instrument(skip_all, fields(task_id = request.task_id, student_id = request.student_id, mode = ?request.mode))]
    pub async fn grade(
        &self,
        request: GradeRequest<'_>,
        cancel: &CancellationToken,
    ) -> Result<GradingReport, GradeError> {
        let start = Instant::now();

        let mut selected: Vec<&TestCaseSpec> = request
            .test_cases
            .iter()
            .filter(|tc| request.mode == GradeMode::Submit || !tc.is_hidden)
            .collect();
        if selected.is_empty() {
            return Err(GradeError::NoTestCases);
        }
        selected.sort_by_key(|tc| tc.order);

        let language = Language::from_str(&request.task.language);
        info!(
            language = %request.task.language,
            test_cases = selected.len(),
            parallel = self.defaults.max_parallel_tests,
            "Grading started"
        );

        let rows: Vec<TestCaseReport> = stream::iter(selected)
            .map(|tc| self.run_case(tc, language, &request, cancel))
            .buffered(self.defaults.max_parallel_tests.max(1))
            .try_collect()
            .await?;

        let score = weighted_score(
            rows.iter().map(|r| (r.weight, r.passed)),
            self.defaults.zero_weight_score,
        );
        let passed_count = rows.iter().filter(|r| r.passed).count();
        let cancelled = cancel.is_cancelled();
        let test_count = if cancelled {
            warn!("Grading cancelled, attempt not counted");
            self.store
                .attempt_count(request.task_id, request.student_id)
                .await?
        } else {
            self.store
                .record_attempt(&AttemptRecord {
                    task_id: request.task_id,
                    student_id: request.student_id,
                    mode: request.mode,
                    code_content: request.submission.code_content.clone(),
                    language: request.submission.language.clone(),
                    per_test: rows.clone(),
                    score,
                    passed_count,
                    total_count: rows.len(),
                    created_at: Utc::now(),
                })
                .await?
        };

        let report = GradingReport {
            mode: request.mode,
            total_count: rows.len(),
            per_test: rows,
            score,
            passed_count,
            test_count,
            total_time: start.elapsed().as_secs_f64(),
        };

        if request.mode == GradeMode::Submit && !cancelled {
            self.store
                .save_submission(&StoredSubmission {
                    task_id: request.task_id,
                    student_id: request.student_id,
                    code_content: request.submission.code_content.clone(),
                    language: request.submission.language.clone(),
                    report: report.clone(),
                    updated_at: Utc::now(),
                })
                .await?;
        }

        info!(
            score = report.score,
            passed = report.passed_count,
            total = report.total_count,
            attempt = report.test_count,
            "Grading finished"
        );
        Ok(report)
    }

    async fn run_case(
        &self,
        test_case: &TestCaseSpec,
        language: Option<Language>,
        request: &GradeRequest<'_>,
        cancel: &CancellationToken,
    ) -> Result<TestCaseReport, GradeError> {
        let language = match language {
            Some(language) if self.languages.get_config(&language).is_some() => language,
            _ => {
                return Ok(failure_row(
                    test_case,
                    ErrorKind::UnsupportedLanguage,
                    &format!("unsupported language: {}", request.task.language),
                ))
            }
        };

        let source = match request.task.solution_mode {
            SolutionMode::Full => request.submission.code_content.clone(),
            SolutionMode::Function => {
                let inputs = input::parse(&test_case.input_data);
                let harness = HarnessRequest {
                    language,
                    user_code: &request.submission.code_content,
                    function_name: request.task.function_name.as_deref(),
                    template_code: request.task.template_code.as_deref(),
                    inputs: &inputs,
                };
                match synthesize(&harness, &self.defaults.harness) {
                    Ok(program) => program.source,
                    Err(e) => {
                        debug!(test_case_id = test_case.id, error = %e, "Harness synthesis failed");
                        return Ok(failure_row(
                            test_case,
                            ErrorKind::HarnessSynthesisError,
                            &e.to_string(),
                        ));
                    }
                }
            }
        };

        let execution = ExecutionRequest {
            language,
            source,
            stdin: test_case.input_data.clone(),
            expected_output: Some(test_case.expected_output.clone())
                .filter(|e| !e.trim().is_empty()),
            limits: self.languages.limits(&language),
        };

        match self.backend.execute(&execution, cancel).await {
            Ok(outcome) => {
                debug!(
                    test_case_id = test_case.id,
                    passed = outcome.is_passed(),
                    status = ?outcome.status_id,
                    "Test case executed"
                );
                Ok(report_row(test_case, &outcome))
            }
            Err(DispatchError::Configuration(msg)) => Err(GradeError::Configuration(msg)),
            Err(e) => {
                warn!(test_case_id = test_case.id, error = %e, "Test case execution failed");
                Ok(failure_row(test_case, e.kind(), &e.to_string()))
            }
        }
    }

    /// Grade a queued job and wrap the outcome for the result store
    pub async fn run_job(&self, job: &GradingJob, cancel: &CancellationToken) -> JobResult {
        match self.grade(GradeRequest::from(job), cancel).await {
            Ok(report) => JobResult {
                job_id: job.id,
                status: JobStatus::Completed,
                report: Some(report),
                error_kind: None,
                error: None,
                finished_at: Utc::now(),
            },
            Err(e) => {
                warn!(job_id = %job.id, error = %e, "Grading aborted");
                JobResult {
                    job_id: job.id,
                    status: JobStatus::Failed,
                    report: None,
                    error_kind: Some(e.kind()),
                    error: Some(e.to_string()),
                    finished_at: Utc::now(),
                }
            }
        }
    }
}
