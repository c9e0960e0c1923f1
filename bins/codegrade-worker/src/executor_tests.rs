use crate::config::{GradingDefaults, LanguageConfigManager};
use crate::dispatcher::{DispatchError, ExecutionBackend, ExecutionRequest};
use crate::executor::{GradeError, GradeRequest, Grader};
use async_trait::async_trait;
use codegrade_common::store::{MemoryStore, SubmissionStore};
use codegrade_common::types::{
    ErrorKind, ExecutionOutcome, GradeMode, Language, SolutionMode, SubmissionInput, TaskConfig,
    TestCaseSpec,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// How the fake engine answers a given stdin
#[derive(Clone)]
enum Script {
    /// Echo the stdin back as stdout after a delay
    Echo(u64),
    Fail(fn() -> DispatchError),
    Outcome(ExecutionOutcome),
}

struct ScriptedBackend {
    script: Box<dyn Fn(&ExecutionRequest) -> Script + Send + Sync>,
    seen: Mutex<Vec<ExecutionRequest>>,
}

impl ScriptedBackend {
    fn new(script: impl Fn(&ExecutionRequest) -> Script + Send + Sync + 'static) -> Arc<Self> {
        Arc::new(Self {
            script: Box::new(script),
            seen: Mutex::new(Vec::new()),
        })
    }

    fn echo() -> Arc<Self> {
        Self::new(|_| Script::Echo(0))
    }

    fn seen(&self) -> Vec<ExecutionRequest> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl ExecutionBackend for ScriptedBackend {
    async fn execute(
        &self,
        request: &ExecutionRequest,
        _cancel: &CancellationToken,
    ) -> Result<ExecutionOutcome, DispatchError> {
        self.seen.lock().unwrap().push(request.clone());
        match (self.script)(request) {
            Script::Echo(delay_ms) => {
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                let stdout = request.stdin.trim_end().to_string();
                let passed = request
                    .expected_output
                    .as_deref()
                    .map_or(true, |e| e.trim_end() == stdout);
                Ok(ExecutionOutcome {
                    succeeded: true,
                    passed: Some(passed),
                    stdout,
                    time: Some(0.01),
                    status_id: Some(3),
                    error_kind: (!passed).then_some(ErrorKind::WrongAnswer),
                    ..Default::default()
                })
            }
            Script::Fail(make) => Err(make()),
            Script::Outcome(outcome) => Ok(outcome),
        }
    }
}

fn case(id: u64, stdin: &str, expected: &str, weight: f64, is_hidden: bool, order: i32) -> TestCaseSpec {
    TestCaseSpec {
        id,
        input_data: stdin.to_string(),
        expected_output: expected.to_string(),
        weight,
        is_hidden,
        order,
    }
}

fn full_task(language: &str) -> TaskConfig {
    TaskConfig {
        language: language.to_string(),
        function_name: None,
        template_code: None,
        solution_mode: SolutionMode::Full,
    }
}

fn submission(code: &str) -> SubmissionInput {
    SubmissionInput {
        code_content: code.to_string(),
        language: "python".to_string(),
    }
}

fn grader(backend: Arc<ScriptedBackend>, store: Arc<MemoryStore>, max_parallel: usize) -> Grader {
    let defaults = GradingDefaults {
        max_parallel_tests: max_parallel,
        ..GradingDefaults::default()
    };
    Grader::new(backend, store, LanguageConfigManager::builtin(), defaults)
}

fn request<'a>(
    mode: GradeMode,
    task: &'a TaskConfig,
    test_cases: &'a [TestCaseSpec],
    submission: &'a SubmissionInput,
) -> GradeRequest<'a> {
    GradeRequest {
        mode,
        task_id: 10,
        student_id: 20,
        task,
        test_cases,
        submission,
    }
}

#[tokio::test]
async fn test_weighted_score_over_mixed_results() {
    let store = Arc::new(MemoryStore::new());
    let grader = grader(ScriptedBackend::echo(), store, 1);
    let task = full_task("python");
    let cases = vec![
        case(1, "a", "a", 1.0, false, 1),
        case(2, "b", "x", 2.0, false, 2),
        case(3, "c", "c", 1.0, false, 3),
    ];
    let code = submission("print(input())");

    let report = grader
        .grade(request(GradeMode::Test, &task, &cases, &code), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.score, 50.0);
    assert_eq!(report.passed_count, 2);
    assert_eq!(report.total_count, 3);
    assert_eq!(report.per_test[1].error_kind, Some(ErrorKind::WrongAnswer));
}

#[tokio::test]
async fn test_test_mode_runs_visible_cases_only() {
    let backend = ScriptedBackend::echo();
    let grader = grader(backend.clone(), Arc::new(MemoryStore::new()), 1);
    let task = full_task("python");
    let cases = vec![
        case(1, "a", "a", 1.0, false, 1),
        case(2, "b", "b", 5.0, true, 2),
    ];
    let code = submission("print(input())");

    let report = grader
        .grade(request(GradeMode::Test, &task, &cases, &code), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.total_count, 1);
    assert_eq!(report.per_test[0].test_case_id, 1);
    assert_eq!(backend.seen().len(), 1);
}

#[tokio::test]
async fn test_only_hidden_cases_in_test_mode_is_no_test_cases() {
    let store = Arc::new(MemoryStore::new());
    let grader = grader(ScriptedBackend::echo(), store.clone(), 1);
    let task = full_task("python");
    let cases = vec![case(1, "a", "a", 1.0, true, 1)];
    let code = submission("print(input())");

    let err = grader
        .grade(request(GradeMode::Test, &task, &cases, &code), &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, GradeError::NoTestCases));
    assert_eq!(err.kind(), ErrorKind::NoTestCases);

    let empty: Vec<TestCaseSpec> = Vec::new();
    let err = grader
        .grade(request(GradeMode::Submit, &task, &empty, &code), &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, GradeError::NoTestCases));
    assert_eq!(store.attempt_count(10, 20).await.unwrap(), 0);
}

#[tokio::test]
async fn test_rows_keep_test_case_order_under_parallelism() {
    let backend = ScriptedBackend::new(|req| match req.stdin.as_str() {
        "first" => Script::Echo(60),
        "second" => Script::Echo(30),
        _ => Script::Echo(0),
    });
    let grader = grader(backend, Arc::new(MemoryStore::new()), 3);
    let task = full_task("python");
    let cases = vec![
        case(30, "third", "third", 1.0, false, 3),
        case(10, "first", "first", 1.0, false, 1),
        case(20, "second", "second", 1.0, false, 2),
    ];
    let code = submission("print(input())");

    let report = grader
        .grade(request(GradeMode::Submit, &task, &cases, &code), &CancellationToken::new())
        .await
        .unwrap();

    let ids: Vec<u64> = report.per_test.iter().map(|r| r.test_case_id).collect();
    assert_eq!(ids, vec![10, 20, 30]);
    assert_eq!(report.score, 100.0);
}

#[tokio::test]
async fn test_resubmission_replaces_report_and_counts_attempts() {
    let store = Arc::new(MemoryStore::new());
    let grader = grader(ScriptedBackend::echo(), store.clone(), 1);
    let task = full_task("python");
    let cases = vec![case(1, "a", "a", 1.0, false, 1)];
    let first = submission("print('first')");
    let second = submission("print('second')");

    let report = grader
        .grade(request(GradeMode::Submit, &task, &cases, &first), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(report.test_count, 1);

    let report = grader
        .grade(request(GradeMode::Submit, &task, &cases, &second), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(report.test_count, 2);

    assert_eq!(store.submission_count().await, 1);
    let stored = store.load_submission(10, 20).await.unwrap().unwrap();
    assert_eq!(stored.code_content, "print('second')");
    assert_eq!(stored.report, report);
}

#[tokio::test]
async fn test_test_mode_does_not_persist_submission() {
    let store = Arc::new(MemoryStore::new());
    let grader = grader(ScriptedBackend::echo(), store.clone(), 1);
    let task = full_task("python");
    let cases = vec![case(1, "a", "a", 1.0, false, 1)];
    let code = submission("print(input())");

    let report = grader
        .grade(request(GradeMode::Test, &task, &cases, &code), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.test_count, 1);
    assert_eq!(store.submission_count().await, 0);

    let history = store.load_attempts(10, 20).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].mode, GradeMode::Test);
    assert_eq!(history[0].code_content, "print(input())");
    assert_eq!(history[0].per_test, report.per_test);
    assert_eq!(history[0].passed_count, 1);
}

#[tokio::test]
async fn test_configuration_error_aborts_batch() {
    let store = Arc::new(MemoryStore::new());
    let backend = ScriptedBackend::new(|_| {
        Script::Fail(|| DispatchError::Configuration("JUDGE0_API_KEY missing".to_string()))
    });
    let grader = grader(backend, store.clone(), 1);
    let task = full_task("python");
    let cases = vec![case(1, "a", "a", 1.0, false, 1)];
    let code = submission("print(input())");

    let err = grader
        .grade(request(GradeMode::Submit, &task, &cases, &code), &CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ConfigurationError);
    assert_eq!(store.submission_count().await, 0);
}

#[tokio::test]
async fn test_per_case_failures_become_rows() {
    let backend = ScriptedBackend::new(|req| match req.stdin.as_str() {
        "slow" => Script::Fail(|| DispatchError::PollTimeout { attempts: 30 }),
        "down" => Script::Fail(|| DispatchError::Network("connection refused".to_string())),
        _ => Script::Outcome(ExecutionOutcome {
            succeeded: false,
            passed: Some(false),
            stderr: "Traceback (most recent call last)".to_string(),
            status_id: Some(11),
            error_kind: Some(ErrorKind::RuntimeFailure),
            ..Default::default()
        }),
    });
    let grader = grader(backend, Arc::new(MemoryStore::new()), 2);
    let task = full_task("python");
    let cases = vec![
        case(1, "slow", "x", 1.0, false, 1),
        case(2, "down", "x", 1.0, false, 2),
        case(3, "crash", "x", 1.0, false, 3),
    ];
    let code = submission("print(input())");

    let report = grader
        .grade(request(GradeMode::Test, &task, &cases, &code), &CancellationToken::new())
        .await
        .unwrap();

    let kinds: Vec<Option<ErrorKind>> = report.per_test.iter().map(|r| r.error_kind).collect();
    assert_eq!(
        kinds,
        vec![
            Some(ErrorKind::PollTimeout),
            Some(ErrorKind::NetworkError),
            Some(ErrorKind::RuntimeFailure)
        ]
    );
    assert_eq!(report.per_test[2].error_message, "Traceback (most recent call last)");
    assert_eq!(report.score, 0.0);
}

#[tokio::test]
async fn test_unsupported_language_rows() {
    let backend = ScriptedBackend::echo();
    let grader = grader(backend.clone(), Arc::new(MemoryStore::new()), 1);
    let task = full_task("cobol");
    let cases = vec![case(1, "a", "a", 1.0, false, 1)];
    let code = submission("DISPLAY 'HI'.");

    let report = grader
        .grade(request(GradeMode::Test, &task, &cases, &code), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.per_test[0].error_kind, Some(ErrorKind::UnsupportedLanguage));
    assert!(report.per_test[0].error_message.contains("cobol"));
    assert!(backend.seen().is_empty());
}

#[tokio::test]
async fn test_synthesis_failure_row() {
    let backend = ScriptedBackend::echo();
    let grader = grader(backend.clone(), Arc::new(MemoryStore::new()), 1);
    let task = TaskConfig {
        solution_mode: SolutionMode::Function,
        ..full_task("python")
    };
    let cases = vec![case(1, "1", "1", 1.0, false, 1)];
    let code = submission("   \n");

    let report = grader
        .grade(request(GradeMode::Test, &task, &cases, &code), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.per_test[0].error_kind, Some(ErrorKind::HarnessSynthesisError));
    assert!(!report.per_test[0].passed);
    assert!(backend.seen().is_empty());
}

#[tokio::test]
async fn test_cancelled_submit_keeps_previous_submission() {
    let store = Arc::new(MemoryStore::new());
    let task = full_task("python");
    let cases = vec![case(1, "a", "a", 1.0, false, 1)];
    let code = submission("print(input())");

    let finished = grader(ScriptedBackend::echo(), store.clone(), 1)
        .grade(request(GradeMode::Submit, &task, &cases, &code), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(finished.test_count, 1);

    let backend = ScriptedBackend::new(|_| Script::Fail(|| DispatchError::Cancelled));
    let grader = grader(backend, store.clone(), 1);
    let cancel = CancellationToken::new();
    cancel.cancel();
    let report = grader
        .grade(request(GradeMode::Submit, &task, &cases, &code), &cancel)
        .await
        .unwrap();

    assert_eq!(report.per_test[0].error_kind, Some(ErrorKind::Cancelled));
    assert_eq!(report.test_count, 1);
    assert_eq!(store.attempt_count(10, 20).await.unwrap(), 1);
    assert_eq!(store.load_attempts(10, 20).await.unwrap().len(), 1);

    let stored = store.load_submission(10, 20).await.unwrap().unwrap();
    assert_eq!(stored.report, finished);
}

#[tokio::test]
async fn test_hidden_rows_omit_io_in_submit_mode() {
    let grader = grader(ScriptedBackend::echo(), Arc::new(MemoryStore::new()), 1);
    let task = full_task("python");
    let cases = vec![
        case(1, "a", "a", 1.0, false, 1),
        case(2, "secret", "secret", 1.0, true, 2),
    ];
    let code = submission("print(input())");

    let report = grader
        .grade(request(GradeMode::Submit, &task, &cases, &code), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.per_test[0].input_data.as_deref(), Some("a"));
    assert!(report.per_test[1].is_hidden);
    assert!(report.per_test[1].input_data.is_none());
    assert!(report.per_test[1].expected_output.is_none());
    assert!(report.per_test[1].passed);
}

#[tokio::test]
async fn test_full_mode_sends_code_verbatim() {
    let backend = ScriptedBackend::echo();
    let grader = grader(backend.clone(), Arc::new(MemoryStore::new()), 1);
    let task = full_task("Java");
    let cases = vec![case(1, "7", "  ", 1.0, false, 1)];
    let code = submission("public class Main { public static void main(String[] a) {} }");

    grader
        .grade(request(GradeMode::Test, &task, &cases, &code), &CancellationToken::new())
        .await
        .unwrap();

    let seen = backend.seen();
    assert_eq!(seen[0].language, Language::Java);
    assert_eq!(seen[0].source, code.code_content);
    assert_eq!(seen[0].stdin, "7");
    assert_eq!(seen[0].expected_output, None);
    assert_eq!(seen[0].limits.memory_limit_kb, 128_000);
}

#[tokio::test]
async fn test_function_mode_synthesizes_python_harness() {
    let backend = ScriptedBackend::echo();
    let grader = grader(backend.clone(), Arc::new(MemoryStore::new()), 1);
    let task = TaskConfig {
        solution_mode: SolutionMode::Function,
        ..full_task("python")
    };
    let cases = vec![case(1, "2 3", "5", 1.0, false, 1)];
    let code = submission("def solve(a, b):\n    return a + b\n");

    grader
        .grade(request(GradeMode::Test, &task, &cases, &code), &CancellationToken::new())
        .await
        .unwrap();

    let seen = backend.seen();
    assert!(seen[0].source.contains("def solve(a, b):"));
    assert!(seen[0].source.contains("_result = solve(2, 3)"));
    assert_eq!(seen[0].stdin, "2 3");
    assert_eq!(seen[0].expected_output.as_deref(), Some("5"));
}

#[tokio::test]
async fn test_run_job_wraps_abort_as_failed_result() {
    use codegrade_common::types::{GradingJob, JobStatus};

    let grader = grader(ScriptedBackend::echo(), Arc::new(MemoryStore::new()), 1);
    let job = GradingJob {
        id: uuid::Uuid::new_v4(),
        mode: GradeMode::Test,
        task_id: 1,
        student_id: 2,
        task: full_task("python"),
        test_cases: vec![],
        submission: submission("print(1)"),
        created_at: chrono::Utc::now(),
    };

    let result = grader.run_job(&job, &CancellationToken::new()).await;
    assert_eq!(result.job_id, job.id);
    assert_eq!(result.status, JobStatus::Failed);
    assert_eq!(result.error_kind, Some(ErrorKind::NoTestCases));
    assert!(result.report.is_none());
}
