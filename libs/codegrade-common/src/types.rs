use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Longest diagnostic text carried out of the grading core
pub const MAX_DETAIL_CHARS: usize = 2000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Python,
    Java,
}

impl Language {
    /// Parse a language tag (case-insensitive); `None` for anything unsupported
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "python" => Some(Language::Python),
            "java" => Some(Language::Java),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Language::Python => "python",
            Language::Java => "java",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a task expects student code to be shaped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SolutionMode {
    /// A complete program reading stdin and writing stdout
    Full,
    /// A function (or bare function body) driven by a synthesized harness
    #[default]
    Function,
}

/// Test mode is a student self-check over visible cases; submit mode grades
/// everything and persists the report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GradeMode {
    Test,
    Submit,
}

/// Task-level settings supplied by the task store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskConfig {
    pub language: String,
    #[serde(default)]
    pub function_name: Option<String>,
    #[serde(default)]
    pub template_code: Option<String>,
    #[serde(default)]
    pub solution_mode: SolutionMode,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestCaseSpec {
    pub id: u64,
    pub input_data: String,
    pub expected_output: String,
    #[serde(default = "default_weight")]
    pub weight: f64,
    #[serde(default)]
    pub is_hidden: bool,
    #[serde(default)]
    pub order: i32,
}

fn default_weight() -> f64 {
    1.0
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionInput {
    pub code_content: String,
    pub language: String,
}

/// Unit of work pushed on the grading queue
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradingJob {
    pub id: Uuid,
    pub mode: GradeMode,
    pub task_id: u64,
    pub student_id: u64,
    pub task: TaskConfig,
    pub test_cases: Vec<TestCaseSpec>,
    pub submission: SubmissionInput,
    pub created_at: DateTime<Utc>,
}

/// Per-run resource limits forwarded to the execution engine
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExecutionLimits {
    /// Seconds of CPU time
    pub cpu_time_limit: f64,
    /// Kilobytes
    pub memory_limit_kb: u64,
}

impl Default for ExecutionLimits {
    fn default() -> Self {
        Self {
            cpu_time_limit: 2.0,
            memory_limit_kb: 128_000,
        }
    }
}

/// Serializable tag for every failure the grading core can report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    UnsupportedLanguage,
    ConfigurationError,
    NetworkError,
    RemoteApiError,
    PollTimeout,
    CompileError,
    RuntimeFailure,
    WrongAnswer,
    EngineInternal,
    HarnessSynthesisError,
    NoTestCases,
    Cancelled,
    StorageError,
}

/// Normalized result of running one program against one stdin
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ExecutionOutcome {
    pub succeeded: bool,
    pub passed: Option<bool>,
    pub stdout: String,
    pub stderr: String,
    pub compile_output: String,
    /// Seconds, as reported by the engine
    pub time: Option<f64>,
    /// Kilobytes, as reported by the engine
    pub memory: Option<u64>,
    pub status_id: Option<u32>,
    pub error_kind: Option<ErrorKind>,
    pub error_detail: Option<String>,
}

impl ExecutionOutcome {
    pub fn is_passed(&self) -> bool {
        self.passed.unwrap_or(false)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestCaseReport {
    pub test_case_id: u64,
    pub order: i32,
    pub weight: f64,
    pub is_hidden: bool,
    pub passed: bool,
    pub output: String,
    pub error_message: String,
    pub error_kind: Option<ErrorKind>,
    pub execution_time: f64,
    pub memory: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_data: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_output: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradingReport {
    pub mode: GradeMode,
    pub per_test: Vec<TestCaseReport>,
    /// Percentage in [0, 100]
    pub score: f64,
    pub passed_count: usize,
    pub total_count: usize,
    /// Attempt counter supplied by the submission store
    pub test_count: u64,
    /// Wall-clock seconds spent grading
    pub total_time: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobStatus {
    Completed,
    Failed,
}

/// What the worker stores for a job, whether grading finished or aborted
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobResult {
    pub job_id: Uuid,
    pub status: JobStatus,
    pub report: Option<GradingReport>,
    pub error_kind: Option<ErrorKind>,
    pub error: Option<String>,
    pub finished_at: DateTime<Utc>,
}

/// The single persisted submission for a (task, student) pair
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredSubmission {
    pub task_id: u64,
    pub student_id: u64,
    pub code_content: String,
    pub language: String,
    pub report: GradingReport,
    pub updated_at: DateTime<Utc>,
}

/// One grading call as kept in a pair's attempt history
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttemptRecord {
    pub task_id: u64,
    pub student_id: u64,
    pub mode: GradeMode,
    pub code_content: String,
    pub language: String,
    pub per_test: Vec<TestCaseReport>,
    pub score: f64,
    pub passed_count: usize,
    pub total_count: usize,
    pub created_at: DateTime<Utc>,
}

/// Cut diagnostic text down to `MAX_DETAIL_CHARS` characters
pub fn truncate_detail(text: &str) -> String {
    if text.chars().count() <= MAX_DETAIL_CHARS {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(MAX_DETAIL_CHARS).collect();
    cut.push_str("...[truncated]");
    cut
}
