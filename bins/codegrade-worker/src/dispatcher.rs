/// Execution Dispatcher - Remote Engine Client
///
/// **Responsibility:**
/// Run one program against one stdin on a Judge0-compatible engine and
/// normalize whatever comes back into an `ExecutionOutcome`.
///
/// **Protocol:**
/// 1. Resolve the engine's numeric language id (no id → `UnsupportedLanguage`)
/// 2. Build auth headers (key mode without a key → `Configuration`)
/// 3. `POST /submissions` → token (anything but 201 → `RemoteApi`)
/// 4. `GET /submissions/{token}` every poll interval until a terminal status
///    or the attempt budget runs out (`PollTimeout`)
///
/// Transport failures are reported as `Network` and never retried here.
/// The poll wait is the only place a grading run can be cancelled.

use crate::config::LanguageConfigManager;
use async_trait::async_trait;
use codegrade_common::config::EngineConfig;
use codegrade_common::types::{
    truncate_detail, ErrorKind, ExecutionLimits, ExecutionOutcome, Language,
};
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

pub const STATUS_IN_QUEUE: u32 = 1;
pub const STATUS_PROCESSING: u32 = 2;
pub const STATUS_ACCEPTED: u32 = 3;
pub const STATUS_WRONG_ANSWER: u32 = 4;
pub const STATUS_TIME_LIMIT: u32 = 5;
pub const STATUS_COMPILE_ERROR: u32 = 6;

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("unsupported language: {0}")]
    UnsupportedLanguage(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("execution engine returned HTTP {status}: {body}")]
    RemoteApi { status: u16, body: String },

    #[error("no terminal status after {attempts} poll attempts")]
    PollTimeout { attempts: u32 },

    #[error("execution cancelled")]
    Cancelled,
}

impl DispatchError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DispatchError::UnsupportedLanguage(_) => ErrorKind::UnsupportedLanguage,
            DispatchError::Configuration(_) => ErrorKind::ConfigurationError,
            DispatchError::Network(_) => ErrorKind::NetworkError,
            DispatchError::RemoteApi { .. } => ErrorKind::RemoteApiError,
            DispatchError::PollTimeout { .. } => ErrorKind::PollTimeout,
            DispatchError::Cancelled => ErrorKind::Cancelled,
        }
    }
}

impl From<reqwest::Error> for DispatchError {
    fn from(e: reqwest::Error) -> Self {
        DispatchError::Network(truncate_detail(&e.to_string()))
    }
}

/// One program run as the engine sees it
#[derive(Debug, Clone)]
pub struct ExecutionRequest {
    pub language: Language,
    pub source: String,
    pub stdin: String,
    pub expected_output: Option<String>,
    pub limits: ExecutionLimits,
}

#[async_trait]
pub trait ExecutionBackend: Send + Sync {
    async fn execute(
        &self,
        request: &ExecutionRequest,
        cancel: &CancellationToken,
    ) -> Result<ExecutionOutcome, DispatchError>;
}

#[derive(Debug, Serialize)]
struct SubmissionBody<'a> {
    source_code: &'a str,
    language_id: u32,
    stdin: &'a str,
    cpu_time_limit: f64,
    memory_limit: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    expected_output: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct SubmissionToken {
    token: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EngineStatus {
    pub id: u32,
    #[serde(default)]
    pub description: String,
}

/// Poll response body, only the fields grading reads
#[derive(Debug, Clone, Deserialize)]
pub struct EngineResult {
    pub status: EngineStatus,
    #[serde(default)]
    pub stdout: Option<String>,
    #[serde(default)]
    pub stderr: Option<String>,
    #[serde(default)]
    pub compile_output: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    /// Seconds, as a string or a number
    #[serde(default)]
    pub time: Option<serde_json::Value>,
    /// Kilobytes
    #[serde(default)]
    pub memory: Option<u64>,
}

/// Judge0 HTTP client
pub struct Judge0Client {
    http: reqwest::Client,
    config: EngineConfig,
    languages: LanguageConfigManager,
}

impl Judge0Client {
    pub fn new(config: EngineConfig, languages: LanguageConfigManager) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
            languages,
        }
    }

    fn headers(&self) -> Result<HeaderMap, DispatchError> {
        let mut headers = HeaderMap::new();
        if !self.config.requires_key() {
            return Ok(headers);
        }

        let key = self.config.api_key.as_deref().ok_or_else(|| {
            DispatchError::Configuration(format!(
                "JUDGE0_API_KEY is required for key-authenticated endpoint {}",
                self.config.api_url
            ))
        })?;
        let key = HeaderValue::from_str(key)
            .map_err(|_| DispatchError::Configuration("JUDGE0_API_KEY is not a valid header value".to_string()))?;
        let host = HeaderValue::from_str(&self.config.auth_host).map_err(|_| {
            DispatchError::Configuration("JUDGE0_RAPIDAPI_HOST is not a valid header value".to_string())
        })?;
        headers.insert("X-RapidAPI-Key", key);
        headers.insert("X-RapidAPI-Host", host);
        Ok(headers)
    }

    async fn submit(
        &self,
        headers: &HeaderMap,
        body: &SubmissionBody<'_>,
    ) -> Result<String, DispatchError> {
        let response = self
            .http
            .post(format!("{}/submissions?base64_encoded=false&wait=false", self.config.api_url))
            .headers(headers.clone())
            .timeout(self.config.submit_timeout)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        match status {
            StatusCode::CREATED => {
                let token: SubmissionToken = serde_json::from_str(&text).map_err(|e| {
                    DispatchError::RemoteApi {
                        status: status.as_u16(),
                        body: truncate_detail(&format!("unreadable submission response: {}: {}", e, text)),
                    }
                })?;
                Ok(token.token)
            }
            StatusCode::UNAUTHORIZED => Err(DispatchError::RemoteApi {
                status: status.as_u16(),
                body: truncate_detail(&format!(
                    "authentication failed, check JUDGE0_API_KEY and JUDGE0_RAPIDAPI_HOST: {}",
                    text
                )),
            }),
            _ => Err(DispatchError::RemoteApi {
                status: status.as_u16(),
                body: truncate_detail(&text),
            }),
        }
    }

    async fn fetch(&self, headers: &HeaderMap, token: &str) -> Result<EngineResult, DispatchError> {
        let response = self
            .http
            .get(format!(
                "{}/submissions/{}?base64_encoded=false&fields=stdout,stderr,compile_output,message,status,time,memory",
                self.config.api_url, token
            ))
            .headers(headers.clone())
            .timeout(self.config.poll_timeout)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(DispatchError::RemoteApi {
                status: status.as_u16(),
                body: truncate_detail(&text),
            });
        }
        serde_json::from_str(&text).map_err(|e| DispatchError::RemoteApi {
            status: status.as_u16(),
            body: truncate_detail(&format!("unreadable poll response: {}: {}", e, text)),
        })
    }
}

#[async_trait]
impl ExecutionBackend for Judge0Client {
    #[instrument(skip_all, fields(language = %request.language))]
    async fn execute(
        &self,
        request: &ExecutionRequest,
        cancel: &CancellationToken,
    ) -> Result<ExecutionOutcome, DispatchError> {
        let language_id = self
            .languages
            .engine_language_id(&request.language)
            .ok_or_else(|| DispatchError::UnsupportedLanguage(request.language.to_string()))?;
        let headers = self.headers()?;

        let body = SubmissionBody {
            source_code: &request.source,
            language_id,
            stdin: &request.stdin,
            cpu_time_limit: request.limits.cpu_time_limit,
            memory_limit: request.limits.memory_limit_kb,
            expected_output: request.expected_output.as_deref(),
        };
        let token = self.submit(&headers, &body).await?;
        debug!(token = %token, language_id, "Submission accepted");

        for attempt in 1..=self.config.max_poll_attempts {
            tokio::select! {
                _ = cancel.cancelled() => return Err(DispatchError::Cancelled),
                _ = tokio::time::sleep(self.config.poll_interval) => {}
            }

            let result = self.fetch(&headers, &token).await?;
            if is_pending(result.status.id) {
                debug!(token = %token, attempt, status = result.status.id, "Still running");
                continue;
            }

            debug!(
                token = %token,
                attempt,
                status = result.status.id,
                description = %result.status.description,
                "Terminal status"
            );
            return Ok(interpret(result, request.expected_output.as_deref()));
        }

        warn!(token = %token, attempts = self.config.max_poll_attempts, "Polling exhausted");
        Err(DispatchError::PollTimeout {
            attempts: self.config.max_poll_attempts,
        })
    }
}

pub fn is_pending(status_id: u32) -> bool {
    matches!(status_id, STATUS_IN_QUEUE | STATUS_PROCESSING)
}

/// Failure class of a terminal, non-accepted status
pub fn failure_kind(status_id: u32) -> ErrorKind {
    match status_id {
        STATUS_WRONG_ANSWER => ErrorKind::WrongAnswer,
        STATUS_COMPILE_ERROR => ErrorKind::CompileError,
        STATUS_TIME_LIMIT | 7..=12 => ErrorKind::RuntimeFailure,
        _ => ErrorKind::EngineInternal,
    }
}

/// Turn a terminal engine result into an outcome.
///
/// Stdout and the expected output are compared after trimming trailing
/// whitespace. Without an expected output a run passes when it wrote nothing
/// to stderr and produced no compile diagnostics.
pub fn interpret(result: EngineResult, expected_output: Option<&str>) -> ExecutionOutcome {
    let stdout = result.stdout.unwrap_or_default().trim_end().to_string();
    let stderr = result.stderr.unwrap_or_default();
    let compile_output = result.compile_output.unwrap_or_default();
    let time = result.time.as_ref().and_then(|t| match t {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    });
    let detail = [result.message.as_deref(), Some(result.status.description.as_str())]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|s| !s.is_empty())
        .map(truncate_detail);

    let mut outcome = ExecutionOutcome {
        succeeded: result.status.id == STATUS_ACCEPTED,
        passed: Some(false),
        stdout,
        stderr,
        compile_output,
        time,
        memory: result.memory,
        status_id: Some(result.status.id),
        error_kind: None,
        error_detail: None,
    };

    if result.status.id != STATUS_ACCEPTED {
        outcome.error_kind = Some(failure_kind(result.status.id));
        outcome.error_detail = detail;
        return outcome;
    }

    if !outcome.compile_output.trim().is_empty() {
        outcome.error_kind = Some(ErrorKind::CompileError);
        outcome.error_detail = Some(truncate_detail(outcome.compile_output.trim()));
        return outcome;
    }

    let expected = expected_output.map(str::trim_end).filter(|e| !e.is_empty());
    let passed = match expected {
        Some(expected) => outcome.stdout == expected,
        None => outcome.stderr.trim().is_empty(),
    };
    outcome.passed = Some(passed);
    if !passed {
        outcome.error_kind = Some(ErrorKind::WrongAnswer);
    }
    outcome
}
