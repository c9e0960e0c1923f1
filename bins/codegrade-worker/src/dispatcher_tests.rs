/// Dispatcher tests against an in-process fake of the Judge0 HTTP API
///
/// The fake answers `POST /submissions` with a configurable status and
/// `GET /submissions/{token}` with a scripted sequence of status ids (the
/// last one repeats), recording what it was sent.

use crate::config::LanguageConfigManager;
use crate::dispatcher::{
    interpret, DispatchError, EngineResult, EngineStatus, ExecutionBackend, ExecutionRequest,
    Judge0Client,
};
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use codegrade_common::config::{AuthMode, EngineConfig};
use codegrade_common::types::{ErrorKind, ExecutionLimits, Language};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

struct FakeJudge0 {
    submit_status: StatusCode,
    statuses: Vec<u32>,
    result: Value,
    polls: AtomicU32,
    submissions: Mutex<Vec<Value>>,
    api_keys: Mutex<Vec<String>>,
}

impl FakeJudge0 {
    fn new(statuses: Vec<u32>, result: Value) -> Self {
        Self {
            submit_status: StatusCode::CREATED,
            statuses,
            result,
            polls: AtomicU32::new(0),
            submissions: Mutex::new(Vec::new()),
            api_keys: Mutex::new(Vec::new()),
        }
    }
}

async fn submit(
    State(fake): State<Arc<FakeJudge0>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    if let Some(key) = headers.get("x-rapidapi-key").and_then(|v| v.to_str().ok()) {
        fake.api_keys.lock().unwrap().push(key.to_string());
    }
    fake.submissions.lock().unwrap().push(body);

    if fake.submit_status == StatusCode::CREATED {
        (StatusCode::CREATED, Json(json!({ "token": "tok-123" })))
    } else {
        (fake.submit_status, Json(json!({ "message": "rejected" })))
    }
}

async fn poll(
    State(fake): State<Arc<FakeJudge0>>,
    Path(token): Path<String>,
) -> (StatusCode, Json<Value>) {
    assert_eq!(token, "tok-123");
    let n = fake.polls.fetch_add(1, Ordering::SeqCst) as usize;
    let id = fake.statuses[n.min(fake.statuses.len() - 1)];

    let mut body = fake.result.clone();
    body["status"] = json!({ "id": id, "description": format!("status {}", id) });
    (StatusCode::OK, Json(body))
}

async fn spawn_fake(fake: Arc<FakeJudge0>) -> String {
    let app = Router::new()
        .route("/submissions", post(submit))
        .route("/submissions/:token", get(poll))
        .with_state(fake);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

fn fast_config(url: &str) -> EngineConfig {
    let mut config = EngineConfig::new(url);
    config.poll_interval = Duration::from_millis(5);
    config.max_poll_attempts = 3;
    config
}

fn request(language: Language, expected: Option<&str>) -> ExecutionRequest {
    ExecutionRequest {
        language,
        source: "print(5)".to_string(),
        stdin: "2 3".to_string(),
        expected_output: expected.map(str::to_string),
        limits: ExecutionLimits::default(),
    }
}

async fn run(
    fake: Arc<FakeJudge0>,
    expected: Option<&str>,
) -> Result<codegrade_common::types::ExecutionOutcome, DispatchError> {
    let url = spawn_fake(fake).await;
    let client = Judge0Client::new(fast_config(&url), LanguageConfigManager::builtin());
    client
        .execute(&request(Language::Python, expected), &CancellationToken::new())
        .await
}

#[tokio::test]
async fn test_accepted_output_matches_expected() {
    let fake = Arc::new(FakeJudge0::new(
        vec![1, 2, 3],
        json!({ "stdout": "5\n", "stderr": null, "compile_output": null, "time": "0.012", "memory": 3200 }),
    ));
    let outcome = run(fake.clone(), Some("5\n\n")).await.unwrap();

    assert!(outcome.succeeded);
    assert_eq!(outcome.passed, Some(true));
    assert_eq!(outcome.stdout, "5");
    assert_eq!(outcome.time, Some(0.012));
    assert_eq!(outcome.memory, Some(3200));
    assert_eq!(fake.polls.load(Ordering::SeqCst), 3);

    let submissions = fake.submissions.lock().unwrap();
    assert_eq!(submissions[0]["language_id"], 71);
    assert_eq!(submissions[0]["stdin"], "2 3");
    assert_eq!(submissions[0]["memory_limit"], 128000);
    assert_eq!(submissions[0]["expected_output"], "5\n\n");
}

#[tokio::test]
async fn test_accepted_output_mismatch_is_wrong_answer() {
    let fake = Arc::new(FakeJudge0::new(vec![3], json!({ "stdout": "6\n" })));
    let outcome = run(fake, Some("5")).await.unwrap();

    assert_eq!(outcome.passed, Some(false));
    assert_eq!(outcome.error_kind, Some(ErrorKind::WrongAnswer));
}

#[tokio::test]
async fn test_poll_exhaustion_is_poll_timeout() {
    let fake = Arc::new(FakeJudge0::new(vec![1, 2], json!({})));
    let err = run(fake.clone(), Some("5")).await.unwrap_err();

    assert!(matches!(err, DispatchError::PollTimeout { attempts: 3 }));
    assert_eq!(err.kind(), ErrorKind::PollTimeout);
    assert_eq!(fake.polls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_compile_error_status() {
    let fake = Arc::new(FakeJudge0::new(
        vec![6],
        json!({ "stdout": null, "compile_output": "Main.java:2: error: ';' expected" }),
    ));
    let outcome = run(fake, Some("5")).await.unwrap();

    assert!(!outcome.succeeded);
    assert_eq!(outcome.passed, Some(false));
    assert_eq!(outcome.error_kind, Some(ErrorKind::CompileError));
    assert_eq!(outcome.compile_output, "Main.java:2: error: ';' expected");
}

#[tokio::test]
async fn test_runtime_error_keeps_stderr() {
    let fake = Arc::new(FakeJudge0::new(
        vec![11],
        json!({ "stderr": "ZeroDivisionError: division by zero", "message": "Exited with error status 1" }),
    ));
    let outcome = run(fake, Some("5")).await.unwrap();

    assert_eq!(outcome.error_kind, Some(ErrorKind::RuntimeFailure));
    assert_eq!(outcome.stderr, "ZeroDivisionError: division by zero");
    assert_eq!(outcome.error_detail.as_deref(), Some("Exited with error status 1"));
}

#[tokio::test]
async fn test_unauthorized_submit_is_remote_api_error() {
    let mut fake = FakeJudge0::new(vec![3], json!({}));
    fake.submit_status = StatusCode::UNAUTHORIZED;
    let err = run(Arc::new(fake), None).await.unwrap_err();

    match err {
        DispatchError::RemoteApi { status, body } => {
            assert_eq!(status, 401);
            assert!(body.contains("authentication failed"));
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn test_server_error_on_submit_carries_body() {
    let mut fake = FakeJudge0::new(vec![3], json!({}));
    fake.submit_status = StatusCode::INTERNAL_SERVER_ERROR;
    let fake = Arc::new(fake);
    let err = run(fake.clone(), None).await.unwrap_err();

    assert!(matches!(err, DispatchError::RemoteApi { status: 500, ref body } if body.contains("rejected")));
    assert_eq!(fake.polls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_key_mode_without_key_fails_before_network() {
    let config = EngineConfig::new("https://judge0-ce.p.rapidapi.com");
    let client = Judge0Client::new(config, LanguageConfigManager::builtin());
    let err = client
        .execute(&request(Language::Python, None), &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, DispatchError::Configuration(_)));
    assert_eq!(err.kind(), ErrorKind::ConfigurationError);
}

#[tokio::test]
async fn test_key_mode_sends_auth_headers() {
    let fake = Arc::new(FakeJudge0::new(vec![3], json!({ "stdout": "5" })));
    let url = spawn_fake(fake.clone()).await;
    let mut config = fast_config(&url);
    config.auth_mode = AuthMode::Key;
    config.api_key = Some("secret-key".to_string());

    let client = Judge0Client::new(config, LanguageConfigManager::builtin());
    client
        .execute(&request(Language::Python, Some("5")), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(*fake.api_keys.lock().unwrap(), vec!["secret-key".to_string()]);
}

#[tokio::test]
async fn test_unreachable_engine_is_network_error() {
    let client = Judge0Client::new(fast_config("http://127.0.0.1:1"), LanguageConfigManager::builtin());
    let err = client
        .execute(&request(Language::Python, None), &CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::NetworkError);
}

#[tokio::test]
async fn test_unconfigured_language_is_unsupported() {
    let languages = LanguageConfigManager::from_json(
        r#"{"languages": [{"name": "python", "version": "3", "engine_language_id": 71}]}"#,
    )
    .unwrap();
    let client = Judge0Client::new(fast_config("http://127.0.0.1:1"), languages);
    let err = client
        .execute(&request(Language::Java, None), &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, DispatchError::UnsupportedLanguage(ref l) if l == "java"));
}

#[tokio::test]
async fn test_cancellation_interrupts_polling() {
    let fake = Arc::new(FakeJudge0::new(vec![1], json!({})));
    let url = spawn_fake(fake).await;
    let mut config = fast_config(&url);
    config.poll_interval = Duration::from_secs(30);

    let client = Judge0Client::new(config, LanguageConfigManager::builtin());
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let err = client
        .execute(&request(Language::Python, None), &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, DispatchError::Cancelled));
}

fn engine_result(id: u32) -> EngineResult {
    EngineResult {
        status: EngineStatus {
            id,
            description: "Accepted".to_string(),
        },
        stdout: Some("ok\n".to_string()),
        stderr: None,
        compile_output: None,
        message: None,
        time: Some(json!(0.5)),
        memory: None,
    }
}

#[test]
fn test_no_expected_output_passes_on_clean_stderr() {
    let outcome = interpret(engine_result(3), None);
    assert_eq!(outcome.passed, Some(true));

    let mut noisy = engine_result(3);
    noisy.stderr = Some("warning".to_string());
    assert_eq!(interpret(noisy, Some("   ")).passed, Some(false));
}

#[test]
fn test_compile_output_on_accepted_run_fails() {
    let mut result = engine_result(3);
    result.compile_output = Some("note: deprecated API".to_string());
    let outcome = interpret(result, Some("ok"));

    assert_eq!(outcome.passed, Some(false));
    assert_eq!(outcome.error_kind, Some(ErrorKind::CompileError));
}

#[test]
fn test_engine_internal_statuses() {
    for id in [13, 14] {
        let outcome = interpret(engine_result(id), Some("ok"));
        assert_eq!(outcome.error_kind, Some(ErrorKind::EngineInternal));
        assert_eq!(outcome.passed, Some(false));
    }
    assert_eq!(interpret(engine_result(5), None).error_kind, Some(ErrorKind::RuntimeFailure));
    assert_eq!(interpret(engine_result(3), None).time, Some(0.5));
}
