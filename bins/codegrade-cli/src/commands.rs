// CLI commands for inspecting harnesses and driving the grading queue
use anyhow::{bail, Context, Result};
use chrono::Utc;
use codegrade_common::redis;
use codegrade_common::types::{
    GradeMode, GradingJob, Language, SubmissionInput, TaskConfig, TestCaseSpec,
};
use codegrade_harness::{HarnessDefaults, HarnessRequest, Value};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use uuid::Uuid;

/// Job file accepted by `enqueue`; id and timestamp are assigned here
#[derive(Debug, Deserialize)]
pub struct JobFile {
    pub mode: GradeMode,
    pub task_id: u64,
    pub student_id: u64,
    pub task: TaskConfig,
    pub test_cases: Vec<TestCaseSpec>,
    pub submission: SubmissionInput,
}

impl JobFile {
    pub fn into_job(self) -> GradingJob {
        GradingJob {
            id: Uuid::new_v4(),
            mode: self.mode,
            task_id: self.task_id,
            student_id: self.student_id,
            task: self.task,
            test_cases: self.test_cases,
            submission: self.submission,
            created_at: Utc::now(),
        }
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Int(_) => "int",
        Value::Float(_) => "float",
        Value::Str(_) => "str",
        Value::List(_) => "list",
        Value::Map(_) => "map",
    }
}

/// One line per parsed argument: index, type, JSON rendering
pub fn describe_input(raw: &str) -> Vec<String> {
    codegrade_harness::parse(raw)
        .iter()
        .enumerate()
        .map(|(i, value)| format!("[{}] {:<5} {}", i, type_name(value), value.to_json()))
        .collect()
}

pub fn parse_input(raw: &str) {
    let lines = describe_input(raw);
    if lines.is_empty() {
        println!("(no arguments)");
        return;
    }
    for line in lines {
        println!("{}", line);
    }
}

pub fn synth(
    language: &str,
    code_file: &Path,
    function: Option<&str>,
    template_file: Option<&Path>,
    input: &str,
) -> Result<()> {
    let Some(language) = Language::from_str(language) else {
        bail!("Unsupported language '{}' (expected python or java)", language);
    };
    let code = fs::read_to_string(code_file)
        .with_context(|| format!("Failed to read {}", code_file.display()))?;
    let template = match template_file {
        Some(path) => Some(
            fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?,
        ),
        None => None,
    };

    let inputs = codegrade_harness::parse(input);
    let request = HarnessRequest {
        language,
        user_code: &code,
        function_name: function,
        template_code: template.as_deref(),
        inputs: &inputs,
    };
    let program = codegrade_harness::synthesize(&request, &HarnessDefaults::default())
        .context("Harness synthesis failed")?;

    if !program.wrapped {
        eprintln!("note: code is a complete program, submitted verbatim");
    }
    print!("{}", program.source);
    Ok(())
}

async fn connect() -> Result<::redis::aio::ConnectionManager> {
    let redis_url =
        std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string());
    let client = ::redis::Client::open(redis_url.as_str()).context("Failed to create Redis client")?;
    ::redis::aio::ConnectionManager::new(client)
        .await
        .with_context(|| format!("Failed to connect to Redis at {}", redis_url))
}

pub async fn enqueue(job_file: &Path) -> Result<()> {
    let content = fs::read_to_string(job_file)
        .with_context(|| format!("Failed to read {}", job_file.display()))?;
    let job = serde_json::from_str::<JobFile>(&content)
        .context("Failed to parse job file")?
        .into_job();

    let mut conn = connect().await?;
    redis::push_job(&mut conn, &job)
        .await
        .context("Failed to queue job")?;

    println!("✅ Queued {:?} job {}", job.mode, job.id);
    println!("   task {} / student {}, {} test case(s)", job.task_id, job.student_id, job.test_cases.len());
    Ok(())
}

pub async fn fetch_result(job_id: &str) -> Result<()> {
    let job_id = Uuid::parse_str(job_id).context("Invalid job ID format")?;

    let mut conn = connect().await?;
    match redis::get_result(&mut conn, &job_id)
        .await
        .context("Failed to query job result")?
    {
        Some(result) => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        None => println!("⏳ Job {} is queued or still grading", job_id),
    }
    Ok(())
}
