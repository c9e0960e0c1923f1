// Prometheus counters exposed on GET /metrics

use lazy_static::lazy_static;
use prometheus::{register_int_counter_vec, Encoder, IntCounterVec, TextEncoder};

lazy_static! {
    pub static ref JOBS_QUEUED: IntCounterVec = register_int_counter_vec!(
        "codegrade_jobs_queued_total",
        "Grading jobs pushed on the queue",
        &["mode"]
    )
    .unwrap();
    pub static ref SUBMISSIONS_REJECTED: IntCounterVec = register_int_counter_vec!(
        "codegrade_submissions_rejected_total",
        "Grading requests refused before queueing",
        &["reason"]
    )
    .unwrap();
}

/// Render every registered metric in the text exposition format
pub fn render() -> Result<String, prometheus::Error> {
    let mut buffer = Vec::new();
    TextEncoder::new().encode(&prometheus::gather(), &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}
