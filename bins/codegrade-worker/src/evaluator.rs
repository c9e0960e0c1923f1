/// Test Evaluator - Scoring and Report Rows
///
/// **Core Responsibility:**
/// Turn per-test execution outcomes into report rows and a weighted score.
///
/// **Critical Properties:**
/// - Knows nothing about the execution engine or Redis
/// - Pure functions: (test case, outcome) → row, rows → score
///
/// **Scoring Rules:**
/// - score = 100 × Σ(weight × passed) / Σ weight
/// - Negative or non-finite weights count as zero
/// - Σ weight = 0 → the configured zero-weight score (0 by default)
/// - The sums are taken over weights sorted by value, so the score does not
///   depend on the order outcomes arrive in

use codegrade_common::types::{truncate_detail, ErrorKind, ExecutionOutcome, TestCaseReport, TestCaseSpec};

/// Weighted percentage over `(weight, passed)` pairs
pub fn weighted_score<I>(results: I, zero_weight_score: f64) -> f64
where
    I: IntoIterator<Item = (f64, bool)>,
{
    let mut total = Vec::new();
    let mut earned = Vec::new();
    for (weight, passed) in results {
        let weight = if weight.is_finite() { weight.max(0.0) } else { 0.0 };
        total.push(weight);
        if passed {
            earned.push(weight);
        }
    }

    total.sort_by(f64::total_cmp);
    earned.sort_by(f64::total_cmp);
    let total: f64 = total.iter().sum();
    let earned: f64 = earned.iter().sum();

    if total <= 0.0 {
        return zero_weight_score;
    }
    100.0 * earned / total
}

/// First non-empty diagnostic: stderr, then compile output, then engine text
pub fn error_message(outcome: &ExecutionOutcome) -> String {
    [
        outcome.stderr.as_str(),
        outcome.compile_output.as_str(),
        outcome.error_detail.as_deref().unwrap_or(""),
    ]
    .into_iter()
    .map(str::trim)
    .find(|s| !s.is_empty())
    .map(truncate_detail)
    .unwrap_or_default()
}

/// Row for a test case the engine actually ran
pub fn report_row(test_case: &TestCaseSpec, outcome: &ExecutionOutcome) -> TestCaseReport {
    let mut row = base_row(test_case);
    row.passed = outcome.is_passed();
    row.output = outcome.stdout.clone();
    row.error_message = error_message(outcome);
    row.error_kind = outcome.error_kind;
    row.execution_time = outcome.time.unwrap_or(0.0);
    row.memory = outcome.memory;
    row
}

/// Row for a test case that never produced an outcome
pub fn failure_row(test_case: &TestCaseSpec, kind: ErrorKind, message: &str) -> TestCaseReport {
    let mut row = base_row(test_case);
    row.error_kind = Some(kind);
    row.error_message = truncate_detail(message);
    row
}

fn base_row(test_case: &TestCaseSpec) -> TestCaseReport {
    let visible = !test_case.is_hidden;
    TestCaseReport {
        test_case_id: test_case.id,
        order: test_case.order,
        weight: test_case.weight,
        is_hidden: test_case.is_hidden,
        passed: false,
        output: String::new(),
        error_message: String::new(),
        error_kind: None,
        execution_time: 0.0,
        memory: None,
        input_data: visible.then(|| test_case.input_data.clone()),
        expected_output: visible.then(|| test_case.expected_output.clone()),
    }
}
