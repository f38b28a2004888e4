/// Prometheus metrics for the submission path
///
/// **Exposed series:**
/// - `crucible_submissions_total{outcome}`: one increment per request, labelled
///   by how it ended
/// - `crucible_sandbox_duration_seconds`: wall time of each sandbox launch
/// - `crucible_active_sandboxes`: launches currently holding a slot

use lazy_static::lazy_static;
use prometheus::{
    register_histogram, register_int_counter_vec, register_int_gauge, Encoder, Histogram,
    IntCounterVec, IntGauge, TextEncoder,
};

lazy_static! {
    pub static ref SUBMISSIONS: IntCounterVec = register_int_counter_vec!(
        "crucible_submissions_total",
        "Submissions handled, by outcome",
        &["outcome"]
    )
    .expect("Failed to register crucible_submissions_total");
    pub static ref SANDBOX_DURATION: Histogram = register_histogram!(
        "crucible_sandbox_duration_seconds",
        "Wall time of one sandbox launch",
        vec![0.25, 0.5, 1.0, 2.0, 4.0, 8.0, 12.0, 20.0]
    )
    .expect("Failed to register crucible_sandbox_duration_seconds");
    pub static ref ACTIVE_SANDBOXES: IntGauge = register_int_gauge!(
        "crucible_active_sandboxes",
        "Sandboxes currently running"
    )
    .expect("Failed to register crucible_active_sandboxes");
}

/// How a submission request ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Passed,
    Failed,
    LoadError,
    Timeout,
    Infrastructure,
    Validation,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Passed => "passed",
            Outcome::Failed => "failed",
            Outcome::LoadError => "load_error",
            Outcome::Timeout => "timeout",
            Outcome::Infrastructure => "infrastructure",
            Outcome::Validation => "validation",
        }
    }
}

pub fn record(outcome: Outcome) {
    SUBMISSIONS.with_label_values(&[outcome.as_str()]).inc();
}

/// Holds the active-sandbox gauge up for its lifetime, including when the
/// launch future is dropped mid-flight
pub struct ActiveSandbox(());

impl ActiveSandbox {
    pub fn enter() -> Self {
        ACTIVE_SANDBOXES.inc();
        ActiveSandbox(())
    }
}

impl Drop for ActiveSandbox {
    fn drop(&mut self) {
        ACTIVE_SANDBOXES.dec();
    }
}

/// Render the default registry in Prometheus text format
pub fn render() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder.encode(&prometheus::gather(), &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}
