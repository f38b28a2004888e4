mod config;
mod interpreter;
mod runner;

use anyhow::{Context, Result};
use config::HarnessConfig;
use crucible_common::types::{ExecutionOutcome, Submission};
use interpreter::PythonRuntime;
use std::fs;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    // stdout belongs to nobody; all diagnostics go to the container log via stderr
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let config = HarnessConfig::from_env();
    info!(data_dir = %config.data_dir.display(), "Harness starting");

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| execute(&config))).unwrap_or_else(|_| {
        error!("Harness panicked while running submission");
        ExecutionOutcome::error("harness crashed while running submission")
    });

    match &outcome {
        ExecutionOutcome::Results(results) => {
            let passed = results.iter().filter(|r| r.is_pass()).count();
            info!(passed = passed, total = results.len(), "Submission finished");
        }
        ExecutionOutcome::Error(message) => info!(error = %message, "Submission errored"),
    }

    write_outcome(&config.output_path(), &outcome)?;
    Ok(())
}

/// Produce an outcome for whatever is in the data directory; never fails
fn execute(config: &HarnessConfig) -> ExecutionOutcome {
    let submission = match read_submission(&config.input_path()) {
        Ok(submission) => submission,
        Err(e) => {
            error!(error = %format!("{:#}", e), "Unusable input payload");
            return ExecutionOutcome::Error(format!("{:#}", e));
        }
    };

    info!(
        function = %submission.function_name,
        cases = submission.test_cases.len(),
        "Running submission"
    );

    let mut runtime = PythonRuntime::new(config.interpreter.clone());
    runner::run_submission(&mut runtime, &submission)
}

fn read_submission(path: &Path) -> Result<Submission> {
    let raw = fs::read(path).with_context(|| format!("Failed to read input payload {}", path.display()))?;
    serde_json::from_slice(&raw).context("Failed to parse input payload")
}

/// Write via a temp file and rename so the launcher never sees a partial payload
fn write_outcome(path: &Path, outcome: &ExecutionOutcome) -> Result<()> {
    let body = serde_json::to_vec(outcome).context("Failed to serialize outcome")?;
    let staging = path.with_extension("json.tmp");

    fs::write(&staging, body)
        .with_context(|| format!("Failed to write output payload {}", staging.display()))?;
    fs::rename(&staging, path)
        .with_context(|| format!("Failed to publish output payload {}", path.display()))?;
    Ok(())
}
