/// Test case orchestration inside the sandbox
///
/// Loads the submission into a runtime once, then calls the target function
/// for every case behind its own failure boundary. Load failures end the
/// submission; case failures never do.

use crucible_common::types::{CaseResult, ExecutionOutcome, Submission, TestCase};
use crucible_common::value::Value;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Why the code could not be bound
#[derive(Debug, Clone, PartialEq)]
pub enum LoadFailure {
    /// Loading the code raised (syntax error, import-time exception)
    Raised(String),
    MissingFunction,
    /// The runtime itself failed (could not start, died, broke protocol)
    Fault(String),
}

/// Result of one call that reached the function
#[derive(Debug, Clone, PartialEq)]
pub enum Invocation {
    Returned(Value),
    Raised(String),
    /// Returned something with no `Value` form; carries its textual representation
    Unrepresentable(String),
}

/// The runtime was lost mid-call; it must be loaded again before the next call
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{0}")]
pub struct RuntimeFault(pub String);

/// A fresh evaluation namespace for one submission
pub trait Runtime {
    /// (Re)load the code into a brand-new namespace and bind `function_name`
    fn load(&mut self, code: &str, function_name: &str) -> Result<(), LoadFailure>;

    /// Call the bound function with positional arguments
    fn call(&mut self, args: &[Value]) -> Result<Invocation, RuntimeFault>;
}

pub fn missing_function_message(function_name: &str) -> String {
    format!("Function `{}` not defined.", function_name)
}

fn load_failure_message(failure: LoadFailure, function_name: &str) -> String {
    match failure {
        LoadFailure::Raised(message) | LoadFailure::Fault(message) => message,
        LoadFailure::MissingFunction => missing_function_message(function_name),
    }
}

fn judge(case: &TestCase, got: Value) -> CaseResult {
    if got == case.expected {
        CaseResult::Pass
    } else {
        CaseResult::Fail {
            input: case.input.clone(),
            expected: case.expected.clone(),
            got,
        }
    }
}

/// Run every test case in order and produce the outcome
pub fn run_submission<R: Runtime>(runtime: &mut R, submission: &Submission) -> ExecutionOutcome {
    let function_name = submission.function_name.as_str();

    if let Err(failure) = runtime.load(&submission.code, function_name) {
        let message = load_failure_message(failure, function_name);
        info!(error = %message, "Submission failed to load");
        return ExecutionOutcome::Error(message);
    }

    let mut results = Vec::with_capacity(submission.test_cases.len());
    // Set once the runtime cannot be brought back; remaining cases get this error
    let mut unrecoverable: Option<String> = None;

    for (idx, case) in submission.test_cases.iter().enumerate() {
        if let Some(message) = &unrecoverable {
            results.push(CaseResult::Error {
                message: message.clone(),
            });
            continue;
        }

        let result = match runtime.call(&case.input) {
            Ok(Invocation::Returned(got)) => judge(case, got),
            Ok(Invocation::Raised(message)) => CaseResult::Error { message },
            Ok(Invocation::Unrepresentable(text)) => CaseResult::Fail {
                input: case.input.clone(),
                expected: case.expected.clone(),
                got: Value::String(text),
            },
            Err(fault) => {
                warn!(case = idx + 1, error = %fault, "Runtime lost during case, reloading");
                if let Err(failure) = runtime.load(&submission.code, function_name) {
                    let reason = load_failure_message(failure, function_name);
                    unrecoverable = Some(format!("runtime could not be restarted: {}", reason));
                }
                CaseResult::Error {
                    message: fault.to_string(),
                }
            }
        };

        debug!(case = idx + 1, passed = result.is_pass(), "Case finished");
        results.push(result);
    }

    ExecutionOutcome::Results(results)
}
