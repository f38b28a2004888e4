/// Result Interpreter - Outcome to Report
///
/// **Core Responsibility:**
/// Turn an `ExecutionOutcome` into a deterministic, line-based report and an
/// aggregate verdict.
///
/// **Critical Properties:**
/// - Knows nothing about Docker
/// - Knows nothing about workspaces or storage
/// - Pure function: outcome → (report text, passed_all)
///
/// **Report Format:**
/// - `Test case {i}: Passed`
/// - `Test case {i}: Failed` + indented Input / Expected / Got lines
/// - `Test case {i}: Error` + indented Message line
/// - Blocks joined by one blank line, in case order, 1-based
/// - Whole-submission failure: `Execution error: {message}`

use crucible_common::types::{CaseResult, ExecutionOutcome};
use crucible_common::value::display_list;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Report {
    pub output: String,
    pub passed_all: bool,
}

/// Format the block for one case (index is 1-based)
pub fn format_case(index: usize, result: &CaseResult) -> String {
    match result {
        CaseResult::Pass => format!("Test case {}: Passed", index),
        CaseResult::Fail {
            input,
            expected,
            got,
        } => format!(
            "Test case {}: Failed\n  Input: {}\n  Expected: {}\n  Got: {}",
            index,
            display_list(input),
            expected,
            got
        ),
        CaseResult::Error { message } => {
            format!("Test case {}: Error\n  Message: {}", index, message)
        }
    }
}

/// Interpret an outcome into its report text and verdict
pub fn interpret(outcome: &ExecutionOutcome) -> Report {
    let output = match outcome {
        ExecutionOutcome::Results(results) => results
            .iter()
            .enumerate()
            .map(|(idx, result)| format_case(idx + 1, result))
            .collect::<Vec<_>>()
            .join("\n\n"),
        ExecutionOutcome::Error(message) => format!("Execution error: {}", message),
    };

    Report {
        output,
        passed_all: outcome.passed_all(),
    }
}
