use crate::value::Value;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// One user code + test-case execution request.
/// Also the exact shape of the sandbox input payload (`input.json`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Submission {
    pub code: String,
    pub function_name: String,
    pub test_cases: Vec<TestCase>,
}

/// A callable name the harness can bind: a letter or underscore, then
/// letters, digits and underscores
pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || c == '_')
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestCase {
    /// Positional arguments for the target function
    pub input: Vec<Value>,
    pub expected: Value,
}

/// Outcome of a single test case, in input order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum CaseResult {
    Pass,
    Fail {
        input: Vec<Value>,
        expected: Value,
        got: Value,
    },
    Error {
        message: String,
    },
}

impl CaseResult {
    pub fn is_pass(&self) -> bool {
        matches!(self, CaseResult::Pass)
    }
}

/// Complete result of one submission.
/// Also the exact shape of the sandbox output payload (`output.json`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "OutcomePayload", into = "OutcomePayload")]
pub enum ExecutionOutcome {
    Results(Vec<CaseResult>),
    /// Whole-submission failure: code did not load, function missing,
    /// or the harness could not read its input
    Error(String),
}

impl ExecutionOutcome {
    pub fn error(message: impl Into<String>) -> Self {
        ExecutionOutcome::Error(message.into())
    }

    /// True iff per-case results exist and every one passed
    pub fn passed_all(&self) -> bool {
        match self {
            ExecutionOutcome::Results(results) => results.iter().all(CaseResult::is_pass),
            ExecutionOutcome::Error(_) => false,
        }
    }
}

/// Wire form of [`ExecutionOutcome`]: exactly one of the two fields is set
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutcomePayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub results: Option<Vec<CaseResult>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct PayloadShapeError(&'static str);

impl TryFrom<OutcomePayload> for ExecutionOutcome {
    type Error = PayloadShapeError;

    fn try_from(payload: OutcomePayload) -> Result<Self, PayloadShapeError> {
        match (payload.results, payload.error) {
            (Some(results), None) => Ok(ExecutionOutcome::Results(results)),
            (None, Some(error)) => Ok(ExecutionOutcome::Error(error)),
            (Some(_), Some(_)) => Err(PayloadShapeError(
                "outcome payload carries both `results` and `error`",
            )),
            (None, None) => Err(PayloadShapeError(
                "outcome payload carries neither `results` nor `error`",
            )),
        }
    }
}

impl From<ExecutionOutcome> for OutcomePayload {
    fn from(outcome: ExecutionOutcome) -> Self {
        match outcome {
            ExecutionOutcome::Results(results) => OutcomePayload {
                results: Some(results),
                error: None,
            },
            ExecutionOutcome::Error(error) => OutcomePayload {
                results: None,
                error: Some(error),
            },
        }
    }
}

/// A problem as held by the storage collaborator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Problem {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub function_name: String,
    pub test_cases: Vec<TestCase>,
}

/// Problem listing entry (test cases stay server-side)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProblemSummary {
    pub id: String,
    pub title: String,
    pub description: String,
    pub function_name: String,
}

impl From<&Problem> for ProblemSummary {
    fn from(problem: &Problem) -> Self {
        Self {
            id: problem.id.clone(),
            title: problem.title.clone(),
            description: problem.description.clone(),
            function_name: problem.function_name.clone(),
        }
    }
}

/// Verdict handed to the solve log after a problem-backed submission
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolveRecord {
    pub submission_id: Uuid,
    pub problem_id: String,
    pub passed_all: bool,
    pub recorded_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_case_result_wire_shape() {
        let results = vec![
            CaseResult::Pass,
            CaseResult::Fail {
                input: vec![Value::from(2i64)],
                expected: Value::from(4i64),
                got: Value::from(5i64),
            },
            CaseResult::Error {
                message: "division by zero".to_string(),
            },
        ];
        let wire = serde_json::to_value(ExecutionOutcome::Results(results)).unwrap();
        assert_eq!(
            wire,
            json!({"results": [
                {"status": "pass"},
                {"status": "fail", "input": [2], "expected": 4, "got": 5},
                {"status": "error", "message": "division by zero"}
            ]})
        );
    }

    #[test]
    fn test_error_outcome_wire_shape() {
        let wire = serde_json::to_string(&ExecutionOutcome::error("boom")).unwrap();
        assert_eq!(wire, r#"{"error":"boom"}"#);
    }

    #[test]
    fn test_outcome_requires_exactly_one_field() {
        let both = serde_json::from_str::<ExecutionOutcome>(r#"{"results": [], "error": "x"}"#);
        assert!(both.unwrap_err().to_string().contains("both `results` and `error`"));
        let neither = serde_json::from_str::<ExecutionOutcome>("{}");
        assert!(neither.unwrap_err().to_string().contains("neither `results` nor `error`"));
        let ok: ExecutionOutcome = serde_json::from_str(r#"{"results": []}"#).unwrap();
        assert_eq!(ok, ExecutionOutcome::Results(vec![]));
    }

    #[test]
    fn test_identifier_rules() {
        assert!(is_identifier("two_sum"));
        assert!(is_identifier("_helper2"));
        assert!(is_identifier("café"));
        assert!(!is_identifier(""));
        assert!(!is_identifier("2sum"));
        assert!(!is_identifier("two-sum"));
        assert!(!is_identifier("os.system"));
        assert!(!is_identifier("not valid"));
    }

    #[test]
    fn test_passed_all() {
        assert!(ExecutionOutcome::Results(vec![CaseResult::Pass, CaseResult::Pass]).passed_all());
        assert!(!ExecutionOutcome::Results(vec![
            CaseResult::Pass,
            CaseResult::Error { message: "e".into() },
        ])
        .passed_all());
        assert!(!ExecutionOutcome::error("Function `f` not defined.").passed_all());
    }

    #[test]
    fn test_submission_payload_shape() {
        let raw = r#"{"code":"def f(a):\n    return a","function_name":"f",
            "test_cases":[{"input":[1],"expected":1},{"input":[[1,2]],"expected":[1,2]}]}"#;
        let submission: Submission = serde_json::from_str(raw).unwrap();
        assert_eq!(submission.function_name, "f");
        assert_eq!(submission.test_cases.len(), 2);
        assert_eq!(submission.test_cases[1].input, vec![Value::List(vec![Value::from(1i64), Value::from(2i64)])]);
    }

    #[test]
    fn test_non_list_input_is_rejected() {
        let raw = r#"{"code":"","function_name":"f","test_cases":[{"input":3,"expected":3}]}"#;
        assert!(serde_json::from_str::<Submission>(raw).is_err());
    }
}
