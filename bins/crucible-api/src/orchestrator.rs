/// Submission Orchestrator
///
/// **Core Responsibility:**
/// Turn one API request into a sandboxed run and a report.
///
/// **Flow:**
/// 1. Validate code and function name, resolve test cases (directly or via
///    `question_id` from the problem store)
/// 2. Wait for a sandbox slot (bounded semaphore)
/// 3. Launch; the slot is held until the launch finishes or is dropped
/// 4. Interpret the outcome into `{output, passed_all}`
/// 5. Record the verdict when the submission targeted a stored problem
///
/// Every request increments exactly one `crucible_submissions_total` label.

use crucible_common::types::{is_identifier, ExecutionOutcome, SolveRecord, Submission, TestCase};
use crucible_sandbox::report::{self, Report};
use crucible_sandbox::Sandbox;
use serde::Deserialize;
use std::fmt;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::SubmissionError;
use crate::metrics::{self, ActiveSandbox, Outcome};
use crate::store::{ProblemStore, SolveLog};

/// Upper bound on submitted source size
pub const MAX_CODE_BYTES: usize = 1024 * 1024;

/// Problem identifiers arrive as strings or integers.
/// Numbers stay `serde_json::Number` so untagged matching survives
/// `arbitrary_precision` buffering.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum ProblemId {
    Text(String),
    Number(serde_json::Number),
}

impl fmt::Display for ProblemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProblemId::Text(id) => f.write_str(id),
            ProblemId::Number(id) => write!(f, "{}", id),
        }
    }
}

/// Body of `POST /execute`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExecuteRequest {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub function_name: Option<String>,
    #[serde(default)]
    pub test_cases: Option<Vec<TestCase>>,
    #[serde(default)]
    pub question_id: Option<ProblemId>,
}

/// A validated submission, plus the problem it targets if any
#[derive(Debug, Clone, PartialEq)]
pub struct Prepared {
    pub submission: Submission,
    pub problem_id: Option<String>,
}

pub struct Orchestrator {
    sandbox: Arc<dyn Sandbox>,
    problems: Arc<dyn ProblemStore>,
    solves: Arc<dyn SolveLog>,
    slots: Arc<Semaphore>,
}

impl Orchestrator {
    pub fn new(
        sandbox: Arc<dyn Sandbox>,
        problems: Arc<dyn ProblemStore>,
        solves: Arc<dyn SolveLog>,
        max_concurrent_sandboxes: usize,
    ) -> Self {
        Self {
            sandbox,
            problems,
            solves,
            slots: Arc::new(Semaphore::new(max_concurrent_sandboxes.max(1))),
        }
    }

    pub fn problems(&self) -> &Arc<dyn ProblemStore> {
        &self.problems
    }

    /// Slots not currently held by a launch
    pub fn available_slots(&self) -> usize {
        self.slots.available_permits()
    }

    /// Validate the request and resolve its test cases
    pub async fn prepare(&self, request: ExecuteRequest) -> Result<Prepared, SubmissionError> {
        let code = request.code.unwrap_or_default();
        if code.trim().is_empty() {
            return Err(SubmissionError::validation(
                "Missing code or question_id",
            ));
        }
        if code.len() > MAX_CODE_BYTES {
            return Err(SubmissionError::validation(format!(
                "Code exceeds {} bytes",
                MAX_CODE_BYTES
            )));
        }

        let (function_name, test_cases, problem_id) = match request.question_id {
            Some(id) => {
                let id = id.to_string();
                let problem = self
                    .problems
                    .get(&id)
                    .await?
                    .ok_or(SubmissionError::NotFound)?;
                (problem.function_name, problem.test_cases, Some(id))
            }
            None => match (request.function_name, request.test_cases) {
                (Some(name), Some(cases)) => (name, cases, None),
                (None, _) => {
                    return Err(SubmissionError::validation(
                        "Missing function_name or question_id",
                    ))
                }
                (_, None) => {
                    return Err(SubmissionError::validation(
                        "Missing test_cases or question_id",
                    ))
                }
            },
        };

        if !is_identifier(&function_name) {
            return Err(SubmissionError::validation(format!(
                "Invalid function name `{}`",
                function_name
            )));
        }

        Ok(Prepared {
            submission: Submission {
                code,
                function_name,
                test_cases,
            },
            problem_id,
        })
    }

    /// Run a prepared submission in a sandbox and interpret the outcome
    pub async fn run(&self, prepared: Prepared) -> Result<Report, SubmissionError> {
        let submission_id = Uuid::new_v4();

        let outcome = {
            let _permit = self
                .slots
                .acquire()
                .await
                .map_err(|_| SubmissionError::Internal("sandbox slots closed".to_string()))?;
            let _active = ActiveSandbox::enter();
            let timer = metrics::SANDBOX_DURATION.start_timer();

            let outcome = self.sandbox.launch(submission_id, &prepared.submission).await;
            timer.observe_duration();
            outcome?
        };

        let report = report::interpret(&outcome);
        let label = match &outcome {
            ExecutionOutcome::Error(_) => Outcome::LoadError,
            _ if report.passed_all => Outcome::Passed,
            _ => Outcome::Failed,
        };
        metrics::record(label);

        info!(
            submission_id = %submission_id,
            function = %prepared.submission.function_name,
            outcome = label.as_str(),
            "Submission evaluated"
        );

        if let Some(problem_id) = prepared.problem_id {
            let record = SolveRecord {
                submission_id,
                problem_id,
                passed_all: report.passed_all,
                recorded_at: chrono::Utc::now(),
            };
            if let Err(e) = self.solves.record(&record).await {
                warn!(submission_id = %submission_id, error = %e, "Failed to record solve");
            }
        }

        Ok(report)
    }

    /// Validate, run, and count the request under exactly one outcome label
    pub async fn execute(&self, request: ExecuteRequest) -> Result<Report, SubmissionError> {
        let result = match self.prepare(request).await {
            Ok(prepared) => self.run(prepared).await,
            Err(e) => Err(e),
        };
        if let Err(e) = &result {
            metrics::record(e.outcome());
        }
        result
    }
}
