// Request-level failures and their HTTP mapping

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use crucible_sandbox::SandboxError;
use thiserror::Error;
use tracing::error;

use crate::metrics::Outcome;
use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum SubmissionError {
    /// Missing or malformed request fields
    #[error("{0}")]
    Validation(String),

    #[error("Problem not found")]
    NotFound,

    #[error("Code execution timed out")]
    TimedOut,

    /// Sandbox or storage infrastructure failed; never the submitter's fault
    #[error("{0}")]
    Internal(String),
}

impl SubmissionError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::TimedOut => StatusCode::REQUEST_TIMEOUT,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn outcome(&self) -> Outcome {
        match self {
            Self::Validation(_) | Self::NotFound => Outcome::Validation,
            Self::TimedOut => Outcome::Timeout,
            Self::Internal(_) => Outcome::Infrastructure,
        }
    }
}

impl From<SandboxError> for SubmissionError {
    fn from(err: SandboxError) -> Self {
        match err {
            SandboxError::TimedOut(_) => Self::TimedOut,
            other => {
                error!(kind = other.kind(), error = %other, "Sandbox infrastructure failure");
                Self::Internal(format!("Sandbox failure: {}", other))
            }
        }
    }
}

impl From<StoreError> for SubmissionError {
    fn from(err: StoreError) -> Self {
        error!(error = %err, "Problem store failure");
        Self::Internal(format!("Problem store failure: {}", err))
    }
}

impl IntoResponse for SubmissionError {
    fn into_response(self) -> Response {
        (
            self.status(),
            Json(serde_json::json!({ "error": self.to_string() })),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_status_mapping() {
        assert_eq!(SubmissionError::validation("x").status(), StatusCode::BAD_REQUEST);
        assert_eq!(SubmissionError::NotFound.status(), StatusCode::NOT_FOUND);
        assert_eq!(SubmissionError::TimedOut.status(), StatusCode::REQUEST_TIMEOUT);
        assert_eq!(
            SubmissionError::Internal("x".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_fixed_messages() {
        assert_eq!(SubmissionError::NotFound.to_string(), "Problem not found");
        assert_eq!(SubmissionError::TimedOut.to_string(), "Code execution timed out");
    }

    #[test]
    fn test_sandbox_error_conversion() {
        let timed_out: SubmissionError = SandboxError::TimedOut(Duration::from_secs(10)).into();
        assert!(matches!(timed_out, SubmissionError::TimedOut));

        let missing: SubmissionError = SandboxError::NoResult("output payload missing".into()).into();
        match missing {
            SubmissionError::Internal(msg) => assert!(msg.contains("output payload missing")),
            other => panic!("expected internal error, got {:?}", other),
        }

        let unavailable: SubmissionError = SandboxError::Unavailable("no daemon".into()).into();
        assert_eq!(unavailable.outcome(), Outcome::Infrastructure);
    }
}
