// HTTP route handlers for the Crucible API

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json},
};
use crucible_common::types::ProblemSummary;
use crucible_sandbox::report::Report;
use std::sync::Arc;
use tracing::error;

use crate::error::SubmissionError;
use crate::metrics;
use crate::orchestrator::ExecuteRequest;
use crate::AppState;

/// POST /execute - Run a submission and return its report
pub async fn execute(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ExecuteRequest>, JsonRejection>,
) -> Result<Json<Report>, SubmissionError> {
    let Json(request) = match payload {
        Ok(payload) => payload,
        Err(rejection) => {
            let err = SubmissionError::validation(rejection.body_text());
            metrics::record(err.outcome());
            return Err(err);
        }
    };

    let report = state.orchestrator.execute(request).await?;
    Ok(Json(report))
}

/// GET /problems - List stored problems without their test cases
pub async fn list_problems(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<ProblemSummary>>, SubmissionError> {
    let problems = state.orchestrator.problems().list().await?;
    Ok(Json(problems))
}

/// GET /status - Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// GET /metrics - Prometheus text exposition
pub async fn export_metrics() -> impl IntoResponse {
    match metrics::render() {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "Failed to render metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}
