use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use crate::handlers;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/execute", post(handlers::execute))
        .route("/problems", get(handlers::list_problems))
        .route("/status", get(handlers::health_check))
        .route("/metrics", get(handlers::export_metrics))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::tests::{sample_problem, FakeSandbox};
    use crate::orchestrator::Orchestrator;
    use crate::store::MemoryStore;
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
    };
    use crucible_common::types::{CaseResult, ExecutionOutcome};
    use crucible_common::value::Value;
    use crucible_sandbox::SandboxError;
    use serde_json::json;
    use std::time::Duration;
    use tower::ServiceExt; // for `oneshot`

    fn app(sandbox: FakeSandbox) -> Router {
        let store = Arc::new(MemoryStore::from_problems(vec![sample_problem()]).unwrap());
        let state = Arc::new(AppState {
            orchestrator: Orchestrator::new(Arc::new(sandbox), store.clone(), store, 2),
        });
        routes().with_state(state)
    }

    async fn post_json(app: Router, body: serde_json::Value) -> (StatusCode, serde_json::Value) {
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/execute")
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), 1024 * 1024).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_execute_direct_submission() {
        let sandbox = FakeSandbox::new(|_| {
            Ok(ExecutionOutcome::Results(vec![
                CaseResult::Pass,
                CaseResult::Fail {
                    input: vec![Value::from(4i64)],
                    expected: Value::from(8i64),
                    got: Value::from(9i64),
                },
            ]))
        });

        let (status, body) = post_json(
            app(sandbox),
            json!({
                "code": "def double(n):\n    return n * 2 + (n == 4)\n",
                "function_name": "double",
                "test_cases": [
                    {"input": [1], "expected": 2},
                    {"input": [4], "expected": 8}
                ]
            }),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body["output"],
            "Test case 1: Passed\n\nTest case 2: Failed\n  Input: [4]\n  Expected: 8\n  Got: 9"
        );
        assert_eq!(body["passed_all"], false);
    }

    #[tokio::test]
    async fn test_execute_by_question_id() {
        let (status, body) = post_json(
            app(FakeSandbox::passing()),
            json!({"code": "def double(n):\n    return n * 2\n", "question_id": 1}),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["passed_all"], true);
    }

    #[tokio::test]
    async fn test_execute_missing_fields() {
        let (status, body) = post_json(app(FakeSandbox::passing()), json!({"question_id": "1"})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Missing code or question_id");
    }

    #[tokio::test]
    async fn test_execute_malformed_body() {
        let response = app(FakeSandbox::passing())
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/execute")
                    .header("content-type", "application/json")
                    .body(Body::from("{\"code\": 12"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_execute_unknown_problem() {
        let (status, body) = post_json(
            app(FakeSandbox::passing()),
            json!({"code": "x = 1", "question_id": "404"}),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Problem not found");
    }

    #[tokio::test]
    async fn test_execute_timeout() {
        let sandbox = FakeSandbox::new(|_| Err(SandboxError::TimedOut(Duration::from_secs(10))));
        let (status, body) = post_json(
            app(sandbox),
            json!({"code": "x = 1", "question_id": 1}),
        )
        .await;
        assert_eq!(status, StatusCode::REQUEST_TIMEOUT);
        assert_eq!(body["error"], "Code execution timed out");
    }

    #[tokio::test]
    async fn test_execute_infrastructure_failure() {
        let sandbox = FakeSandbox::new(|_| Err(SandboxError::Unavailable("no daemon".to_string())));
        let (status, body) = post_json(
            app(sandbox),
            json!({"code": "x = 1", "question_id": 1}),
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body["error"].as_str().unwrap().contains("no daemon"));
    }

    #[tokio::test]
    async fn test_list_problems_hides_test_cases() {
        let response = app(FakeSandbox::passing())
            .oneshot(Request::builder().uri("/problems").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = to_bytes(response.into_body(), 1024 * 1024).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(
            body,
            json!([{
                "id": "1",
                "title": "Double",
                "description": "Return twice the input",
                "function_name": "double"
            }])
        );
    }

    #[tokio::test]
    async fn test_status_and_metrics() {
        let status = app(FakeSandbox::passing())
            .oneshot(Request::builder().uri("/status").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(status.status(), StatusCode::OK);

        let metrics = app(FakeSandbox::passing())
            .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(metrics.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_execute_rejects_get() {
        let response = app(FakeSandbox::passing())
            .oneshot(Request::builder().uri("/execute").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }
}
