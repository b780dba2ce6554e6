pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::decision::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Decision API
        .route(
            "/api/v1/decisions/evaluate",
            post(handlers::handle_evaluate),
        )
        .route("/api/v1/decisions/outcome", post(handlers::handle_outcome))
        .route(
            "/api/v1/decisions/outcomes/batch",
            post(handlers::handle_batch),
        )
        .route(
            "/api/v1/decisions/insights",
            get(handlers::handle_insights),
        )
        .route(
            "/api/v1/decisions/state",
            get(handlers::handle_export_state).put(handlers::handle_import_state),
        )
        .route("/api/v1/decisions/reset", post(handlers::handle_reset))
        .route(
            "/api/v1/decisions/history",
            get(handlers::handle_history),
        )
        .route(
            "/api/v1/decisions/history/:id",
            get(handlers::handle_get_decision),
        )
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use axum::body::{to_bytes, Body};
    use axum::http::{Method, Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::config::Config;
    use crate::decision::config::EngineConfig;
    use crate::decision::engine::DecisionEngine;
    use crate::decision::persistence::{MemorySnapshotStore, SnapshotStore};
    use crate::decision::rng::seeded;
    use crate::decision::worker::EngineWorkers;

    fn test_state() -> (AppState, EngineWorkers) {
        let engine_config = EngineConfig {
            bootstrap_corpus_size: 50,
            ..EngineConfig::default().deterministic()
        };
        let engine = Arc::new(DecisionEngine::init(engine_config, seeded(42)).unwrap());
        let snapshots: Arc<dyn SnapshotStore> = Arc::new(MemorySnapshotStore::new());
        let (workers, training) = EngineWorkers::spawn(
            Arc::clone(&engine),
            Arc::clone(&snapshots),
            16,
            Duration::from_secs(3600),
        );
        let config = Config::from_lookup(|_| None).unwrap();
        (
            AppState {
                engine,
                training,
                snapshots,
                config,
            },
            workers,
        )
    }

    async fn send(app: Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(json) => {
                builder = builder.header("content-type", "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };
        let response = app.oneshot(builder.body(body).unwrap()).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    fn strong_candidate() -> Value {
        json!({
            "candidateId": "c-42",
            "technical": 90,
            "experience": 10,
            "education": 9,
            "communication": 85,
            "leadership": 70,
            "cultureFit": 85
        })
    }

    #[tokio::test]
    async fn test_health() {
        let (state, workers) = test_state();
        let (status, body) = send(build_router(state), Method::GET, "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["service"], "candidate-api");
        assert_eq!(body["tenant"], "default");
        assert_eq!(body["snapshotBackend"], "memory");
        workers.shutdown_and_join().await;
    }

    #[tokio::test]
    async fn test_evaluate_then_train_by_candidate() {
        let (state, workers) = test_state();
        let app = build_router(state);

        let (status, decision) = send(
            app.clone(),
            Method::POST,
            "/api/v1/decisions/evaluate",
            Some(strong_candidate()),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(decision["action"], "hire");
        assert_eq!(decision["candidateId"], "c-42");

        let (status, feedback) = send(
            app.clone(),
            Method::POST,
            "/api/v1/decisions/outcome",
            Some(json!({
                "target": { "candidateId": "c-42" },
                "accepted": true,
                "rating": 5
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(feedback["status"], "trained");

        let (status, insights) =
            send(app, Method::GET, "/api/v1/decisions/insights", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(insights["totalDecisions"], 1);
        assert_eq!(insights["totalTrainingCount"], 51);
        workers.shutdown_and_join().await;
    }

    #[tokio::test]
    async fn test_get_decision_by_id() {
        let (state, workers) = test_state();
        let app = build_router(state);
        let (_, decision) = send(
            app.clone(),
            Method::POST,
            "/api/v1/decisions/evaluate",
            Some(strong_candidate()),
        )
        .await;
        let id = decision["id"].as_str().unwrap().to_string();

        let (status, found) = send(
            app.clone(),
            Method::GET,
            &format!("/api/v1/decisions/history/{id}"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(found["id"], decision["id"]);

        let (status, body) = send(
            app,
            Method::GET,
            &format!("/api/v1/decisions/history/{}", uuid::Uuid::new_v4()),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"], "NOT_FOUND");
        workers.shutdown_and_join().await;
    }

    #[tokio::test]
    async fn test_outcome_rejects_bad_rating() {
        let (state, workers) = test_state();
        let (status, body) = send(
            build_router(state),
            Method::POST,
            "/api/v1/decisions/outcome",
            Some(json!({
                "target": { "candidateId": "c-42" },
                "accepted": true,
                "rating": 9
            })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
        workers.shutdown_and_join().await;
    }

    #[tokio::test]
    async fn test_unknown_target_is_ignored() {
        let (state, workers) = test_state();
        let (status, body) = send(
            build_router(state),
            Method::POST,
            "/api/v1/decisions/outcome",
            Some(json!({
                "target": { "candidateId": "nobody" },
                "accepted": false
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ignored");
        workers.shutdown_and_join().await;
    }

    #[tokio::test]
    async fn test_batch_reports_counts() {
        let (state, workers) = test_state();
        let app = build_router(state);
        send(
            app.clone(),
            Method::POST,
            "/api/v1/decisions/evaluate",
            Some(strong_candidate()),
        )
        .await;

        let (status, summary) = send(
            app,
            Method::POST,
            "/api/v1/decisions/outcomes/batch",
            Some(json!({
                "outcomes": [
                    { "target": { "candidateId": "c-42" }, "accepted": true, "rating": 4 },
                    { "target": { "candidateId": "ghost" }, "accepted": true }
                ],
                "learningRateBoost": 2.0
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(summary["trained"], 1);
        assert_eq!(summary["skipped"], 1);
        assert_eq!(summary["cancelled"], false);
        workers.shutdown_and_join().await;
    }

    #[tokio::test]
    async fn test_batch_rejects_non_positive_boost() {
        let (state, workers) = test_state();
        let (status, _) = send(
            build_router(state),
            Method::POST,
            "/api/v1/decisions/outcomes/batch",
            Some(json!({ "outcomes": [], "learningRateBoost": 0 })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        workers.shutdown_and_join().await;
    }

    #[tokio::test]
    async fn test_state_round_trip_and_version_check() {
        let (state, workers) = test_state();
        let app = build_router(state);

        let (status, mut snapshot) =
            send(app.clone(), Method::GET, "/api/v1/decisions/state", None).await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = send(
            app.clone(),
            Method::PUT,
            "/api/v1/decisions/state",
            Some(snapshot.clone()),
        )
        .await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        snapshot["formatVersion"] = json!(99);
        let (status, body) = send(app, Method::PUT, "/api/v1/decisions/state", Some(snapshot)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
        workers.shutdown_and_join().await;
    }

    #[tokio::test]
    async fn test_reset_and_history() {
        let (state, workers) = test_state();
        let snapshots = Arc::clone(&state.snapshots);
        let app = build_router(state);
        for _ in 0..3 {
            send(
                app.clone(),
                Method::POST,
                "/api/v1/decisions/evaluate",
                Some(strong_candidate()),
            )
            .await;
        }

        let (_, history) =
            send(app.clone(), Method::GET, "/api/v1/decisions/history?limit=2", None).await;
        assert_eq!(history.as_array().map(Vec::len), Some(2));

        let (status, reset) = send(app.clone(), Method::POST, "/api/v1/decisions/reset", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(reset["bootstrapSamples"], 50);
        assert_eq!(reset["insights"]["totalDecisions"], 0);
        assert!(snapshots.load().await.unwrap().is_some());

        let (_, history) = send(app, Method::GET, "/api/v1/decisions/history", None).await;
        assert_eq!(history.as_array().map(Vec::len), Some(0));
        workers.shutdown_and_join().await;
    }
}
