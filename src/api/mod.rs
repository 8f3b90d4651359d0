//! HTTP API
//!
//! Thin axum layer over the engine: classification and full-pipeline
//! endpoints plus health and Prometheus metrics. All per-query error
//! conditions are absorbed by the engine, so the only handler errors here
//! are request validation.

use crate::engine::{InsightEngine, InsightResponse};
use crate::intent::models::{ClassifiedQuery, EntityMap};
use crate::metrics::METRICS;
use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<InsightEngine>,
}

/// API error body
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub code: String,
    pub message: String,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

/// Query request
#[derive(Debug, Serialize, Deserialize)]
pub struct QueryRequest {
    pub query: String,
    /// Entity overrides carried from a prior turn; extraction augments them
    #[serde(default)]
    pub entities: Option<EntityMap>,
}

/// Build the API router
pub fn router(state: AppState, max_body_bytes: usize) -> Router {
    Router::new()
        .route("/api/v1/insights/query", post(insight_query))
        .route("/api/v1/insights/classify", post(classify_query))
        .route("/healthz", get(health))
        .route("/metrics", get(metrics_export))
        .layer(TraceLayer::new_for_http())
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .with_state(state)
}

/// Run the full pipeline for a query
///
/// POST /api/v1/insights/query
async fn insight_query(
    State(state): State<AppState>,
    Json(request): Json<QueryRequest>,
) -> Result<Json<InsightResponse>, (StatusCode, Json<ApiError>)> {
    validate(&request)?;
    let start = Instant::now();

    info!(query = %request.query, "Insight query");
    let response = state
        .engine
        .handle_query(&request.query, request.entities.as_ref())
        .await;

    METRICS
        .request_duration
        .with_label_values(&["query"])
        .observe(start.elapsed().as_secs_f64());

    Ok(Json(response))
}

/// Classify only, without context assembly
///
/// POST /api/v1/insights/classify
async fn classify_query(
    State(state): State<AppState>,
    Json(request): Json<QueryRequest>,
) -> Result<Json<ClassifiedQuery>, (StatusCode, Json<ApiError>)> {
    validate(&request)?;
    let start = Instant::now();

    let classified = match &request.entities {
        Some(seed) => state.engine.classify_with_seed(&request.query, seed),
        None => state.engine.classify(&request.query).await,
    };

    METRICS
        .request_duration
        .with_label_values(&["classify"])
        .observe(start.elapsed().as_secs_f64());

    Ok(Json(classified))
}

async fn health() -> &'static str {
    "ok"
}

async fn metrics_export() -> String {
    METRICS.export()
}

fn validate(request: &QueryRequest) -> Result<(), (StatusCode, Json<ApiError>)> {
    if request.query.trim().is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ApiError::new("VALIDATION_ERROR", "Query cannot be empty")),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalogs;
    use crate::domain::DomainKnowledge;
    use crate::providers::lexical::LexicalSimilarity;
    use crate::repo::{seed_repository, MemoryRepository};
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    fn state() -> AppState {
        let catalogs = Arc::new(Catalogs::builtin().unwrap());
        let repo = Arc::new(MemoryRepository::new());
        seed_repository(&repo, 25, 3, chrono::Utc::now());
        let similarity = Arc::new(LexicalSimilarity::new(
            repo.clone(),
            DomainKnowledge::new().all_notes(),
        ));
        AppState {
            engine: Arc::new(InsightEngine::new(catalogs, repo, similarity, None).unwrap()),
        }
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let app = router(state(), 65536);
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/healthz")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_classify_endpoint() {
        let app = router(state(), 65536);
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v1/insights/classify")
                    .header("content-type", "application/json")
                    .body(Body::from(
                        r#"{"query": "How do BOGO offers perform?"}"#,
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let classified: ClassifiedQuery = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(classified.intent_id, "category_analysis");
    }

    #[tokio::test]
    async fn test_empty_query_is_rejected() {
        let app = router(state(), 65536);
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v1/insights/query")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"query": "   "}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
