use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info, info_span};
use uuid::Uuid;

use super::AppState;
use crate::types::{InputRecord, PredictionResponse};

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    version: &'static str,
    started_at: DateTime<Utc>,
    uptime_secs: i64,
    models: usize,
    cache_enabled: bool,
    cached_models: usize,
}

pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        started_at: state.started_at,
        uptime_secs: state.uptime_secs(),
        models: state.aggregator.registry().len(),
        cache_enabled: state.aggregator.is_cached(),
        cached_models: state.aggregator.cached_models(),
    })
}

/// Run the record through every registered model
pub async fn post_predict(
    State(state): State<AppState>,
    Json(input): Json<InputRecord>,
) -> impl IntoResponse {
    let request_id = Uuid::new_v4();
    let aggregator = Arc::clone(&state.aggregator);

    // Artifact loading and inference are blocking
    let task = tokio::task::spawn_blocking(move || {
        let span = info_span!("predict", %request_id);
        let _guard = span.enter();
        info!(job_title = %input.job_title, "Prediction requested");
        aggregator.predict_all(&input)
    });

    match task.await {
        Ok(previsoes) => Json(PredictionResponse { previsoes }).into_response(),
        Err(e) => {
            error!(%request_id, "Prediction task failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": "prediction task failed", "request_id": request_id})),
            )
                .into_response()
        }
    }
}

pub async fn get_models(State(state): State<AppState>) -> impl IntoResponse {
    let aggregator = Arc::clone(&state.aggregator);
    let described = tokio::task::spawn_blocking(move || {
        let registry = aggregator.registry();
        json!({
            "dir": registry.base_dir().display().to_string(),
            "cache_enabled": aggregator.is_cached(),
            "models": registry.describe(),
        })
    })
    .await;

    match described {
        Ok(body) => Json(body).into_response(),
        Err(e) => {
            error!("Model listing failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": "model listing failed"})),
            )
                .into_response()
        }
    }
}

/// Drop cached classifiers so the next request reads the artifacts again
pub async fn post_reload_models(State(state): State<AppState>) -> impl IntoResponse {
    let evicted = state.aggregator.clear_cache();
    info!(evicted, "Model cache cleared");
    Json(json!({
        "status": "ok",
        "cache_enabled": state.aggregator.is_cached(),
        "evicted": evicted,
    }))
}
