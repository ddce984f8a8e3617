use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
};
use chrono::Utc;
use tracing::warn;

use crate::AppState;

pub async fn root(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "service": "The Oracle",
        "version": env!("CARGO_PKG_VERSION"),
        "mode": state.config.mode.as_str(),
        "status": "ok",
    }))
}

pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let check = async {
        state.store.ping().await?;
        state.store.stats().await
    };

    match check.await {
        Ok(stats) => Json(serde_json::json!({
            "status": "healthy",
            "timestamp": Utc::now(),
            "database": "connected",
            "store": state.store_kind,
            "mode": state.config.mode.as_str(),
            "statistics": {
                "total_events": stats.events,
                "total_topics": stats.topics,
                "total_forecasts": stats.forecasts,
            },
        }))
        .into_response(),
        Err(e) => {
            warn!(error = %e, "Health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(serde_json::json!({
                    "status": "unhealthy",
                    "timestamp": Utc::now(),
                    "database": "disconnected",
                    "store": state.store_kind,
                    "error": e.to_string(),
                })),
            )
                .into_response()
        }
    }
}

/// 200 once topics and events exist, 503 with a reason otherwise.
pub async fn ready(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let not_ready = |reason: &str| {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({
                "status": "not_ready",
                "reason": reason,
                "timestamp": Utc::now(),
            })),
        )
            .into_response()
    };

    match state.store.stats().await {
        Ok(stats) if stats.topics == 0 => not_ready("no_topics_configured"),
        Ok(stats) if stats.events == 0 => not_ready("no_events_available"),
        Ok(stats) => Json(serde_json::json!({
            "status": "ready",
            "timestamp": Utc::now(),
            "topics_count": stats.topics,
            "events_count": stats.events,
        }))
        .into_response(),
        Err(e) => {
            warn!(error = %e, "Readiness check failed");
            not_ready("store_unavailable")
        }
    }
}
