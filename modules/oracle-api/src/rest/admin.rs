use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use chrono::Utc;
use serde::Deserialize;
use tracing::{info, warn};

use super::error_response;
use crate::auth::AdminKey;
use crate::jobs;
use crate::AppState;

const DEFAULT_INGEST_DAYS: u32 = 7;
const MAX_INGEST_DAYS: u32 = 90;

#[derive(Deserialize)]
pub struct IngestQuery {
    days: Option<u32>,
}

/// Mock mode: reseed deterministic events, then rebuild features and
/// forecasts. Live mode keeps the stored events and only rebuilds.
pub async fn api_rebuild(
    _admin: AdminKey,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let run = async {
        let seeded = if state.config.is_mock() {
            let end = Utc::now().date_naive();
            Some(jobs::seed_mock(&state, state.config.feature_lookback_days, end).await?)
        } else {
            None
        };
        let refresh = jobs::refresh(&state).await?;
        anyhow::Ok((seeded, refresh))
    };

    match run.await {
        Ok((seeded, refresh)) => {
            info!(
                seeded = seeded.unwrap_or(0),
                feature_rows = refresh.features.rows,
                forecasts = refresh.forecasts.rows,
                "Admin rebuild complete"
            );
            let message = if seeded.is_some() {
                "Rebuilt with deterministic mock data"
            } else {
                "Rebuilt features and forecasts"
            };
            Json(serde_json::json!({
                "status": "ok",
                "message": message,
                "events_seeded": seeded,
                "refresh": refresh,
            }))
            .into_response()
        }
        Err(e) => {
            warn!(error = %e, "Admin rebuild failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, format!("Rebuild failed: {e}"))
        }
    }
}

pub async fn api_ingest(
    _admin: AdminKey,
    State(state): State<Arc<AppState>>,
    Query(params): Query<IngestQuery>,
) -> impl IntoResponse {
    let days = params.days.unwrap_or(DEFAULT_INGEST_DAYS);
    if days == 0 || days > MAX_INGEST_DAYS {
        return error_response(
            StatusCode::BAD_REQUEST,
            format!("days must be between 1 and {MAX_INGEST_DAYS}"),
        );
    }

    let run = async {
        let etl = jobs::run_etl(&state, days).await?;
        let refresh = jobs::refresh(&state).await?;
        anyhow::Ok((etl, refresh))
    };

    match run.await {
        Ok((etl, refresh)) => Json(serde_json::json!({
            "status": "ok",
            "days": days,
            "etl": etl,
            "refresh": refresh,
        }))
        .into_response(),
        Err(e) => {
            warn!(error = %e, "Admin ingest failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, format!("Ingest failed: {e}"))
        }
    }
}
