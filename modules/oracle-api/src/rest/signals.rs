use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::Deserialize;
use tracing::warn;

use oracle_common::{SignalFilter, Source};

use super::error_response;
use crate::analysis;
use crate::AppState;

pub const DEFAULT_LIMIT: u32 = 100;
pub const MAX_LIMIT: u32 = 1000;

#[derive(Deserialize)]
pub struct SignalsQuery {
    topic_id: Option<String>,
    source: Option<String>,
    start: Option<String>,
    end: Option<String>,
    min_magnitude: Option<f64>,
    limit: Option<u32>,
    offset: Option<u32>,
}

/// RFC 3339 timestamp or bare date. A bare date means the start of that day
/// for `start` and its last second for `end`.
fn parse_bound(value: &str, end_of_day: bool) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Some(ts.with_timezone(&Utc));
    }
    let date = NaiveDate::parse_from_str(value, "%Y-%m-%d").ok()?;
    let time = if end_of_day {
        NaiveTime::from_hms_opt(23, 59, 59)?
    } else {
        NaiveTime::MIN
    };
    Some(date.and_time(time).and_utc())
}

fn build_filter(params: SignalsQuery) -> Result<SignalFilter, String> {
    let source = params
        .source
        .as_deref()
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<Source>().map_err(|e| e.to_string()))
        .transpose()?;
    let start = match params.start.as_deref() {
        Some(s) => Some(parse_bound(s, false).ok_or_else(|| format!("invalid start: {s}"))?),
        None => None,
    };
    let end = match params.end.as_deref() {
        Some(s) => Some(parse_bound(s, true).ok_or_else(|| format!("invalid end: {s}"))?),
        None => None,
    };
    if params.min_magnitude.is_some_and(|m| !m.is_finite()) {
        return Err("min_magnitude must be a finite number".into());
    }

    Ok(SignalFilter {
        topic_id: params.topic_id.filter(|t| !t.is_empty()),
        source,
        start,
        end,
        min_magnitude: params.min_magnitude,
        limit: params.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT),
        offset: params.offset.unwrap_or(0),
    })
}

pub async fn api_signals(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SignalsQuery>,
) -> impl IntoResponse {
    let filter = match build_filter(params) {
        Ok(f) => f,
        Err(message) => return error_response(StatusCode::BAD_REQUEST, message),
    };

    match state.store.list_events(&filter).await {
        Ok(page) => {
            let has_more = (filter.offset as u64 + page.events.len() as u64) < page.total;
            Json(serde_json::json!({
                "events": page.events,
                "total": page.total,
                "limit": filter.limit,
                "offset": filter.offset,
                "has_more": has_more,
            }))
            .into_response()
        }
        Err(e) => {
            warn!(error = %e, "Failed to load signals");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

pub async fn api_signal_detail(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match state.store.get_event(&id).await {
        Ok(Some(event)) => Json(serde_json::json!(event)).into_response(),
        Ok(None) => error_response(StatusCode::NOT_FOUND, "Signal not found"),
        Err(e) => {
            warn!(error = %e, signal_id = id.as_str(), "Failed to load signal");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

pub async fn api_stats(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let stats = async {
        let stats = state.store.stats().await?;
        let as_of = analysis::as_of(state.store.as_ref()).await?;
        anyhow::Ok((stats, as_of))
    };

    match stats.await {
        Ok((stats, as_of)) => Json(serde_json::json!({
            "total_topics": stats.topics,
            "total_events": stats.events,
            "mapped_events": stats.mapped_events,
            "total_features": stats.feature_rows,
            "total_forecasts": stats.forecasts,
            "events_by_source": stats.events_by_source,
            "earliest_event": stats.earliest_event,
            "latest_event": stats.latest_event,
            "as_of": as_of,
            "mode": state.config.mode.as_str(),
            "cached_snapshots": state.cache.len(),
            "last_updated": Utc::now(),
        }))
        .into_response(),
        Err(e) => {
            warn!(error = %e, "Failed to load stats");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

pub async fn api_source_status(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.store.source_status().await {
        Ok(statuses) => {
            let mock = state.config.is_mock();
            let sources: serde_json::Map<String, serde_json::Value> = statuses
                .into_iter()
                .map(|s| {
                    let status = if mock {
                        "mock"
                    } else if s.event_count > 0 {
                        "ok"
                    } else {
                        "no_data"
                    };
                    (
                        s.source.to_string(),
                        serde_json::json!({
                            "status": status,
                            "events_count": s.event_count,
                            "last_success": s.latest_timestamp,
                        }),
                    )
                })
                .collect();
            Json(serde_json::json!({ "sources": sources })).into_response()
        }
        Err(e) => {
            warn!(error = %e, "Failed to load source status");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
