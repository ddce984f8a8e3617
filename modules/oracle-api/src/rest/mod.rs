pub mod admin;
pub mod health;
pub mod signals;

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use chrono::{Duration, Utc};
use serde::Deserialize;
use tracing::warn;

use oracle_common::{SignalFilter, Source};
use oracle_features::narrative::{digest_markdown, topic_narrative};
use oracle_features::ranking::{
    emerging_topics, ranking_alerts, ranking_insights, EMERGING_THRESHOLD,
};
use oracle_features::TopicSnapshot;

use crate::analysis::{self, TopicView};
use crate::AppState;

const RECENT_SIGNALS: u32 = 10;
/// Days of stored feature history returned with a topic.
const TREND_DAYS: i64 = 30;

// --- Query structs ---

#[derive(Deserialize)]
pub struct LimitQuery {
    limit: Option<usize>,
}

#[derive(Deserialize)]
pub struct EmergingQuery {
    threshold: Option<f64>,
}

#[derive(Deserialize)]
pub struct NarrativeQuery {
    horizon: Option<u32>,
}

// --- Helpers ---

pub(crate) fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(serde_json::json!({ "error": message.into() }))).into_response()
}

/// Surge and feature fields shared by every topic representation.
fn surge_json(snapshot: &TopicSnapshot) -> serde_json::Value {
    let f = &snapshot.features;
    serde_json::json!({
        "velocity": f.velocity,
        "acceleration": f.acceleration,
        "z_spike": f.z_spike,
        "convergence": f.convergence,
        "surge_score": snapshot.surge.score,
        "surge_score_pct": snapshot.surge.score_pct,
        "surge_score_breakdown": snapshot.surge.breakdown,
    })
}

fn merge(mut base: serde_json::Value, extra: serde_json::Value) -> serde_json::Value {
    if let (Some(obj), serde_json::Value::Object(extra)) = (base.as_object_mut(), extra) {
        obj.extend(extra);
    }
    base
}

fn topic_summary(view: &TopicView) -> serde_json::Value {
    let forecast = view.forecast.as_ref();
    merge(
        serde_json::json!({
            "id": view.topic.id,
            "name": view.topic.name,
            "description": view.topic.description,
            "keywords": view.topic.keywords,
            "mention_count": view.snapshot.mentions_in_window,
            "forecast_available": forecast.is_some(),
            "confidence": forecast.map(|f| f.confidence_score),
            "growth_rate": forecast.map(|f| f.growth_rate),
            "model_type": forecast.map(|f| f.model_type.as_str()),
            "updated_at": forecast.map(|f| f.updated_at).unwrap_or(view.topic.updated_at),
        }),
        surge_json(&view.snapshot),
    )
}

fn leaderboard_entry(rank: usize, view: &TopicView) -> serde_json::Value {
    let sparkline: Vec<f64> = view.snapshot.trend.iter().map(|p| p.velocity).collect();
    merge(
        serde_json::json!({
            "rank": rank,
            "topic_id": view.topic.id,
            "name": view.topic.name,
            "confidence": view.forecast.as_ref().map(|f| f.confidence_score),
            "growth_rate": view.forecast.as_ref().map(|f| f.growth_rate),
            "sparkline": sparkline,
        }),
        surge_json(&view.snapshot),
    )
}

// --- Handlers ---

pub async fn api_topics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match analysis::leaderboard(&state).await {
        Ok((_, views)) => {
            let topics: Vec<serde_json::Value> = views.iter().map(topic_summary).collect();
            Json(serde_json::json!(topics)).into_response()
        }
        Err(e) => {
            warn!(error = %e, "Failed to load topics");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

pub async fn api_leaderboard(
    State(state): State<Arc<AppState>>,
    Query(params): Query<LimitQuery>,
) -> impl IntoResponse {
    let limit = params.limit.unwrap_or(20).clamp(1, 100);
    match analysis::leaderboard(&state).await {
        Ok((as_of, views)) => {
            let entries: Vec<serde_json::Value> = views
                .iter()
                .take(limit)
                .enumerate()
                .map(|(i, v)| leaderboard_entry(i + 1, v))
                .collect();
            Json(serde_json::json!({
                "as_of": as_of,
                "total_topics": views.len(),
                "leaderboard": entries,
            }))
            .into_response()
        }
        Err(e) => {
            warn!(error = %e, "Failed to build leaderboard");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

pub async fn api_emerging(
    State(state): State<Arc<AppState>>,
    Query(params): Query<EmergingQuery>,
) -> impl IntoResponse {
    let threshold = params.threshold.unwrap_or(EMERGING_THRESHOLD);
    if !(0.0..=1.0).contains(&threshold) {
        return error_response(StatusCode::BAD_REQUEST, "threshold must be between 0 and 1");
    }

    match analysis::leaderboard(&state).await {
        Ok((as_of, views)) => {
            let emerging = emerging_topics(&analysis::ranked(&views), threshold);
            let entries: Vec<serde_json::Value> = views
                .iter()
                .filter(|v| emerging.iter().any(|r| r.topic_id == v.topic.id))
                .enumerate()
                .map(|(i, v)| leaderboard_entry(i + 1, v))
                .collect();
            Json(serde_json::json!({
                "as_of": as_of,
                "threshold": threshold,
                "count": entries.len(),
                "topics": entries,
            }))
            .into_response()
        }
        Err(e) => {
            warn!(error = %e, "Failed to load emerging topics");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

pub async fn api_insights(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match analysis::leaderboard(&state).await {
        Ok((as_of, views)) => {
            let ranked = analysis::ranked(&views);
            Json(serde_json::json!({
                "as_of": as_of,
                "insights": ranking_insights(&ranked),
                "alerts": ranking_alerts(&ranked),
                "emerging_topics": emerging_topics(&ranked, EMERGING_THRESHOLD)
                    .iter()
                    .take(10)
                    .map(|r| &r.topic_id)
                    .collect::<Vec<_>>(),
                "generated_at": Utc::now(),
            }))
            .into_response()
        }
        Err(e) => {
            warn!(error = %e, "Failed to compute insights");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

pub async fn api_topic_detail(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let topic = match state.store.get_topic(&id).await {
        Ok(Some(t)) => t,
        Ok(None) => return error_response(StatusCode::NOT_FOUND, "Topic not found"),
        Err(e) => {
            warn!(error = %e, topic_id = id.as_str(), "Failed to load topic");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let detail = async {
        let basis = analysis::basis(state.store.as_ref()).await?;
        let view = analysis::topic_view(&state, topic, basis).await?;
        let recent = state
            .store
            .list_events(&SignalFilter {
                topic_id: Some(id.clone()),
                limit: RECENT_SIGNALS,
                ..Default::default()
            })
            .await?;
        let since = basis.as_of - Duration::days(TREND_DAYS - 1);
        let stored = state.store.list_features(&id, Some(since)).await?;
        anyhow::Ok((basis.as_of, view, recent.events, stored))
    };

    match detail.await {
        Ok((as_of, view, recent, stored)) => {
            let snapshot = &view.snapshot;
            let narrative = topic_narrative(&view.topic.name, snapshot, view.forecast.as_ref());
            let contributing: Vec<Source> = snapshot.contributing_sources();
            Json(merge(
                serde_json::json!({
                    "id": view.topic.id,
                    "name": view.topic.name,
                    "description": view.topic.description,
                    "keywords": view.topic.keywords,
                    "as_of": as_of,
                    "metrics": snapshot.features,
                    "mention_count": snapshot.mentions_in_window,
                    "forecast": view.forecast,
                    "recent_signals": recent,
                    "trend": snapshot.trend,
                    "velocity_trend": stored.iter().map(|f| f.velocity).collect::<Vec<_>>(),
                    "acceleration_trend": stored
                        .iter()
                        .map(|f| f.acceleration)
                        .collect::<Vec<_>>(),
                    "contributing_sources": contributing,
                    "source_totals": snapshot.source_totals,
                    "narrative": narrative,
                }),
                surge_json(snapshot),
            ))
            .into_response()
        }
        Err(e) => {
            warn!(error = %e, topic_id = id.as_str(), "Failed to load topic detail");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

pub async fn api_topic_forecasts(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let topic = match state.store.get_topic(&id).await {
        Ok(Some(t)) => t,
        Ok(None) => return error_response(StatusCode::NOT_FOUND, "Topic not found"),
        Err(e) => {
            warn!(error = %e, topic_id = id.as_str(), "Failed to load topic");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    match state.store.list_forecasts(&id).await {
        Ok(forecasts) => Json(serde_json::json!({
            "topic_id": topic.id,
            "topic_name": topic.name,
            "total_forecasts": forecasts.len(),
            "forecasts": forecasts,
        }))
        .into_response(),
        Err(e) => {
            warn!(error = %e, topic_id = id.as_str(), "Failed to load forecasts");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

pub async fn api_topic_narrative(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(params): Query<NarrativeQuery>,
) -> impl IntoResponse {
    let topic = match state.store.get_topic(&id).await {
        Ok(Some(t)) => t,
        Ok(None) => return error_response(StatusCode::NOT_FOUND, "Topic not found"),
        Err(e) => {
            warn!(error = %e, topic_id = id.as_str(), "Failed to load topic");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };
    let horizon = params.horizon.unwrap_or_else(|| state.config.primary_horizon());

    let narrative = async {
        let basis = analysis::basis(state.store.as_ref()).await?;
        let view = analysis::topic_view(&state, topic, basis).await?;
        let forecast = if horizon == state.config.primary_horizon() {
            view.forecast.clone()
        } else {
            state.store.get_forecast(&id, horizon).await?
        };
        let text = topic_narrative(&view.topic.name, &view.snapshot, forecast.as_ref());
        anyhow::Ok((view.topic.name, text))
    };

    match narrative.await {
        Ok((name, text)) => Json(serde_json::json!({
            "topic_id": id,
            "topic_name": name,
            "horizon_days": horizon,
            "narrative": text,
            "generated_at": Utc::now(),
        }))
        .into_response(),
        Err(e) => {
            warn!(error = %e, topic_id = id.as_str(), "Failed to build narrative");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

pub async fn api_digest(
    State(state): State<Arc<AppState>>,
    Query(params): Query<LimitQuery>,
) -> impl IntoResponse {
    let limit = params.limit.unwrap_or(10).clamp(1, 50);
    match analysis::leaderboard(&state).await {
        Ok((as_of, views)) => {
            let markdown = digest(&views, as_of, limit);
            Json(serde_json::json!({
                "as_of": as_of,
                "limit": limit,
                "markdown": markdown,
            }))
            .into_response()
        }
        Err(e) => {
            warn!(error = %e, "Failed to build digest");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Markdown digest of the first `limit` views (already in leaderboard order).
pub fn digest(views: &[TopicView], as_of: chrono::NaiveDate, limit: usize) -> String {
    let narratives: Vec<(String, String)> = views
        .iter()
        .take(limit)
        .map(|v| {
            (
                v.topic.id.clone(),
                topic_narrative(&v.topic.name, &v.snapshot, v.forecast.as_ref()),
            )
        })
        .collect();
    digest_markdown(as_of, &analysis::ranked(views), limit, |topic_id| {
        narratives
            .iter()
            .find(|(id, _)| id == topic_id)
            .map(|(_, text)| text.as_str())
    })
}
