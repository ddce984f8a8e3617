//! Router tests against an in-memory store.

use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use chrono::{NaiveDate, TimeZone, Utc};
use serde_json::Value;
use tower::ServiceExt;

use oracle_api::{jobs, router, AppState};
use oracle_common::{Config, Metadata, SignalEvent, Source};
use oracle_ingest::load_catalog;
use oracle_store::{MemoryStore, SignalStore};

const SEED_DAYS: u32 = 60;

fn end_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 6, 30).unwrap()
}

fn test_config() -> Config {
    Config {
        feature_lookback_days: SEED_DAYS,
        ..Config::default()
    }
}

async fn empty_state() -> Arc<AppState> {
    state_on(Arc::new(MemoryStore::new())).await
}

async fn state_on(store: Arc<dyn SignalStore>) -> Arc<AppState> {
    let catalog = load_catalog(None).unwrap();
    store.upsert_topics(&catalog).await.unwrap();
    Arc::new(AppState::new(test_config(), store, catalog, "memory"))
}

async fn seeded_state() -> Arc<AppState> {
    let state = empty_state().await;
    jobs::seed_mock(&state, SEED_DAYS, end_date()).await.unwrap();
    jobs::refresh(&state).await.unwrap();
    state
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

async fn get(app: Router, uri: &str) -> (StatusCode, Value) {
    send(app, Request::get(uri).body(Body::empty()).unwrap()).await
}

#[tokio::test]
async fn health_reports_store_statistics() {
    let app = router(seeded_state().await);
    let (status, body) = get(app, "/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["store"], "memory");
    assert_eq!(body["statistics"]["total_topics"], 12);
    assert!(body["statistics"]["total_events"].as_u64().unwrap() > 0);
}

#[tokio::test]
async fn readiness_waits_for_events() {
    let state = empty_state().await;
    let (status, body) = get(router(state.clone()), "/health/ready").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["reason"], "no_events_available");

    jobs::seed_mock(&state, 14, end_date()).await.unwrap();
    let (status, body) = get(router(state), "/health/ready").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ready");
}

#[tokio::test]
async fn topics_carry_surge_scores() {
    let app = router(seeded_state().await);
    let (status, body) = get(app, "/topics").await;

    assert_eq!(status, StatusCode::OK);
    let topics = body.as_array().unwrap();
    assert_eq!(topics.len(), 12);
    for topic in topics {
        let pct = topic["surge_score_pct"].as_f64().unwrap();
        assert!((0.0..=100.0).contains(&pct), "{pct}");
        assert!(topic["surge_score_breakdown"]["velocity_growth"].is_number());
        assert_eq!(topic["forecast_available"], true);
    }
}

#[tokio::test]
async fn leaderboard_is_ranked_by_score() {
    let app = router(seeded_state().await);
    let (status, body) = get(app, "/topics/leaderboard?limit=5").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["as_of"], "2025-06-30");
    let entries = body["leaderboard"].as_array().unwrap();
    assert_eq!(entries.len(), 5);
    for (i, pair) in entries.windows(2).enumerate() {
        assert_eq!(pair[0]["rank"], i + 1);
        assert!(pair[0]["surge_score"].as_f64() >= pair[1]["surge_score"].as_f64());
    }
}

#[tokio::test]
async fn topic_detail_and_unknown_topic() {
    let state = seeded_state().await;

    let (status, body) = get(router(state.clone()), "/topics/ai-agents").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "AI Agents");
    assert_eq!(body["recent_signals"].as_array().unwrap().len(), 10);
    assert!(!body["narrative"].as_str().unwrap().is_empty());

    let velocity_trend = body["velocity_trend"].as_array().unwrap();
    assert_eq!(velocity_trend.len(), 30);
    assert_eq!(body["acceleration_trend"].as_array().unwrap().len(), 30);
    let latest_stored = velocity_trend.last().unwrap().as_f64().unwrap();
    let current = body["metrics"]["velocity"].as_f64().unwrap();
    assert!((latest_stored - current).abs() < 1e-9);

    let (status, body) = get(router(state.clone()), "/topics/not-a-topic").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Topic not found");

    let (status, body) = get(router(state), "/topics/ai-agents/forecasts").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_forecasts"], 3);
}

#[tokio::test]
async fn emerging_threshold_is_validated() {
    let state = seeded_state().await;

    let (status, _) = get(router(state.clone()), "/topics/emerging?threshold=2").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = get(router(state), "/topics/emerging?threshold=0").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 12);
}

#[tokio::test]
async fn signals_are_filtered_and_paged() {
    let state = seeded_state().await;

    let (status, body) = get(router(state.clone()), "/signals?source=bogus").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());

    let (status, body) = get(router(state.clone()), "/signals?limit=5000").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["limit"], 1000);
    assert_eq!(body["events"].as_array().unwrap().len(), 1000);
    assert_eq!(body["has_more"], true);

    let (status, body) =
        get(router(state.clone()), "/signals?source=github&topic_id=robotics&limit=3").await;
    assert_eq!(status, StatusCode::OK);
    for event in body["events"].as_array().unwrap() {
        assert_eq!(event["source"], "github");
        assert_eq!(event["topic_id"], "robotics");
    }

    let (status, _) = get(router(state), "/signals/does-not-exist").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn admin_routes_require_key() {
    let state = seeded_state().await;

    let request = Request::post("/admin/rebuild").body(Body::empty()).unwrap();
    let (status, body) = send(router(state.clone()), request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Invalid or missing API key");

    let request = Request::post("/admin/rebuild")
        .header("x-api-key", "wrong")
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(router(state.clone()), request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let request = Request::post("/admin/rebuild")
        .header("x-api-key", "dev123")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(router(state), request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert!(body["events_seeded"].as_u64().unwrap() > 0);
}

#[tokio::test]
async fn ingest_days_are_bounded() {
    let state = seeded_state().await;
    let request = Request::post("/admin/ingest?days=365")
        .header("x-api-key", "dev123")
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(router(state), request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn digest_renders_markdown() {
    let app = router(seeded_state().await);
    let (status, body) = get(app, "/digest?limit=3").await;

    assert_eq!(status, StatusCode::OK);
    let markdown = body["markdown"].as_str().unwrap();
    assert!(markdown.starts_with("# Oracle Weekly Digest - 2025-06-30"));
}

#[tokio::test]
async fn source_status_lists_every_source() {
    let app = router(seeded_state().await);
    let (status, body) = get(app, "/status/sources").await;

    assert_eq!(status, StatusCode::OK);
    for source in ["arxiv", "github", "jobs", "funding"] {
        assert_eq!(body["sources"][source]["status"], "mock");
        assert!(body["sources"][source]["events_count"].as_u64().unwrap() > 0);
    }
}

fn github_burst(topic: &str, count: usize) -> Vec<SignalEvent> {
    let ts = Utc.with_ymd_and_hms(2025, 6, 30, 18, 0, 0).unwrap();
    (0..count)
        .map(|i| SignalEvent {
            id: format!("burst_{topic}_{i}"),
            source: Source::Github,
            source_id: format!("burst_{topic}_{i}"),
            topic_id: Some(topic.to_string()),
            title: format!("burst {i}"),
            url: None,
            description: None,
            timestamp: ts,
            magnitude: 2.0,
            metadata: Metadata::new(),
            created_at: ts,
        })
        .collect()
}

async fn surge_pct(state: &Arc<AppState>, topic: &str) -> f64 {
    let (status, body) = get(router(state.clone()), &format!("/topics/{topic}")).await;
    assert_eq!(status, StatusCode::OK);
    body["surge_score_pct"].as_f64().unwrap()
}

#[tokio::test]
async fn server_sees_refresh_run_by_another_process() {
    let store: Arc<dyn SignalStore> = Arc::new(MemoryStore::new());
    let server = state_on(store.clone()).await;
    let batch = state_on(store.clone()).await;

    jobs::seed_mock(&batch, SEED_DAYS, end_date()).await.unwrap();
    jobs::refresh(&batch).await.unwrap();
    let before = surge_pct(&server, "ai-agents").await;

    store.upsert_events(&github_burst("ai-agents", 200)).await.unwrap();
    jobs::refresh(&batch).await.unwrap();

    let served = surge_pct(&server, "ai-agents").await;
    let fresh = surge_pct(&state_on(store.clone()).await, "ai-agents").await;
    assert_eq!(served, fresh);
    assert!(served > before, "before={before} served={served}");
}
