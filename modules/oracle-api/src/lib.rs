use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    http::{header, HeaderValue},
    routing::{get, post},
    Router,
};
use chrono::Utc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tracing::{info, warn};

use oracle_common::{Config, Topic};
use oracle_features::{FeatureCache, FeatureEngine, Forecaster};
use oracle_ingest::load_catalog;
use oracle_store::{MemoryStore, PgStore, SignalStore};

pub mod analysis;
pub mod auth;
pub mod jobs;
pub mod rest;

pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn SignalStore>,
    pub engine: FeatureEngine,
    pub forecaster: Forecaster,
    pub cache: FeatureCache,
    /// Topic catalog the store is seeded from.
    pub catalog: Vec<Topic>,
    /// "postgres" or "memory".
    pub store_kind: &'static str,
}

impl AppState {
    pub fn new(
        config: Config,
        store: Arc<dyn SignalStore>,
        catalog: Vec<Topic>,
        store_kind: &'static str,
    ) -> Self {
        Self {
            engine: FeatureEngine::new(config.feature_window_days),
            forecaster: Forecaster::default(),
            cache: FeatureCache::new(),
            config,
            store,
            catalog,
            store_kind,
        }
    }
}

/// Connect the store, load the topic catalog and make sure every catalog
/// topic exists.
pub async fn connect_state(config: Config) -> Result<Arc<AppState>> {
    let (store, store_kind): (Arc<dyn SignalStore>, &'static str) = match &config.database_url {
        Some(url) => {
            let store = PgStore::connect(url)
                .await
                .context("Failed to connect to Postgres")?;
            info!("Using Postgres store");
            (Arc::new(store), "postgres")
        }
        None => {
            info!("DATABASE_URL not set, using in-memory store");
            (Arc::new(MemoryStore::new()), "memory")
        }
    };

    let catalog = load_catalog(config.topic_keywords_path.as_deref().map(Path::new))
        .context("Failed to load topic catalog")?;
    store.upsert_topics(&catalog).await?;
    info!(topics = catalog.len(), "Topic catalog loaded");

    Ok(Arc::new(AppState::new(config, store, catalog, store_kind)))
}

/// [`connect_state`], then in mock mode seed an empty store and build its
/// features and forecasts so there is something to serve.
pub async fn build_state(config: Config) -> Result<Arc<AppState>> {
    let state = connect_state(config).await?;

    if state.config.is_mock() && state.store.stats().await?.events == 0 {
        let end = Utc::now().date_naive();
        let seeded = jobs::seed_mock(&state, state.config.feature_lookback_days, end).await?;
        let refresh = jobs::refresh(&state).await?;
        info!(
            events = seeded,
            feature_rows = refresh.features.rows,
            forecasts = refresh.forecasts.rows,
            "Mock data seeded"
        );
    }

    Ok(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let parsed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(_) => {
                warn!(origin = o.as_str(), "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if parsed.is_empty() || origins.iter().any(|o| o == "*") {
        layer.allow_origin(Any)
    } else {
        layer.allow_origin(parsed)
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    let cors = cors_layer(&state.config.cors_origins);

    Router::new()
        .route("/", get(rest::health::root))
        .route("/health", get(rest::health::health))
        .route("/health/ready", get(rest::health::ready))
        // Topics
        .route("/topics", get(rest::api_topics))
        .route("/topics/leaderboard", get(rest::api_leaderboard))
        .route("/topics/emerging", get(rest::api_emerging))
        .route("/topics/insights", get(rest::api_insights))
        .route("/topics/{id}", get(rest::api_topic_detail))
        .route("/topics/{id}/forecasts", get(rest::api_topic_forecasts))
        .route("/topics/{id}/narrative", get(rest::api_topic_narrative))
        // Signals
        .route("/signals", get(rest::signals::api_signals))
        .route("/signals/{id}", get(rest::signals::api_signal_detail))
        .route("/stats", get(rest::signals::api_stats))
        .route("/status/sources", get(rest::signals::api_source_status))
        .route("/digest", get(rest::api_digest))
        // Admin
        .route("/admin/rebuild", post(rest::admin::api_rebuild))
        .route("/admin/ingest", post(rest::admin::api_ingest))
        .with_state(state)
        .layer(cors)
        .layer(SetResponseHeaderLayer::overriding(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-store"),
        ))
        // Method + path only
        .layer(
            tower_http::trace::TraceLayer::new_for_http().make_span_with(
                |request: &axum::http::Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        path = %request.uri().path(),
                    )
                },
            ),
        )
}
