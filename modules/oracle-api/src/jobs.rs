//! Batch jobs: seeding, ETL, feature rebuild and forecasting.
//!
//! Topics are processed independently with bounded concurrency. A failing
//! topic is logged and counted; it never aborts the batch.

use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use tracing::{info, warn};

use oracle_common::Topic;
use oracle_features::{FeatureEngine, Forecaster};
use oracle_ingest::{EtlReport, EtlRunner, MockGenerator, TopicMapper};
use oracle_store::SignalStore;

use crate::analysis::{as_of, load_series};
use crate::AppState;

const TOPIC_CONCURRENCY: usize = 8;
const UPSERT_CHUNK: usize = 5_000;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct JobReport {
    pub topics: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Feature rows or forecasts written.
    pub rows: usize,
}

impl JobReport {
    fn tally(results: Vec<(String, Result<usize>)>, job: &'static str) -> Self {
        let mut report = JobReport {
            topics: results.len(),
            ..Default::default()
        };
        for (topic_id, result) in results {
            match result {
                Ok(rows) => {
                    report.succeeded += 1;
                    report.rows += rows;
                }
                Err(e) => {
                    report.failed += 1;
                    warn!(job, topic_id = topic_id.as_str(), error = %e, "Topic failed");
                }
            }
        }
        report
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RefreshReport {
    pub as_of: Option<NaiveDate>,
    pub features: JobReport,
    pub forecasts: JobReport,
}

/// Recompute and replace the stored feature history of every topic.
pub async fn rebuild_features(
    store: &dyn SignalStore,
    engine: &FeatureEngine,
    lookback_days: u32,
) -> Result<JobReport> {
    let as_of = as_of(store).await?;
    let topics = store.list_topics().await?;

    let results: Vec<(String, Result<usize>)> = stream::iter(topics)
        .map(|topic| async move {
            let result = async {
                let series = load_series(store, &topic.id, as_of, lookback_days).await?;
                let rows = engine.history(&series);
                store
                    .replace_features(&topic.id, &rows)
                    .await
                    .context("replace features")?;
                Ok::<_, anyhow::Error>(rows.len())
            }
            .await;
            (topic.id, result)
        })
        .buffer_unordered(TOPIC_CONCURRENCY)
        .collect()
        .await;

    let report = JobReport::tally(results, "rebuild_features");
    info!(
        %as_of,
        topics = report.topics,
        failed = report.failed,
        rows = report.rows,
        "Feature rebuild complete"
    );
    Ok(report)
}

/// Forecast every topic at every horizon and store the results. Topics with
/// too little history are skipped without error.
pub async fn run_forecasts(
    store: &dyn SignalStore,
    forecaster: &Forecaster,
    horizons: &[u32],
    lookback_days: u32,
) -> Result<JobReport> {
    let as_of = as_of(store).await?;
    let topics = store.list_topics().await?;
    let now = Utc::now();

    let results: Vec<(String, Result<usize>)> = stream::iter(topics)
        .map(|topic| async move {
            let result = async {
                let series = load_series(store, &topic.id, as_of, lookback_days).await?;
                let mut written = 0;
                for &horizon in horizons {
                    let Some(forecast) =
                        forecaster.forecast(&topic.id, series.as_of, &series.totals, horizon, now)
                    else {
                        continue;
                    };
                    store
                        .upsert_forecast(&forecast)
                        .await
                        .with_context(|| format!("upsert {horizon}-day forecast"))?;
                    written += 1;
                }
                Ok::<_, anyhow::Error>(written)
            }
            .await;
            (topic.id, result)
        })
        .buffer_unordered(TOPIC_CONCURRENCY)
        .collect()
        .await;

    let report = JobReport::tally(results, "run_forecasts");
    info!(
        %as_of,
        topics = report.topics,
        failed = report.failed,
        forecasts = report.rows,
        "Forecast run complete"
    );
    Ok(report)
}

/// Features then forecasts, then drop every cached snapshot.
pub async fn refresh(state: &AppState) -> Result<RefreshReport> {
    let store = state.store.as_ref();
    let lookback = state.config.feature_lookback_days;

    let features = rebuild_features(store, &state.engine, lookback).await?;
    let forecasts = run_forecasts(
        store,
        &state.forecaster,
        &state.config.forecast_horizons,
        lookback,
    )
    .await?;
    state.cache.invalidate();

    Ok(RefreshReport {
        as_of: store.latest_event_date().await?,
        features,
        forecasts,
    })
}

/// Replace all signals with deterministic mock events for the catalog
/// topics over the `days` days ending at `end`. Returns the event count.
pub async fn seed_mock(state: &AppState, days: u32, end: NaiveDate) -> Result<usize> {
    seed_store(state.store.as_ref(), &state.catalog, days, end).await?;
    state.cache.invalidate();
    Ok(state.store.stats().await?.events as usize)
}

async fn seed_store(
    store: &dyn SignalStore,
    topics: &[Topic],
    days: u32,
    end: NaiveDate,
) -> Result<usize> {
    store.reset_signals().await.context("reset signals")?;
    store.upsert_topics(topics).await.context("upsert topics")?;

    let events = MockGenerator::default().generate(topics, end, days);
    let mut written = 0;
    for chunk in events.chunks(UPSERT_CHUNK) {
        written += store.upsert_events(chunk).await.context("upsert mock events")?;
    }
    info!(topics = topics.len(), days, %end, events = written, "Seeded mock events");
    Ok(written)
}

/// Fetch from every live source and store what comes back.
pub async fn run_etl(state: &AppState, days: u32) -> Result<EtlReport> {
    let topics = state.store.list_topics().await?;
    let runner = EtlRunner::from_config(&state.config, TopicMapper::new(&topics))
        .context("build source clients")?;
    let report = runner.run(state.store.as_ref(), days).await?;
    state.cache.invalidate();
    Ok(report)
}
