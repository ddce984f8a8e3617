//! Loads series from the store and turns them into cached snapshots and
//! leaderboard entries.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use chrono::{Duration, NaiveDate, Utc};
use futures::stream::{self, StreamExt, TryStreamExt};

use oracle_common::{Topic, TopicForecast};
use oracle_features::ranking::sort_leaderboard;
use oracle_features::{RankedTopic, TopicSeries, TopicSnapshot};
use oracle_store::SignalStore;

use crate::AppState;

/// Topics computed concurrently when building the leaderboard.
const TOPIC_CONCURRENCY: usize = 8;

/// Reference date for every computation: the newest event's UTC date, or
/// today when there are no events.
pub async fn as_of(store: &dyn SignalStore) -> Result<NaiveDate> {
    Ok(store
        .latest_event_date()
        .await?
        .unwrap_or_else(|| Utc::now().date_naive()))
}

/// Daily series covering the `lookback_days` days ending at `as_of`.
pub async fn load_series(
    store: &dyn SignalStore,
    topic_id: &str,
    as_of: NaiveDate,
    lookback_days: u32,
) -> Result<TopicSeries> {
    let start = as_of - Duration::days(lookback_days.max(1) as i64 - 1);
    let rows = store.daily_counts(topic_id, start).await?;
    Ok(TopicSeries::from_daily_counts(topic_id, &rows, start, as_of))
}

/// The data a set of snapshots is computed from: the reference date and the
/// store revision read before anything else.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Basis {
    pub as_of: NaiveDate,
    pub revision: u64,
}

/// Read the revision first so that anything written while a snapshot is being
/// computed lands under a newer revision and forces a recompute.
pub async fn basis(store: &dyn SignalStore) -> Result<Basis> {
    let revision = store.data_revision().await?;
    Ok(Basis {
        as_of: as_of(store).await?,
        revision,
    })
}

/// Cached snapshot for (topic, as_of) at the basis revision, computed on a miss.
pub async fn snapshot(
    state: &AppState,
    topic_id: &str,
    basis: Basis,
    forecast: Option<&TopicForecast>,
) -> Result<Arc<TopicSnapshot>> {
    if let Some(hit) = state.cache.get(topic_id, basis.as_of, basis.revision) {
        return Ok(hit);
    }
    let series = load_series(
        state.store.as_ref(),
        topic_id,
        basis.as_of,
        state.config.feature_lookback_days,
    )
    .await?;
    let computed = state.engine.snapshot(&series, forecast);
    Ok(state.cache.insert(basis.as_of, basis.revision, computed))
}

/// A topic with its current snapshot and primary-horizon forecast.
#[derive(Debug, Clone)]
pub struct TopicView {
    pub topic: Topic,
    pub snapshot: Arc<TopicSnapshot>,
    pub forecast: Option<TopicForecast>,
}

impl TopicView {
    pub fn ranked(&self) -> RankedTopic {
        RankedTopic {
            topic_id: self.topic.id.clone(),
            name: self.topic.name.clone(),
            surge: self.snapshot.surge.clone(),
            confidence: self.forecast.as_ref().map(|f| f.confidence_score),
            growth_rate: self.forecast.as_ref().map(|f| f.growth_rate),
            model_type: self.forecast.as_ref().map(|f| f.model_type.clone()),
        }
    }
}

pub async fn topic_view(state: &AppState, topic: Topic, basis: Basis) -> Result<TopicView> {
    let forecast = state
        .store
        .get_forecast(&topic.id, state.config.primary_horizon())
        .await?;
    let snapshot = snapshot(state, &topic.id, basis, forecast.as_ref()).await?;
    Ok(TopicView {
        topic,
        snapshot,
        forecast,
    })
}

/// Every topic, in leaderboard order.
pub async fn leaderboard(state: &AppState) -> Result<(NaiveDate, Vec<TopicView>)> {
    let basis = basis(state.store.as_ref()).await?;
    let topics = state.store.list_topics().await?;

    let views: Vec<TopicView> = stream::iter(topics)
        .map(|topic| topic_view(state, topic, basis))
        .buffered(TOPIC_CONCURRENCY)
        .try_collect()
        .await?;

    Ok((basis.as_of, in_leaderboard_order(views)))
}

fn in_leaderboard_order(views: Vec<TopicView>) -> Vec<TopicView> {
    let mut ranked: Vec<RankedTopic> = views.iter().map(TopicView::ranked).collect();
    sort_leaderboard(&mut ranked);

    let mut by_id: HashMap<String, TopicView> = views
        .into_iter()
        .map(|v| (v.topic.id.clone(), v))
        .collect();
    ranked
        .iter()
        .filter_map(|r| by_id.remove(&r.topic_id))
        .collect()
}

pub fn ranked(views: &[TopicView]) -> Vec<RankedTopic> {
    views.iter().map(TopicView::ranked).collect()
}
