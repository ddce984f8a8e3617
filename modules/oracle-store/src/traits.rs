//! The storage seam shared by the Postgres and in-memory backends.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use oracle_common::{
    DailyCount, SignalEvent, SignalFilter, Source, Topic, TopicFeatures, TopicForecast,
};

use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreStats {
    pub topics: u64,
    pub events: u64,
    pub mapped_events: u64,
    pub feature_rows: u64,
    pub forecasts: u64,
    pub events_by_source: BTreeMap<Source, u64>,
    pub earliest_event: Option<DateTime<Utc>>,
    pub latest_event: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceStatus {
    pub source: Source,
    pub event_count: u64,
    pub latest_timestamp: Option<DateTime<Utc>>,
}

/// One page of events plus the total matching the filter.
#[derive(Debug, Clone, PartialEq)]
pub struct EventPage {
    pub events: Vec<SignalEvent>,
    pub total: u64,
}

/// Persistence for topics, events and derived metrics.
///
/// Implemented by `PgStore` (production) and `MemoryStore` (mock mode, tests).
#[async_trait]
pub trait SignalStore: Send + Sync {
    /// Cheap connectivity check.
    async fn ping(&self) -> Result<()>;

    async fn list_topics(&self) -> Result<Vec<Topic>>;
    async fn get_topic(&self, id: &str) -> Result<Option<Topic>>;
    /// Insert or update by id. Returns the number of rows written.
    async fn upsert_topics(&self, topics: &[Topic]) -> Result<usize>;

    /// Insert or update by (source, source_id). An existing topic mapping is
    /// kept when the incoming event has none. Returns the number of rows written.
    async fn upsert_events(&self, events: &[SignalEvent]) -> Result<usize>;
    /// Newest first, then by id.
    async fn list_events(&self, filter: &SignalFilter) -> Result<EventPage>;
    async fn get_event(&self, id: &str) -> Result<Option<SignalEvent>>;
    /// Events with no topic, newest first, skipping the first `offset`.
    async fn unmapped_events(&self, limit: u32, offset: u32) -> Result<Vec<SignalEvent>>;
    async fn assign_topic(&self, event_id: &str, topic_id: &str) -> Result<()>;

    /// Per (date, source) event counts and magnitude sums for a topic from
    /// `since` onwards, ordered by date then source.
    async fn daily_counts(&self, topic_id: &str, since: NaiveDate) -> Result<Vec<DailyCount>>;

    /// Replace every stored feature row for the topic with `rows`.
    async fn replace_features(&self, topic_id: &str, rows: &[TopicFeatures]) -> Result<()>;
    /// Oldest first. Feeds the stored velocity and acceleration trends.
    async fn list_features(
        &self,
        topic_id: &str,
        since: Option<NaiveDate>,
    ) -> Result<Vec<TopicFeatures>>;

    /// Insert or replace by (topic_id, horizon_days).
    async fn upsert_forecast(&self, forecast: &TopicForecast) -> Result<()>;
    /// Ordered by horizon.
    async fn list_forecasts(&self, topic_id: &str) -> Result<Vec<TopicForecast>>;
    async fn get_forecast(&self, topic_id: &str, horizon_days: u32)
        -> Result<Option<TopicForecast>>;

    async fn stats(&self) -> Result<StoreStats>;
    /// One entry per source, including sources with no events.
    async fn source_status(&self) -> Result<Vec<SourceStatus>>;
    /// UTC date of the newest event, if any.
    async fn latest_event_date(&self) -> Result<Option<NaiveDate>>;

    /// Counter that grows on every write to events, features or forecasts,
    /// whichever process made it. Equal revisions mean unchanged data.
    async fn data_revision(&self) -> Result<u64>;

    /// Drop events, features and forecasts. Topics are kept.
    async fn reset_signals(&self) -> Result<()>;
}
