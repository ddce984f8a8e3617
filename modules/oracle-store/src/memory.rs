//! In-process store. Used in mock mode and by tests; no database required.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use tokio::sync::RwLock;

use oracle_common::{
    DailyCount, SignalEvent, SignalFilter, Source, Topic, TopicFeatures, TopicForecast,
};

use crate::error::{Result, StoreError};
use crate::traits::{EventPage, SignalStore, SourceStatus, StoreStats};

#[derive(Default)]
struct Inner {
    topics: BTreeMap<String, Topic>,
    events: HashMap<String, SignalEvent>,
    /// (source, source_id) -> event id
    event_keys: HashMap<(Source, String), String>,
    features: BTreeMap<(String, NaiveDate), TopicFeatures>,
    forecasts: BTreeMap<(String, u32), TopicForecast>,
    revision: u64,
}

/// Thread-safe in-memory [`SignalStore`].
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn matches(event: &SignalEvent, filter: &SignalFilter) -> bool {
    if let Some(topic) = &filter.topic_id {
        if event.topic_id.as_ref() != Some(topic) {
            return false;
        }
    }
    if filter.source.is_some_and(|s| s != event.source) {
        return false;
    }
    if filter.start.is_some_and(|start| event.timestamp < start) {
        return false;
    }
    if filter.end.is_some_and(|end| event.timestamp > end) {
        return false;
    }
    if filter.min_magnitude.is_some_and(|m| event.magnitude < m) {
        return false;
    }
    true
}

fn newest_first(a: &SignalEvent, b: &SignalEvent) -> std::cmp::Ordering {
    b.timestamp.cmp(&a.timestamp).then_with(|| a.id.cmp(&b.id))
}

#[async_trait]
impl SignalStore for MemoryStore {
    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    async fn list_topics(&self) -> Result<Vec<Topic>> {
        Ok(self.inner.read().await.topics.values().cloned().collect())
    }

    async fn get_topic(&self, id: &str) -> Result<Option<Topic>> {
        Ok(self.inner.read().await.topics.get(id).cloned())
    }

    async fn upsert_topics(&self, topics: &[Topic]) -> Result<usize> {
        let mut inner = self.inner.write().await;
        inner.revision += 1;
        for topic in topics {
            let mut topic = topic.clone();
            if let Some(existing) = inner.topics.get(&topic.id) {
                topic.created_at = existing.created_at;
                topic.updated_at = Utc::now();
            }
            inner.topics.insert(topic.id.clone(), topic);
        }
        Ok(topics.len())
    }

    async fn upsert_events(&self, events: &[SignalEvent]) -> Result<usize> {
        let mut inner = self.inner.write().await;
        inner.revision += 1;
        for event in events {
            let key = (event.source, event.source_id.clone());
            match inner.event_keys.get(&key).cloned() {
                Some(existing_id) => {
                    let mut updated = event.clone();
                    if let Some(existing) = inner.events.get(&existing_id) {
                        updated.id = existing.id.clone();
                        updated.created_at = existing.created_at;
                        if updated.topic_id.is_none() {
                            updated.topic_id = existing.topic_id.clone();
                        }
                    }
                    inner.events.insert(existing_id, updated);
                }
                None => {
                    inner.event_keys.insert(key, event.id.clone());
                    inner.events.insert(event.id.clone(), event.clone());
                }
            }
        }
        Ok(events.len())
    }

    async fn list_events(&self, filter: &SignalFilter) -> Result<EventPage> {
        let inner = self.inner.read().await;
        let mut hits: Vec<&SignalEvent> = inner
            .events
            .values()
            .filter(|e| matches(e, filter))
            .collect();
        hits.sort_by(|a, b| newest_first(a, b));

        let total = hits.len() as u64;
        let events = hits
            .into_iter()
            .skip(filter.offset as usize)
            .take(filter.limit as usize)
            .cloned()
            .collect();
        Ok(EventPage { events, total })
    }

    async fn get_event(&self, id: &str) -> Result<Option<SignalEvent>> {
        Ok(self.inner.read().await.events.get(id).cloned())
    }

    async fn unmapped_events(&self, limit: u32, offset: u32) -> Result<Vec<SignalEvent>> {
        let inner = self.inner.read().await;
        let mut hits: Vec<&SignalEvent> = inner
            .events
            .values()
            .filter(|e| e.topic_id.is_none())
            .collect();
        hits.sort_by(|a, b| newest_first(a, b));
        Ok(hits
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn assign_topic(&self, event_id: &str, topic_id: &str) -> Result<()> {
        let mut inner = self.inner.write().await;
        if !inner.topics.contains_key(topic_id) {
            return Err(StoreError::NotFound(format!("topic {topic_id}")));
        }
        let event = inner
            .events
            .get_mut(event_id)
            .ok_or_else(|| StoreError::NotFound(format!("event {event_id}")))?;
        event.topic_id = Some(topic_id.to_string());
        inner.revision += 1;
        Ok(())
    }

    async fn daily_counts(&self, topic_id: &str, since: NaiveDate) -> Result<Vec<DailyCount>> {
        let inner = self.inner.read().await;
        let mut buckets: BTreeMap<(NaiveDate, Source), (u32, f64)> = BTreeMap::new();
        for event in inner.events.values() {
            if event.topic_id.as_deref() != Some(topic_id) {
                continue;
            }
            let date = event.timestamp.date_naive();
            if date < since {
                continue;
            }
            let bucket = buckets.entry((date, event.source)).or_insert((0, 0.0));
            bucket.0 += 1;
            bucket.1 += event.magnitude;
        }
        Ok(buckets
            .into_iter()
            .map(|((date, source), (count, magnitude))| DailyCount {
                topic_id: topic_id.to_string(),
                date,
                source,
                count,
                magnitude,
            })
            .collect())
    }

    async fn replace_features(&self, topic_id: &str, rows: &[TopicFeatures]) -> Result<()> {
        let mut inner = self.inner.write().await;
        inner.revision += 1;
        inner.features.retain(|(topic, _), _| topic != topic_id);
        for row in rows {
            inner
                .features
                .insert((topic_id.to_string(), row.date), row.clone());
        }
        Ok(())
    }

    async fn list_features(
        &self,
        topic_id: &str,
        since: Option<NaiveDate>,
    ) -> Result<Vec<TopicFeatures>> {
        let inner = self.inner.read().await;
        Ok(inner
            .features
            .iter()
            .filter(|((topic, date), _)| {
                topic == topic_id && since.map_or(true, |s| *date >= s)
            })
            .map(|(_, row)| row.clone())
            .collect())
    }

    async fn upsert_forecast(&self, forecast: &TopicForecast) -> Result<()> {
        let mut inner = self.inner.write().await;
        inner.revision += 1;
        inner.forecasts.insert(
            (forecast.topic_id.clone(), forecast.horizon_days),
            forecast.clone(),
        );
        Ok(())
    }

    async fn list_forecasts(&self, topic_id: &str) -> Result<Vec<TopicForecast>> {
        let inner = self.inner.read().await;
        Ok(inner
            .forecasts
            .iter()
            .filter(|((topic, _), _)| topic == topic_id)
            .map(|(_, f)| f.clone())
            .collect())
    }

    async fn get_forecast(
        &self,
        topic_id: &str,
        horizon_days: u32,
    ) -> Result<Option<TopicForecast>> {
        let inner = self.inner.read().await;
        Ok(inner
            .forecasts
            .get(&(topic_id.to_string(), horizon_days))
            .cloned())
    }

    async fn stats(&self) -> Result<StoreStats> {
        let inner = self.inner.read().await;
        let mut events_by_source: BTreeMap<Source, u64> =
            Source::ALL.iter().map(|s| (*s, 0)).collect();
        for event in inner.events.values() {
            *events_by_source.entry(event.source).or_insert(0) += 1;
        }
        Ok(StoreStats {
            topics: inner.topics.len() as u64,
            events: inner.events.len() as u64,
            mapped_events: inner.events.values().filter(|e| e.topic_id.is_some()).count() as u64,
            feature_rows: inner.features.len() as u64,
            forecasts: inner.forecasts.len() as u64,
            events_by_source,
            earliest_event: inner.events.values().map(|e| e.timestamp).min(),
            latest_event: inner.events.values().map(|e| e.timestamp).max(),
        })
    }

    async fn source_status(&self) -> Result<Vec<SourceStatus>> {
        let inner = self.inner.read().await;
        Ok(Source::ALL
            .iter()
            .map(|source| {
                let of_source = inner.events.values().filter(|e| e.source == *source);
                SourceStatus {
                    source: *source,
                    event_count: of_source.clone().count() as u64,
                    latest_timestamp: of_source.map(|e| e.timestamp).max(),
                }
            })
            .collect())
    }

    async fn latest_event_date(&self) -> Result<Option<NaiveDate>> {
        let inner = self.inner.read().await;
        Ok(inner
            .events
            .values()
            .map(|e| e.timestamp)
            .max()
            .map(|t| t.date_naive()))
    }

    async fn data_revision(&self) -> Result<u64> {
        Ok(self.inner.read().await.revision)
    }

    async fn reset_signals(&self) -> Result<()> {
        let mut inner = self.inner.write().await;
        inner.revision += 1;
        inner.events.clear();
        inner.event_keys.clear();
        inner.features.clear();
        inner.forecasts.clear();
        Ok(())
    }
}
