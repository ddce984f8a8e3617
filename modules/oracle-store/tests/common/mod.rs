//! Behaviour every `SignalStore` backend must share.

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use oracle_common::{
    ForecastPoint, Metadata, SignalEvent, SignalFilter, Source, Topic, TopicFeatures,
    TopicForecast,
};
use oracle_store::SignalStore;

pub fn at(day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, day, hour, 0, 0).unwrap()
}

pub fn date(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 3, day).unwrap()
}

pub fn event(
    id: &str,
    source: Source,
    topic: Option<&str>,
    ts: DateTime<Utc>,
    magnitude: f64,
) -> SignalEvent {
    SignalEvent {
        id: id.to_string(),
        source,
        source_id: format!("{}-{id}", source.as_str()),
        topic_id: topic.map(str::to_string),
        title: format!("event {id}"),
        url: None,
        description: None,
        timestamp: ts,
        magnitude,
        metadata: Metadata::new(),
        created_at: ts,
    }
}

pub fn topics() -> Vec<Topic> {
    vec![
        Topic::new("ai-agents", "AI Agents", vec!["agent".into()]),
        Topic::new("quantum", "Quantum Computing", vec!["qubit".into()]),
    ]
}

pub fn feature_row(topic: &str, d: u32, velocity: f64) -> TopicFeatures {
    TopicFeatures {
        topic_id: topic.into(),
        date: date(d),
        mention_count_total: 2,
        mention_count_arxiv: 2,
        mention_count_github: 0,
        mention_count_jobs: 0,
        mention_count_funding: 0,
        magnitude_sum: 2.5,
        unique_sources: 1,
        velocity,
        acceleration: 0.0,
        z_spike: 0.0,
        convergence: 0.25,
    }
}

pub async fn seed(store: &dyn SignalStore) {
    store.upsert_topics(&topics()).await.unwrap();
    store
        .upsert_events(&[
            event("e1", Source::Arxiv, Some("ai-agents"), at(1, 9), 1.0),
            event("e2", Source::Arxiv, Some("ai-agents"), at(1, 15), 1.5),
            event("e3", Source::Github, Some("ai-agents"), at(2, 10), 4.0),
            event("e4", Source::Funding, Some("quantum"), at(3, 8), 6.0),
            event("e5", Source::Jobs, None, at(3, 12), 1.5),
        ])
        .await
        .unwrap();
}

pub async fn events_are_filtered_and_paginated(store: &dyn SignalStore) {
    seed(store).await;

    let all = store
        .list_events(&SignalFilter { limit: 100, ..Default::default() })
        .await
        .unwrap();
    assert_eq!(all.total, 5);
    let ids: Vec<&str> = all.events.iter().map(|e| e.id.as_str()).collect();
    assert_eq!(ids, vec!["e5", "e4", "e3", "e2", "e1"]);

    let page = store
        .list_events(&SignalFilter { limit: 2, offset: 1, ..Default::default() })
        .await
        .unwrap();
    assert_eq!(page.total, 5);
    assert_eq!(page.events.len(), 2);
    assert_eq!(page.events[0].id, "e4");

    let arxiv = store
        .list_events(&SignalFilter {
            source: Some(Source::Arxiv),
            min_magnitude: Some(1.2),
            limit: 100,
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(arxiv.total, 1);
    assert_eq!(arxiv.events[0].id, "e2");

    let windowed = store
        .list_events(&SignalFilter {
            topic_id: Some("ai-agents".into()),
            start: Some(at(1, 12)),
            end: Some(at(2, 23)),
            limit: 100,
            ..Default::default()
        })
        .await
        .unwrap();
    let ids: Vec<&str> = windowed.events.iter().map(|e| e.id.as_str()).collect();
    assert_eq!(ids, vec!["e3", "e2"]);
}

pub async fn upsert_keeps_identity_and_mapping(store: &dyn SignalStore) {
    seed(store).await;

    let mut again = event("other-id", Source::Arxiv, None, at(1, 9), 2.0);
    again.source_id = "arxiv-e1".to_string();
    store.upsert_events(&[again]).await.unwrap();

    let stored = store.get_event("e1").await.unwrap().unwrap();
    assert_eq!(stored.magnitude, 2.0);
    assert_eq!(stored.topic_id.as_deref(), Some("ai-agents"));
    assert!(store.get_event("other-id").await.unwrap().is_none());
    assert_eq!(store.stats().await.unwrap().events, 5);
}

pub async fn unmapped_events_can_be_assigned(store: &dyn SignalStore) {
    seed(store).await;

    let unmapped = store.unmapped_events(10, 0).await.unwrap();
    assert_eq!(unmapped.len(), 1);
    store.assign_topic("e5", "quantum").await.unwrap();
    assert!(store.unmapped_events(10, 0).await.unwrap().is_empty());
    assert!(store.assign_topic("missing", "quantum").await.is_err());
}

pub async fn daily_counts_group_by_day_and_source(store: &dyn SignalStore) {
    seed(store).await;

    let counts = store.daily_counts("ai-agents", date(1)).await.unwrap();
    assert_eq!(counts.len(), 2);
    assert_eq!(counts[0].date, date(1));
    assert_eq!(counts[0].source, Source::Arxiv);
    assert_eq!(counts[0].count, 2);
    assert!((counts[0].magnitude - 2.5).abs() < 1e-9);
    assert_eq!(counts[1].source, Source::Github);

    let later = store.daily_counts("ai-agents", date(2)).await.unwrap();
    assert_eq!(later.len(), 1);
}

pub async fn features_are_replaced_wholesale(store: &dyn SignalStore) {
    seed(store).await;

    let row = |d: u32, velocity: f64| feature_row("ai-agents", d, velocity);

    store
        .replace_features("ai-agents", &[row(1, 1.0), row(2, 1.5), row(3, 2.0)])
        .await
        .unwrap();
    store
        .replace_features("ai-agents", &[row(2, 9.0), row(3, 9.5)])
        .await
        .unwrap();

    let rows = store.list_features("ai-agents", None).await.unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].date, date(2));
    assert_eq!(rows[0].velocity, 9.0);

    let since = store.list_features("ai-agents", Some(date(3))).await.unwrap();
    assert_eq!(since.len(), 1);
}

pub async fn forecasts_upsert_by_horizon(store: &dyn SignalStore) {
    seed(store).await;

    let forecast = |horizon: u32, confidence: f64| TopicForecast {
        topic_id: "quantum".into(),
        horizon_days: horizon,
        forecast_curve: (1..=horizon)
            .map(|h| ForecastPoint {
                date: date(3) + Duration::days(h as i64),
                yhat: 1.0,
                yhat_lower: Some(0.5),
                yhat_upper: Some(1.5),
            })
            .collect(),
        confidence_score: confidence,
        growth_rate: 0.0,
        model_type: "linear_trend".into(),
        model_params: Metadata::new(),
        model_metrics: Metadata::new(),
        updated_at: at(3, 12),
    };

    store.upsert_forecast(&forecast(90, 0.5)).await.unwrap();
    store.upsert_forecast(&forecast(30, 0.5)).await.unwrap();
    store.upsert_forecast(&forecast(30, 0.8)).await.unwrap();

    let all = store.list_forecasts("quantum").await.unwrap();
    let horizons: Vec<u32> = all.iter().map(|f| f.horizon_days).collect();
    assert_eq!(horizons, vec![30, 90]);

    let thirty = store.get_forecast("quantum", 30).await.unwrap().unwrap();
    assert_eq!(thirty.confidence_score, 0.8);
    assert_eq!(thirty.forecast_curve.len(), 30);
    assert!(store.get_forecast("quantum", 180).await.unwrap().is_none());
}

pub async fn stats_and_source_status(store: &dyn SignalStore) {
    seed(store).await;

    let stats = store.stats().await.unwrap();
    assert_eq!(stats.topics, 2);
    assert_eq!(stats.events, 5);
    assert_eq!(stats.mapped_events, 4);
    assert_eq!(stats.events_by_source.get(&Source::Arxiv), Some(&2));
    assert_eq!(stats.latest_event, Some(at(3, 12)));

    let status = store.source_status().await.unwrap();
    assert_eq!(status.len(), 4);
    let github = status.iter().find(|s| s.source == Source::Github).unwrap();
    assert_eq!(github.event_count, 1);
    assert_eq!(github.latest_timestamp, Some(at(2, 10)));

    assert_eq!(store.latest_event_date().await.unwrap(), Some(date(3)));

    store.reset_signals().await.unwrap();
    let stats = store.stats().await.unwrap();
    assert_eq!(stats.events, 0);
    assert_eq!(stats.topics, 2);
    assert_eq!(store.latest_event_date().await.unwrap(), None);
}

pub async fn revision_moves_on_every_write(store: &dyn SignalStore) {
    seed(store).await;

    let mut last = store.data_revision().await.unwrap();
    assert_eq!(store.data_revision().await.unwrap(), last, "reads must not bump");

    store
        .upsert_events(&[event("e6", Source::Github, Some("quantum"), at(3, 20), 2.0)])
        .await
        .unwrap();
    let now = store.data_revision().await.unwrap();
    assert!(now > last);
    last = now;

    store.assign_topic("e5", "ai-agents").await.unwrap();
    let now = store.data_revision().await.unwrap();
    assert!(now > last);
    last = now;

    store
        .replace_features("quantum", &[feature_row("quantum", 3, 1.0)])
        .await
        .unwrap();
    let now = store.data_revision().await.unwrap();
    assert!(now > last);
    last = now;

    store.reset_signals().await.unwrap();
    assert!(store.data_revision().await.unwrap() > last);
}
