// Postgres persistence for topics, signal events and derived metrics.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;

use oracle_common::{
    DailyCount, ForecastPoint, Metadata, SignalEvent, SignalFilter, Source, Topic, TopicFeatures,
    TopicForecast,
};

use crate::error::{Result, StoreError};
use crate::traits::{EventPage, SignalStore, SourceStatus, StoreStats};

pub struct PgStore {
    pool: PgPool,
}

/// A row from the topics table.
#[derive(Debug, sqlx::FromRow)]
struct TopicRow {
    id: String,
    name: String,
    description: Option<String>,
    keywords: Vec<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<TopicRow> for Topic {
    fn from(r: TopicRow) -> Self {
        Topic {
            id: r.id,
            name: r.name,
            description: r.description,
            keywords: r.keywords,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

/// A row from the signal_events table.
#[derive(Debug, sqlx::FromRow)]
struct EventRow {
    id: String,
    source: String,
    source_id: String,
    topic_id: Option<String>,
    title: String,
    url: Option<String>,
    description: Option<String>,
    occurred_at: DateTime<Utc>,
    magnitude: f64,
    metadata: serde_json::Value,
    created_at: DateTime<Utc>,
}

impl TryFrom<EventRow> for SignalEvent {
    type Error = StoreError;

    fn try_from(r: EventRow) -> Result<Self> {
        Ok(SignalEvent {
            source: parse_source(&r.source)?,
            id: r.id,
            source_id: r.source_id,
            topic_id: r.topic_id,
            title: r.title,
            url: r.url,
            description: r.description,
            timestamp: r.occurred_at,
            magnitude: r.magnitude,
            metadata: match r.metadata {
                serde_json::Value::Object(map) => map,
                _ => Metadata::new(),
            },
            created_at: r.created_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct DailyCountRow {
    day: NaiveDate,
    source: String,
    count: i64,
    magnitude: f64,
}

#[derive(Debug, sqlx::FromRow)]
struct FeatureRow {
    topic_id: String,
    date: NaiveDate,
    mention_count_total: i32,
    mention_count_arxiv: i32,
    mention_count_github: i32,
    mention_count_jobs: i32,
    mention_count_funding: i32,
    magnitude_sum: f64,
    unique_sources: i32,
    velocity: f64,
    acceleration: f64,
    z_spike: f64,
    convergence: f64,
}

impl From<FeatureRow> for TopicFeatures {
    fn from(r: FeatureRow) -> Self {
        let count = |v: i32| v.max(0) as u32;
        TopicFeatures {
            topic_id: r.topic_id,
            date: r.date,
            mention_count_total: count(r.mention_count_total),
            mention_count_arxiv: count(r.mention_count_arxiv),
            mention_count_github: count(r.mention_count_github),
            mention_count_jobs: count(r.mention_count_jobs),
            mention_count_funding: count(r.mention_count_funding),
            magnitude_sum: r.magnitude_sum,
            unique_sources: count(r.unique_sources),
            velocity: r.velocity,
            acceleration: r.acceleration,
            z_spike: r.z_spike,
            convergence: r.convergence,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ForecastRow {
    topic_id: String,
    horizon_days: i32,
    forecast_curve: serde_json::Value,
    confidence_score: f64,
    growth_rate: f64,
    model_type: String,
    model_params: serde_json::Value,
    model_metrics: serde_json::Value,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ForecastRow> for TopicForecast {
    type Error = StoreError;

    fn try_from(r: ForecastRow) -> Result<Self> {
        let forecast_curve: Vec<ForecastPoint> = serde_json::from_value(r.forecast_curve)?;
        Ok(TopicForecast {
            topic_id: r.topic_id,
            horizon_days: r.horizon_days.max(0) as u32,
            forecast_curve,
            confidence_score: r.confidence_score,
            growth_rate: r.growth_rate,
            model_type: r.model_type,
            model_params: serde_json::from_value(r.model_params)?,
            model_metrics: serde_json::from_value(r.model_metrics)?,
            updated_at: r.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct SourceStatusRow {
    source: String,
    event_count: i64,
    latest_timestamp: Option<DateTime<Utc>>,
}

fn parse_source(s: &str) -> Result<Source> {
    s.parse()
        .map_err(|_| StoreError::Corrupt(format!("unknown source '{s}'")))
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect and run the embedded migrations.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await?;
        let store = Self::new(pool);
        store.migrate().await?;
        Ok(store)
    }

    /// Run the embedded SQL migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        info!("Store migrations applied");
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl SignalStore for PgStore {
    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn list_topics(&self) -> Result<Vec<Topic>> {
        let rows = sqlx::query_as::<_, TopicRow>("SELECT * FROM topics ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(Topic::from).collect())
    }

    async fn get_topic(&self, id: &str) -> Result<Option<Topic>> {
        let row = sqlx::query_as::<_, TopicRow>("SELECT * FROM topics WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Topic::from))
    }

    async fn upsert_topics(&self, topics: &[Topic]) -> Result<usize> {
        let mut tx = self.pool.begin().await?;
        for t in topics {
            sqlx::query(
                r#"
                INSERT INTO topics (id, name, description, keywords, created_at, updated_at)
                VALUES ($1, $2, $3, $4, $5, $6)
                ON CONFLICT (id) DO UPDATE SET
                    name = EXCLUDED.name,
                    description = EXCLUDED.description,
                    keywords = EXCLUDED.keywords,
                    updated_at = now()
                "#,
            )
            .bind(&t.id)
            .bind(&t.name)
            .bind(&t.description)
            .bind(&t.keywords)
            .bind(t.created_at)
            .bind(t.updated_at)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(topics.len())
    }

    async fn upsert_events(&self, events: &[SignalEvent]) -> Result<usize> {
        let mut tx = self.pool.begin().await?;
        let mut written = 0;
        for e in events {
            let result = sqlx::query(
                r#"
                INSERT INTO signal_events
                    (id, source, source_id, topic_id, title, url, description,
                     occurred_at, magnitude, metadata, created_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
                ON CONFLICT (source, source_id) DO UPDATE SET
                    topic_id = COALESCE(EXCLUDED.topic_id, signal_events.topic_id),
                    title = EXCLUDED.title,
                    url = EXCLUDED.url,
                    description = EXCLUDED.description,
                    occurred_at = EXCLUDED.occurred_at,
                    magnitude = EXCLUDED.magnitude,
                    metadata = EXCLUDED.metadata
                "#,
            )
            .bind(&e.id)
            .bind(e.source.as_str())
            .bind(&e.source_id)
            .bind(&e.topic_id)
            .bind(&e.title)
            .bind(&e.url)
            .bind(&e.description)
            .bind(e.timestamp)
            .bind(e.magnitude)
            .bind(serde_json::Value::Object(e.metadata.clone()))
            .bind(e.created_at)
            .execute(&mut *tx)
            .await?;
            written += result.rows_affected() as usize;
        }
        tx.commit().await?;
        Ok(written)
    }

    async fn list_events(&self, filter: &SignalFilter) -> Result<EventPage> {
        let source = filter.source.map(|s| s.as_str());
        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM signal_events
            WHERE ($1::text IS NULL OR topic_id = $1)
              AND ($2::text IS NULL OR source = $2)
              AND ($3::timestamptz IS NULL OR occurred_at >= $3)
              AND ($4::timestamptz IS NULL OR occurred_at <= $4)
              AND ($5::float8 IS NULL OR magnitude >= $5)
            "#,
        )
        .bind(&filter.topic_id)
        .bind(source)
        .bind(filter.start)
        .bind(filter.end)
        .bind(filter.min_magnitude)
        .fetch_one(&self.pool)
        .await?;

        let rows = sqlx::query_as::<_, EventRow>(
            r#"
            SELECT * FROM signal_events
            WHERE ($1::text IS NULL OR topic_id = $1)
              AND ($2::text IS NULL OR source = $2)
              AND ($3::timestamptz IS NULL OR occurred_at >= $3)
              AND ($4::timestamptz IS NULL OR occurred_at <= $4)
              AND ($5::float8 IS NULL OR magnitude >= $5)
            ORDER BY occurred_at DESC, id ASC
            LIMIT $6 OFFSET $7
            "#,
        )
        .bind(&filter.topic_id)
        .bind(source)
        .bind(filter.start)
        .bind(filter.end)
        .bind(filter.min_magnitude)
        .bind(filter.limit as i64)
        .bind(filter.offset as i64)
        .fetch_all(&self.pool)
        .await?;

        let events = rows
            .into_iter()
            .map(SignalEvent::try_from)
            .collect::<Result<Vec<_>>>()?;
        Ok(EventPage {
            events,
            total: total.max(0) as u64,
        })
    }

    async fn get_event(&self, id: &str) -> Result<Option<SignalEvent>> {
        let row = sqlx::query_as::<_, EventRow>("SELECT * FROM signal_events WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(SignalEvent::try_from).transpose()
    }

    async fn unmapped_events(&self, limit: u32, offset: u32) -> Result<Vec<SignalEvent>> {
        let rows = sqlx::query_as::<_, EventRow>(
            r#"
            SELECT * FROM signal_events
            WHERE topic_id IS NULL
            ORDER BY occurred_at DESC, id ASC
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(limit as i64)
        .bind(offset as i64)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(SignalEvent::try_from).collect()
    }

    async fn assign_topic(&self, event_id: &str, topic_id: &str) -> Result<()> {
        let result = sqlx::query("UPDATE signal_events SET topic_id = $2 WHERE id = $1")
            .bind(event_id)
            .bind(topic_id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("event {event_id}")));
        }
        Ok(())
    }

    async fn daily_counts(&self, topic_id: &str, since: NaiveDate) -> Result<Vec<DailyCount>> {
        let rows = sqlx::query_as::<_, DailyCountRow>(
            r#"
            SELECT (occurred_at AT TIME ZONE 'UTC')::date AS day,
                   source,
                   COUNT(*) AS count,
                   COALESCE(SUM(magnitude), 0)::float8 AS magnitude
            FROM signal_events
            WHERE topic_id = $1
              AND (occurred_at AT TIME ZONE 'UTC')::date >= $2
            GROUP BY day, source
            ORDER BY day, source
            "#,
        )
        .bind(topic_id)
        .bind(since)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|r| {
                Ok(DailyCount {
                    topic_id: topic_id.to_string(),
                    date: r.day,
                    source: parse_source(&r.source)?,
                    count: r.count.max(0) as u32,
                    magnitude: r.magnitude,
                })
            })
            .collect()
    }

    async fn replace_features(&self, topic_id: &str, rows: &[TopicFeatures]) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM topic_features WHERE topic_id = $1")
            .bind(topic_id)
            .execute(&mut *tx)
            .await?;
        for f in rows {
            sqlx::query(
                r#"
                INSERT INTO topic_features
                    (topic_id, date, mention_count_total, mention_count_arxiv,
                     mention_count_github, mention_count_jobs, mention_count_funding,
                     magnitude_sum, unique_sources, velocity, acceleration, z_spike, convergence)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
                "#,
            )
            .bind(topic_id)
            .bind(f.date)
            .bind(f.mention_count_total as i32)
            .bind(f.mention_count_arxiv as i32)
            .bind(f.mention_count_github as i32)
            .bind(f.mention_count_jobs as i32)
            .bind(f.mention_count_funding as i32)
            .bind(f.magnitude_sum)
            .bind(f.unique_sources as i32)
            .bind(f.velocity)
            .bind(f.acceleration)
            .bind(f.z_spike)
            .bind(f.convergence)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn list_features(
        &self,
        topic_id: &str,
        since: Option<NaiveDate>,
    ) -> Result<Vec<TopicFeatures>> {
        let rows = sqlx::query_as::<_, FeatureRow>(
            r#"
            SELECT * FROM topic_features
            WHERE topic_id = $1
              AND ($2::date IS NULL OR date >= $2)
            ORDER BY date
            "#,
        )
        .bind(topic_id)
        .bind(since)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(TopicFeatures::from).collect())
    }

    async fn upsert_forecast(&self, f: &TopicForecast) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO topic_forecasts
                (topic_id, horizon_days, forecast_curve, confidence_score, growth_rate,
                 model_type, model_params, model_metrics, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (topic_id, horizon_days) DO UPDATE SET
                forecast_curve = EXCLUDED.forecast_curve,
                confidence_score = EXCLUDED.confidence_score,
                growth_rate = EXCLUDED.growth_rate,
                model_type = EXCLUDED.model_type,
                model_params = EXCLUDED.model_params,
                model_metrics = EXCLUDED.model_metrics,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(&f.topic_id)
        .bind(f.horizon_days as i32)
        .bind(serde_json::to_value(&f.forecast_curve)?)
        .bind(f.confidence_score)
        .bind(f.growth_rate)
        .bind(&f.model_type)
        .bind(serde_json::Value::Object(f.model_params.clone()))
        .bind(serde_json::Value::Object(f.model_metrics.clone()))
        .bind(f.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_forecasts(&self, topic_id: &str) -> Result<Vec<TopicForecast>> {
        let rows = sqlx::query_as::<_, ForecastRow>(
            "SELECT * FROM topic_forecasts WHERE topic_id = $1 ORDER BY horizon_days",
        )
        .bind(topic_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(TopicForecast::try_from).collect()
    }

    async fn get_forecast(
        &self,
        topic_id: &str,
        horizon_days: u32,
    ) -> Result<Option<TopicForecast>> {
        let row = sqlx::query_as::<_, ForecastRow>(
            "SELECT * FROM topic_forecasts WHERE topic_id = $1 AND horizon_days = $2",
        )
        .bind(topic_id)
        .bind(horizon_days as i32)
        .fetch_optional(&self.pool)
        .await?;
        row.map(TopicForecast::try_from).transpose()
    }

    async fn stats(&self) -> Result<StoreStats> {
        let (topics, events, mapped_events, feature_rows, forecasts): (i64, i64, i64, i64, i64) =
            sqlx::query_as(
                r#"
                SELECT
                    (SELECT COUNT(*) FROM topics),
                    (SELECT COUNT(*) FROM signal_events),
                    (SELECT COUNT(*) FROM signal_events WHERE topic_id IS NOT NULL),
                    (SELECT COUNT(*) FROM topic_features),
                    (SELECT COUNT(*) FROM topic_forecasts)
                "#,
            )
            .fetch_one(&self.pool)
            .await?;

        let (earliest_event, latest_event): (Option<DateTime<Utc>>, Option<DateTime<Utc>>) =
            sqlx::query_as("SELECT MIN(occurred_at), MAX(occurred_at) FROM signal_events")
                .fetch_one(&self.pool)
                .await?;

        let events_by_source: BTreeMap<Source, u64> = self
            .source_status()
            .await?
            .into_iter()
            .map(|s| (s.source, s.event_count))
            .collect();

        Ok(StoreStats {
            topics: topics as u64,
            events: events as u64,
            mapped_events: mapped_events as u64,
            feature_rows: feature_rows as u64,
            forecasts: forecasts as u64,
            events_by_source,
            earliest_event,
            latest_event,
        })
    }

    async fn source_status(&self) -> Result<Vec<SourceStatus>> {
        let rows = sqlx::query_as::<_, SourceStatusRow>(
            r#"
            SELECT source, COUNT(*) AS event_count, MAX(occurred_at) AS latest_timestamp
            FROM signal_events
            GROUP BY source
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut by_source: BTreeMap<Source, SourceStatus> = Source::ALL
            .iter()
            .map(|s| {
                (
                    *s,
                    SourceStatus {
                        source: *s,
                        event_count: 0,
                        latest_timestamp: None,
                    },
                )
            })
            .collect();
        for r in rows {
            let source = parse_source(&r.source)?;
            by_source.insert(
                source,
                SourceStatus {
                    source,
                    event_count: r.event_count.max(0) as u64,
                    latest_timestamp: r.latest_timestamp,
                },
            );
        }
        Ok(by_source.into_values().collect())
    }

    async fn latest_event_date(&self) -> Result<Option<NaiveDate>> {
        let latest: Option<DateTime<Utc>> =
            sqlx::query_scalar("SELECT MAX(occurred_at) FROM signal_events")
                .fetch_one(&self.pool)
                .await?;
        Ok(latest.map(|t| t.date_naive()))
    }

    async fn data_revision(&self) -> Result<u64> {
        let revision: i64 = sqlx::query_scalar("SELECT revision FROM data_revision WHERE id")
            .fetch_one(&self.pool)
            .await?;
        Ok(revision as u64)
    }

    async fn reset_signals(&self) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM topic_forecasts").execute(&mut *tx).await?;
        sqlx::query("DELETE FROM topic_features").execute(&mut *tx).await?;
        sqlx::query("DELETE FROM signal_events").execute(&mut *tx).await?;
        tx.commit().await?;
        info!("Signal data reset");
        Ok(())
    }
}
