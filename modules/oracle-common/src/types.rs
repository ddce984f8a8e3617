use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::OracleError;

/// Free-form metadata attached to a signal. Validated at the boundary only.
pub type Metadata = serde_json::Map<String, serde_json::Value>;

// --- Sources ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    Arxiv,
    Github,
    Jobs,
    Funding,
}

impl Source {
    /// Every source, in column order. Convergence is measured against this set.
    pub const ALL: [Source; 4] = [Source::Arxiv, Source::Github, Source::Jobs, Source::Funding];

    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Arxiv => "arxiv",
            Source::Github => "github",
            Source::Jobs => "jobs",
            Source::Funding => "funding",
        }
    }

    /// Position in [`Source::ALL`].
    pub fn index(&self) -> usize {
        match self {
            Source::Arxiv => 0,
            Source::Github => 1,
            Source::Jobs => 2,
            Source::Funding => 3,
        }
    }
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Source {
    type Err = OracleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "arxiv" => Ok(Source::Arxiv),
            "github" => Ok(Source::Github),
            "jobs" => Ok(Source::Jobs),
            "funding" => Ok(Source::Funding),
            other => Err(OracleError::Validation(format!("unknown source: {other}"))),
        }
    }
}

// --- Topics and signals ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Topic {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub keywords: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Topic {
    pub fn new(id: impl Into<String>, name: impl Into<String>, keywords: Vec<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            name: name.into(),
            description: None,
            keywords,
            created_at: now,
            updated_at: now,
        }
    }
}

/// A single observation from one source, optionally mapped to a topic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalEvent {
    pub id: String,
    pub source: Source,
    pub source_id: String,
    pub topic_id: Option<String>,
    pub title: String,
    pub url: Option<String>,
    pub description: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub magnitude: f64,
    #[serde(default)]
    pub metadata: Metadata,
    pub created_at: DateTime<Utc>,
}

/// Query filter for listing signal events.
#[derive(Debug, Clone, Default)]
pub struct SignalFilter {
    pub topic_id: Option<String>,
    pub source: Option<Source>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub min_magnitude: Option<f64>,
    pub limit: u32,
    pub offset: u32,
}

/// One row per topic/day/source. `count` is the number of events that day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyCount {
    pub topic_id: String,
    pub date: NaiveDate,
    pub source: Source,
    pub count: u32,
    /// Sum of event magnitudes for the same row.
    #[serde(default)]
    pub magnitude: f64,
}

// --- Derived metrics ---

/// Per-topic, per-date features. Rewritten whole on every rebuild.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicFeatures {
    pub topic_id: String,
    pub date: NaiveDate,
    pub mention_count_total: u32,
    pub mention_count_arxiv: u32,
    pub mention_count_github: u32,
    pub mention_count_jobs: u32,
    pub mention_count_funding: u32,
    pub magnitude_sum: f64,
    pub unique_sources: u32,
    pub velocity: f64,
    pub acceleration: f64,
    pub z_spike: f64,
    pub convergence: f64,
}

impl TopicFeatures {
    pub fn mention_count(&self, source: Source) -> u32 {
        match source {
            Source::Arxiv => self.mention_count_arxiv,
            Source::Github => self.mention_count_github,
            Source::Jobs => self.mention_count_jobs,
            Source::Funding => self.mention_count_funding,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    pub date: NaiveDate,
    pub yhat: f64,
    pub yhat_lower: Option<f64>,
    pub yhat_upper: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicForecast {
    pub topic_id: String,
    pub horizon_days: u32,
    pub forecast_curve: Vec<ForecastPoint>,
    pub confidence_score: f64,
    pub growth_rate: f64,
    pub model_type: String,
    #[serde(default)]
    pub model_params: Metadata,
    #[serde(default)]
    pub model_metrics: Metadata,
    pub updated_at: DateTime<Utc>,
}

/// The four explainable inputs of the surge score.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SurgeBreakdown {
    pub velocity_growth: f64,
    pub z_spike: f64,
    pub convergence: f64,
    pub uncertainty_penalty: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurgeScore {
    pub topic_id: String,
    pub score: f64,
    pub score_pct: f64,
    pub breakdown: SurgeBreakdown,
}
