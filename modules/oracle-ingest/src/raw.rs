//! Source records as fetched, before normalization.

use chrono::{DateTime, NaiveDate, Utc};

use oracle_common::Source;

/// A record from one upstream source. The normalizer turns it into a
/// `SignalEvent`.
#[derive(Debug, Clone, PartialEq)]
pub enum RawSignal {
    Paper(RawPaper),
    Repo(RawRepo),
    Job(RawJob),
    Funding(RawFundingRound),
}

impl RawSignal {
    pub fn source(&self) -> Source {
        match self {
            RawSignal::Paper(_) => Source::Arxiv,
            RawSignal::Repo(_) => Source::Github,
            RawSignal::Job(_) => Source::Jobs,
            RawSignal::Funding(_) => Source::Funding,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RawPaper {
    /// arXiv identifier, e.g. `2401.01234v1`.
    pub id: String,
    pub title: String,
    pub summary: String,
    pub authors: Vec<String>,
    pub categories: Vec<String>,
    pub primary_category: Option<String>,
    pub url: Option<String>,
    pub published: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RawRepo {
    /// `owner/name`.
    pub full_name: String,
    pub name: String,
    pub owner: Option<String>,
    pub description: Option<String>,
    pub html_url: Option<String>,
    pub language: Option<String>,
    pub stars: u64,
    pub forks: u64,
    pub topics: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub pushed_at: Option<DateTime<Utc>>,
}

impl RawRepo {
    /// Latest activity: push, then update, then creation.
    pub fn activity_at(&self) -> DateTime<Utc> {
        self.pushed_at.or(self.updated_at).unwrap_or(self.created_at)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RawJob {
    pub id: String,
    pub title: String,
    pub company: Option<String>,
    pub description: String,
    pub url: Option<String>,
    pub location: String,
    pub salary: Option<String>,
    pub tech_keywords: Vec<String>,
    pub feed_url: String,
    pub published: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RawFundingRound {
    pub uuid: String,
    pub company: String,
    pub funding_type: Option<String>,
    pub amount: Option<f64>,
    pub currency: Option<String>,
    pub description: Option<String>,
    pub investors: Vec<String>,
    pub announced_on: NaiveDate,
}
