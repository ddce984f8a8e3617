//! Raw source records to `SignalEvent`s, including magnitude weighting.

use chrono::{DateTime, NaiveTime, Utc};
use serde_json::{json, Value};

use oracle_common::{Metadata, SignalEvent, Source};

use crate::raw::{RawFundingRound, RawJob, RawPaper, RawRepo, RawSignal};

pub const MAX_DESCRIPTION_CHARS: usize = 1000;
const MAX_ABSTRACT_METADATA_CHARS: usize = 500;

/// Base magnitude per source before record-level boosts.
pub fn source_weight(source: Source) -> f64 {
    match source {
        Source::Arxiv => 1.0,
        Source::Github => 2.0,
        Source::Jobs => 1.5,
        Source::Funding => 3.0,
    }
}

const AI_CATEGORY_PREFIXES: [&str; 3] = ["cs.AI", "cs.LG", "stat.ML"];

pub fn paper_magnitude(paper: &RawPaper) -> f64 {
    let ai = paper
        .categories
        .iter()
        .any(|c| AI_CATEGORY_PREFIXES.iter().any(|p| c.starts_with(p)));
    source_weight(Source::Arxiv) * if ai { 1.5 } else { 1.0 }
}

pub fn repo_magnitude(repo: &RawRepo) -> f64 {
    source_weight(Source::Github)
        * (1.0 + repo.stars as f64 / 1000.0)
        * (1.0 + repo.forks as f64 / 100.0)
}

pub fn job_magnitude(job: &RawJob) -> f64 {
    let mut magnitude = source_weight(Source::Jobs);
    if let Some(salary) = &job.salary {
        let thousands = salary.contains('k') || salary.contains('K') || salary.contains("000");
        if salary.contains('$') && thousands {
            magnitude *= 1.5;
        }
    }
    if job.location.to_lowercase().contains("remote") {
        magnitude *= 1.2;
    }
    magnitude
}

pub fn funding_magnitude(round: &RawFundingRound) -> f64 {
    let amount_factor = match round.amount {
        Some(amount) => 1.0 + amount.max(1000.0).log10() / 10.0,
        None => 1.0,
    };
    let kind = round.funding_type.as_deref().unwrap_or_default().to_lowercase();
    let type_boost = if kind.contains("series") {
        2.0
    } else if kind.contains("seed") {
        1.5
    } else {
        1.0
    };
    source_weight(Source::Funding) * amount_factor * type_boost
}

fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

fn non_empty(text: &str) -> Option<String> {
    let trimmed = text.trim();
    (!trimmed.is_empty()).then(|| truncate_chars(trimmed, MAX_DESCRIPTION_CHARS))
}

fn metadata(value: Value) -> Metadata {
    match value {
        Value::Object(map) => map,
        _ => Metadata::new(),
    }
}

/// Stateless converter. Events come out unmapped (`topic_id = None`).
#[derive(Debug, Clone, Copy, Default)]
pub struct Normalizer;

impl Normalizer {
    pub fn new() -> Self {
        Self
    }

    pub fn normalize(&self, raw: &RawSignal, now: DateTime<Utc>) -> SignalEvent {
        match raw {
            RawSignal::Paper(p) => self.paper(p, now),
            RawSignal::Repo(r) => self.repo(r, now),
            RawSignal::Job(j) => self.job(j, now),
            RawSignal::Funding(f) => self.funding(f, now),
        }
    }

    pub fn normalize_all(&self, raws: &[RawSignal], now: DateTime<Utc>) -> Vec<SignalEvent> {
        raws.iter().map(|r| self.normalize(r, now)).collect()
    }

    fn paper(&self, paper: &RawPaper, now: DateTime<Utc>) -> SignalEvent {
        SignalEvent {
            id: format!("arxiv:{}", paper.id),
            source: Source::Arxiv,
            source_id: paper.id.clone(),
            topic_id: None,
            title: paper.title.clone(),
            url: paper.url.clone(),
            description: non_empty(&paper.summary),
            timestamp: paper.published,
            magnitude: paper_magnitude(paper),
            metadata: metadata(json!({
                "authors": paper.authors,
                "categories": paper.categories,
                "primary_category": paper.primary_category,
                "abstract": truncate_chars(&paper.summary, MAX_ABSTRACT_METADATA_CHARS),
            })),
            created_at: now,
        }
    }

    fn repo(&self, repo: &RawRepo, now: DateTime<Utc>) -> SignalEvent {
        SignalEvent {
            id: format!("github:{}", repo.full_name),
            source: Source::Github,
            source_id: repo.full_name.clone(),
            topic_id: None,
            title: repo.name.clone(),
            url: repo.html_url.clone(),
            description: repo.description.as_deref().and_then(non_empty),
            timestamp: repo.activity_at(),
            magnitude: repo_magnitude(repo),
            metadata: metadata(json!({
                "full_name": repo.full_name,
                "owner": repo.owner,
                "language": repo.language,
                "stars": repo.stars,
                "forks": repo.forks,
                "topics": repo.topics,
                "created_at": repo.created_at,
            })),
            created_at: now,
        }
    }

    fn job(&self, job: &RawJob, now: DateTime<Utc>) -> SignalEvent {
        SignalEvent {
            id: format!("jobs:{}", job.id),
            source: Source::Jobs,
            source_id: job.id.clone(),
            topic_id: None,
            title: job.title.clone(),
            url: job.url.clone(),
            description: non_empty(&job.description),
            timestamp: job.published,
            magnitude: job_magnitude(job),
            metadata: metadata(json!({
                "company": job.company,
                "location": job.location,
                "salary": job.salary,
                "keywords": job.tech_keywords,
                "feed": job.feed_url,
            })),
            created_at: now,
        }
    }

    fn funding(&self, round: &RawFundingRound, now: DateTime<Utc>) -> SignalEvent {
        let title = match &round.funding_type {
            Some(kind) => format!("{} - {}", round.company, kind),
            None => round.company.clone(),
        };
        SignalEvent {
            id: format!("funding:{}", round.uuid),
            source: Source::Funding,
            source_id: round.uuid.clone(),
            topic_id: None,
            title,
            url: Some(format!("https://www.crunchbase.com/funding_round/{}", round.uuid)),
            description: round.description.as_deref().and_then(non_empty),
            timestamp: round.announced_on.and_time(NaiveTime::MIN).and_utc(),
            magnitude: funding_magnitude(round),
            metadata: metadata(json!({
                "company": round.company,
                "funding_type": round.funding_type,
                "amount": round.amount,
                "currency": round.currency,
                "investors": round.investors,
            })),
            created_at: now,
        }
    }
}
