use std::sync::LazyLock;

use anyhow::Context;
use async_trait::async_trait;
use chrono::{Duration, Utc};
use regex::Regex;
use tracing::{info, warn};

use oracle_common::Source;

use super::{http_client, squash_whitespace, SignalClient};
use crate::error::Result;
use crate::raw::{RawJob, RawSignal};

const UNKNOWN_LOCATION: &str = "Location Not Specified";

/// (needle, display name), first hit wins.
const LOCATIONS: &[(&str, &str)] = &[
    ("remote", "Remote"),
    ("on-site", "On-Site"),
    ("hybrid", "Hybrid"),
    ("new york", "New York"),
    ("san francisco", "San Francisco"),
    ("london", "London"),
    ("seattle", "Seattle"),
    ("austin", "Austin"),
    ("boston", "Boston"),
    ("palo alto", "Palo Alto"),
    ("mountain view", "Mountain View"),
];

const TECH_KEYWORDS: &[&str] = &[
    "python", "javascript", "typescript", "rust", "golang", "react", "angular", "vue",
    "node.js", "django", "flask", "fastapi", "machine learning", "ai",
    "artificial intelligence", "data science", "deep learning", "computer vision", "nlp",
    "natural language processing", "llm", "blockchain", "cryptocurrency", "web3", "defi",
    "cloud", "aws", "azure", "gcp", "docker", "kubernetes", "microservices", "graphql",
    "frontend", "backend", "full stack", "fullstack", "mobile", "ios", "android",
    "react native", "sql", "nosql", "postgresql", "mongodb", "devops", "ci/cd",
];

static SALARY_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"\$[\d,]+(?:k|K)?(?:-\$[\d,]+(?:k|K)?)?",
        r"(?i)\$[\d,]+(?:-\$[\d,]+)?\s*(?:per\s+year|annually|year)",
        r"(?i)\$[\d,]+(?:-\$[\d,]+)?\s*(?:per\s+hour|hourly)",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("Invalid salary regex"))
    .collect()
});

static TECH_PATTERNS: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
    TECH_KEYWORDS
        .iter()
        .map(|kw| {
            let pattern = format!(r"\b{}\b", regex::escape(kw));
            (*kw, Regex::new(&pattern).expect("Invalid keyword regex"))
        })
        .collect()
});

static HTML_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]+>").expect("Invalid HTML tag regex"));

/// Job-board RSS feeds.
pub struct JobsFeedClient {
    client: reqwest::Client,
    feed_urls: Vec<String>,
}

impl JobsFeedClient {
    pub fn new(feed_urls: Vec<String>) -> Result<Self> {
        Ok(Self {
            client: http_client(30)?,
            feed_urls,
        })
    }

    async fn fetch_feed(&self, feed_url: &str, days: u32) -> Result<Vec<RawJob>> {
        let resp = self
            .client
            .get(feed_url)
            .send()
            .await
            .context("Jobs feed fetch failed")?
            .error_for_status()?;

        let bytes = resp.bytes().await.context("Failed to read jobs feed body")?;
        let cutoff = Utc::now() - Duration::days(days as i64);
        let jobs: Vec<RawJob> = parse_jobs(&bytes, feed_url)?
            .into_iter()
            .filter(|job| job.published >= cutoff)
            .collect();

        info!(feed_url, jobs = jobs.len(), "jobs: feed parsed successfully");
        Ok(jobs)
    }
}

#[async_trait]
impl SignalClient for JobsFeedClient {
    fn source(&self) -> Source {
        Source::Jobs
    }

    async fn fetch(&self, days: u32) -> Result<Vec<RawSignal>> {
        let mut out = Vec::new();
        for feed_url in &self.feed_urls {
            match self.fetch_feed(feed_url, days).await {
                Ok(jobs) => out.extend(jobs.into_iter().map(RawSignal::Job)),
                Err(e) => {
                    warn!(feed_url = feed_url.as_str(), error = %e, "jobs: feed fetch failed")
                }
            }
        }
        Ok(out)
    }
}

/// Parse an RSS/Atom job feed. Entries without a timestamp are skipped.
pub(crate) fn parse_jobs(bytes: &[u8], feed_url: &str) -> Result<Vec<RawJob>> {
    let feed = feed_rs::parser::parse(bytes).context("Failed to parse jobs feed")?;

    Ok(feed
        .entries
        .into_iter()
        .filter_map(|entry| {
            let published = entry.published.or(entry.updated)?;
            let url = entry.links.first().map(|l| l.href.clone());
            let title = entry
                .title
                .map(|t| squash_whitespace(&t.content))
                .unwrap_or_default();
            let raw_description = entry
                .summary
                .map(|s| s.content)
                .or_else(|| entry.content.and_then(|c| c.body))
                .unwrap_or_default();
            let description = squash_whitespace(&HTML_TAG.replace_all(&raw_description, " "));

            let id = url
                .as_deref()
                .and_then(last_path_segment)
                .unwrap_or_else(|| entry.id.clone());
            if id.is_empty() {
                return None;
            }

            Some(RawJob {
                id,
                company: extract_company(&title),
                location: extract_location(&title, &description).to_string(),
                salary: extract_salary(&description),
                tech_keywords: extract_tech_keywords(&title, &description),
                title,
                description,
                url,
                feed_url: feed_url.to_string(),
                published,
            })
        })
        .collect())
}

fn last_path_segment(link: &str) -> Option<String> {
    let parsed = url::Url::parse(link).ok()?;
    parsed
        .path_segments()?
        .filter(|s| !s.is_empty())
        .last()
        .map(str::to_string)
}

/// "Senior Engineer at Acme" -> "Acme".
pub(crate) fn extract_company(title: &str) -> Option<String> {
    let lower = title.to_lowercase();
    let idx = lower.rfind(" at ")?;
    let company = title.get(idx + 4..)?.trim();
    (!company.is_empty()).then(|| company.to_string())
}

pub(crate) fn extract_location(title: &str, description: &str) -> &'static str {
    let text = format!("{title} {description}").to_lowercase();
    LOCATIONS
        .iter()
        .find(|(needle, _)| text.contains(needle))
        .map(|(_, name)| *name)
        .unwrap_or(UNKNOWN_LOCATION)
}

pub(crate) fn extract_salary(description: &str) -> Option<String> {
    SALARY_PATTERNS
        .iter()
        .find_map(|re| re.find(description))
        .map(|m| m.as_str().to_string())
}

pub(crate) fn extract_tech_keywords(title: &str, description: &str) -> Vec<String> {
    let text = format!("{title} {description}").to_lowercase();
    TECH_PATTERNS
        .iter()
        .filter(|(_, re)| re.is_match(&text))
        .map(|(kw, _)| kw.to_string())
        .collect()
}
