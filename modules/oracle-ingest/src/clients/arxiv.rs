use anyhow::Context;
use async_trait::async_trait;
use chrono::{Duration, Utc};
use tracing::{info, warn};

use oracle_common::Source;

use super::{http_client, squash_whitespace, SignalClient};
use crate::error::Result;
use crate::raw::{RawPaper, RawSignal};

const ARXIV_API_URL: &str = "http://export.arxiv.org/api/query";
const MAX_RESULTS: u32 = 100;

/// arXiv Atom API, one query per category.
pub struct ArxivClient {
    client: reqwest::Client,
    categories: Vec<String>,
    max_results: u32,
}

impl ArxivClient {
    pub fn new(categories: Vec<String>) -> Result<Self> {
        Ok(Self {
            client: http_client(30)?,
            categories,
            max_results: MAX_RESULTS,
        })
    }

    async fn fetch_category(&self, category: &str, days: u32) -> Result<Vec<RawPaper>> {
        let now = Utc::now();
        let start = now - Duration::days(days as i64);
        let query = format!(
            "cat:{} AND submittedDate:[{} TO {}]",
            category,
            start.format("%Y%m%d%H%M%S"),
            now.format("%Y%m%d%H%M%S")
        );
        let max_results = self.max_results.min(MAX_RESULTS).to_string();

        let resp = self
            .client
            .get(ARXIV_API_URL)
            .query(&[
                ("search_query", query.as_str()),
                ("start", "0"),
                ("max_results", max_results.as_str()),
                ("sortBy", "submittedDate"),
                ("sortOrder", "descending"),
            ])
            .send()
            .await
            .context("arXiv query failed")?
            .error_for_status()?;

        let bytes = resp.bytes().await.context("Failed to read arXiv response body")?;
        let papers = parse_papers(&bytes)?;
        info!(category, papers = papers.len(), "arxiv: parsed successfully");
        Ok(papers)
    }
}

#[async_trait]
impl SignalClient for ArxivClient {
    fn source(&self) -> Source {
        Source::Arxiv
    }

    async fn fetch(&self, days: u32) -> Result<Vec<RawSignal>> {
        let mut out = Vec::new();
        for category in &self.categories {
            match self.fetch_category(category, days).await {
                Ok(papers) => out.extend(papers.into_iter().map(RawSignal::Paper)),
                Err(e) => {
                    warn!(category = category.as_str(), error = %e, "arxiv: category fetch failed")
                }
            }
        }
        Ok(out)
    }
}

/// Parse an arXiv Atom response. Entries without a timestamp are skipped.
pub(crate) fn parse_papers(bytes: &[u8]) -> Result<Vec<RawPaper>> {
    let feed = feed_rs::parser::parse(bytes).context("Failed to parse arXiv Atom feed")?;

    Ok(feed
        .entries
        .into_iter()
        .filter_map(|entry| {
            let published = entry.published.or(entry.updated)?;
            let id = entry
                .id
                .trim_end_matches('/')
                .rsplit('/')
                .next()
                .unwrap_or_default()
                .to_string();
            if id.is_empty() {
                return None;
            }
            let url = entry
                .links
                .iter()
                .find(|l| l.media_type.as_deref() != Some("application/pdf"))
                .or_else(|| entry.links.first())
                .map(|l| l.href.clone());
            let categories: Vec<String> = entry.categories.iter().map(|c| c.term.clone()).collect();

            Some(RawPaper {
                id,
                title: entry
                    .title
                    .map(|t| squash_whitespace(&t.content))
                    .unwrap_or_default(),
                summary: entry
                    .summary
                    .map(|s| squash_whitespace(&s.content))
                    .unwrap_or_default(),
                authors: entry.authors.into_iter().map(|p| p.name).collect(),
                primary_category: categories.first().cloned(),
                categories,
                url,
                published,
            })
        })
        .collect())
}
