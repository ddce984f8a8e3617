use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use tracing::info;

use oracle_common::Source;

use super::{http_client, SignalClient};
use crate::error::{IngestError, Result};
use crate::raw::{RawRepo, RawSignal};

const GITHUB_SEARCH_URL: &str = "https://api.github.com/search/repositories";
const MIN_STARS: u32 = 10;
const PER_PAGE: u32 = 100;

/// GitHub repository search: repos created in the window with some traction.
pub struct GithubClient {
    client: reqwest::Client,
    token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<RepoItem>,
}

#[derive(Debug, Deserialize)]
struct RepoItem {
    full_name: String,
    name: String,
    owner: Option<Owner>,
    description: Option<String>,
    html_url: Option<String>,
    language: Option<String>,
    #[serde(default)]
    stargazers_count: u64,
    #[serde(default)]
    forks_count: u64,
    #[serde(default)]
    topics: Vec<String>,
    created_at: DateTime<Utc>,
    updated_at: Option<DateTime<Utc>>,
    pushed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct Owner {
    login: String,
}

impl From<RepoItem> for RawRepo {
    fn from(item: RepoItem) -> Self {
        Self {
            full_name: item.full_name,
            name: item.name,
            owner: item.owner.map(|o| o.login),
            description: item.description,
            html_url: item.html_url,
            language: item.language,
            stars: item.stargazers_count,
            forks: item.forks_count,
            topics: item.topics,
            created_at: item.created_at,
            updated_at: item.updated_at,
            pushed_at: item.pushed_at,
        }
    }
}

impl GithubClient {
    pub fn new(token: Option<String>) -> Result<Self> {
        Ok(Self {
            client: http_client(30)?,
            token,
        })
    }
}

#[async_trait]
impl SignalClient for GithubClient {
    fn source(&self) -> Source {
        Source::Github
    }

    async fn fetch(&self, days: u32) -> Result<Vec<RawSignal>> {
        let since = (Utc::now() - Duration::days(days as i64)).date_naive();
        let query = format!("created:>={since} stars:>{MIN_STARS}");
        let per_page = PER_PAGE.to_string();

        let mut req = self
            .client
            .get(GITHUB_SEARCH_URL)
            .header("Accept", "application/vnd.github+json")
            .query(&[
                ("q", query.as_str()),
                ("sort", "stars"),
                ("order", "desc"),
                ("per_page", per_page.as_str()),
            ]);
        if let Some(token) = &self.token {
            req = req.header("Authorization", format!("token {token}"));
        }

        let resp = req.send().await.context("GitHub search failed")?;
        if !resp.status().is_success() {
            return Err(IngestError::Status {
                service: "github",
                status: resp.status(),
            });
        }
        let bytes = resp.bytes().await.context("Failed to read GitHub response body")?;
        let repos = parse_repos(&bytes)?;

        info!(repos = repos.len(), authenticated = self.token.is_some(), "github: search complete");
        Ok(repos.into_iter().map(RawSignal::Repo).collect())
    }
}

pub(crate) fn parse_repos(bytes: &[u8]) -> Result<Vec<RawRepo>> {
    let body: SearchResponse =
        serde_json::from_slice(bytes).context("Failed to decode GitHub search response")?;
    Ok(body.items.into_iter().map(RawRepo::from).collect())
}
