//! Upstream source clients.

mod arxiv;
mod funding;
mod github;
mod jobs;

use std::time::Duration;

use async_trait::async_trait;

use oracle_common::Source;

use crate::error::Result;
use crate::raw::RawSignal;

pub use arxiv::ArxivClient;
pub use funding::FundingClient;
pub use github::GithubClient;
pub use jobs::JobsFeedClient;

pub(crate) const USER_AGENT: &str = "oracle-ingest/0.1";

/// Fetches recent records from one upstream source.
#[async_trait]
pub trait SignalClient: Send + Sync {
    fn source(&self) -> Source;

    /// Records from the last `days` days.
    async fn fetch(&self, days: u32) -> Result<Vec<RawSignal>>;
}

pub(crate) fn http_client(timeout_secs: u64) -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .user_agent(USER_AGENT)
        .build()?)
}

/// Collapse runs of whitespace (arXiv titles wrap across lines).
pub(crate) fn squash_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
