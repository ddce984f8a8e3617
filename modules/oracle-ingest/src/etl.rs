//! Fetch -> normalize -> map -> upsert, one source at a time.

use std::collections::BTreeMap;

use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};

use oracle_common::{Config, Source};
use oracle_store::SignalStore;

use crate::clients::{ArxivClient, FundingClient, GithubClient, JobsFeedClient, SignalClient};
use crate::error::Result;
use crate::normalizer::Normalizer;
use crate::topic_mapper::TopicMapper;

/// Events already stored without a topic are re-mapped in batches of this size.
const REMAP_BATCH: u32 = 500;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SourceOutcome {
    pub fetched: usize,
    pub mapped: usize,
    pub stored: usize,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EtlReport {
    pub sources: BTreeMap<Source, SourceOutcome>,
    /// Previously unmapped events that now have a topic.
    pub remapped: usize,
}

impl EtlReport {
    pub fn stored(&self) -> usize {
        self.sources.values().map(|s| s.stored).sum()
    }

    pub fn failed_sources(&self) -> Vec<Source> {
        self.sources
            .iter()
            .filter(|(_, o)| o.error.is_some())
            .map(|(s, _)| *s)
            .collect()
    }
}

pub struct EtlRunner {
    clients: Vec<Box<dyn SignalClient>>,
    normalizer: Normalizer,
    mapper: TopicMapper,
}

impl EtlRunner {
    pub fn new(clients: Vec<Box<dyn SignalClient>>, mapper: TopicMapper) -> Self {
        Self {
            clients,
            normalizer: Normalizer::new(),
            mapper,
        }
    }

    /// All four live clients, configured from `config`.
    pub fn from_config(config: &Config, mapper: TopicMapper) -> Result<Self> {
        let clients: Vec<Box<dyn SignalClient>> = vec![
            Box::new(ArxivClient::new(config.arxiv_categories.clone())?),
            Box::new(GithubClient::new(config.github_token.clone())?),
            Box::new(JobsFeedClient::new(config.jobs_feed_urls.clone())?),
            Box::new(FundingClient::new(config.crunchbase_api_key.clone())?),
        ];
        Ok(Self::new(clients, mapper))
    }

    /// Run every client. A failing source is logged and recorded in the
    /// report; the others still run. Store failures abort the run.
    pub async fn run(&self, store: &dyn SignalStore, days: u32) -> Result<EtlReport> {
        let mut report = EtlReport::default();

        for client in &self.clients {
            let source = client.source();
            let raws = match client.fetch(days).await {
                Ok(raws) => raws,
                Err(e) => {
                    warn!(source = %source, error = %e, "ETL: source fetch failed, skipping");
                    report.sources.insert(
                        source,
                        SourceOutcome {
                            error: Some(e.to_string()),
                            ..Default::default()
                        },
                    );
                    continue;
                }
            };

            let mut events = self.normalizer.normalize_all(&raws, Utc::now());
            let mapped = self.mapper.assign_all(&mut events);
            let stored = store.upsert_events(&events).await?;

            info!(source = %source, fetched = raws.len(), mapped, stored, "ETL: source complete");
            report.sources.insert(
                source,
                SourceOutcome {
                    fetched: raws.len(),
                    mapped,
                    stored,
                    error: None,
                },
            );
        }

        report.remapped = self.remap_unmapped(store).await?;
        info!(
            stored = report.stored(),
            remapped = report.remapped,
            failed = report.failed_sources().len(),
            "ETL run complete"
        );
        Ok(report)
    }

    /// Assign topics to stored events that have none. Returns how many were
    /// assigned. Events no topic matches stay unmapped.
    pub async fn remap_unmapped(&self, store: &dyn SignalStore) -> Result<usize> {
        let mut scanned = 0;
        let mut assigned = 0;
        // Assigned events leave the unmapped set, so the offset only has to
        // skip the ones that still match nothing.
        let mut unmatched: u32 = 0;
        loop {
            let batch = store.unmapped_events(REMAP_BATCH, unmatched).await?;
            for event in &batch {
                match self.mapper.map_event(event) {
                    Some(topic_id) => {
                        store.assign_topic(&event.id, &topic_id).await?;
                        assigned += 1;
                    }
                    None => unmatched += 1,
                }
            }
            scanned += batch.len();
            if batch.len() < REMAP_BATCH as usize {
                break;
            }
        }
        if scanned > 0 {
            info!(scanned, assigned, "ETL: re-mapped stored events");
        }
        Ok(assigned)
    }
}
