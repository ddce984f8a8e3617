use anyhow::Context;
use async_trait::async_trait;
use chrono::{Duration, NaiveDate, Utc};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};

use oracle_common::Source;

use super::{http_client, SignalClient};
use crate::error::{IngestError, Result};
use crate::raw::{RawFundingRound, RawSignal};

const CRUNCHBASE_SEARCH_URL: &str = "https://api.crunchbase.com/v4/searches/funding_rounds";
const SEARCH_LIMIT: u32 = 100;

/// Crunchbase funding-round search. Without an API key it fetches nothing.
pub struct FundingClient {
    client: reqwest::Client,
    api_key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    entities: Vec<Entity>,
}

#[derive(Debug, Deserialize)]
struct Entity {
    #[serde(default)]
    properties: Properties,
}

#[derive(Debug, Default, Deserialize)]
struct Properties {
    identifier: Option<Identifier>,
    short_description: Option<String>,
    funding_type: Option<String>,
    money_raised: Option<Money>,
    announced_on: Option<AnnouncedOn>,
    #[serde(default)]
    investor_identifiers: Vec<Identifier>,
    organization_identifier: Option<Identifier>,
}

#[derive(Debug, Deserialize)]
struct Identifier {
    uuid: Option<String>,
    #[serde(alias = "value")]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Money {
    value: Option<f64>,
    currency_code: Option<String>,
}

/// Crunchbase sends either a bare date or `{ "value": date, "precision": .. }`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum AnnouncedOn {
    Plain(NaiveDate),
    Wrapped { value: NaiveDate },
}

impl AnnouncedOn {
    fn date(&self) -> NaiveDate {
        match self {
            AnnouncedOn::Plain(d) | AnnouncedOn::Wrapped { value: d } => *d,
        }
    }
}

impl Properties {
    fn into_round(self) -> Option<RawFundingRound> {
        let uuid = self.identifier.and_then(|i| i.uuid).filter(|u| !u.is_empty())?;
        let announced_on = self.announced_on.as_ref()?.date();
        Some(RawFundingRound {
            uuid,
            company: self
                .organization_identifier
                .and_then(|o| o.name)
                .unwrap_or_else(|| "Unknown Company".to_string()),
            funding_type: self.funding_type.filter(|t| !t.is_empty()),
            amount: self.money_raised.as_ref().and_then(|m| m.value),
            currency: self.money_raised.and_then(|m| m.currency_code),
            description: self.short_description.filter(|d| !d.is_empty()),
            investors: self
                .investor_identifiers
                .into_iter()
                .filter_map(|i| i.name)
                .collect(),
            announced_on,
        })
    }
}

impl FundingClient {
    pub fn new(api_key: Option<String>) -> Result<Self> {
        Ok(Self {
            client: http_client(30)?,
            api_key: api_key.filter(|k| !k.is_empty()),
        })
    }
}

#[async_trait]
impl SignalClient for FundingClient {
    fn source(&self) -> Source {
        Source::Funding
    }

    async fn fetch(&self, days: u32) -> Result<Vec<RawSignal>> {
        let Some(api_key) = &self.api_key else {
            debug!("funding: no Crunchbase key configured, skipping");
            return Ok(Vec::new());
        };

        let since = (Utc::now() - Duration::days(days as i64)).date_naive();
        let body = json!({
            "field_ids": [
                "identifier", "short_description", "funding_type", "money_raised",
                "announced_on", "investor_identifiers", "organization_identifier"
            ],
            "query": [{
                "type": "predicate",
                "field_id": "announced_on",
                "operator_id": "gte",
                "values": [since.to_string()]
            }],
            "order": [{ "field_id": "announced_on", "sort": "desc" }],
            "limit": SEARCH_LIMIT,
        });

        let resp = self
            .client
            .post(CRUNCHBASE_SEARCH_URL)
            .header("X-cb-user-key", api_key)
            .header("Accept", "application/json")
            .json(&body)
            .send()
            .await
            .context("Crunchbase search failed")?;
        if !resp.status().is_success() {
            return Err(IngestError::Status {
                service: "crunchbase",
                status: resp.status(),
            });
        }

        let bytes = resp.bytes().await.context("Failed to read Crunchbase response body")?;
        let rounds = parse_rounds(&bytes)?;
        info!(rounds = rounds.len(), "funding: search complete");
        Ok(rounds.into_iter().map(RawSignal::Funding).collect())
    }
}

/// Entities without an identifier or announcement date are dropped.
pub(crate) fn parse_rounds(bytes: &[u8]) -> Result<Vec<RawFundingRound>> {
    let body: SearchResponse =
        serde_json::from_slice(bytes).context("Failed to decode Crunchbase response")?;
    Ok(body
        .entities
        .into_iter()
        .filter_map(|e| e.properties.into_round())
        .collect())
}
