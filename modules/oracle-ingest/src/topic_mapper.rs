//! Keyword topic catalog and event-to-topic assignment.

use std::path::Path;

use regex::Regex;
use serde::Deserialize;
use tracing::info;

use oracle_common::{SignalEvent, Topic};

use crate::error::{IngestError, Result};

const EMBEDDED_CATALOG: &str = include_str!("../data/topic_keywords.json");

/// Metadata keys whose values are folded into the matched text.
const METADATA_KEYS: [&str; 4] = ["topics", "keywords", "categories", "language"];

const EXACT_SCORE: f64 = 1.0;
const WORD_SCORE: f64 = 0.8;

#[derive(Debug, Deserialize)]
struct CatalogFile {
    topics: Vec<CatalogEntry>,
}

#[derive(Debug, Deserialize)]
struct CatalogEntry {
    id: String,
    name: String,
    description: Option<String>,
    #[serde(default)]
    keywords: Vec<String>,
}

/// Parse a topic catalog (`{"topics": [{id, name, description?, keywords}]}`).
pub fn parse_catalog(json: &str) -> Result<Vec<Topic>> {
    let file: CatalogFile =
        serde_json::from_str(json).map_err(|e| IngestError::Catalog(e.to_string()))?;
    if file.topics.is_empty() {
        return Err(IngestError::Catalog("no topics defined".into()));
    }
    Ok(file
        .topics
        .into_iter()
        .map(|entry| {
            let mut topic = Topic::new(entry.id, entry.name, entry.keywords);
            topic.description = entry.description;
            topic
        })
        .collect())
}

/// The built-in catalog, or the file at `path` when given.
pub fn load_catalog(path: Option<&Path>) -> Result<Vec<Topic>> {
    match path {
        Some(path) => {
            let json = std::fs::read_to_string(path).map_err(|e| {
                IngestError::Catalog(format!("failed to read {}: {e}", path.display()))
            })?;
            let topics = parse_catalog(&json)?;
            info!(path = %path.display(), topics = topics.len(), "Loaded topic catalog");
            Ok(topics)
        }
        None => parse_catalog(EMBEDDED_CATALOG),
    }
}

struct Keyword {
    text: String,
    /// Word-bounded match on the separator-normalized keyword.
    word: Option<Regex>,
}

impl Keyword {
    fn new(raw: &str) -> Self {
        let text = raw.trim().to_lowercase();
        let normalized = normalize_separators(&text);
        let word = (!normalized.is_empty())
            .then(|| Regex::new(&format!(r"\b{}\b", regex::escape(&normalized))).ok())
            .flatten();
        Self { text, word }
    }

    fn score(&self, content: &str, normalized_content: &str) -> Option<f64> {
        if self.text.is_empty() {
            return None;
        }
        if content.contains(&self.text) {
            return Some(EXACT_SCORE);
        }
        self.word
            .as_ref()
            .filter(|re| re.is_match(normalized_content))
            .map(|_| WORD_SCORE)
    }
}

struct TopicKeywords {
    topic_id: String,
    keywords: Vec<Keyword>,
}

/// Assigns events to the best-matching topic by keyword scoring.
pub struct TopicMapper {
    topics: Vec<TopicKeywords>,
}

impl TopicMapper {
    pub fn new(topics: &[Topic]) -> Self {
        let mut topics: Vec<TopicKeywords> = topics
            .iter()
            .map(|t| TopicKeywords {
                topic_id: t.id.clone(),
                keywords: t.keywords.iter().map(|k| Keyword::new(k)).collect(),
            })
            .collect();
        // Ties go to the lower topic id
        topics.sort_by(|a, b| a.topic_id.cmp(&b.topic_id));
        Self { topics }
    }

    pub fn len(&self) -> usize {
        self.topics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.topics.is_empty()
    }

    /// Score of `content` (already lowercased) against one keyword list.
    fn keyword_score(keywords: &[Keyword], content: &str, normalized: &str) -> f64 {
        if keywords.is_empty() {
            return 0.0;
        }
        let hits: Vec<f64> = keywords
            .iter()
            .filter_map(|k| k.score(content, normalized))
            .collect();
        if hits.is_empty() {
            return 0.0;
        }
        let mut score = hits.iter().sum::<f64>() / keywords.len() as f64;
        if hits.len() > 1 {
            score *= 1.0 + 0.1 * hits.len() as f64;
        }
        score
    }

    /// Best topic for free text, with its score. `None` when nothing matches.
    pub fn best_match(&self, text: &str) -> Option<(&str, f64)> {
        let content = text.to_lowercase();
        let normalized = normalize_separators(&content);
        let mut best: Option<(&str, f64)> = None;
        for topic in &self.topics {
            let score = Self::keyword_score(&topic.keywords, &content, &normalized);
            if score > 0.0 && best.map_or(true, |(_, s)| score > s) {
                best = Some((topic.topic_id.as_str(), score));
            }
        }
        best
    }

    pub fn map_event(&self, event: &SignalEvent) -> Option<String> {
        self.best_match(&event_content(event))
            .map(|(id, _)| id.to_string())
    }

    /// Fill in `topic_id` on every unmapped event. Returns how many were mapped.
    pub fn assign_all(&self, events: &mut [SignalEvent]) -> usize {
        let mut mapped = 0;
        for event in events.iter_mut().filter(|e| e.topic_id.is_none()) {
            if let Some(topic_id) = self.map_event(event) {
                event.topic_id = Some(topic_id);
                mapped += 1;
            }
        }
        mapped
    }
}

/// Title, description and selected metadata values joined into one string.
pub fn event_content(event: &SignalEvent) -> String {
    let mut parts = vec![event.title.clone()];
    if let Some(description) = &event.description {
        parts.push(description.clone());
    }
    for key in METADATA_KEYS {
        match event.metadata.get(key) {
            Some(serde_json::Value::String(s)) => parts.push(s.clone()),
            Some(serde_json::Value::Array(items)) => parts.extend(
                items
                    .iter()
                    .filter_map(|v| v.as_str())
                    .map(str::to_string),
            ),
            _ => {}
        }
    }
    parts.join(" ")
}

/// Non-alphanumerics become single spaces: "multi-agent" -> "multi agent".
fn normalize_separators(text: &str) -> String {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}
