use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::NaiveDate;

use crate::engine::TopicSnapshot;

const MAX_CACHE_ENTRIES: usize = 2_000;

type Key = (String, NaiveDate);

#[derive(Debug, Default)]
struct Entries {
    /// Newest store revision seen. Entries computed from older data are gone.
    revision: u64,
    snapshots: HashMap<Key, Arc<TopicSnapshot>>,
}

/// Computed snapshots keyed by (topic_id, as_of) and tagged with the store
/// revision they were computed from. Owned by whoever serves them.
///
/// A lookup at a newer revision misses, so writes made by another process
/// are picked up without an explicit [`FeatureCache::invalidate`]. Inserts
/// computed from an older revision than the newest seen are dropped.
#[derive(Debug, Default)]
pub struct FeatureCache {
    entries: RwLock<Entries>,
}

impl FeatureCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(
        &self,
        topic_id: &str,
        as_of: NaiveDate,
        revision: u64,
    ) -> Option<Arc<TopicSnapshot>> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        if entries.revision != revision {
            return None;
        }
        entries.snapshots.get(&(topic_id.to_string(), as_of)).cloned()
    }

    pub fn insert(
        &self,
        as_of: NaiveDate,
        revision: u64,
        snapshot: TopicSnapshot,
    ) -> Arc<TopicSnapshot> {
        let snapshot = Arc::new(snapshot);
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        if revision < entries.revision {
            return snapshot;
        }
        if revision > entries.revision {
            entries.snapshots.clear();
            entries.revision = revision;
        }
        // Stale dates pile up across days; drop them before growing further
        if entries.snapshots.len() >= MAX_CACHE_ENTRIES {
            entries.snapshots.retain(|(_, date), _| *date >= as_of);
        }
        entries.snapshots.insert(
            (snapshot.features.topic_id.clone(), as_of),
            Arc::clone(&snapshot),
        );
        snapshot
    }

    /// Return the cached snapshot or compute and store it.
    pub fn get_or_insert_with<F>(
        &self,
        topic_id: &str,
        as_of: NaiveDate,
        revision: u64,
        compute: F,
    ) -> Arc<TopicSnapshot>
    where
        F: FnOnce() -> TopicSnapshot,
    {
        if let Some(hit) = self.get(topic_id, as_of, revision) {
            return hit;
        }
        self.insert(as_of, revision, compute())
    }

    pub fn invalidate(&self) {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        let dropped = entries.snapshots.len();
        entries.snapshots.clear();
        tracing::debug!(dropped, "Feature cache invalidated");
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .snapshots
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
