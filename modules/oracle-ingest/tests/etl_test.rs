use async_trait::async_trait;
use chrono::{TimeZone, Utc};

use oracle_common::{Metadata, SignalEvent, Source, Topic};
use oracle_ingest::{
    EtlRunner, IngestError, RawPaper, RawRepo, RawSignal, SignalClient, TopicMapper,
};
use oracle_store::{MemoryStore, SignalStore};

struct FixedClient {
    source: Source,
    records: Vec<RawSignal>,
}

#[async_trait]
impl SignalClient for FixedClient {
    fn source(&self) -> Source {
        self.source
    }

    async fn fetch(&self, _days: u32) -> oracle_ingest::Result<Vec<RawSignal>> {
        Ok(self.records.clone())
    }
}

struct BrokenClient;

#[async_trait]
impl SignalClient for BrokenClient {
    fn source(&self) -> Source {
        Source::Jobs
    }

    async fn fetch(&self, _days: u32) -> oracle_ingest::Result<Vec<RawSignal>> {
        Err(IngestError::Feed("upstream returned garbage".into()))
    }
}

fn topics() -> Vec<Topic> {
    vec![
        Topic::new("agents", "AI Agents", vec!["agent".into(), "tool use".into()]),
        Topic::new("quantum", "Quantum", vec!["qubit".into()]),
    ]
}

fn paper(id: &str, title: &str) -> RawSignal {
    RawSignal::Paper(RawPaper {
        id: id.into(),
        title: title.into(),
        summary: String::new(),
        authors: vec![],
        categories: vec!["cs.AI".into()],
        primary_category: Some("cs.AI".into()),
        url: None,
        published: Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap(),
    })
}

fn repo(full_name: &str, description: &str) -> RawSignal {
    RawSignal::Repo(RawRepo {
        full_name: full_name.into(),
        name: full_name.rsplit('/').next().unwrap().into(),
        owner: None,
        description: Some(description.into()),
        html_url: None,
        language: Some("Python".into()),
        stars: 50,
        forks: 2,
        topics: vec![],
        created_at: Utc.with_ymd_and_hms(2025, 2, 1, 0, 0, 0).unwrap(),
        updated_at: None,
        pushed_at: None,
    })
}

async fn seeded_store() -> MemoryStore {
    let store = MemoryStore::new();
    store.upsert_topics(&topics()).await.unwrap();
    store
}

#[tokio::test]
async fn failing_source_is_skipped() {
    let store = seeded_store().await;
    let runner = EtlRunner::new(
        vec![
            Box::new(FixedClient {
                source: Source::Arxiv,
                records: vec![paper("1", "An agent that plans"), paper("2", "Soil chemistry")],
            }),
            Box::new(BrokenClient),
            Box::new(FixedClient {
                source: Source::Github,
                records: vec![repo("acme/qkit", "Simulate a qubit register")],
            }),
        ],
        TopicMapper::new(&topics()),
    );

    let report = runner.run(&store, 7).await.unwrap();

    assert_eq!(report.failed_sources(), vec![Source::Jobs]);
    assert_eq!(report.stored(), 3);
    assert_eq!(report.sources[&Source::Arxiv].mapped, 1);
    assert_eq!(report.sources[&Source::Github].mapped, 1);

    let agent = store.get_event("arxiv:1").await.unwrap().unwrap();
    assert_eq!(agent.topic_id.as_deref(), Some("agents"));
    let qkit = store.get_event("github:acme/qkit").await.unwrap().unwrap();
    assert_eq!(qkit.topic_id.as_deref(), Some("quantum"));
    assert!(store.get_event("arxiv:2").await.unwrap().unwrap().topic_id.is_none());
}

#[tokio::test]
async fn rerun_is_idempotent() {
    let store = seeded_store().await;
    let runner = EtlRunner::new(
        vec![Box::new(FixedClient {
            source: Source::Arxiv,
            records: vec![paper("1", "An agent that plans")],
        })],
        TopicMapper::new(&topics()),
    );

    runner.run(&store, 7).await.unwrap();
    runner.run(&store, 7).await.unwrap();

    assert_eq!(store.stats().await.unwrap().events, 1);
}

#[tokio::test]
async fn stored_unmapped_events_are_remapped_when_topics_grow() {
    let store = seeded_store().await;
    let client = FixedClient {
        source: Source::Arxiv,
        records: vec![paper("7", "Soil chemistry survey")],
    };
    EtlRunner::new(vec![Box::new(client)], TopicMapper::new(&topics()))
        .run(&store, 7)
        .await
        .unwrap();
    assert_eq!(store.unmapped_events(10, 0).await.unwrap().len(), 1);

    let mut grown = topics();
    grown.push(Topic::new("soil", "Soil Science", vec!["soil".into()]));
    store.upsert_topics(&grown).await.unwrap();

    let remapped = EtlRunner::new(vec![], TopicMapper::new(&grown))
        .remap_unmapped(&store)
        .await
        .unwrap();
    assert_eq!(remapped, 1);
    assert!(store.unmapped_events(10, 0).await.unwrap().is_empty());
}

fn stored_event(id: &str, title: &str, hours_ago: i64) -> SignalEvent {
    let ts = Utc.with_ymd_and_hms(2025, 3, 10, 12, 0, 0).unwrap()
        - chrono::Duration::hours(hours_ago);
    SignalEvent {
        id: id.into(),
        source: Source::Jobs,
        source_id: id.into(),
        topic_id: None,
        title: title.into(),
        url: None,
        description: None,
        timestamp: ts,
        magnitude: 1.0,
        metadata: Metadata::new(),
        created_at: ts,
    }
}

#[tokio::test]
async fn remap_reaches_past_a_full_batch_of_unmatched_events() {
    let store = seeded_store().await;
    let mut events: Vec<SignalEvent> = (0..1_200)
        .map(|i| stored_event(&format!("noise-{i}"), "Office plants watering rota", i))
        .collect();
    events.push(stored_event("oldest", "Soil sampling field work", 5_000));
    store.upsert_events(&events).await.unwrap();

    let mut grown = topics();
    grown.push(Topic::new("soil", "Soil Science", vec!["soil".into()]));
    store.upsert_topics(&grown).await.unwrap();

    let remapped = EtlRunner::new(vec![], TopicMapper::new(&grown))
        .remap_unmapped(&store)
        .await
        .unwrap();
    assert_eq!(remapped, 1);
    let oldest = store.get_event("oldest").await.unwrap().unwrap();
    assert_eq!(oldest.topic_id.as_deref(), Some("soil"));
    assert_eq!(store.unmapped_events(2_000, 0).await.unwrap().len(), 1_200);
}
