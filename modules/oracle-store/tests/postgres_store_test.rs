//! Integration tests for the Postgres store.
//! Requires a Postgres instance. Set DATABASE_TEST_URL or these tests are skipped.
//! Each test starts from empty tables, so run them with `--test-threads=1`.

mod common;

use anyhow::Result;
use oracle_store::PgStore;

async fn test_store() -> Option<PgStore> {
    let url = std::env::var("DATABASE_TEST_URL").ok()?;
    let store = PgStore::connect(&url).await.ok()?;
    reset(&store).await.ok()?;
    Some(store)
}

async fn reset(store: &PgStore) -> Result<()> {
    sqlx::query("TRUNCATE topic_forecasts, topic_features, signal_events, topics")
        .execute(store.pool())
        .await?;
    Ok(())
}

macro_rules! pg_test {
    ($name:ident) => {
        #[tokio::test]
        async fn $name() {
            let Some(store) = test_store().await else {
                eprintln!("DATABASE_TEST_URL not set, skipping");
                return;
            };
            common::$name(&store).await;
        }
    };
}

pg_test!(events_are_filtered_and_paginated);
pg_test!(upsert_keeps_identity_and_mapping);
pg_test!(unmapped_events_can_be_assigned);
pg_test!(daily_counts_group_by_day_and_source);
pg_test!(features_are_replaced_wholesale);
pg_test!(forecasts_upsert_by_horizon);
pg_test!(stats_and_source_status);
pg_test!(revision_moves_on_every_write);
