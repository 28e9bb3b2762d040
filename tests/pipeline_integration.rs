// SPDX-License-Identifier: MIT

//! End-to-end runs: fetch, raw store, warehouse load and incremental reruns.

use disc_golf_etl::db::Warehouse;
use disc_golf_etl::models::{LoadMode, Scorecard};
use disc_golf_etl::services::{Pipeline, RawStore, RunRequest, SecretStore, UserRegistry};
use std::time::Duration;

mod common;
use common::{account, dispatcher, pages, MockUdisc};

const USERS: &str = r#"[
    {"name": "alice", "display_name": "Alice", "username": "alice", "password": "alice-pw"},
    {"name": "bob", "display_name": "Bob", "username": "bob", "password": "wrong"}
]"#;

async fn pipeline(base: &str, data_dir: &std::path::Path, mode: LoadMode) -> Pipeline {
    let users = UserRegistry::from_config(USERS, &SecretStore::default()).unwrap();
    let warehouse = Warehouse::connect(":memory:").await.unwrap();
    Pipeline::new(
        users,
        dispatcher(base, Duration::from_secs(30)),
        RawStore::new(data_dir),
        warehouse,
        mode,
    )
}

#[tokio::test]
async fn test_full_run_stores_and_loads() {
    let mock = MockUdisc::new()
        .account("alice", account("alice", pages("a", &[50, 50, 12])))
        .account("bob", account("bob", pages("b", &[3])));
    let base = mock.spawn().await;
    let dir = tempfile::tempdir().unwrap();
    let pipeline = pipeline(&base, dir.path(), LoadMode::Full).await;

    let report = pipeline.run(RunRequest::default()).await.unwrap();

    assert_eq!(report.mode, LoadMode::Full);
    assert_eq!(report.cutoff, None);
    assert_eq!(report.fetched.get("alice"), Some(&112));
    assert!(report.failures.contains_key("bob"));
    assert!(!report.storage_keys.contains_key("bob"));
    assert_eq!(report.load.total_records, 112);

    let key = &report.storage_keys["alice"];
    assert!(key.starts_with("alice/data_") && key.ends_with(".json"));
    let stored = pipeline.store().get_scorecards(key).await.unwrap();
    assert_eq!(stored.len(), 112);

    assert_eq!(
        pipeline.warehouse().count_scorecards(Some("alice")).await.unwrap(),
        112
    );
}

#[tokio::test]
async fn test_incremental_rerun_uses_warehouse_cutoff() {
    let mock = MockUdisc::new().account("alice", account("alice", pages("a", &[50, 50, 12])));
    let base = mock.spawn().await;
    let dir = tempfile::tempdir().unwrap();
    let pipeline = pipeline(&base, dir.path(), LoadMode::Incremental).await;

    // First run: empty warehouse, no cutoff, everything fetched.
    let first = pipeline
        .run(RunRequest {
            users: Some(vec!["ALICE".to_string()]),
            mode: None,
        })
        .await
        .unwrap();
    assert_eq!(first.cutoff, None);
    assert_eq!(first.fetched["alice"], 112);
    assert_eq!(mock.skips("obj-alice"), vec![0, 50, 100]);

    // Second run: cutoff is the newest record, the first page's last record
    // is older, so pagination stops after one request and nothing new loads.
    let second = pipeline
        .run(RunRequest {
            users: Some(vec!["alice".to_string()]),
            mode: Some("incremental".to_string()),
        })
        .await
        .unwrap();
    assert!(second.cutoff.is_some());
    assert_eq!(second.fetched["alice"], 50);
    assert_eq!(second.load.total_records, 0, "re-fetched page deduplicated");
    assert_eq!(mock.skips("obj-alice"), vec![0, 50, 100, 0]);

    assert_eq!(
        pipeline.warehouse().count_scorecards(None).await.unwrap(),
        112
    );
}

#[tokio::test]
async fn test_same_page_loaded_twice_creates_no_duplicates() {
    let wh = Warehouse::connect(":memory:").await.unwrap();
    let page: Vec<Scorecard> = common::scorecard_values("a", 0, 50)
        .into_iter()
        .map(Scorecard::from)
        .collect();

    assert_eq!(wh.load_scorecards("alice", "run1", &page).await.unwrap(), 50);
    assert_eq!(wh.load_scorecards("alice", "run2", &page).await.unwrap(), 0);
    assert_eq!(wh.count_scorecards(Some("alice")).await.unwrap(), 50);
}

#[tokio::test]
async fn test_load_latest_picks_newest_blob_per_user() {
    let dir = tempfile::tempdir().unwrap();
    let store = RawStore::new(dir.path());
    let older = chrono::DateTime::parse_from_rfc3339("2024-01-01T06:00:00Z")
        .unwrap()
        .with_timezone(&chrono::Utc);
    let newer = older + chrono::Duration::days(7);

    let cards = |n| -> Vec<Scorecard> {
        common::scorecard_values("a", 0, n)
            .into_iter()
            .map(Scorecard::from)
            .collect()
    };
    store.put_scorecards("alice", &cards(3), older).await.unwrap();
    store.put_scorecards("alice", &cards(5), newer).await.unwrap();
    store.put_scorecards("bob", &[], older).await.unwrap();

    let wh = Warehouse::connect(":memory:").await.unwrap();
    let summary = wh.load_latest_files(&store).await.unwrap();

    assert_eq!(summary.total_records, 5);
    assert_eq!(summary.files_loaded.len(), 2);
    assert_eq!(summary.files_loaded[0].file, "alice/data_20240108_060000.json");
    assert_eq!(summary.files_loaded[1].records, 0);
}

#[tokio::test]
async fn test_unknown_mode_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = pipeline("http://127.0.0.1:9", dir.path(), LoadMode::Full).await;

    let err = pipeline
        .run(RunRequest {
            users: None,
            mode: Some("delta".to_string()),
        })
        .await
        .unwrap_err();

    assert!(matches!(err, disc_golf_etl::error::AppError::BadRequest(_)));
}
