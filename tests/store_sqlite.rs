//! Integration tests for the SQLite passage store.

use std::sync::Arc;

use tempfile::TempDir;

use answer_harness::config::Config;
use answer_harness::db;
use answer_harness::migrate;
use answer_harness::store_sqlite::{DocumentRecord, SqlitePassageStore};

use answer_harness_core::models::Passage;
use answer_harness_core::store::VectorStore;

fn test_config(tmp: &TempDir) -> Config {
    let mut config = Config::default();
    config.db.path = tmp.path().join("test.sqlite");
    config
}

fn passage(tenant: &str, doc: &str, index: i64, content: &str, embedding: Vec<f32>) -> Passage {
    Passage {
        id: format!("{tenant}-{doc}-{index}"),
        tenant_id: tenant.to_string(),
        document_id: doc.to_string(),
        chunk_index: index,
        content: content.to_string(),
        embedding,
        metadata: serde_json::json!({ "title": "test" }),
    }
}

async fn seeded_store(tmp: &TempDir) -> Arc<SqlitePassageStore> {
    let config = test_config(tmp);
    migrate::run_migrations(&config).await.unwrap();
    let pool = db::connect(&config.db).await.unwrap();
    let store = Arc::new(SqlitePassageStore::new(pool));

    store
        .insert_passages(&[
            passage("a", "doc-1", 0, "tenant a near", vec![1.0, 0.0]),
            passage("a", "doc-1", 1, "tenant a far", vec![0.0, 1.0]),
            passage("b", "doc-2", 0, "tenant b near", vec![1.0, 0.0]),
        ])
        .await
        .unwrap();

    store
}

#[tokio::test]
async fn search_orders_by_distance_and_respects_tenant() {
    let tmp = TempDir::new().unwrap();
    let store = seeded_store(&tmp).await;

    let hits = store.search("a", &[1.0, 0.0], 10, None).await.unwrap();
    let contents: Vec<&str> = hits.iter().map(|h| h.content.as_str()).collect();
    assert_eq!(contents, vec!["tenant a near", "tenant a far"]);
    assert!(hits[0].distance < hits[1].distance);
}

#[tokio::test]
async fn max_distance_threshold_is_optional() {
    let tmp = TempDir::new().unwrap();
    let store = seeded_store(&tmp).await;

    let filtered = store.search("a", &[1.0, 0.0], 10, Some(0.5)).await.unwrap();
    assert_eq!(filtered.len(), 1);

    let unfiltered = store.search("a", &[1.0, 0.0], 10, None).await.unwrap();
    assert_eq!(unfiltered.len(), 2);
}

#[tokio::test]
async fn empty_tenant_searches_cleanly() {
    let tmp = TempDir::new().unwrap();
    let store = seeded_store(&tmp).await;

    let hits = store.search("missing", &[1.0, 0.0], 10, None).await.unwrap();
    assert!(hits.is_empty());
    assert_eq!(store.count("missing").await.unwrap(), 0);
}

#[tokio::test]
async fn delete_document_removes_passages_and_ledger_row() {
    let tmp = TempDir::new().unwrap();
    let store = seeded_store(&tmp).await;

    store
        .record_document(&DocumentRecord {
            id: "doc-1".to_string(),
            tenant_id: "a".to_string(),
            title: Some("first".to_string()),
            created_at: 1_700_000_000,
            word_count: 6,
        })
        .await
        .unwrap();
    assert_eq!(store.list_documents("a").await.unwrap().len(), 1);

    let removed = store.delete_document("a", "doc-1").await.unwrap();
    assert_eq!(removed, 2);
    assert_eq!(store.count("a").await.unwrap(), 0);
    assert!(store.list_documents("a").await.unwrap().is_empty());

    // Other tenants untouched.
    assert_eq!(store.count("b").await.unwrap(), 1);
}

#[tokio::test]
async fn embeddings_survive_the_blob_round_trip() {
    let tmp = TempDir::new().unwrap();
    let store = seeded_store(&tmp).await;

    // A query identical to a stored vector comes back at distance ~0.
    let hits = store.search("b", &[1.0, 0.0], 1, None).await.unwrap();
    assert_eq!(hits.len(), 1);
    assert!(hits[0].distance.abs() < 1e-6);
}
