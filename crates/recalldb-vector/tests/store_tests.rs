use recalldb_core::config::StoreSettings;
use recalldb_core::traits::VectorStore;
use recalldb_core::types::{DistanceMetric, DocumentRecord, RecordMetadata};
use recalldb_vector::lance::META_TABLE;
use recalldb_vector::{open_store, LanceVectorStore, MemoryVectorStore};
use tempfile::TempDir;

fn record(id: &str, embedding: Vec<f32>) -> DocumentRecord {
    DocumentRecord {
        id: id.to_string(),
        filename: format!("{id}.txt"),
        content: format!("content of {id}"),
        embedding,
        metadata: RecordMetadata { date: Some("2024-06-15T00:00:00".into()), entity_name: None },
    }
}

#[tokio::test]
async fn memory_store_ranks_by_cosine() {
    let store = MemoryVectorStore::new();
    store.create_collection("docs", 2, DistanceMetric::Cosine).await.unwrap();
    store
        .upsert("docs", &[record("a", vec![1.0, 0.0]), record("b", vec![0.0, 1.0]), record("c", vec![1.0, 1.0])])
        .await
        .unwrap();

    let hits = store.search("docs", &[1.0, 0.1], 2).await.unwrap();
    let ids: Vec<_> = hits.iter().map(|h| h.record.id.as_str()).collect();
    assert_eq!(ids, vec!["a", "c"]);
    assert!(hits[0].score >= hits[1].score);
}

#[tokio::test]
async fn memory_store_keeps_insertion_order_for_ties() {
    let store = MemoryVectorStore::new();
    store.create_collection("docs", 2, DistanceMetric::Cosine).await.unwrap();
    store
        .upsert("docs", &[record("first", vec![1.0, 0.0]), record("second", vec![2.0, 0.0])])
        .await
        .unwrap();
    let hits = store.search("docs", &[1.0, 0.0], 5).await.unwrap();
    assert_eq!(hits[0].record.id, "first");
    assert_eq!(hits[1].record.id, "second");
}

#[tokio::test]
async fn memory_store_upsert_replaces_by_id() {
    let store = MemoryVectorStore::new();
    store.create_collection("docs", 2, DistanceMetric::Cosine).await.unwrap();
    store.upsert("docs", &[record("a", vec![1.0, 0.0])]).await.unwrap();
    let mut updated = record("a", vec![0.0, 1.0]);
    updated.content = "new".into();
    store.upsert("docs", &[updated]).await.unwrap();

    assert_eq!(store.len("docs"), 1);
    let hits = store.search("docs", &[0.0, 1.0], 1).await.unwrap();
    assert_eq!(hits[0].record.content, "new");
}

#[tokio::test]
async fn memory_store_rejects_wrong_width_without_partial_write() {
    let store = MemoryVectorStore::new();
    store.create_collection("docs", 2, DistanceMetric::Cosine).await.unwrap();
    let err = store
        .upsert("docs", &[record("ok", vec![1.0, 0.0]), record("bad", vec![1.0, 0.0, 0.0])])
        .await;
    assert!(err.is_err());
    assert_eq!(store.len("docs"), 0);
}

#[tokio::test]
async fn missing_collection_has_no_dimension_and_no_hits() {
    let store = MemoryVectorStore::new();
    assert_eq!(store.collection_dimension("nope").await.unwrap(), None);
    assert!(store.search("nope", &[1.0], 3).await.unwrap().is_empty());
}

#[tokio::test]
async fn open_store_rejects_unknown_backend() {
    let tmp = TempDir::new().unwrap();
    let settings = StoreSettings { backend: "faiss".into(), ..StoreSettings::default() };
    assert!(open_store(&settings, tmp.path()).await.is_err());
}

#[tokio::test]
async fn lance_store_round_trip() {
    let tmp = TempDir::new().unwrap();
    let store = LanceVectorStore::open(&tmp.path().join("lancedb")).await.unwrap();

    assert_eq!(store.collection_dimension("docs").await.unwrap(), None);
    store.create_collection("docs", 3, DistanceMetric::Cosine).await.unwrap();
    assert_eq!(store.collection_dimension("docs").await.unwrap(), Some(3));

    store
        .upsert("docs", &[record("a", vec![1.0, 0.0, 0.0]), record("b", vec![0.0, 1.0, 0.0])])
        .await
        .unwrap();
    // same id again replaces rather than duplicates
    store.upsert("docs", &[record("a", vec![1.0, 0.0, 0.0])]).await.unwrap();

    let hits = store.search("docs", &[1.0, 0.0, 0.0], 5).await.unwrap();
    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].record.id, "a");
    assert!((hits[0].score - 1.0).abs() < 1e-4);
    assert_eq!(hits[0].record.metadata.date.as_deref(), Some("2024-06-15T00:00:00"));
    assert_eq!(hits[0].record.metadata.entity_name, None);

    assert!(store.upsert("docs", &[record("c", vec![1.0, 0.0])]).await.is_err());
}

#[tokio::test]
async fn lance_collection_named_meta_does_not_clobber_settings() {
    let tmp = TempDir::new().unwrap();
    let store = LanceVectorStore::open(&tmp.path().join("lancedb")).await.unwrap();

    store.create_collection("docs", 2, DistanceMetric::Euclid).await.unwrap();
    store.create_collection("meta", 2, DistanceMetric::Cosine).await.unwrap();
    assert!(store.create_collection(META_TABLE, 2, DistanceMetric::Cosine).await.is_err());

    store.upsert("docs", &[record("near", vec![1.0, 0.0]), record("far", vec![5.0, 0.0])]).await.unwrap();
    store.upsert("meta", &[record("m", vec![1.0, 0.0])]).await.unwrap();
    let hits = store.search("docs", &[1.0, 0.0], 2).await.unwrap();
    assert_eq!(hits[0].record.id, "near");
    // euclid scores are negated distances
    assert!(hits[0].score > hits[1].score);
    assert!(hits[0].score <= 0.0);
}
