use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use recalldb_core::cache::DeterministicCache;
use recalldb_core::config::EmbeddingSettings;
use recalldb_core::traits::Embedder;
use recalldb_embed::{get_default_embedder, CachedEmbedder, FakeEmbedder};

#[tokio::test]
async fn fake_embedder_shapes_and_determinism() {
    let settings = EmbeddingSettings { provider: "fake".into(), ..EmbeddingSettings::default() };
    let embedder = get_default_embedder(&settings).expect("embedder");
    let v1 = embedder.embed("hello world").await.expect("embed");
    let v2 = embedder.embed("hello world").await.expect("embed");

    assert_eq!(v1.len(), 1024, "embedding dim is 1024");

    // Norm approximately 1.0
    let norm: f32 = v1.iter().map(|x| x * x).sum::<f32>().sqrt();
    assert!((norm - 1.0).abs() <= 1e-3, "vector is L2-normalized (norm={norm})");

    // Deterministic for same input
    for (a, b) in v1.iter().zip(v2.iter()) { assert!((a - b).abs() <= 1e-6); }
}

#[test]
fn unknown_provider_is_rejected() {
    let settings = EmbeddingSettings { provider: "word2vec".into(), ..EmbeddingSettings::default() };
    assert!(get_default_embedder(&settings).is_err());
}

struct CountingEmbedder {
    inner: FakeEmbedder,
    calls: AtomicUsize,
}

#[async_trait]
impl Embedder for CountingEmbedder {
    fn model_id(&self) -> &str { self.inner.model_id() }
    async fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.embed(text).await
    }
}

#[tokio::test]
async fn cached_embedder_calls_provider_once_per_text() {
    let counting = Arc::new(CountingEmbedder { inner: FakeEmbedder::new(16), calls: AtomicUsize::new(0) });
    let cached = CachedEmbedder::new(counting.clone(), DeterministicCache::in_memory());

    let a = cached.embed("report about the prototype").await.unwrap();
    let b = cached.embed("report about the prototype").await.unwrap();
    let _ = cached.embed("a different report").await.unwrap();

    assert_eq!(a, b);
    assert_eq!(counting.calls.load(Ordering::SeqCst), 2);
    assert_eq!(cached.model_id(), "fake:xxh64:d16");
}
