//! Embedding providers.
//!
//! `OpenAiEmbedder` talks to OpenAI-compatible `/embeddings` endpoints,
//! `FakeEmbedder` hashes tokens into a normalized vector for fast and
//! deterministic runs, and `CachedEmbedder` memoizes any provider through the
//! deterministic cache.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;
use recalldb_core::config::EmbeddingSettings;
use recalldb_core::traits::Embedder;
use tracing::info;

pub mod cached;
pub mod openai;

pub use cached::CachedEmbedder;
pub use openai::OpenAiEmbedder;

pub const FAKE_EMBEDDING_DIM: usize = 1024;

pub struct FakeEmbedder {
    dim: usize,
    id: String,
}

impl FakeEmbedder {
    pub fn new(dim: usize) -> Self {
        Self { dim, id: format!("fake:xxh64:d{dim}") }
    }

    pub fn embed_sync(&self, text: &str) -> Vec<f32> {
        use std::hash::{Hash, Hasher};
        use twox_hash::XxHash64;
        let mut v = vec![0f32; self.dim];
        for (i, token) in text.split_whitespace().enumerate() {
            let mut hasher = XxHash64::with_seed(0);
            token.to_lowercase().hash(&mut hasher);
            let h = hasher.finish();
            let idx = (h as usize) % self.dim;
            let val = (((h >> 32) as u32) as f32) / (u32::MAX as f32);
            v[idx] += val + (i as f32 % 3.0) * 0.01;
        }
        let norm = (v.iter().map(|x| x * x).sum::<f32>()).sqrt().max(1e-6);
        for x in &mut v {
            *x /= norm;
        }
        v
    }
}

#[async_trait]
impl Embedder for FakeEmbedder {
    fn model_id(&self) -> &str {
        &self.id
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.embed_sync(text))
    }
}

/// Provider selected by settings; `APP_USE_FAKE_EMBEDDINGS=1` forces the fake one.
pub fn get_default_embedder(settings: &EmbeddingSettings) -> Result<Arc<dyn Embedder>> {
    let use_fake = std::env::var("APP_USE_FAKE_EMBEDDINGS")
        .ok()
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false);
    if use_fake || settings.provider == "fake" {
        info!("using FakeEmbedder");
        return Ok(Arc::new(FakeEmbedder::new(settings.dimensions.unwrap_or(FAKE_EMBEDDING_DIM))));
    }
    match settings.provider.as_str() {
        "openai" => {
            let api_key = std::env::var(&settings.api_key_env).unwrap_or_default();
            let embedder = OpenAiEmbedder::new(
                api_key,
                settings.base_url.clone(),
                settings.model.clone(),
                settings.dimensions,
                Duration::from_secs(settings.timeout_secs),
                settings.max_retries,
            )?;
            Ok(Arc::new(embedder))
        }
        other => bail!("unknown embedding provider '{other}'"),
    }
}
