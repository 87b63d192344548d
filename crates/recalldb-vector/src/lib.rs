//! Vector store backends for recalldb.
//!
//! Every backend implements [`recalldb_core::traits::VectorStore`]; the
//! configured one is picked with [`open_store`].

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use recalldb_core::config::StoreSettings;
use recalldb_core::traits::VectorStore;
use tracing::info;

pub mod lance;
pub mod memory;
pub mod qdrant;
pub mod schema;
pub mod table;

pub use lance::LanceVectorStore;
pub use memory::MemoryVectorStore;
pub use qdrant::QdrantStore;

/// Opens the backend named by `settings.backend`.
///
/// `lancedb_dir` is only used by the `lancedb` backend.
pub async fn open_store(settings: &StoreSettings, lancedb_dir: &Path) -> Result<Arc<dyn VectorStore>> {
    match settings.backend.as_str() {
        "lancedb" => {
            info!(path = %lancedb_dir.display(), "opening LanceDB store");
            Ok(Arc::new(LanceVectorStore::open(lancedb_dir).await?))
        }
        "qdrant" => {
            info!(url = %settings.qdrant_url, "using Qdrant store");
            let api_key = std::env::var(&settings.qdrant_api_key_env).ok();
            let timeout = Duration::from_secs(settings.timeout_secs);
            Ok(Arc::new(QdrantStore::new(settings.qdrant_url.clone(), api_key, timeout)?))
        }
        "memory" => Ok(Arc::new(MemoryVectorStore::new())),
        other => bail!("unknown store backend '{other}'"),
    }
}
