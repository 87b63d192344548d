use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use futures::{stream, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use recalldb_core::cache::DeterministicCache;
use recalldb_core::error::{Error, Result};
use recalldb_core::traits::{Embedder, VectorStore};
use recalldb_core::types::{record_id, DistanceMetric, DocumentRecord};
use recalldb_embed::CachedEmbedder;
use recalldb_text::{list_documents, ExtractorRegistry};
use tracing::{info, warn};

use crate::metadata::MetadataExtractor;
use crate::with_timeout;

/// A file that did not make it into the collection.
#[derive(Debug)]
pub struct IngestFailure {
    pub path: PathBuf,
    pub error: Error,
}

/// Outcome of one [`Ingestor::ingest`] run.
#[derive(Debug, Default)]
pub struct IngestReport {
    /// Records that were stored, in path order.
    pub records: Vec<DocumentRecord>,
    pub failures: Vec<IngestFailure>,
}

impl IngestReport {
    pub fn processed(&self) -> usize {
        self.records.len()
    }

    pub fn failed(&self) -> usize {
        self.failures.len()
    }
}

pub struct Ingestor {
    registry: Arc<ExtractorRegistry>,
    embedder: Arc<dyn Embedder>,
    metadata: MetadataExtractor,
    store: Arc<dyn VectorStore>,
    collection: String,
    batch_size: usize,
    concurrency: usize,
    embed_timeout: Duration,
    extract_timeout: Duration,
    store_timeout: Duration,
    progress: bool,
}

impl Ingestor {
    pub fn new(
        registry: ExtractorRegistry,
        embedder: Arc<dyn Embedder>,
        cache: DeterministicCache,
        metadata: MetadataExtractor,
        store: Arc<dyn VectorStore>,
        collection: impl Into<String>,
    ) -> Self {
        Self {
            registry: Arc::new(registry),
            embedder: Arc::new(CachedEmbedder::new(embedder, cache)),
            metadata,
            store,
            collection: collection.into(),
            batch_size: 100,
            concurrency: 4,
            embed_timeout: Duration::from_secs(30),
            extract_timeout: Duration::from_secs(300),
            store_timeout: Duration::from_secs(30),
            progress: false,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_embed_timeout(mut self, timeout: Duration) -> Self {
        self.embed_timeout = timeout;
        self
    }

    pub fn with_extract_timeout(mut self, timeout: Duration) -> Self {
        self.extract_timeout = timeout;
        self
    }

    pub fn with_store_timeout(mut self, timeout: Duration) -> Self {
        self.store_timeout = timeout;
        self
    }

    pub fn with_progress(mut self, progress: bool) -> Self {
        self.progress = progress;
        self
    }

    /// Extracts, embeds, annotates and stores every supported file under `dir`.
    ///
    /// Per-file problems land in [`IngestReport::failures`]; only a missing
    /// directory or an unreachable store fails the whole run.
    pub async fn ingest(&self, dir: &Path) -> Result<IngestReport> {
        if !dir.is_dir() {
            return Err(Error::NotFound(format!("document directory {}", dir.display())));
        }
        let paths = list_documents(dir, &self.registry);
        info!(dir = %dir.display(), files = paths.len(), collection = %self.collection, "ingesting");

        let pb = self.progress_bar(paths.len() as u64);
        let progress = &pb;
        let mut prepared: Vec<(usize, PathBuf, Result<DocumentRecord>)> = stream::iter(paths.into_iter().enumerate())
            .map(move |(i, path)| async move {
                let result = self.prepare(dir, &path).await;
                progress.inc(1);
                (i, path, result)
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;
        pb.finish_and_clear();
        // completion order is arbitrary; the first record decides the dimension
        prepared.sort_by_key(|(i, _, _)| *i);

        let mut report = IngestReport::default();
        let mut ready: Vec<(PathBuf, DocumentRecord)> = Vec::new();
        let mut dimension = with_timeout("collection lookup", self.store_timeout, async {
            self.store.collection_dimension(&self.collection).await.map_err(Error::Store)
        })
        .await?;

        for (_, path, result) in prepared {
            let record = match result {
                Ok(record) => record,
                Err(error) => {
                    warn!(path = %path.display(), "{error}");
                    report.failures.push(IngestFailure { path, error });
                    continue;
                }
            };
            let expected = match dimension {
                Some(d) => d,
                None => {
                    let d = record.embedding.len();
                    with_timeout("collection create", self.store_timeout, async {
                        self.store
                            .create_collection(&self.collection, d, DistanceMetric::Cosine)
                            .await
                            .map_err(Error::Store)
                    })
                    .await?;
                    info!(collection = %self.collection, dimension = d, "created collection");
                    dimension = Some(d);
                    d
                }
            };
            if record.embedding.len() != expected {
                let error = Error::DimensionMismatch { expected, actual: record.embedding.len() };
                warn!(path = %path.display(), "{error}");
                report.failures.push(IngestFailure { path, error });
                continue;
            }
            ready.push((path, record));
        }

        for batch in ready.chunks(self.batch_size) {
            let records: Vec<DocumentRecord> = batch.iter().map(|(_, r)| r.clone()).collect();
            let upserted = with_timeout("batch upsert", self.store_timeout, async {
                self.store.upsert(&self.collection, &records).await.map_err(Error::Store)
            })
            .await;
            match upserted {
                Ok(()) => report.records.extend(records),
                Err(e) => {
                    warn!(records = batch.len(), "upsert failed: {e}");
                    for (path, _) in batch {
                        report.failures.push(IngestFailure {
                            path: path.clone(),
                            error: Error::Store(anyhow::anyhow!("batch upsert failed: {e}")),
                        });
                    }
                }
            }
        }

        info!(processed = report.processed(), failed = report.failed(), "ingestion finished");
        Ok(report)
    }

    async fn prepare(&self, root: &Path, path: &Path) -> Result<DocumentRecord> {
        let content = with_timeout("text extraction", self.extract_timeout, self.extract_text(path)).await?;

        let embedding = with_timeout("document embedding", self.embed_timeout, async {
            self.embedder.embed(&content).await.map_err(Error::Embedding)
        })
        .await?;

        let filename = path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
        let metadata = self.metadata.extract(&filename, &content).await;

        let relative = path.strip_prefix(root).unwrap_or(path);
        let source = relative.components().map(|c| c.as_os_str().to_string_lossy()).collect::<Vec<_>>().join("/");

        Ok(DocumentRecord { id: record_id(&source), filename, content, embedding, metadata })
    }

    /// Runs the file's extractor on the blocking pool. On timeout the task
    /// is detached and its result discarded.
    async fn extract_text(&self, path: &Path) -> Result<String> {
        let registry = Arc::clone(&self.registry);
        let owned = path.to_path_buf();
        let extraction_error = |message: String| Error::Extraction { path: path.to_path_buf(), message };
        let extracted = tokio::task::spawn_blocking(move || match registry.for_path(&owned) {
            Some(extractor) => extractor.extract(&owned).map_err(|e| format!("{e:#}")),
            None => Err("no extractor for this file type".to_string()),
        })
        .await
        .map_err(|e| extraction_error(format!("extraction task failed: {e}")))?;
        extracted.map_err(extraction_error)
    }

    fn progress_bar(&self, len: u64) -> ProgressBar {
        if !self.progress {
            return ProgressBar::hidden();
        }
        let pb = ProgressBar::new(len);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} documents ({percent}%) {msg}")
        {
            pb.set_style(style.progress_chars("#>-"));
        }
        pb
    }
}
