use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use recalldb_core::cache::DeterministicCache;
use recalldb_core::config::{resolve_with_base, Config, Settings};
use recalldb_core::traits::{Embedder, LanguageModel, VectorStore};
use recalldb_core::types::QueryCandidate;
use recalldb_embed::get_default_embedder;
use recalldb_hybrid::{HybridQueryEngine, Ingestor, MetadataExtractor, RelevanceJudge};
use recalldb_llm::get_default_language_model;
use recalldb_text::ExtractorRegistry;
use recalldb_vector::open_store;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "recalldb")]
#[command(about = "Ingest documents and answer questions with vector search re-ranked by a language model", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract, embed and store every supported file in a directory
    Ingest {
        /// Defaults to `data.documents_dir`
        dir: Option<PathBuf>,
    },
    /// Ranked candidates for a question
    Query {
        query: String,
        #[arg(short, long, help = "Candidates to retrieve (default: search.k)")]
        k: Option<usize>,
    },
    /// Day (YYYY-MM-DD) of the best matching document
    BestDate {
        query: String,
        #[arg(short, long, help = "Candidates to retrieve (default: search.k)")]
        k: Option<usize>,
    },
    /// Cache maintenance
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand)]
enum CacheAction {
    /// Delete every cached embedding and model reply
    Clear,
}

struct Services {
    settings: Settings,
    cache: DeterministicCache,
    embedder: Arc<dyn Embedder>,
    model: Arc<dyn LanguageModel>,
    store: Arc<dyn VectorStore>,
}

impl Services {
    async fn build(settings: Settings, base: &Path) -> anyhow::Result<Self> {
        let cache = open_cache(&settings, base);
        let embedder = get_default_embedder(&settings.embedding)?;
        let model = get_default_language_model(&settings.llm)?;
        let store = open_store(&settings.store, &resolve_with_base(base, &settings.data.lancedb_dir)).await?;
        Ok(Self { settings, cache, embedder, model, store })
    }

    fn ingestor(&self) -> anyhow::Result<Ingestor> {
        let s = &self.settings;
        let metadata = MetadataExtractor::new(self.model.clone(), self.cache.clone(), s.metadata.entity_kind.clone())
            .with_limits(s.llm.max_output_tokens, Duration::from_secs(s.llm.timeout_secs));
        Ok(Ingestor::new(
            ExtractorRegistry::from_settings(&s.extract)?,
            self.embedder.clone(),
            self.cache.clone(),
            metadata,
            self.store.clone(),
            s.collection.name.clone(),
        )
        .with_batch_size(s.collection.batch_size)
        .with_concurrency(s.ingest.concurrency)
        .with_embed_timeout(Duration::from_secs(s.embedding.timeout_secs))
        .with_extract_timeout(Duration::from_secs(s.extract.timeout_secs))
        .with_store_timeout(Duration::from_secs(s.store.timeout_secs))
        .with_progress(s.ingest.progress))
    }

    fn engine(&self) -> HybridQueryEngine {
        let s = &self.settings;
        let judge = RelevanceJudge::new(self.model.clone(), self.cache.clone())
            .with_limits(s.llm.max_output_tokens, Duration::from_secs(s.search.timeout_secs))
            .retry_unparseable(s.search.retry_unparseable);
        HybridQueryEngine::new(
            self.embedder.clone(),
            self.cache.clone(),
            self.store.clone(),
            judge,
            s.collection.name.clone(),
        )
        .with_concurrency(s.search.concurrency)
        .with_embed_timeout(Duration::from_secs(s.embedding.timeout_secs))
        .with_store_timeout(Duration::from_secs(s.store.timeout_secs))
    }
}

fn open_cache(settings: &Settings, base: &Path) -> DeterministicCache {
    DeterministicCache::on_disk(resolve_with_base(base, &settings.data.cache_dir))
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("RECALLDB_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_writer(std::io::stderr).with_env_filter(filter).with_target(false).init();
}

fn preview(text: &str, chars: usize) -> String {
    text.chars().take(chars).collect::<String>().replace('\n', " ")
}

fn print_table(candidates: &[QueryCandidate]) {
    println!("{:<5} {:<11} {:<24} {:>8} {:>8} {:>9}", "Rank", "Date", "Entity", "Vector", "Judgment", "Combined");
    println!("{}", "-".repeat(70));
    for (i, c) in candidates.iter().enumerate() {
        let meta = &c.record.metadata;
        println!(
            "{:<5} {:<11} {:<24} {:>8.4} {:>8.4} {:>9.4}",
            i + 1,
            meta.day().unwrap_or("-"),
            preview(meta.known_entity_name().unwrap_or("unknown"), 24),
            c.similarity_score,
            c.relevance_score,
            c.combined_score
        );
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let config = Config::load().context("loading configuration")?;
    let settings = config.settings()?;
    let base = std::env::current_dir()?;

    match cli.command {
        Commands::Ingest { dir } => {
            let dir = dir.unwrap_or_else(|| resolve_with_base(&base, &settings.data.documents_dir));
            let services = Services::build(settings, &base).await?;
            let report = services.ingestor()?.ingest(&dir).await?;
            for failure in &report.failures {
                eprintln!("failed: {}: {}", failure.path.display(), failure.error);
            }
            println!("Ingested {} documents ({} failed) from {}", report.processed(), report.failed(), dir.display());
        }
        Commands::Query { query, k } => {
            let k = k.unwrap_or(settings.search.k);
            let services = Services::build(settings, &base).await?;
            let candidates = services.engine().search(&query, k).await?;
            println!("\nSearch results:");
            print_table(&candidates);
            if let Some(best) = candidates.first() {
                println!("\nBest matching document ({}):", best.record.filename);
                println!("{}", "-".repeat(70));
                println!("{}", preview(&best.record.content, 80));
                println!("{}", "-".repeat(70));
            }
        }
        Commands::BestDate { query, k } => {
            let k = k.unwrap_or(settings.search.k);
            let services = Services::build(settings, &base).await?;
            let best = services.engine().best_match(&query, k).await?;
            match best.record.metadata.day() {
                Some(day) => println!("{day}"),
                None => anyhow::bail!("best match {} has no date", best.record.filename),
            }
        }
        Commands::Cache { action: CacheAction::Clear } => {
            let removed = open_cache(&settings, &base).clear()?;
            info!(removed, "cache cleared");
            println!("Removed {removed} cache entries");
        }
    }
    Ok(())
}
