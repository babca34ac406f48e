use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use localrag_cache::CacheLayer;
use localrag_core::config::{resolve_with_base, Config, Settings};
use localrag_core::data_processor::DataProcessor;
use localrag_core::store::JsonFileDocumentStore;
use localrag_core::traits::Embedder;
use localrag_embed::get_default_embedder;
use localrag_hybrid::{IndexPaths, Ingestor, RagEngine, SearchOutcome};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "localrag", about = "Local hybrid retrieval over plain-text documents")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Chunk, embed and index every .txt file under a directory.
    Ingest {
        /// Defaults to `paths.data_dir` from configuration.
        dir: Option<PathBuf>,
    },
    /// Search the indices.
    Query {
        text: String,
        /// Print the outcome as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Index, cache and circuit-breaker statistics as JSON.
    Stats,
    /// Remove every indexed fragment.
    Clear,
}

fn build_engine(settings: Settings, base: &Path) -> anyhow::Result<Arc<RagEngine>> {
    let paths = IndexPaths { vector_dir: settings.paths.vector_dir(base), keyword_dir: settings.paths.keyword_dir(base) };
    let embedder: Arc<dyn Embedder> = Arc::from(get_default_embedder(settings.embedding.dimension)?);
    Ok(Arc::new(RagEngine::new(settings, embedder, CacheLayer::in_memory(), Some(paths))?))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::load().map_err(|e| {
        tracing::error!(error = %e, "failed to load config");
        e
    })?;
    let settings = config.settings()?;
    let base = std::env::current_dir()?;
    let data_dir = resolve_with_base(&base, &settings.paths.data_dir);
    let store = JsonFileDocumentStore::open(resolve_with_base(&base, &settings.paths.index_dir).join("documents.json"))?;
    let engine = build_engine(settings, &base)?;
    engine.initialize().await?;
    let ingestor = Ingestor::new(engine.clone(), Arc::new(store));

    match cli.command {
        Command::Ingest { dir } => {
            let dir = dir.unwrap_or(data_dir);
            println!("Ingesting from {}", dir.display());
            let documents = DataProcessor::new().process_directory(&dir)?;
            let bar = ProgressBar::new(documents.len() as u64);
            bar.set_style(ProgressStyle::with_template("{bar:40} {pos}/{len} {msg}")?);
            let (mut added, mut skipped) = (0usize, 0usize);
            for doc in &documents {
                bar.set_message(doc.filename.clone());
                let report = ingestor.ingest_document(doc).await?;
                if report.duplicate { skipped += 1 } else { added += report.chunks_added }
                bar.inc(1);
            }
            bar.finish_and_clear();
            println!("✅ Ingest complete: {} documents, {} chunks added, {} duplicates skipped", documents.len(), added, skipped);
        }
        Command::Query { text, json } => {
            let outcome = engine.search(&text).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(outcome.results())?);
                return Ok(());
            }
            match &outcome {
                SearchOutcome::Empty => println!("Nothing indexed yet. Run `localrag ingest` first."),
                SearchOutcome::NoRelevantMatch { best } => {
                    println!("No relevant match. Closest: [{}] score {:.4}", best.fragment.source_label, best.score.raw());
                }
                SearchOutcome::Matches { results, confidence } => {
                    println!("{} results (confidence {:.2})", results.len(), confidence);
                    for (rank, r) in results.iter().enumerate() {
                        println!("\n#{} [{}] {:?}", rank + 1, r.fragment.source_label, r.score);
                        println!("{}", r.fragment.text);
                    }
                }
            }
        }
        Command::Stats => println!("{}", serde_json::to_string_pretty(&engine.stats())?),
        Command::Clear => {
            ingestor.clear_all().await?;
            println!("✅ Indices cleared");
        }
    }
    Ok(())
}
