mod config;
mod dedup;
mod doc_store;
mod error;
mod heuristics;
mod ingest;
mod object_store;
mod ocr;
mod trigger;

use clap::{Parser, Subcommand};
use config::Config;
use doc_store::SqliteDocumentStore;
use ingest::IngestPipeline;
use object_store::FsObjectStore;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;
use trigger::TriggerEvent;

/// Bucket deduplication and invoice ingest tools.
#[derive(Parser)]
#[command(name = "bucket-tools", version, about)]
struct Cli {
    /// Path to a TOML config file; environment variables override it
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Hash every object in a bucket and delete content duplicates
    Dedup {
        /// Bucket to scan (defaults to the configured one)
        #[arg(short, long)]
        bucket: Option<String>,
        /// Report duplicates without deleting them
        #[arg(long)]
        dry_run: bool,
    },
    /// Run the invoice pipeline for one object-created event
    Ingest {
        /// Event JSON file, or `-` for stdin
        #[arg(short, long)]
        event: PathBuf,
    },
    /// Run field extraction on a local text file and print the result
    Extract { file: PathBuf },
    /// Print stored invoices, newest first
    Invoices {
        #[arg(short, long, default_value_t = 20)]
        limit: usize,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // init tracing
    tracing_subscriber::fmt()
        .with_target(true)
        .with_level(true)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Install crypto provider; a second install is harmless
    let _ = rustls::crypto::ring::default_provider().install_default();

    let cli = Cli::parse();
    let cfg = Config::resolve(cli.config.as_deref())?;

    match cli.command {
        Commands::Dedup { bucket, dry_run } => {
            let bucket = bucket.unwrap_or_else(|| cfg.dedup.bucket.clone());
            let store = FsObjectStore::new(&cfg.object_store.root, cfg.object_store.page_size);
            let mut report = dedup::find_duplicates(&store, &bucket).await?;

            if report.bucket_was_empty() {
                println!("Bucket is empty!");
                return Ok(());
            }
            println!("\nDuplicate files found:");
            for dup in &report.duplicates {
                println!("- {} (same as {})", dup.key, dup.canonical_key);
            }

            if !dry_run {
                if let Err(e) = dedup::delete_duplicates(&store, &bucket, &mut report).await {
                    eprintln!(
                        "Deleted {} of {} duplicates before failing:",
                        report.deleted.len(),
                        report.duplicates.len()
                    );
                    for key in &report.deleted {
                        eprintln!("- {key}");
                    }
                    return Err(e.into());
                }
            }
            info!(
                scanned = report.scanned,
                unique = report.canonical.len(),
                duplicates = report.duplicates.len(),
                deleted = report.deleted.len(),
                dry_run,
                "Dedup finished"
            );
        }
        Commands::Ingest { event } => {
            let event = TriggerEvent::read(&event)?;
            let store = FsObjectStore::new(&cfg.object_store.root, cfg.object_store.page_size);
            let ocr = ocr::engine_from_config(&cfg.ocr)?;
            let docs = SqliteDocumentStore::open(&cfg.document_store.uri, &cfg.document_store.database)?;
            docs.prepare_collection(&cfg.document_store.collection)?;
            let pipeline = IngestPipeline {
                store: &store,
                ocr: ocr.as_ref(),
                docs: &docs,
                collection: &cfg.document_store.collection,
            };

            let response = pipeline.handle(&event).await?;
            info!(
                collection = %cfg.document_store.collection,
                documents = docs.count(&cfg.document_store.collection)?,
                "Database statistics"
            );
            println!("{}", serde_json::to_string(&response)?);
        }
        Commands::Extract { file } => {
            let text = std::fs::read_to_string(&file)?;
            let fields = heuristics::extract_invoice_fields(&text);
            let (filled, total) = fields.coverage();
            info!(filled, total, file = %file.display(), "Heuristic coverage");
            println!("{}", serde_json::to_string_pretty(&fields)?);
        }
        Commands::Invoices { limit } => {
            let docs = SqliteDocumentStore::open(&cfg.document_store.uri, &cfg.document_store.database)?;
            let collection = &cfg.document_store.collection;
            for (id, doc) in docs.find_all(collection, limit)? {
                println!("--- #{id} ---");
                println!("{}", serde_json::to_string_pretty(&doc)?);
            }
            info!(collection = %collection, total = docs.count(collection)?, "Database statistics");
        }
    }

    Ok(())
}
