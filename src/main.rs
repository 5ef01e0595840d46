//! CLI entry point for the email dedup engine.
//!
//! Provides commands for processing a single email, inspecting the
//! index, and the administrative clear. Transport (IMAP/HTTP) lives
//! outside this binary; it exists to drive the engine from scripts and
//! for manual inspection.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use maildex::{
    DedupService, EmailContent, FastEmbedProvider, FileBackend, KeywordClassifier, Settings,
};

#[derive(Parser)]
#[command(name = "maildex", version, about = "Email duplicate detection and classification engine")]
struct Cli {
    /// Path to settings.toml (defaults to .maildex/settings.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one email through the duplicate check and classifier
    Process {
        /// File containing the plain-text body
        file: PathBuf,

        /// Subject line (defaults to the file stem)
        #[arg(long)]
        subject: Option<String>,

        /// Sender address
        #[arg(long, default_value = "unknown@localhost")]
        from: String,

        /// Date header (defaults to now, RFC 2822)
        #[arg(long)]
        date: Option<String>,

        /// Emit the outcome as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show index statistics
    Info,

    /// Empty the index and persist the empty state
    Clear,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("maildex=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let settings = match &cli.config {
        Some(path) => Settings::load_from(path.clone()),
        None => Settings::load(),
    }
    .context("failed to load configuration")?;

    let embedder = Arc::new(
        FastEmbedProvider::new(&settings.embedding.cache_dir)
            .context("failed to initialize embedding model")?,
    );
    let classifier = Arc::new(KeywordClassifier::new());
    let backend = Arc::new(FileBackend::new(settings.snapshot_path.clone()));

    let service = DedupService::new(&settings, embedder, classifier, backend)
        .context("failed to start engine")?;

    match cli.command {
        Commands::Process {
            file,
            subject,
            from,
            date,
            json,
        } => {
            let body = std::fs::read_to_string(&file)
                .with_context(|| format!("failed to read email body from {}", file.display()))?;
            let subject = subject.unwrap_or_else(|| {
                file.file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "(no subject)".to_string())
            });
            let date = date.unwrap_or_else(|| chrono::Utc::now().to_rfc2822());

            let email = EmailContent::new(subject, from, date, body);
            let outcome = service.process(&email)?;

            if json {
                println!("{}", serde_json::to_string_pretty(&outcome)?);
            } else if outcome.is_duplicate {
                let best = &outcome.similar_matches[0];
                println!(
                    "Duplicate of \"{}\" from {} (similarity {:.3})",
                    best.subject, best.from_address, best.similarity
                );
                println!("Request type (copied from match): {}", outcome.request_type);
            } else {
                println!(
                    "Committed as new entry: {} (confidence {:.2})",
                    outcome.request_type, outcome.confidence
                );
            }
        }

        Commands::Info => {
            let stats = service.stats();
            println!("Entries:   {}", stats.entry_count);
            println!("Records:   {}", stats.record_count);
            println!("Dimension: {}", stats.dimension);
            println!("Next ID:   {}", stats.next_id);
        }

        Commands::Clear => {
            service.clear()?;
            println!("Index cleared.");
        }
    }

    Ok(())
}
