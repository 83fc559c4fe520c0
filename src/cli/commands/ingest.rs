//! Ingest command implementation.

use anyhow::{Context, Result};
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;

use crate::cli::output::get_formatter;
use crate::error::IngestError;
use crate::models::{Config, OutputFormat};
use crate::services::{
    DocumentSource, DossierStore, Embedder, EmbeddingClient, GcsSource, Ingestor, LocalSource,
    PgDossierStore, TextChunker,
};

#[derive(Debug, Args)]
pub struct IngestArgs {
    /// Cloud Storage bucket to read dossiers from (defaults to GCS_BUCKET_NAME)
    #[arg(long, conflicts_with = "dir")]
    pub bucket: Option<String>,

    /// Local directory of dossier PDFs instead of a bucket
    #[arg(long)]
    pub dir: Option<PathBuf>,

    /// Client the dossiers belong to (defaults to DOSSIER_CLIENT_NAME)
    #[arg(long)]
    pub client: Option<String>,

    /// Chunk window in characters
    #[arg(long)]
    pub chunk_size: Option<u32>,

    /// Characters shared between consecutive chunks
    #[arg(long)]
    pub chunk_overlap: Option<u32>,

    /// Create the extension and tables before ingesting
    #[arg(long)]
    pub init_schema: bool,

    /// List, classify, extract and chunk without embedding or storing
    #[arg(long)]
    pub dry_run: bool,
}

pub async fn handle_ingest(args: IngestArgs, format: OutputFormat) -> Result<()> {
    let mut config = Config::load()?;
    if let Some(size) = args.chunk_size {
        config.ingestion.chunk_size = size;
    }
    if let Some(overlap) = args.chunk_overlap {
        config.ingestion.chunk_overlap = overlap;
    }
    if let Some(client) = args.client {
        config.ingestion.client_name = client;
    }

    let formatter = get_formatter(format);
    let source = open_source(&config, args.bucket, args.dir)?;
    let chunker = TextChunker::from_config(&config.ingestion);

    let mut ingestor = Ingestor::new(source.as_ref(), chunker);
    if format == OutputFormat::Text {
        ingestor = ingestor.with_progress(progress_bar()?);
    }

    if args.dry_run {
        let report = ingestor.survey().await;
        print!("{}", formatter.format_ingest_report(&report));
        return Ok(());
    }

    let store = PgDossierStore::connect(&config.database, config.embedding.dimension as usize)
        .await
        .with_context(|| format!("cannot reach {}", config.database.target()))?;

    if args.init_schema {
        store
            .ensure_schema()
            .await
            .context("failed to initialize schema")?;
    }

    let embedder =
        EmbeddingClient::new(&config.embedding).context("failed to initialize embedding client")?;

    tracing::info!(
        source = %source.describe(),
        client = %config.ingestion.client_name,
        model = %embedder.model(),
        chunk_size = config.ingestion.chunk_size,
        chunk_overlap = config.ingestion.chunk_overlap,
        "Starting ingestion"
    );

    let report = ingestor
        .run(&config.ingestion.client_name, &embedder, &store)
        .await?;

    print!("{}", formatter.format_ingest_report(&report));

    let failed: Vec<String> = report.failed_years().map(|y| y.year.to_string()).collect();
    if !failed.is_empty() {
        eprintln!(
            "Warning: inserts for {} were rolled back; re-run to retry them.",
            failed.join(", ")
        );
    }

    Ok(())
}

fn open_source(
    config: &Config,
    bucket: Option<String>,
    dir: Option<PathBuf>,
) -> Result<Box<dyn DocumentSource>> {
    if let Some(dir) = dir {
        return Ok(Box::new(LocalSource::new(
            dir,
            config.ingestion.max_file_size,
        )));
    }

    let bucket = bucket
        .or_else(|| config.storage.bucket.clone())
        .ok_or(IngestError::NoSource)?;
    let source = GcsSource::new(&bucket, &config.storage).context("failed to build storage client")?;
    Ok(Box::new(source))
}

fn progress_bar() -> Result<ProgressBar> {
    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")?
            .progress_chars("#>-"),
    );
    Ok(pb)
}
