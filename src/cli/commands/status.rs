use anyhow::Result;
use clap::Args;

use crate::cli::output::{StatusInfo, YearCount, get_formatter};
use crate::models::{Config, OutputFormat};
use crate::services::{DossierStore, PgDossierStore};

#[derive(Debug, Args)]
pub struct StatusArgs {
    /// Client to report on (defaults to DOSSIER_CLIENT_NAME)
    #[arg(long)]
    pub client: Option<String>,
}

pub async fn handle_status(args: StatusArgs, format: OutputFormat) -> Result<()> {
    let config = Config::load()?;
    let formatter = get_formatter(format);
    let client_name = args
        .client
        .unwrap_or_else(|| config.ingestion.client_name.clone());

    let mut status = StatusInfo {
        database: config.database.target(),
        database_connected: false,
        client_name,
        client_id: None,
        years: Vec::new(),
        source: config.storage.bucket.as_ref().map(|b| format!("gs://{}", b)),
        embedding_model: config.embedding.model.clone(),
        embedding_configured: config.embedding.api_key.is_some(),
    };

    match PgDossierStore::connect(&config.database, config.embedding.dimension as usize).await {
        Ok(store) => {
            status.database_connected = store.health_check().await.unwrap_or(false);
            if status.database_connected
                && let Ok(Some(client)) = store.find_client(&status.client_name).await
            {
                status.client_id = Some(client.id);
                status.years = store
                    .year_counts(client.id)
                    .await
                    .unwrap_or_default()
                    .into_iter()
                    .map(|(year, chunks)| YearCount { year, chunks })
                    .collect();
            }
        }
        Err(e) => tracing::debug!(error = %e, "Status check could not connect"),
    }

    print!("{}", formatter.format_status(&status));

    if !status.database_connected {
        eprintln!();
        eprintln!("Warning: PostgreSQL not accessible. Check DB_HOST/DB_PORT/DB_USER/DB_PASSWORD.");
    }
    if !status.embedding_configured {
        eprintln!("Hint: set GEMINI_API_KEY before running `dossier ingest`.");
    }

    Ok(())
}
