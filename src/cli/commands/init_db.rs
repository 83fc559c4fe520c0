use anyhow::{Context, Result};

use crate::cli::output::get_formatter;
use crate::models::{Config, OutputFormat};
use crate::services::{CLIENTS_TABLE, CORPUS_TABLE, DossierStore, PgDossierStore};

pub async fn handle_init_db(format: OutputFormat) -> Result<()> {
    let config = Config::load()?;
    let formatter = get_formatter(format);

    let store = PgDossierStore::connect(&config.database, config.embedding.dimension as usize)
        .await
        .with_context(|| format!("cannot reach {}", config.database.target()))?;
    store
        .ensure_schema()
        .await
        .context("failed to initialize schema")?;

    println!(
        "{}",
        formatter.format_message(&format!(
            "Schema ready on {}: {}, {} (vector({}))",
            config.database.target(),
            CLIENTS_TABLE,
            CORPUS_TABLE,
            config.embedding.dimension
        ))
    );
    Ok(())
}
