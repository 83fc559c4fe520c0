use anyhow::{Context, Result};
use clap::Args;
use std::path::Path;

use crate::cli::output::get_formatter;
use crate::models::{Config, OutputFormat};
use crate::services::{
    DocumentSource, GcsSource, PredictionClient, Record, load_records, records_from_bytes,
};
use crate::utils::split_gcs_uri;

#[derive(Debug, Args)]
pub struct PredictArgs {
    /// Records to score: a CSV file with a header row, a JSON array of objects, JSON Lines,
    /// or a gs://bucket/object path to any of these
    pub input: String,
}

pub async fn handle_predict(args: PredictArgs, format: OutputFormat) -> Result<()> {
    let config = Config::load()?;
    let formatter = get_formatter(format);

    let records = read_records(&args.input, &config)
        .await
        .with_context(|| format!("failed to load records from {}", args.input))?;
    if records.is_empty() {
        println!("{}", formatter.format_message("No records to score."));
        return Ok(());
    }

    let client = PredictionClient::new(&config.prediction)?;
    tracing::info!(records = records.len(), endpoint = %client.endpoint_url(), "Requesting predictions");

    let rows = client.classify(&records).await.context("prediction request failed")?;
    print!("{}", formatter.format_predictions(&rows));
    Ok(())
}

async fn read_records(input: &str, config: &Config) -> Result<Vec<Record>> {
    match split_gcs_uri(input) {
        Some((bucket, object)) => {
            let source = GcsSource::new(bucket, &config.storage)?;
            let bytes = source.fetch(object).await?;
            Ok(records_from_bytes(object, &bytes)?)
        }
        None => Ok(load_records(Path::new(input))?),
    }
}
