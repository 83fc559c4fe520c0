use anyhow::Result;
use clap::Args;
use std::path::PathBuf;

use crate::cli::output::{ExtractionInfo, get_formatter};
use crate::models::{Config, OutputFormat};
use crate::services::{TextChunker, extract_pages_from_path};
use crate::utils::review_year_from_filename;

#[derive(Debug, Args)]
pub struct ExtractArgs {
    /// PDF file to extract
    pub path: PathBuf,

    /// Print a preview of every chunk
    #[arg(long)]
    pub show_chunks: bool,
}

pub async fn handle_extract(args: ExtractArgs, format: OutputFormat) -> Result<()> {
    let config = Config::load()?;
    let formatter = get_formatter(format);

    if !args.path.is_file() {
        anyhow::bail!("file does not exist: {}", args.path.display());
    }

    let extracted = extract_pages_from_path(&args.path);
    let text = extracted.text();
    let chunks = TextChunker::from_config(&config.ingestion).split(&text);
    let file_name = args
        .path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| args.path.display().to_string());

    let info = ExtractionInfo {
        review_year: review_year_from_filename(&file_name),
        file: args.path.display().to_string(),
        pages: extracted.page_count(),
        characters: text.chars().count(),
        chunk_count: chunks.len(),
        chunks: args.show_chunks.then_some(chunks),
    };

    print!("{}", formatter.format_extraction(&info));
    Ok(())
}
