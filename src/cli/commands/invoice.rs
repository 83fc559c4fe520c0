use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;

use crate::cli::output::get_formatter;
use crate::models::{Invoice, OutputFormat};

#[derive(Debug, Args)]
pub struct InvoiceArgs {
    /// Invoice JSON produced by the document parser
    pub path: PathBuf,
}

pub async fn handle_invoice(args: InvoiceArgs, format: OutputFormat) -> Result<()> {
    let formatter = get_formatter(format);
    let invoice = Invoice::from_path(&args.path)
        .with_context(|| format!("failed to load invoice {}", args.path.display()))?;

    print!("{}", formatter.format_invoice(&invoice));
    Ok(())
}
