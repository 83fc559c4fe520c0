//! Command-line interface for the risk dossier tools.

pub mod commands;
pub mod output;

use clap::{Parser, Subcommand};

use crate::models::OutputFormat;

/// Ingest client risk dossiers into PostgreSQL/pgvector and inspect related documents.
#[derive(Debug, Parser)]
#[command(name = "dossier")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[arg(
        long,
        short = 'f',
        global = true,
        help = "Output format: text, json, or markdown"
    )]
    pub format: Option<OutputFormat>,

    #[arg(long, short = 'v', global = true, help = "Enable verbose output")]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Ingest dossier PDFs for a client, grouped by review year
    Ingest(commands::IngestArgs),

    /// Show database connectivity and stored chunk counts per year
    Status(commands::StatusArgs),

    /// Create the pgvector extension, tables and indexes
    InitDb,

    /// Extract and chunk a local PDF without embedding or storing it
    Extract(commands::ExtractArgs),

    /// Render a parsed invoice JSON document
    Invoice(commands::InvoiceArgs),

    /// Score tabular records against the hosted risk model
    Predict(commands::PredictArgs),

    /// Manage configuration
    #[command(subcommand)]
    Config(commands::ConfigCommand),
}
