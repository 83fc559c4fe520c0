use anyhow::Result;
use clap::Parser;
use tokio::signal;

use risk_dossier::cli::commands::{
    handle_config, handle_extract, handle_ingest, handle_init_db, handle_invoice, handle_predict,
    handle_status,
};
use risk_dossier::cli::output::get_formatter;
use risk_dossier::cli::{Cli, Commands};
use risk_dossier::logging::init_tracing;
use risk_dossier::models::{Config, OutputFormat};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let format = cli.format.unwrap_or_else(|| {
        Config::load_file()
            .map(|c| c.output.default_format)
            .unwrap_or_default()
    });

    tokio::select! {
        result = run_command(cli.command, format) => {
            if let Err(e) = result {
                let message = get_formatter(format).format_error(&format!("{e:#}"));
                eprintln!("{}", message.trim_end());
                std::process::exit(1);
            }
        }
        _ = shutdown_signal() => {
            eprintln!("\nReceived shutdown signal, stopping...");
            tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
        }
    }

    Ok(())
}

async fn run_command(command: Commands, format: OutputFormat) -> Result<()> {
    match command {
        Commands::Ingest(args) => handle_ingest(args, format).await,
        Commands::Status(args) => handle_status(args, format).await,
        Commands::InitDb => handle_init_db(format).await,
        Commands::Extract(args) => handle_extract(args, format).await,
        Commands::Invoice(args) => handle_invoice(args, format).await,
        Commands::Predict(args) => handle_predict(args, format).await,
        Commands::Config(cmd) => handle_config(cmd, format).await,
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
