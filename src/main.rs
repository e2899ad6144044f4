//! Savor CLI entry point.

use anyhow::Result;
use clap::Parser;
use savor::cli::{commands, Cli, Commands};
use savor::config::Settings;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| format!("savor={}", log_level)),
        ))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let config_path = cli
        .config
        .as_ref()
        .map(PathBuf::from)
        .unwrap_or_else(Settings::default_config_path);
    let settings = Settings::load_from(Some(&config_path))?;

    std::fs::create_dir_all(settings.data_dir())?;

    match cli.command {
        Commands::Ingest => {
            commands::run_ingest(settings).await?;
        }

        Commands::Catalog => {
            commands::run_catalog(settings).await?;
        }

        Commands::Search {
            query,
            limit,
            min_score,
        } => {
            commands::run_search(&query, limit, min_score, settings).await?;
        }

        Commands::Ask { question } => {
            commands::run_ask(&question, settings).await?;
        }

        Commands::Chat {
            server,
            token,
            mute,
        } => {
            commands::run_chat(server, token, mute, settings).await?;
        }

        Commands::Serve { host, port } => {
            commands::run_serve(host, port, settings).await?;
        }

        Commands::Config { action } => {
            commands::run_config(&action, config_path, settings)?;
        }
    }

    Ok(())
}
