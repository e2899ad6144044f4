//! CLI module for Savor.

pub mod commands;
mod output;
pub mod preflight;

pub use output::Output;

use clap::{Parser, Subcommand};

/// Savor - catalog-grounded answers about dishes and wines
///
/// Indexes a menu catalog into a vector store, answers questions grounded in
/// it, and reads the answers aloud.
#[derive(Parser, Debug)]
#[command(name = "savor")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Rebuild the knowledge base from the catalog
    Ingest,

    /// List the catalog records the indexer would see
    Catalog,

    /// Show the stored documents most similar to a query
    Search {
        /// Search query
        query: String,

        /// Maximum number of results
        #[arg(short, long)]
        limit: Option<usize>,

        /// Minimum similarity score (0.0-1.0)
        #[arg(short, long)]
        min_score: Option<f32>,
    },

    /// Ask a question and stream the answer
    Ask {
        /// The question to ask
        question: String,
    },

    /// Start an interactive chat session with spoken answers
    Chat {
        /// Use a running `savor serve` instance instead of local providers
        #[arg(long, num_args = 0..=1, default_missing_value = "")]
        server: Option<String>,

        /// Bearer token for the server
        #[arg(long, env = "SAVOR_API_TOKEN")]
        token: Option<String>,

        /// Do not play speech
        #[arg(long)]
        mute: bool,
    },

    /// Start the HTTP API server
    Serve {
        /// Host to bind to
        #[arg(long)]
        host: Option<String>,

        /// Port to bind to
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Write the default configuration file if none exists
    Init,

    /// Show configuration file path
    Path,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_server_flag_without_value() {
        let cli = Cli::try_parse_from(["savor", "chat", "--server", "--mute"]).unwrap();
        match cli.command {
            Commands::Chat { server, mute, .. } => {
                assert_eq!(server.as_deref(), Some(""));
                assert!(mute);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli =
            Cli::try_parse_from(["savor", "search", "紅酒", "-vv", "--config", "/tmp/c.toml"])
                .unwrap();
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.config.as_deref(), Some("/tmp/c.toml"));
        assert!(matches!(cli.command, Commands::Search { limit: None, .. }));
    }
}
