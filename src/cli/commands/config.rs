//! Config command implementation.

use crate::cli::{ConfigAction, Output};
use crate::config::Settings;
use anyhow::Result;
use std::path::PathBuf;

/// Run the config command. `path` is the file the settings were loaded from.
pub fn run_config(action: &ConfigAction, path: PathBuf, settings: Settings) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let mut shown = settings.clone();
            if !shown.server.api_tokens.is_empty() {
                shown.server.api_tokens = vec!["<redacted>".to_string(); shown.server.api_tokens.len()];
            }
            if shown.client.token.is_some() {
                shown.client.token = Some("<redacted>".to_string());
            }
            let toml_str = toml::to_string_pretty(&shown)
                .map_err(|e| anyhow::anyhow!("Failed to serialize config: {}", e))?;
            println!("{}", toml_str);
        }

        ConfigAction::Init => {
            if path.exists() {
                Output::info(&format!("Config already exists at {}", path.display()));
            } else {
                Settings::default().save_to(&path)?;
                Output::success(&format!("Created default config at {}", path.display()));
            }
        }

        ConfigAction::Path => {
            println!("{}", path.display());
        }
    }

    Ok(())
}
