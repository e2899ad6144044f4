//! Configuration settings for Savor.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct Settings {
    pub general: GeneralSettings,
    pub embedding: EmbeddingSettings,
    pub catalog: CatalogSettings,
    pub vector_store: VectorStoreSettings,
    pub rag: RagSettings,
    pub speech: SpeechSettings,
    pub server: ServerSettings,
    pub client: ClientSettings,
    pub prompts: PromptSettings,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralSettings {
    /// Directory for storing application data.
    pub data_dir: String,
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
    /// Timeout applied to every provider request, in seconds.
    pub request_timeout_secs: u64,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            data_dir: "~/.savor".to_string(),
            log_level: "info".to_string(),
            request_timeout_secs: crate::openai::DEFAULT_TIMEOUT_SECS,
        }
    }
}

/// Embedding generation settings.
///
/// The indexer and the retriever share these, so stored documents and
/// queries always live in the same embedding space.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    /// Embedding provider (openai).
    pub provider: String,
    /// Embedding model to use.
    pub model: String,
    /// Embedding dimensions.
    pub dimensions: u32,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: "text-embedding-3-small".to_string(),
            dimensions: 1536,
        }
    }
}

/// Where catalog records come from.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum CatalogProvider {
    /// `dishes` and `wines` tables in an externally managed SQLite database.
    #[default]
    Sqlite,
    /// A JSON array of records.
    Json,
}

impl std::str::FromStr for CatalogProvider {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sqlite" => Ok(CatalogProvider::Sqlite),
            "json" => Ok(CatalogProvider::Json),
            _ => Err(format!("Unknown catalog provider: {}", s)),
        }
    }
}

impl std::fmt::Display for CatalogProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CatalogProvider::Sqlite => write!(f, "sqlite"),
            CatalogProvider::Json => write!(f, "json"),
        }
    }
}

/// Catalog source settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogSettings {
    /// Catalog provider (sqlite, json).
    pub provider: CatalogProvider,
    /// Path to the catalog SQLite database (for sqlite provider).
    pub sqlite_path: String,
    /// Path to the catalog JSON file (for json provider).
    pub json_path: String,
}

impl Default for CatalogSettings {
    fn default() -> Self {
        Self {
            provider: CatalogProvider::Sqlite,
            sqlite_path: "~/.savor/catalog.db".to_string(),
            json_path: "~/.savor/catalog.json".to_string(),
        }
    }
}

/// Vector store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorStoreSettings {
    /// Vector store provider (sqlite, memory).
    pub provider: String,
    /// Path to SQLite database (for sqlite provider).
    pub sqlite_path: String,
}

impl Default for VectorStoreSettings {
    fn default() -> Self {
        Self {
            provider: "sqlite".to_string(),
            sqlite_path: "~/.savor/vectors.db".to_string(),
        }
    }
}

/// RAG (Retrieval-Augmented Generation) settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RagSettings {
    /// LLM model for response generation.
    pub model: String,
    /// Minimum cosine similarity for a stored document to be used as context.
    pub match_threshold: f32,
    /// Maximum number of context documents.
    pub match_count: usize,
    /// Sampling temperature for answers.
    pub temperature: f32,
}

impl Default for RagSettings {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            match_threshold: 0.3,
            match_count: 5,
            temperature: 0.2,
        }
    }
}

/// Speech synthesis settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeechSettings {
    /// TTS model.
    pub model: String,
    /// Voice name (alloy, echo, fable, onyx, nova, shimmer).
    pub voice: String,
    /// Audio encoding (mp3, opus, aac, flac, wav, pcm).
    pub format: String,
}

impl Default for SpeechSettings {
    fn default() -> Self {
        Self {
            model: "tts-1".to_string(),
            voice: "alloy".to_string(),
            format: "mp3".to_string(),
        }
    }
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Host to bind to.
    pub host: String,
    /// Port to bind to.
    pub port: u16,
    /// Bearer tokens accepted by the API. Empty disables authentication.
    pub api_tokens: Vec<String>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            api_tokens: Vec::new(),
        }
    }
}

/// Interactive client settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientSettings {
    /// Base URL of a running `savor serve` instance.
    pub server_url: String,
    /// Bearer token sent to the server.
    pub token: Option<String>,
    /// Delay between revealed characters, in milliseconds.
    pub reveal_interval_ms: u64,
    /// External player used for speech playback.
    pub player: String,
    /// Arguments passed to the player before the audio file path.
    pub player_args: Vec<String>,
    /// Start playback as soon as the newest answer's audio is ready.
    pub autoplay: bool,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            server_url: "http://127.0.0.1:3000".to_string(),
            token: None,
            reveal_interval_ms: 30,
            player: "ffplay".to_string(),
            player_args: vec![
                "-nodisp".to_string(),
                "-autoexit".to_string(),
                "-loglevel".to_string(),
                "quiet".to_string(),
            ],
            autoplay: true,
        }
    }
}

impl ClientSettings {
    pub fn reveal_interval(&self) -> Duration {
        Duration::from_millis(self.reveal_interval_ms.max(1))
    }
}

/// Prompt customization settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct PromptSettings {
    /// Directory for custom prompts (overrides defaults).
    pub custom_dir: Option<String>,
    /// Custom variables available in all prompts as {{variable_name}}.
    pub variables: std::collections::HashMap<String, String>,
}

impl Settings {
    /// Load settings from the default configuration file.
    pub fn load() -> crate::error::Result<Self> {
        Self::load_from(None)
    }

    /// Load settings from a specific path, or default location if None.
    pub fn load_from(path: Option<&PathBuf>) -> crate::error::Result<Self> {
        let config_path = match path {
            Some(p) => p.clone(),
            None => Self::default_config_path(),
        };

        let mut settings = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            toml::from_str(&content)?
        } else {
            Settings::default()
        };

        if let Ok(token) = std::env::var("SAVOR_API_TOKEN") {
            if !token.is_empty() && !settings.server.api_tokens.contains(&token) {
                settings.server.api_tokens.push(token);
            }
        }

        Ok(settings)
    }

    /// Save settings to a specific path.
    pub fn save_to(&self, path: &PathBuf) -> crate::error::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::error::SavorError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the default configuration file path.
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("savor")
            .join("config.toml")
    }

    /// Expand shell variables in paths (e.g., ~).
    pub fn expand_path(path: &str) -> PathBuf {
        PathBuf::from(shellexpand::tilde(path).to_string())
    }

    /// Get the expanded data directory path.
    pub fn data_dir(&self) -> PathBuf {
        Self::expand_path(&self.general.data_dir)
    }

    /// Get the expanded vector store database path.
    pub fn sqlite_path(&self) -> PathBuf {
        Self::expand_path(&self.vector_store.sqlite_path)
    }

    /// Get the expanded catalog database path.
    pub fn catalog_sqlite_path(&self) -> PathBuf {
        Self::expand_path(&self.catalog.sqlite_path)
    }

    /// Get the expanded catalog JSON path.
    pub fn catalog_json_path(&self) -> PathBuf {
        Self::expand_path(&self.catalog.json_path)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.general.request_timeout_secs)
    }
}
