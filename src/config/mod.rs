//! Configuration module for Savor.
//!
//! Handles loading and managing application settings and prompt templates.

mod prompts;
mod settings;

pub use prompts::{Prompts, RagPrompts};
pub use settings::{
    CatalogProvider, CatalogSettings, ClientSettings, EmbeddingSettings, GeneralSettings,
    PromptSettings, RagSettings, ServerSettings, Settings, SpeechSettings, VectorStoreSettings,
};
