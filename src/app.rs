//! Component wiring for Savor.
//!
//! Builds the catalog source, embedder, vector store, answer engine and
//! speech provider described by [`Settings`].

use crate::catalog::{CatalogRecord, CatalogSource, JsonCatalog, SqliteCatalog};
use crate::config::{CatalogProvider, Prompts, Settings};
use crate::embedding::{Embedder, OpenAIEmbedder};
use crate::error::{Result, SavorError};
use crate::indexer::Indexer;
use crate::openai::create_client_with_timeout;
use crate::rag::{Generator, OpenAIGenerator, RagEngine, Retriever};
use crate::speech::{OpenAISpeech, SpeechSynthesizer};
use crate::vector_store::{MemoryVectorStore, SqliteVectorStore, VectorStore};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

/// Stands in for a catalog that could not be opened.
struct UnavailableCatalog(String);

#[async_trait]
impl CatalogSource for UnavailableCatalog {
    async fn fetch_all(&self) -> Result<Vec<CatalogRecord>> {
        Err(SavorError::SourceUnavailable(self.0.clone()))
    }
}

/// The assembled components of one Savor process.
pub struct App {
    settings: Settings,
    prompts: Prompts,
    catalog: Arc<dyn CatalogSource>,
    embedder: Arc<dyn Embedder>,
    vector_store: Arc<dyn VectorStore>,
    generator: Arc<dyn Generator>,
    speech: Arc<dyn SpeechSynthesizer>,
}

impl App {
    /// Build every component from configuration.
    pub fn new(settings: Settings) -> Result<Self> {
        let prompts = Prompts::load(
            settings.prompts.custom_dir.as_deref(),
            Some(&settings.prompts.variables),
        )?;

        let client = create_client_with_timeout(settings.request_timeout())?;

        let catalog: Arc<dyn CatalogSource> = match settings.catalog.provider {
            CatalogProvider::Sqlite => {
                let path = settings.catalog_sqlite_path();
                match SqliteCatalog::open(&path) {
                    Ok(catalog) => Arc::new(catalog),
                    // Answering and speech still work without a catalog;
                    // only indexing needs it.
                    Err(SavorError::SourceUnavailable(reason)) => {
                        warn!("{}", reason);
                        Arc::new(UnavailableCatalog(reason))
                    }
                    Err(e) => return Err(e),
                }
            }
            CatalogProvider::Json => {
                let path = settings.catalog_json_path();
                info!("Using JSON catalog at {}", path.display());
                Arc::new(JsonCatalog::new(&path))
            }
        };

        let vector_store: Arc<dyn VectorStore> = match settings.vector_store.provider.as_str() {
            "sqlite" => Arc::new(SqliteVectorStore::new(&settings.sqlite_path())?),
            "memory" => Arc::new(MemoryVectorStore::new()),
            other => {
                return Err(SavorError::Config(format!(
                    "Unknown vector store provider: {}",
                    other
                )))
            }
        };

        let embedder = Arc::new(OpenAIEmbedder::with_client(
            client.clone(),
            &settings.embedding.model,
            settings.embedding.dimensions as usize,
        ));

        let generator = Arc::new(
            OpenAIGenerator::new(client.clone(), &settings.rag.model, settings.rag.temperature)
                .with_prompts(prompts.clone()),
        );

        let speech = Arc::new(OpenAISpeech::new(client, &settings.speech)?);

        Ok(Self::with_components(
            settings,
            prompts,
            catalog,
            embedder,
            vector_store,
            generator,
            speech,
        ))
    }

    /// Assemble an app from custom components.
    pub fn with_components(
        settings: Settings,
        prompts: Prompts,
        catalog: Arc<dyn CatalogSource>,
        embedder: Arc<dyn Embedder>,
        vector_store: Arc<dyn VectorStore>,
        generator: Arc<dyn Generator>,
        speech: Arc<dyn SpeechSynthesizer>,
    ) -> Self {
        Self {
            settings,
            prompts,
            catalog,
            embedder,
            vector_store,
            generator,
            speech,
        }
    }

    pub fn prompts(&self) -> &Prompts {
        &self.prompts
    }

    pub fn catalog(&self) -> Arc<dyn CatalogSource> {
        self.catalog.clone()
    }

    pub fn speech(&self) -> Arc<dyn SpeechSynthesizer> {
        self.speech.clone()
    }

    pub fn indexer(&self) -> Indexer {
        Indexer::new(
            self.catalog.clone(),
            self.embedder.clone(),
            self.vector_store.clone(),
        )
    }

    /// A retriever using the configured threshold and cap.
    pub fn retriever(&self) -> Retriever {
        Retriever::new(self.vector_store.clone(), self.embedder.clone())
            .with_match_threshold(self.settings.rag.match_threshold)
            .with_match_count(self.settings.rag.match_count)
    }

    pub fn engine(&self) -> RagEngine {
        RagEngine::new(
            self.retriever(),
            self.generator.clone(),
            &self.prompts.rag.no_context,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Dish, MemoryCatalog};
    use crate::embedding::testing::CharEmbedder;
    use crate::rag::generator::testing::ScriptedGenerator;
    use crate::speech::AudioClip;
    use futures::StreamExt;

    struct SilentSpeech;

    #[async_trait]
    impl SpeechSynthesizer for SilentSpeech {
        async fn synthesize(&self, _text: &str) -> Result<AudioClip> {
            Ok(AudioClip::new(Vec::new(), "audio/mpeg"))
        }
    }

    fn app(generator: Arc<ScriptedGenerator>) -> App {
        let mut settings = Settings::default();
        settings.rag.match_threshold = 0.05;

        let catalog = Arc::new(MemoryCatalog::new(vec![CatalogRecord::Dish(Dish {
            id: 7,
            name: "松露燉飯".to_string(),
            story: Some("主廚招牌".to_string()),
            price: 420.0,
            in_stock: true,
            ingredients: Vec::new(),
        })]));

        App::with_components(
            settings,
            Prompts::default(),
            catalog,
            Arc::new(CharEmbedder::new()),
            Arc::new(MemoryVectorStore::new()),
            generator,
            Arc::new(SilentSpeech),
        )
    }

    #[tokio::test]
    async fn test_indexed_record_reaches_generator_context() {
        let generator = Arc::new(ScriptedGenerator::new(&["420 元"]));
        let app = app(generator.clone());

        let report = app.indexer().reindex().await.unwrap();
        assert_eq!(report.count, 1);

        let answer: Vec<String> = app
            .engine()
            .answer("松露燉飯多少錢")
            .await
            .unwrap()
            .map(|f| f.unwrap())
            .collect()
            .await;
        assert_eq!(answer.concat(), "420 元");

        let (context, query) = generator.last_call().unwrap();
        assert!(context.contains("松露燉飯"));
        assert_eq!(query, "松露燉飯多少錢");
    }

    #[tokio::test]
    async fn test_missing_sqlite_catalog_fails_only_on_fetch() {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = Settings::default();
        settings.catalog.sqlite_path = dir.path().join("missing.db").display().to_string();
        settings.vector_store.provider = "memory".to_string();

        let app = App::new(settings).unwrap();
        let err = app.indexer().reindex().await.unwrap_err();
        assert!(matches!(err, SavorError::SourceUnavailable(_)));
    }

    #[test]
    fn test_unknown_vector_store_is_config_error() {
        let mut settings = Settings::default();
        settings.catalog.provider = CatalogProvider::Json;
        settings.vector_store.provider = "pinecone".to_string();
        assert!(matches!(App::new(settings), Err(SavorError::Config(_))));
    }

    #[tokio::test]
    async fn test_empty_store_uses_no_context_marker() {
        let generator = Arc::new(ScriptedGenerator::new(&["不知道"]));
        let app = app(generator.clone());

        let _ = app.engine().answer("任何問題").await.unwrap().count().await;

        let (context, _) = generator.last_call().unwrap();
        assert_eq!(context, app.prompts().rag.no_context);
    }
}
