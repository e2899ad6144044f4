//! HTTP API: indexing trigger, streamed answers and speech synthesis.

use crate::error::SavorError;
use crate::indexer::Indexer;
use crate::rag::RagEngine;
use crate::speech::SpeechSynthesizer;
use axum::{
    body::Body,
    extract::{rejection::JsonRejection, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use futures::{stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, instrument, warn};

/// Shared application state.
pub struct AppState {
    pub engine: Arc<RagEngine>,
    pub indexer: Arc<Indexer>,
    pub speech: Arc<dyn SpeechSynthesizer>,
    /// Accepted bearer tokens. Empty accepts every request.
    pub api_tokens: Vec<String>,
}

#[derive(Deserialize)]
struct QueryRequest {
    #[serde(default)]
    query: String,
}

#[derive(Deserialize)]
struct SpeechRequest {
    #[serde(default)]
    text: String,
}

#[derive(Serialize)]
struct MessageResponse {
    message: String,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

/// Build the API router.
pub fn router(state: Arc<AppState>) -> Router {
    if state.api_tokens.is_empty() {
        warn!("No API tokens configured, the server accepts unauthenticated requests");
    }

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/ingest", post(ingest))
        .route("/query", post(query))
        .route("/speech", post(speech))
        .layer(cors)
        .with_state(state)
}

/// Serve the API on an already bound listener until the task is dropped.
pub async fn serve(listener: TcpListener, state: Arc<AppState>) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!("Listening on http://{}", addr);
    }
    axum::serve(listener, router(state)).await
}

fn error_response(status: StatusCode, error: impl ToString) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: error.to_string(),
        }),
    )
        .into_response()
}

fn status_for(err: &SavorError) -> StatusCode {
    match err {
        SavorError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        SavorError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn authorize(state: &AppState, headers: &HeaderMap) -> Result<(), Response> {
    if state.api_tokens.is_empty() {
        return Ok(());
    }

    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim);

    match token {
        Some(token) if state.api_tokens.iter().any(|t| t == token) => Ok(()),
        Some(_) => Err(error_response(StatusCode::UNAUTHORIZED, "Invalid API token")),
        None => Err(error_response(
            StatusCode::UNAUTHORIZED,
            "Missing bearer token",
        )),
    }
}

/// Unwrap a JSON body, turning axum's plain-text rejection into `{error}`.
fn request_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, Response> {
    body.map(|Json(req)| req)
        .map_err(|rejection| error_response(StatusCode::BAD_REQUEST, rejection.body_text()))
}

// === Handlers ===

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

#[instrument(skip_all)]
async fn ingest(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    if let Err(denied) = authorize(&state, &headers) {
        return denied;
    }

    match state.indexer.reindex().await {
        Ok(report) if report.count == 0 => Json(MessageResponse {
            message: "資料庫中沒有項目可同步。".to_string(),
        })
        .into_response(),
        Ok(report) => Json(MessageResponse {
            message: format!("成功同步 {} 筆項目資料到 AI 知識庫。", report.count),
        })
        .into_response(),
        Err(e) => {
            warn!("Indexing failed: {}", e);
            error_response(status_for(&e), e)
        }
    }
}

#[instrument(skip_all)]
async fn query(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Result<Json<QueryRequest>, JsonRejection>,
) -> Response {
    if let Err(denied) = authorize(&state, &headers) {
        return denied;
    }
    let req = match request_body(body) {
        Ok(req) => req,
        Err(rejected) => return rejected,
    };
    if req.query.trim().is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "No query provided.");
    }

    let mut fragments = match state.engine.answer(&req.query).await {
        Ok(fragments) => fragments,
        Err(e) => {
            warn!("Query failed before streaming: {}", e);
            return error_response(status_for(&e), e);
        }
    };

    // Look at the first fragment so a provider failure at the start still
    // gets a JSON error instead of an aborted body.
    let head = match fragments.next().await {
        Some(Ok(fragment)) => Some(fragment),
        Some(Err(e)) => {
            warn!("Generation failed: {}", e);
            return error_response(status_for(&e), e);
        }
        None => None,
    };

    let body = stream::iter(head.map(Ok::<String, SavorError>)).chain(fragments);

    (
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        Body::from_stream(body),
    )
        .into_response()
}

#[instrument(skip_all)]
async fn speech(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Result<Json<SpeechRequest>, JsonRejection>,
) -> Response {
    if let Err(denied) = authorize(&state, &headers) {
        return denied;
    }
    let req = match request_body(body) {
        Ok(req) => req,
        Err(rejected) => return rejected,
    };
    if req.text.trim().is_empty() {
        return error_response(
            StatusCode::BAD_REQUEST,
            "No text provided for speech synthesis.",
        );
    }

    match state.speech.synthesize(&req.text).await {
        Ok(clip) => ([(header::CONTENT_TYPE, clip.content_type)], clip.bytes).into_response(),
        Err(e) => {
            warn!("Speech synthesis failed: {}", e);
            error_response(status_for(&e), e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{CatalogRecord, Dish, MemoryCatalog};
    use crate::client::{AnswerService, HttpAnswerService};
    use crate::config::Prompts;
    use crate::embedding::testing::CharEmbedder;
    use crate::error::Result;
    use crate::rag::generator::testing::ScriptedGenerator;
    use crate::rag::Retriever;
    use crate::speech::AudioClip;
    use crate::vector_store::{MemoryVectorStore, VectorStore};
    use async_trait::async_trait;
    use std::time::Duration;

    struct EchoSpeech;

    #[async_trait]
    impl SpeechSynthesizer for EchoSpeech {
        async fn synthesize(&self, text: &str) -> Result<AudioClip> {
            Ok(AudioClip::new(text.as_bytes().to_vec(), "audio/mpeg"))
        }
    }

    struct Fixture {
        base_url: String,
        store: Arc<MemoryVectorStore>,
    }

    async fn start(generator: ScriptedGenerator, tokens: &[&str]) -> Fixture {
        let embedder = Arc::new(CharEmbedder::new());
        let store = Arc::new(MemoryVectorStore::new());
        let catalog = Arc::new(MemoryCatalog::new(vec![CatalogRecord::Dish(Dish {
            id: 1,
            name: "蒜味奶油雞".to_string(),
            story: None,
            price: 280.0,
            in_stock: true,
            ingredients: Vec::new(),
        })]));

        let retriever = Retriever::new(store.clone(), embedder.clone()).with_match_threshold(0.05);
        let engine = RagEngine::new(
            retriever,
            Arc::new(generator),
            &Prompts::default().rag.no_context,
        );
        let state = Arc::new(AppState {
            engine: Arc::new(engine),
            indexer: Arc::new(Indexer::new(catalog, embedder, store.clone())),
            speech: Arc::new(EchoSpeech),
            api_tokens: tokens.iter().map(|t| t.to_string()).collect(),
        });

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(serve(listener, state));

        Fixture {
            base_url: format!("http://{}", addr),
            store,
        }
    }

    fn client(fixture: &Fixture, token: Option<&str>) -> HttpAnswerService {
        HttpAnswerService::new(
            &fixture.base_url,
            token.map(str::to_string),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_ingest_then_stream_answer() {
        let fixture = start(ScriptedGenerator::new(&["這道菜", "是 280 元"]), &["secret"]).await;

        let response = reqwest::Client::new()
            .post(format!("{}/ingest", fixture.base_url))
            .bearer_auth("secret")
            .send()
            .await
            .unwrap();
        assert!(response.status().is_success());
        let body: serde_json::Value = response.json().await.unwrap();
        assert_eq!(body["message"], "成功同步 1 筆項目資料到 AI 知識庫。");
        assert_eq!(fixture.store.document_count().await.unwrap(), 1);

        let service = client(&fixture, Some("secret"));
        let fragments: Vec<String> = service
            .ask("這道菜多少錢")
            .await
            .unwrap()
            .map(|f| f.unwrap())
            .collect()
            .await;
        assert_eq!(fragments.concat(), "這道菜是 280 元");
    }

    #[tokio::test]
    async fn test_missing_or_wrong_token_is_rejected() {
        let fixture = start(ScriptedGenerator::new(&["x"]), &["secret"]).await;

        let err = client(&fixture, None).ask("q").await.err().unwrap();
        assert!(matches!(err, SavorError::Unauthorized(_)));

        let err = client(&fixture, Some("wrong")).synthesize("hi").await.unwrap_err();
        assert!(matches!(err, SavorError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn test_no_tokens_accepts_everyone() {
        let fixture = start(ScriptedGenerator::new(&["ok"]), &[]).await;
        let clip = client(&fixture, None).synthesize("你好").await.unwrap();
        assert_eq!(clip.bytes, "你好".as_bytes());
        assert_eq!(clip.content_type, "audio/mpeg");
    }

    #[tokio::test]
    async fn test_generation_failure_at_start_is_json_error() {
        let fixture = start(ScriptedGenerator::failing_after(&[]), &[]).await;

        let response = reqwest::Client::new()
            .post(format!("{}/query", fixture.base_url))
            .json(&serde_json::json!({ "query": "q" }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::INTERNAL_SERVER_ERROR);
        let body: serde_json::Value = response.json().await.unwrap();
        assert!(body["error"].as_str().unwrap().contains("rate limited"));
    }

    #[tokio::test]
    async fn test_malformed_body_is_json_error() {
        let fixture = start(ScriptedGenerator::new(&["x"]), &["secret"]).await;
        let http = reqwest::Client::new();

        for path in ["query", "speech"] {
            let response = http
                .post(format!("{}/{}", fixture.base_url, path))
                .bearer_auth("secret")
                .header(header::CONTENT_TYPE.as_str(), "application/json")
                .body("{not json")
                .send()
                .await
                .unwrap();
            assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);
            let body: serde_json::Value = response.json().await.unwrap();
            assert!(body["error"].is_string(), "{}: {}", path, body);
        }

        let response = http
            .post(format!("{}/query", fixture.base_url))
            .bearer_auth("secret")
            .header(header::CONTENT_TYPE.as_str(), "text/plain")
            .body("hello")
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);
        let body: serde_json::Value = response.json().await.unwrap();
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn test_token_is_checked_before_body() {
        let fixture = start(ScriptedGenerator::new(&["x"]), &["secret"]).await;

        let response = reqwest::Client::new()
            .post(format!("{}/query", fixture.base_url))
            .header(header::CONTENT_TYPE.as_str(), "application/json")
            .body("{not json")
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::UNAUTHORIZED);
        let body: serde_json::Value = response.json().await.unwrap();
        assert_eq!(body["error"], "Missing bearer token");
    }

    #[tokio::test]
    async fn test_blank_inputs_are_bad_requests() {
        let fixture = start(ScriptedGenerator::new(&["x"]), &[]).await;
        let service = client(&fixture, None);

        assert!(matches!(
            service.ask("  ").await.err().unwrap(),
            SavorError::InvalidInput(_)
        ));
        let err = service.synthesize("").await.unwrap_err();
        match err {
            SavorError::InvalidInput(message) => {
                assert_eq!(message, "No text provided for speech synthesis.")
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[tokio::test]
    async fn test_empty_catalog_message() {
        let embedder = Arc::new(CharEmbedder::new());
        let store = Arc::new(MemoryVectorStore::new());
        let state = Arc::new(AppState {
            engine: Arc::new(RagEngine::new(
                Retriever::new(store.clone(), embedder.clone()),
                Arc::new(ScriptedGenerator::new(&[])),
                "none",
            )),
            indexer: Arc::new(Indexer::new(
                Arc::new(MemoryCatalog::new(Vec::new())),
                embedder,
                store,
            )),
            speech: Arc::new(EchoSpeech),
            api_tokens: Vec::new(),
        });
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(serve(listener, state));

        let body: serde_json::Value = reqwest::Client::new()
            .post(format!("http://{}/ingest", addr))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["message"], "資料庫中沒有項目可同步。");
    }
}
