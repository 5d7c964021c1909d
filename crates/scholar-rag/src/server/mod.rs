//! HTTP server for the RAG system

pub mod routes;
pub mod state;

use axum::{extract::State, http::StatusCode, routing::get, Router};
use std::net::SocketAddr;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::config::RagConfig;
use crate::error::{Error, Result};
use state::AppState;

/// RAG HTTP Server
pub struct RagServer {
    config: RagConfig,
    state: AppState,
}

impl RagServer {
    /// Create a new RAG server
    pub async fn new(config: RagConfig) -> Result<Self> {
        let state = AppState::new(config.clone()).await?;
        Ok(Self { config, state })
    }

    /// Wrap already-assembled state
    pub fn with_state(state: AppState) -> Self {
        Self {
            config: state.config().clone(),
            state,
        }
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Build the router with all routes
    pub fn build_router(&self) -> Router {
        let router = Router::new()
            .route("/health", get(health_check))
            .route("/ready", get(readiness))
            .nest("/api", routes::api_routes(self.config.server.max_body_bytes))
            .with_state(self.state.clone())
            // Applied bottom to top
            .layer(TraceLayer::new_for_http())
            .layer(CompressionLayer::new());

        if self.config.server.enable_cors {
            router.layer(
                CorsLayer::new()
                    .allow_origin(Any)
                    .allow_methods(Any)
                    .allow_headers(Any),
            )
        } else {
            router
        }
    }

    /// Start the server
    pub async fn start(self) -> Result<()> {
        let addr: SocketAddr = self
            .address()
            .parse()
            .map_err(|e| Error::Config(format!("Invalid address: {}", e)))?;

        let router = self.build_router();

        tracing::info!("Starting scholar-rag server on http://{}", addr);
        tracing::info!("API info: http://{}/api/info", addr);

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| Error::Config(format!("Failed to bind: {}", e)))?;

        axum::serve(listener, router)
            .await
            .map_err(|e| Error::Internal(format!("Server error: {}", e)))?;

        Ok(())
    }

    /// Get the server address
    pub fn address(&self) -> String {
        format!("{}:{}", self.config.server.host, self.config.server.port)
    }
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}

/// Readiness check endpoint
async fn readiness(State(state): State<AppState>) -> StatusCode {
    if state.is_ready() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::TextEmbedder;
    use crate::generation::synthesizer::tests::ScriptedLlm;
    use crate::providers::{EmbeddingProvider, HashEmbedder};
    use crate::storage::PassageStore;
    use async_trait::async_trait;
    use reqwest::Method;
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    const PAPER: &str = "Scaling laws describe how loss falls with compute.\n\n\
        Larger models trained on more tokens reach lower loss.\n\n\
        Data quality matters as much as quantity.";

    /// Hash embedder that can be switched off to simulate an outage
    struct SwitchableEmbedder {
        inner: HashEmbedder,
        down: AtomicBool,
    }

    #[async_trait]
    impl EmbeddingProvider for SwitchableEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            if self.down.load(Ordering::SeqCst) {
                return Err(Error::embedding("ollama down"));
            }
            self.inner.embed(text).await
        }

        fn dimensions(&self) -> usize {
            self.inner.dimensions()
        }

        async fn health_check(&self) -> Result<bool> {
            Ok(!self.down.load(Ordering::SeqCst))
        }

        fn name(&self) -> &str {
            "switchable"
        }
    }

    struct TestServer {
        base: String,
        state: AppState,
        llm: Arc<ScriptedLlm>,
        client: reqwest::Client,
        handle: tokio::task::JoinHandle<()>,
    }

    impl TestServer {
        async fn spawn(reply: &str) -> Self {
            Self::spawn_with(reply, Arc::new(HashEmbedder::new(64).unwrap())).await
        }

        async fn spawn_with(reply: &str, provider: Arc<dyn EmbeddingProvider>) -> Self {
            let llm = ScriptedLlm::replying(reply);
            let store = Arc::new(PassageStore::in_memory().unwrap());
            let embedder = TextEmbedder::new(provider);
            let state =
                AppState::from_parts(RagConfig::default(), store, embedder, llm.cache()).unwrap();
            let router = RagServer::with_state(state.clone()).build_router();

            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();
            let handle = tokio::spawn(async move {
                axum::serve(listener, router).await.unwrap();
            });

            Self {
                base: format!("http://{}", addr),
                state,
                llm,
                client: reqwest::Client::builder().no_proxy().build().unwrap(),
                handle,
            }
        }

        async fn send(&self, method: Method, path: &str, body: Option<Value>) -> (StatusCode, Value) {
            let mut request = self.client.request(method, format!("{}{}", self.base, path));
            if let Some(body) = body {
                request = request.json(&body);
            }

            let response = request.send().await.unwrap();
            let status = StatusCode::from_u16(response.status().as_u16()).unwrap();
            let bytes = response.bytes().await.unwrap();
            (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
        }
    }

    impl Drop for TestServer {
        fn drop(&mut self) {
            self.handle.abort();
        }
    }

    #[tokio::test]
    async fn test_health_and_readiness() {
        let server = TestServer::spawn("{}").await;

        let body = server
            .client
            .get(format!("{}/health", server.base))
            .send()
            .await
            .unwrap()
            .text()
            .await
            .unwrap();
        assert_eq!(body, "OK");

        let (status, _) = server.send(Method::GET, "/ready", None).await;
        assert_eq!(status, StatusCode::OK);

        server.state.set_ready(false);
        let (status, _) = server.send(Method::GET, "/ready", None).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_register_query_and_history() {
        let server =
            TestServer::spawn(r#"{"response": "Loss falls with compute.", "chunk_id_list": []}"#).await;

        let (status, body) = server
            .send(
                Method::POST,
                "/api/documents",
                Some(json!({
                    "doi": "10.1000/scaling",
                    "title": "Scaling Laws",
                    "publication_year": 2020,
                    "authors": ["Kaplan", "McCandlish", "Henighan", "Brown"],
                    "fulltext": PAPER,
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["ingest"]["status"], "stored");
        assert!(body["document"].get("fulltext").is_none());
        let doc_id = body["document"]["id"].as_str().unwrap().to_string();

        let (status, body) = server
            .send(
                Method::POST,
                "/api/query",
                Some(json!({ "question": "How does loss scale?", "user_id": 7 })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["answer"], "Loss falls with compute.");
        assert_eq!(body["articles"][0]["id"], doc_id.as_str());
        assert_eq!(body["articles"][0]["url"], "https://doi.org/10.1000/scaling");
        assert_eq!(body["articles"][0]["author_summary"], "Kaplan, McCandlish, Henighan...");
        assert!(body["articles"][0]["used_passage_texts"].is_array());
        assert_eq!(
            body["articles"][0]["unused_passage_texts"].as_array().unwrap().len(),
            1
        );
        assert_eq!(server.llm.calls.load(Ordering::SeqCst), 1);
        let record_id = body["record_id"].as_str().unwrap().to_string();
        let live_articles = body["articles"].clone();

        // Another owner sees nothing
        let (_, body) = server.send(Method::GET, "/api/history", None).await;
        assert_eq!(body.as_array().unwrap().len(), 0);

        let (_, body) = server.send(Method::GET, "/api/history?user_id=7", None).await;
        let entries = body.as_array().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0]["query"], "How does loss scale?");

        let path = format!("/api/history/{}", record_id);
        let (status, body) = server.send(Method::GET, &path, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["query"], "How does loss scale?");
        assert_eq!(body["answer"], "Loss falls with compute.");
        assert_eq!(body["record_id"], record_id.as_str());
        assert_eq!(body["articles"], live_articles);

        let (status, _) = server.send(Method::DELETE, &path, None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, body) = server.send(Method::GET, &path, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["type"], "not_found");
    }

    #[tokio::test]
    async fn test_fulltext_attaches_once() {
        let server = TestServer::spawn("{}").await;

        let (_, body) = server
            .send(Method::POST, "/api/documents", Some(json!({ "title": "Pending paper" })))
            .await;
        assert!(body.get("ingest").is_none());
        let path = format!("/api/documents/{}/fulltext", body["document"]["id"].as_str().unwrap());

        let (status, body) = server
            .send(Method::POST, &path, Some(json!({ "fulltext": PAPER })))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ingest"]["status"], "stored");

        let (status, body) = server
            .send(Method::POST, &path, Some(json!({ "fulltext": PAPER })))
            .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"]["type"], "storage_conflict");

        let missing = format!("/api/documents/{}/fulltext", uuid::Uuid::new_v4());
        let (status, _) = server
            .send(Method::POST, &missing, Some(json!({ "fulltext": PAPER })))
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_failed_ingest_can_be_retried() {
        let provider = Arc::new(SwitchableEmbedder {
            inner: HashEmbedder::new(64).unwrap(),
            down: AtomicBool::new(true),
        });
        let server = TestServer::spawn_with("{}", provider.clone()).await;

        let (status, body) = server
            .send(
                Method::POST,
                "/api/documents",
                Some(json!({ "title": "Scaling Laws", "fulltext": PAPER })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["ingest"]["status"], "failed");
        let id = body["document"]["id"].as_str().unwrap().to_string();
        assert_eq!(server.state.store().count_passages().unwrap(), 0);

        provider.down.store(false, Ordering::SeqCst);
        let path = format!("/api/documents/{}/ingest", id);
        let (status, body) = server.send(Method::POST, &path, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ingest"]["status"], "stored");
        assert!(body["document"].get("fulltext").is_none());
        assert!(server.state.store().count_passages().unwrap() > 0);

        // Nothing to ingest without fulltext
        let (_, body) = server
            .send(Method::POST, "/api/documents", Some(json!({ "title": "Empty" })))
            .await;
        let path = format!("/api/documents/{}/ingest", body["document"]["id"].as_str().unwrap());
        let (status, _) = server.send(Method::POST, &path, None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let path = format!("/api/documents/{}/ingest", uuid::Uuid::new_v4());
        let (status, _) = server.send(Method::POST, &path, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_oversized_query_parameters_are_handled() {
        let server = TestServer::spawn("{}").await;

        let (status, body) = server
            .send(
                Method::POST,
                "/api/query",
                Some(json!({ "question": "q", "top_k": 1u64 << 40 })),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["type"], "invalid_request");

        let (status, _) = server
            .send(
                Method::POST,
                "/api/query",
                Some(json!({ "question": "q", "timeout_secs": u64::MAX })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_models_lists_backend_catalog() {
        let server = TestServer::spawn("{}").await;

        let (status, body) = server.send(Method::GET, "/api/models", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["default_model"], "llama3.2:3b");
        assert_eq!(body["models"], json!(["scripted"]));
    }

    #[tokio::test]
    async fn test_blank_question_is_rejected() {
        let server = TestServer::spawn("{}").await;

        let (status, body) = server
            .send(Method::POST, "/api/query", Some(json!({ "question": "  " })))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["type"], "invalid_request");
        assert_eq!(server.llm.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_info_reports_store_stats() {
        let server = TestServer::spawn("{}").await;

        let (status, body) = server.send(Method::GET, "/api/info", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["name"], "scholar-rag");
        assert_eq!(body["embedding_dimensions"], 64);
        assert_eq!(body["stats"]["documents"], 0);
    }
}
