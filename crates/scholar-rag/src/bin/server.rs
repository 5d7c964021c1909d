//! Scholar RAG server binary
//!
//! Run with: cargo run -p scholar-rag --bin scholar-rag-server -- --config scholar-rag.toml

use std::path::PathBuf;

use clap::Parser;
use scholar_rag::{config::RagConfig, server::RagServer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "scholar-rag-server", version, about = "Question answering over academic papers")]
struct Args {
    /// TOML configuration file; defaults plus SCHOLAR_RAG_* variables when absent
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "scholar_rag=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => RagConfig::from_file(path)?,
        None => RagConfig::from_env()?,
    };

    tracing::info!("Configuration loaded");
    tracing::info!("  - Embedding backend: {:?}", config.embeddings.backend);
    tracing::info!("  - Embedding model: {}", config.embeddings.model);
    tracing::info!("  - Generation model: {}", config.llm.default_model);
    tracing::info!(
        "  - Chunking: {} chars, {} overlap",
        config.chunking.chunk_size,
        config.chunking.chunk_overlap
    );
    tracing::info!("  - Database: {}", config.storage.database_path.display());

    let server = RagServer::new(config).await?;

    let state = server.state();
    match state.embedder().health_check().await {
        Ok(true) => tracing::info!("Embedding backend {} is up", state.embedder().provider_name()),
        _ => tracing::warn!(
            "Embedding backend {} is not reachable; ingest and queries will fail until it is",
            state.embedder().provider_name()
        ),
    }

    let default_model = state.search().default_model().to_string();
    let llm_up = match state.llm_cache().get_or_create(&default_model) {
        Ok(llm) => llm.health_check().await.unwrap_or(false),
        Err(_) => false,
    };
    if llm_up {
        tracing::info!("Generation model {} is available", default_model);
    } else {
        tracing::warn!("Generation backend not available for model {}", default_model);
        tracing::warn!("  Start Ollama and pull the model: ollama pull {}", default_model);
    }

    tracing::info!("Health: http://{}/health", server.address());
    server.start().await?;

    Ok(())
}
