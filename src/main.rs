use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::http::HeaderName;
use tracing_subscriber::{fmt, EnvFilter};

use scene_studio::{
    config::{Config, StorageBackend},
    gemini::GeminiClient,
    identity::TrustedHeaderIdentity,
    pipeline::Pipeline,
    records::{DocumentStore, LocalDocumentStore, MemoryDocumentStore},
    routes::{router, AppState, Limits},
    storage::{LocalObjectStore, MemoryObjectStore, ObjectStore},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    // Init tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).init();

    let config = Config::from_env()?;
    let key_preview: String = config.gemini_api_key.chars().take(4).collect();
    tracing::info!("Using API key: {}...", key_preview);

    let objects: Arc<dyn ObjectStore>;
    let documents: Arc<dyn DocumentStore>;
    match config.backend {
        StorageBackend::Local => {
            objects = Arc::new(LocalObjectStore::new(config.storage_dir.clone(), config.public_base_url.clone()));
            documents = Arc::new(LocalDocumentStore::new(config.records_dir.clone()));
        }
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory storage; nothing survives a restart");
            objects = Arc::new(MemoryObjectStore::new(config.public_base_url.clone()));
            documents = Arc::new(MemoryDocumentStore::default());
        }
    }
    let gemini = GeminiClient::new(config.gemini_api_key.clone(), config.gemini_api_base.clone(), config.gemini_image_model.clone());
    let identity_header = HeaderName::from_bytes(config.identity_header.as_bytes())
        .with_context(|| format!("IDENTITY_HEADER is not a valid header name: {}", config.identity_header))?;

    let state = AppState {
        pipeline: Arc::new(Pipeline::new(objects.clone(), documents.clone(), Arc::new(gemini)).with_deadline(config.request_timeout)),
        objects,
        documents,
        identity: Arc::new(TrustedHeaderIdentity::new(identity_header)),
    };

    let app = router(state, Limits {
        max_upload_bytes: config.max_upload_bytes,
        max_concurrent_generations: config.max_concurrent_requests,
    });

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!(%addr, model = %config.gemini_image_model, "Starting server");
    let listener = tokio::net::TcpListener::bind(addr).await.with_context(|| format!("failed to bind {addr}"))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async { let _ = tokio::signal::ctrl_c().await; })
        .await?;
    Ok(())
}
