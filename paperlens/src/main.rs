mod app;
mod completion;
mod config;
mod embedding;
mod error;
mod models;
mod parser;
mod rag;
mod routes;
#[cfg(test)]
mod testing;
mod vector_store;

use std::net::SocketAddr;
use std::sync::Arc;

use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

use app::AppState;
use completion::CompletionModel;
use completion::openai::OpenAICompletionModel;
use config::{VectorStoreProvider, load_settings};
use embedding::openai::OpenAIEmbeddingModel;
use parser::pdf::PdfTextExtractor;
use rag::RagService;
use rag::generator::Generator;
use vector_store::VectorStore;
use vector_store::index::DocumentIndex;
use vector_store::lance::LanceVectorStore;
use vector_store::qdrant::QdrantVectorStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Initializing services...");

    // Load configuration.
    let settings = load_settings()?;
    info!(
        "Configuration loaded: environment={}, host={}, port={}",
        settings.environment, settings.host, settings.port
    );

    // Initialize vector store.
    let vector_store: Arc<dyn VectorStore> = match settings.vector_store_provider {
        VectorStoreProvider::Local => {
            let store = LanceVectorStore::connect(&settings.vector_store_path).await?;
            info!(
                "Found {} indexed documents",
                store.collection_names().await?.len()
            );
            Arc::new(store)
        }
        VectorStoreProvider::Qdrant => Arc::new(QdrantVectorStore::new(&settings.qdrant_url)?),
    };
    info!("Vector store initialized: {}", vector_store.backend_name());

    let http_client = reqwest::Client::builder()
        .timeout(settings.http_timeout)
        .build()?;

    // Initialize embedding model.
    let embedding_model = Arc::new(OpenAIEmbeddingModel::new(
        &settings.embedding_base_url,
        &settings.embedding_model,
        settings.embedding_api_key.clone(),
        settings.embedding_dimensions,
        http_client.clone(),
    ));
    info!(
        "Embedding model initialized: {} ({} dims)",
        settings.embedding_model, settings.embedding_dimensions
    );

    // Initialize completion models.
    let primary: Arc<dyn CompletionModel> = Arc::new(OpenAICompletionModel::new(
        &settings.completion_base_url,
        &settings.completion_model,
        &settings.groq_api_key,
        http_client.clone(),
    ));
    let fallback = settings.fallback_model.as_deref().map(|model| {
        Arc::new(OpenAICompletionModel::new(
            &settings.completion_base_url,
            model,
            &settings.groq_api_key,
            http_client.clone(),
        )) as Arc<dyn CompletionModel>
    });
    info!(
        "Completion model initialized: {} (fallback: {})",
        settings.completion_model,
        settings.fallback_model.as_deref().unwrap_or("none")
    );

    let index = DocumentIndex::new(vector_store, embedding_model);
    let generator = Generator::new(primary, fallback, settings.completion_params);
    let rag = RagService::new(index, generator, settings.top_k);

    // Build application state.
    let state = Arc::new(AppState {
        settings: settings.clone(),
        extractor: Arc::new(PdfTextExtractor),
        rag,
    });
    info!("Services initialized successfully");

    // Build router.
    let app = routes::build_router(state)
        .layer(routes::cors_layer(&settings.cors_origins))
        .layer(TraceLayer::new_for_http());

    // Start server.
    let addr: SocketAddr = format!("{}:{}", settings.host, settings.port).parse()?;
    info!("Listening on {addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Shutting down...");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {e}");
    }
}
