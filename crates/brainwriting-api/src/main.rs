//! Brainwriting API server entry point.

use std::error::Error;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use brainwriting_api::{routes, state};
use brainwriting_core::clock::SystemClock;
use brainwriting_core::generator::IllustrationGenerator;
use brainwriting_illustration::{NullGenerator, OpenAiImageGenerator};
use brainwriting_session::SessionEngine;
use brainwriting_store::MemoryDocumentStore;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // Initialize tracing subscriber.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    tracing::info!("Starting brainwriting API server");

    // Read configuration from environment.
    let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port: u16 = std::env::var("PORT")
        .unwrap_or_else(|_| "3000".to_string())
        .parse()
        .map_err(|e| format!("PORT must be a valid u16: {e}"))?;

    // Card illustrations are generated only when an API key is configured.
    let generator: Arc<dyn IllustrationGenerator> = match OpenAiImageGenerator::from_env() {
        Some(generator) => Arc::new(generator),
        None => {
            tracing::info!("OPENAI_API_KEY not set; card illustrations disabled");
            Arc::new(NullGenerator)
        }
    };

    // Build application state.
    let engine = Arc::new(SessionEngine::new(
        Arc::new(MemoryDocumentStore::new()),
        Arc::new(SystemClock),
        generator,
    ));
    let app_state = state::AppState::new(engine);

    // Build router.
    // TODO: Replace CorsLayer::permissive() with restricted origins for production.
    let app = Router::new()
        .merge(routes::health::router())
        .nest(
            "/api/v1/sessions",
            routes::session::router().merge(routes::round::router()),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(app_state);

    // Start server.
    let addr: SocketAddr = format!("{host}:{port}")
        .parse()
        .map_err(|e| format!("invalid HOST:PORT combination: {e}"))?;
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app).await?;

    Ok(())
}
