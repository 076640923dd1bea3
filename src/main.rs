//! Vision Relay - WebRTC signaling with server-side object detection
//!
//! Main entry point.

use axum::http::HeaderValue;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use vision_relay::web_api;
use vision_relay::{AppConfig, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "vision_relay=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Vision Relay v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = AppConfig::default();
    tracing::info!(
        host = %config.host,
        port = config.port,
        model_path = %config.model_path.display(),
        models_dir = %config.models_dir.display(),
        inference_workers = config.inference_workers,
        "Configuration loaded"
    );

    // Model assets are served statically for client-side (WASM) inference
    std::fs::create_dir_all(&config.models_dir).ok();

    // Initialize components
    let state = AppState::new(config);
    if state.engine.available() {
        tracing::info!("Detection engine ready (server-mode inference)");
    } else {
        tracing::warn!("Detection engine unavailable, frames will yield empty detections");
    }

    // CORS policy from config
    let cors = if state.config.cors_origins == "*" {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins = state
            .config
            .cors_origins
            .split(',')
            .filter_map(|o| o.trim().parse::<HeaderValue>().ok());
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods(Any)
            .allow_headers(Any)
    };

    // Create router with model asset serving
    let app = web_api::create_router(state.clone())
        .nest_service("/models", ServeDir::new(&state.config.models_dir))
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    // Start server
    let addr = format!("{}:{}", state.config.host, state.config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Listening on {}", addr);

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    // Let outstanding inference work drain before exit, even when the
    // server loop itself failed.
    state.pipeline.shutdown().await;
    served?;

    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("Shutdown signal received");
}
