//! Video analysis worker binary.

use std::net::SocketAddr;
use std::sync::Arc;

use tracing::{error, info};

use bwatch_inference::GeminiClient;
use bwatch_storage::S3Client;
use bwatch_worker::{
    create_router, logging, metrics, Analyzer, AppState, FfmpegPipeline, JobProcessor, WorkerConfig,
};

#[tokio::main]
async fn main() {
    // Install rustls crypto provider (required for TLS/HTTPS)
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    // Load environment variables
    dotenvy::dotenv().ok();

    logging::init_tracing();

    info!("Starting bwatch-worker");

    let config = WorkerConfig::from_env();
    info!(
        host = %config.host,
        port = config.port,
        model = %config.model,
        "Worker config loaded"
    );

    let storage = match S3Client::from_env() {
        Ok(client) => Arc::new(client),
        Err(e) => {
            error!("Failed to create storage client: {}", e);
            std::process::exit(1);
        }
    };

    let backend = match GeminiClient::from_env() {
        Ok(client) => Arc::new(client),
        Err(e) => {
            error!("Failed to create inference client: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = bwatch_media::check_ffmpeg().and(bwatch_media::check_ffprobe()) {
        error!("Media tooling missing: {}", e);
        std::process::exit(1);
    }

    let metrics_enabled = std::env::var("METRICS_ENABLED")
        .map(|v| v == "true" || v == "1")
        .unwrap_or(false);
    let metrics_handle = if metrics_enabled {
        info!("Prometheus metrics enabled at /metrics");
        Some(metrics::init_metrics())
    } else {
        None
    };

    let analyzer = Analyzer::new(backend, Arc::new(FfmpegPipeline), config.clone());
    let processor = Arc::new(JobProcessor::new(storage, analyzer, config.clone()));

    let state = AppState {
        processor,
        api_token: config.worker_api_token.clone(),
    };
    let app = create_router(state, metrics_handle);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .expect("Invalid bind address");

    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind listener");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    info!("Worker shutdown complete");
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install CTRL+C handler");
    info!("Received shutdown signal");
}
