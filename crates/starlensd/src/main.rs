use std::sync::Arc;

use anyhow::{Context, Result};
use starlens_core::{CascadeDetector, CelebrityIdentifier, FaceLocalizer, Pipeline, QaEngine};
use tracing_subscriber::EnvFilter;

mod config;
mod http_interface;

use config::Config;
use http_interface::{AppState, ServiceInfo};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    tracing::info!("starlensd starting");

    let config = Config::load().context("loading configuration")?;
    if config.api_key.is_none() {
        tracing::warn!("GROQ_API_KEY is not set; model calls will fall back to placeholder text");
    }

    // Load the detector synchronously so a missing model fails startup, not the first request.
    let detector = CascadeDetector::load(&config.model_path, config.detector_settings())
        .context("loading face detector")?;
    let localizer = FaceLocalizer::new(Arc::new(detector)).with_style(config.annotation_style());

    let identifier = CelebrityIdentifier::new(config.vision_endpoint())
        .context("building identification client")?;
    let qa = QaEngine::new(config.qa_endpoint()).context("building question-answering client")?;

    let state = AppState {
        pipeline: Pipeline::new(localizer, Arc::new(identifier), Arc::new(qa)),
        info: ServiceInfo {
            version: env!("CARGO_PKG_VERSION"),
            vision_model: config.vision_model.clone(),
            qa_model: config.qa_model.clone(),
        },
    };
    let app = http_interface::router(state, config.max_upload_bytes);

    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("binding {}", config.bind))?;
    tracing::info!(
        addr = %config.bind,
        vision_model = %config.vision_model,
        qa_model = %config.qa_model,
        "starlensd ready"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            // Keep running until signaled
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for shutdown signal");
                std::future::pending::<()>().await;
            }
        })
        .await
        .context("serving HTTP")?;

    tracing::info!("starlensd shutting down");
    Ok(())
}
