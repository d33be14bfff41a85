mod adapters;
mod application;
mod config;
mod domain;

use std::sync::Arc;
use tower_http::services::ServeDir;
use crate::adapters::{
    http::{router, state::{HttpState, SessionStore}},
    media::LocalMediaOpener,
    onnx::model_catalog::OnnxModelCatalog,
};
use crate::application::registry::ModelRegistry;
use crate::config::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // RUST_LOG=info unless set
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info");
    }
    tracing_subscriber::fmt::init();

    let cfg = AppConfig::from_env()?;
    tracing::info!("configuration: {:?}", cfg);

    let registry = Arc::new(ModelRegistry::new(&cfg.weights_dir, &cfg.assets_dir, cfg.camera_index));
    if !registry.weights_dir().is_dir() {
        tracing::warn!("weights directory {} does not exist yet", registry.weights_dir().display());
    }

    let state = HttpState {
        registry: registry.clone(),
        loader: Arc::new(OnnxModelCatalog::new()),
        opener: Arc::new(LocalMediaOpener::new()),
        sessions: Arc::new(SessionStore::default()),
    };

    // Demo assets under /images and /videos, the page itself as fallback.
    let app = router(state, cfg.max_upload_bytes)
        .nest_service("/images", ServeDir::new(registry.images_dir()))
        .nest_service("/videos", ServeDir::new(registry.videos_dir()))
        .fallback_service(ServeDir::new(&cfg.static_dir));

    tracing::info!("dashboard listening on http://{}", cfg.bind);
    tracing::info!("static files served from {}", cfg.static_dir.display());

    let listener = tokio::net::TcpListener::bind(cfg.bind).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
