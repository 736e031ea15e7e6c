mod adapters;
mod application;
mod config;
mod domain;

use ab_glyph::FontVec;
use anyhow::Context;
use std::path::Path;
use std::sync::Arc;

use crate::adapters::{
    http::{router, state::HttpState},
    onnx::{model_catalog::OnnxModelCatalog, runner::OnnxRunner},
    s3::object_store::S3ObjectStore,
};
use crate::application::{
    detector::{DetectionService, RunLayout},
    imaging::{bundled_font, Annotator},
    ports::ModelCatalogPort,
    services::{Buckets, PredictService, StorageService},
};
use crate::config::AppConfig;
use crate::domain::model::{InferenceConfig, ModelId};

/// `output.font_path` when it is readable, else the bundled DejaVu Sans.
async fn load_font(path: Option<&Path>) -> anyhow::Result<FontVec> {
    if let Some(path) = path {
        match tokio::fs::read(path).await {
            Ok(bytes) => match FontVec::try_from_vec(bytes) {
                Ok(font) => return Ok(font),
                Err(e) => tracing::warn!("cannot parse font {}: {}, using bundled font", path.display(), e),
            },
            Err(e) => tracing::warn!("cannot read font {}: {}, using bundled font", path.display(), e),
        }
    }
    bundled_font().context("bundled font is not a valid TTF")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Init logs (RUST_LOG=info unless set) and configuration
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info");
    }
    tracing_subscriber::fmt::init();

    let cfg = AppConfig::load().await?;

    // 2. Instantiate adapters (model, labels, object store)
    tracing::info!("🔧 Loading model {} from {}", cfg.model.name, cfg.model.onnx_path);
    let catalog = OnnxModelCatalog::new();
    catalog.validate_model(&cfg.model.onnx_path).await?;
    let labels = catalog.load_labels(cfg.model.labels_path.as_deref()).await?;
    let runner = OnnxRunner::load(&cfg.model.onnx_path, cfg.model.intra_threads)
        .with_context(|| format!("loading {}", cfg.model.onnx_path))?;

    let store = S3ObjectStore::connect(&cfg.storage).await;

    // 3. Instantiate services (use cases)
    let font = load_font(cfg.output.font_path.as_deref()).await?;
    let annotator = Annotator::new(font, cfg.output.font_size, cfg.output.line_thickness, labels.len());
    let detector = DetectionService::new(
        Arc::new(runner),
        InferenceConfig {
            model: ModelId {
                name: cfg.model.name.clone(),
                onnx_path: cfg.model.onnx_path.clone(),
            },
            params: cfg.model.params.clone(),
        },
        labels,
        annotator,
        RunLayout {
            root: cfg.output.runs_dir.clone(),
            name: cfg.output.run_name.clone(),
        },
    );

    let storage = StorageService::new(
        Arc::new(store),
        Buckets {
            input: cfg.storage.input_bucket.clone(),
            output: cfg.storage.output_bucket.clone(),
            public_base_url: cfg.storage.public_base_url.clone(),
        },
        cfg.storage.download_dir.clone(),
    );

    // 4. API state and router
    let state = HttpState {
        predict: Arc::new(PredictService::new(storage, Arc::new(detector))),
    };
    let app = router(state);

    // 5. Serve until ctrl-c
    tracing::info!("🚀 Serving on http://{}", cfg.server.bind);
    let listener = tokio::net::TcpListener::bind(&cfg.server.bind).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutting down");
        })
        .await?;

    Ok(())
}
