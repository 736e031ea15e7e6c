use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::{
    application::{
        detector::DetectionService,
        dto::{PredictRequest, PredictResponse},
        ports::ObjectStorePort,
    },
    domain::{
        errors::{DomainError, DomainResult},
        model::InferenceConfig,
    },
};

/// Bucket names and URL shape for the two stores.
#[derive(Debug, Clone)]
pub struct Buckets {
    pub input: String,
    pub output: String,
    pub public_base_url: Option<String>,
}

/// Fetch and publish steps on top of an object store.
#[derive(Clone)]
pub struct StorageService {
    store: Arc<dyn ObjectStorePort>,
    buckets: Buckets,
    download_dir: PathBuf,
}

impl StorageService {
    pub fn new(store: Arc<dyn ObjectStorePort>, buckets: Buckets, download_dir: PathBuf) -> Self {
        Self {
            store,
            buckets,
            download_dir,
        }
    }

    /// Local path a key is downloaded to.
    pub fn local_path(&self, key: &str) -> PathBuf {
        self.download_dir.join(key)
    }

    /// Downloads `key` from the input bucket. Storage failures are logged and
    /// swallowed; the returned path may not exist afterwards.
    pub async fn fetch(&self, key: &str) -> PathBuf {
        let dest = self.local_path(key);
        match self.store.download(&self.buckets.input, key, &dest).await {
            Ok(()) => info!("Downloaded {}/{}", self.buckets.input, key),
            Err(DomainError::NotFound(_)) => {
                warn!("The object {}/{} does not exist.", self.buckets.input, key)
            }
            Err(e) => error!("download of {}/{} failed: {}", self.buckets.input, key, e),
        }
        dest
    }

    /// Uploads `src` to the output bucket as `key`. Failures are logged and
    /// swallowed.
    pub async fn publish(&self, src: &Path, key: &str) {
        match self.store.upload(src, &self.buckets.output, key).await {
            Ok(()) => info!("Uploaded {}/{}", self.buckets.output, key),
            Err(e) => error!("upload of {}/{} failed: {}", self.buckets.output, key, e),
        }
    }

    pub fn public_url(&self, key: &str) -> String {
        match &self.buckets.public_base_url {
            Some(base) => format!("{}/{}", base.trim_end_matches('/'), key),
            None => format!("https://{}.s3.amazonaws.com/{}", self.buckets.output, key),
        }
    }
}

/// Fetch, infer-and-annotate, publish.
#[derive(Clone)]
pub struct PredictService {
    storage: StorageService,
    detector: Arc<DetectionService>,
}

impl PredictService {
    pub fn new(storage: StorageService, detector: Arc<DetectionService>) -> Self {
        Self { storage, detector }
    }

    pub fn inference_config(&self) -> &InferenceConfig {
        self.detector.config()
    }

    pub async fn predict(&self, req: PredictRequest) -> DomainResult<PredictResponse> {
        let key = req.filename;
        validate_key(&key)?;

        // A missing object does not stop the pipeline; detection then fails
        // on the absent file.
        let local = self.storage.fetch(&key).await;
        let saved = self.detector.infer_and_annotate(&local).await?;
        self.storage.publish(&saved, &key).await;

        Ok(PredictResponse {
            location: self.storage.public_url(&key),
        })
    }
}

/// Keys are used as relative paths on disk, so they must stay inside the
/// download directory.
pub fn validate_key(key: &str) -> DomainResult<()> {
    if key.trim().is_empty() {
        return Err(DomainError::InvalidInput("filename is empty".into()));
    }
    let path = Path::new(key);
    let escapes = path
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
    if escapes || path.file_name().is_none() {
        return Err(DomainError::InvalidInput(format!("filename {key:?} is not a plain relative path")));
    }
    Ok(())
}
