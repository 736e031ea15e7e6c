use async_trait::async_trait;
use ndarray::Array4;
use std::path::Path;

use crate::domain::{errors::DomainResult, model::RawOutput};

/// Object storage keyed by bucket and object key.
#[async_trait]
pub trait ObjectStorePort: Send + Sync {
    /// Writes the object to `dest`. A missing key yields `DomainError::NotFound`.
    async fn download(&self, bucket: &str, key: &str, dest: &Path) -> DomainResult<()>;
    async fn upload(&self, src: &Path, bucket: &str, key: &str) -> DomainResult<()>;
}

/// Executes the detection network on an NCHW tensor.
#[async_trait]
pub trait InferenceRunnerPort: Send + Sync {
    async fn run(&self, input: Array4<f32>) -> DomainResult<RawOutput>;
}

#[async_trait]
pub trait ModelCatalogPort: Send + Sync {
    async fn validate_model(&self, onnx_path: &str) -> DomainResult<()>;
    async fn load_labels(&self, labels_path: Option<&str>) -> DomainResult<Vec<String>>;
}
