use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::domain::model::YoloParams;

/// Environment variable naming the TOML config file.
pub const CONFIG_ENV: &str = "ANNOTATOR_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub model: ModelConfig,
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:3000".into(),
        }
    }
}

/// Credentials and buckets. Empty keys defer to the AWS default provider
/// chain.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub access_key: String,
    pub secret_key: String,
    pub region: String,
    pub endpoint: Option<String>,
    pub force_path_style: bool,
    pub input_bucket: String,
    pub output_bucket: String,
    pub public_base_url: Option<String>,
    pub download_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            access_key: String::new(),
            secret_key: String::new(),
            region: "us-east-1".into(),
            endpoint: None,
            force_path_style: false,
            input_bucket: String::new(),
            output_bucket: String::new(),
            public_base_url: None,
            download_dir: PathBuf::from("."),
        }
    }
}

impl StorageConfig {
    pub fn has_static_credentials(&self) -> bool {
        !self.access_key.is_empty() && !self.secret_key.is_empty()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub name: String,
    pub onnx_path: String,
    pub labels_path: Option<String>,
    pub intra_threads: usize,
    #[serde(flatten)]
    pub params: YoloParams,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            name: "yolov7-w6".into(),
            onnx_path: "models/yolov7-w6.onnx".into(),
            labels_path: None,
            intra_threads: 4,
            params: YoloParams::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub runs_dir: PathBuf,
    pub run_name: String,
    pub font_path: Option<PathBuf>,
    pub font_size: f32,
    pub line_thickness: u32,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            runs_dir: PathBuf::from("runs/detect"),
            run_name: "exp".into(),
            font_path: None,
            font_size: 16.0,
            line_thickness: 1,
        }
    }
}

impl AppConfig {
    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).context("invalid configuration")
    }

    /// Reads the file named by `ANNOTATOR_CONFIG`, else `config.toml`. A
    /// missing file yields the defaults.
    pub async fn load() -> Result<Self> {
        let path = std::env::var(CONFIG_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.into());
        Self::load_from(Path::new(&path)).await
    }

    pub async fn load_from(path: &Path) -> Result<Self> {
        match tokio::fs::read_to_string(path).await {
            Ok(text) => {
                tracing::info!("loading configuration from {}", path.display());
                Self::from_toml(&text).with_context(|| format!("in {}", path.display()))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!("{} not found, using default configuration", path.display());
                Ok(Self::default())
            }
            Err(e) => Err(e).with_context(|| format!("reading {}", path.display())),
        }
    }
}
