use async_trait::async_trait;
use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region};
use aws_sdk_s3::error::{ProvideErrorMetadata, SdkError};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use std::path::Path;
use tokio::io::AsyncWriteExt;

use crate::application::ports::ObjectStorePort;
use crate::config::StorageConfig;
use crate::domain::errors::{DomainError, DomainResult};

/// S3 (or S3-compatible) object store.
pub struct S3ObjectStore {
    client: Client,
}

impl S3ObjectStore {
    pub async fn connect(cfg: &StorageConfig) -> Self {
        let region = Region::new(cfg.region.clone());

        let client = if cfg.has_static_credentials() {
            let creds = Credentials::new(
                cfg.access_key.clone(),
                cfg.secret_key.clone(),
                None,
                None,
                "annotator-config",
            );
            let mut builder = aws_sdk_s3::config::Builder::new()
                .behavior_version(BehaviorVersion::latest())
                .region(region)
                .credentials_provider(creds)
                .force_path_style(cfg.force_path_style);
            if let Some(endpoint) = &cfg.endpoint {
                builder = builder.endpoint_url(endpoint);
            }
            Client::from_conf(builder.build())
        } else {
            let shared = aws_config::defaults(BehaviorVersion::latest())
                .region(region)
                .load()
                .await;
            let mut builder =
                aws_sdk_s3::config::Builder::from(&shared).force_path_style(cfg.force_path_style);
            if let Some(endpoint) = &cfg.endpoint {
                builder = builder.endpoint_url(endpoint);
            }
            Client::from_conf(builder.build())
        };

        Self::from_client(client)
    }

    pub fn from_client(client: Client) -> Self {
        Self { client }
    }
}

fn storage_error<E, R>(op: &str, bucket: &str, key: &str, err: SdkError<E, R>) -> DomainError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: std::fmt::Debug,
{
    let detail = match err.as_service_error() {
        Some(service) => format!(
            "{}: {}",
            service.code().unwrap_or("Unknown"),
            service.message().unwrap_or_default()
        ),
        None => err.to_string(),
    };
    DomainError::Storage(format!("{op} s3://{bucket}/{key}: {detail}"))
}

#[async_trait]
impl ObjectStorePort for S3ObjectStore {
    async fn download(&self, bucket: &str, key: &str, dest: &Path) -> DomainResult<()> {
        let resp = match self.client.get_object().bucket(bucket).key(key).send().await {
            Ok(resp) => resp,
            Err(err) => {
                let missing = err
                    .as_service_error()
                    .map(|e| e.is_no_such_key())
                    .unwrap_or(false)
                    || err
                        .raw_response()
                        .map(|r| r.status().as_u16() == 404)
                        .unwrap_or(false);
                if missing {
                    return Err(DomainError::NotFound(format!("s3://{bucket}/{key}")));
                }
                return Err(storage_error("get", bucket, key, err));
            }
        };

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut file = tokio::fs::File::create(dest).await?;
        let mut body = resp.body.into_async_read();
        let written = tokio::io::copy(&mut body, &mut file)
            .await
            .map_err(|e| DomainError::Storage(format!("reading s3://{bucket}/{key}: {e}")))?;
        file.flush().await?;
        tracing::debug!("wrote {written} bytes to {}", dest.display());
        Ok(())
    }

    async fn upload(&self, src: &Path, bucket: &str, key: &str) -> DomainResult<()> {
        let body = ByteStream::from_path(src)
            .await
            .map_err(|e| DomainError::Storage(format!("reading {}: {e}", src.display())))?;

        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(body)
            .send()
            .await
            .map_err(|e| storage_error("put", bucket, key, e))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_sdk_s3::config::retry::RetryConfig;
    use aws_sdk_s3::primitives::SdkBody;
    use aws_smithy_http_client::test_util::{ReplayEvent, StaticReplayClient};
    use aws_smithy_runtime_api::client::orchestrator::{HttpRequest, HttpResponse};
    use aws_smithy_runtime_api::http::StatusCode;

    const NO_SUCH_KEY: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<Error><Code>NoSuchKey</Code><Message>The specified key does not exist.</Message><Key>ghost.png</Key><RequestId>R1</RequestId></Error>"#;

    const ACCESS_DENIED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<Error><Code>AccessDenied</Code><Message>Access Denied</Message><RequestId>R2</RequestId></Error>"#;

    /// Store whose single request is answered with `status` and `body`.
    fn replying(status: u16, body: &'static str) -> S3ObjectStore {
        let http = StaticReplayClient::new(vec![ReplayEvent::new(
            HttpRequest::new(SdkBody::empty()),
            HttpResponse::new(StatusCode::try_from(status).unwrap(), SdkBody::from(body)),
        )]);
        let conf = aws_sdk_s3::config::Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new("us-east-1"))
            .credentials_provider(Credentials::new("key", "secret", None, None, "test"))
            .retry_config(RetryConfig::disabled())
            .http_client(http)
            .build();
        S3ObjectStore::from_client(Client::from_conf(conf))
    }

    #[tokio::test]
    async fn no_such_key_is_not_found() {
        let tmp = tempfile::tempdir().unwrap();
        let dest = tmp.path().join("ghost.png");

        let err = replying(404, NO_SUCH_KEY)
            .download("in-bucket", "ghost.png", &dest)
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::NotFound(_)), "{err:?}");
        assert!(!dest.exists());
    }

    #[tokio::test]
    async fn bare_404_is_not_found() {
        let tmp = tempfile::tempdir().unwrap();
        let err = replying(404, "")
            .download("in-bucket", "ghost.png", &tmp.path().join("ghost.png"))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::NotFound(_)), "{err:?}");
    }

    #[tokio::test]
    async fn access_denied_is_a_storage_error() {
        let tmp = tempfile::tempdir().unwrap();
        let err = replying(403, ACCESS_DENIED)
            .download("in-bucket", "cat.png", &tmp.path().join("cat.png"))
            .await
            .unwrap_err();
        match err {
            DomainError::Storage(msg) => assert!(msg.contains("AccessDenied"), "{msg}"),
            other => panic!("expected storage error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn object_body_is_streamed_to_nested_path() {
        let tmp = tempfile::tempdir().unwrap();
        let dest = tmp.path().join("2024/05/cat.png");

        replying(200, "not really a png")
            .download("in-bucket", "2024/05/cat.png", &dest)
            .await
            .unwrap();
        assert_eq!(std::fs::read(&dest).unwrap(), b"not really a png");
    }
}
