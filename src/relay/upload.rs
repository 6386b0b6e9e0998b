// Copyright 2025 Lablup Inc. and Jeongkyu Shin
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Cloud upload back-ends.

use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region, SdkConfig};
use aws_credential_types::provider::ProvideCredentials;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;

use crate::config::{UploadConfig, UploadTarget};
use crate::error::UploadError;

/// Destination for the relayed artifact.
#[async_trait]
pub trait ObjectUploader: Send + Sync {
    /// Human-readable destination, used in logs and errors.
    fn target(&self) -> String;

    /// Verify credentials before anything is done on the appliance.
    async fn preflight(&self) -> Result<(), UploadError>;

    /// Upload `path` under `key`, returning the object URL.
    async fn upload(&self, path: &Path, key: &str) -> Result<String, UploadError>;
}

/// Object key for an artifact: the prefix followed by the file name.
pub fn object_key(prefix: &str, artifact_name: &str) -> String {
    format!("{prefix}{artifact_name}")
}

/// Build the uploader for the configured target.
pub fn uploader_for(config: &UploadConfig) -> Arc<dyn ObjectUploader> {
    match &config.target {
        UploadTarget::S3 {
            bucket,
            region,
            profile,
        } => Arc::new(S3Uploader::new(bucket, region, profile.as_deref())),
        UploadTarget::PresignedUrl { url } => Arc::new(PresignedUrlUploader::new(url)),
    }
}

async fn ensure_artifact(path: &Path) -> Result<(), UploadError> {
    match tokio::fs::metadata(path).await {
        Ok(meta) if meta.is_file() => Ok(()),
        Ok(_) => Err(UploadError::MissingArtifact {
            path: path.to_path_buf(),
        }),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(UploadError::MissingArtifact {
            path: path.to_path_buf(),
        }),
        Err(source) => Err(UploadError::Read {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Uploads through the AWS SDK default credential chain.
pub struct S3Uploader {
    bucket: String,
    region: String,
    profile: Option<String>,
    sdk_config: OnceCell<SdkConfig>,
}

impl S3Uploader {
    pub fn new(bucket: &str, region: &str, profile: Option<&str>) -> Self {
        Self {
            bucket: bucket.to_string(),
            region: region.to_string(),
            profile: profile.map(str::to_string),
            sdk_config: OnceCell::new(),
        }
    }

    async fn sdk_config(&self) -> &SdkConfig {
        self.sdk_config
            .get_or_init(|| async {
                let mut loader = aws_config::defaults(BehaviorVersion::latest())
                    .region(Region::new(self.region.clone()));
                if let Some(profile) = &self.profile {
                    loader = loader.profile_name(profile);
                }
                loader.load().await
            })
            .await
    }

    fn object_url(&self, key: &str) -> String {
        format!(
            "https://{}.s3.{}.amazonaws.com/{}",
            self.bucket, self.region, key
        )
    }
}

#[async_trait]
impl ObjectUploader for S3Uploader {
    fn target(&self) -> String {
        format!("s3://{}", self.bucket)
    }

    async fn preflight(&self) -> Result<(), UploadError> {
        let config = self.sdk_config().await;
        let provider = config
            .credentials_provider()
            .ok_or_else(|| UploadError::Credentials("no credentials provider found".to_string()))?;

        provider
            .provide_credentials()
            .await
            .map_err(|e| UploadError::Credentials(DisplayErrorContext(&e).to_string()))?;

        tracing::debug!("AWS credentials resolved for {}", self.target());
        Ok(())
    }

    async fn upload(&self, path: &Path, key: &str) -> Result<String, UploadError> {
        ensure_artifact(path).await?;

        let body = ByteStream::from_path(path)
            .await
            .map_err(|e| UploadError::Read {
                path: path.to_path_buf(),
                source: std::io::Error::other(e),
            })?;

        let client = aws_sdk_s3::Client::new(self.sdk_config().await);
        client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type("text/csv")
            .body(body)
            .send()
            .await
            .map_err(|e| UploadError::Rejected(DisplayErrorContext(&e).to_string()))?;

        Ok(self.object_url(key))
    }
}

/// Uploads with an HTTP PUT to a pre-signed object URL.
pub struct PresignedUrlUploader {
    url: String,
    http: reqwest::Client,
}

impl PresignedUrlUploader {
    pub fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
            http: reqwest::Client::new(),
        }
    }

    /// The URL without its signature query.
    fn object_url(&self) -> String {
        match self.url.split_once('?') {
            Some((base, _)) => base.to_string(),
            None => self.url.clone(),
        }
    }
}

#[async_trait]
impl ObjectUploader for PresignedUrlUploader {
    fn target(&self) -> String {
        self.object_url()
    }

    async fn preflight(&self) -> Result<(), UploadError> {
        reqwest::Url::parse(&self.url)
            .map(|_| ())
            .map_err(|e| UploadError::Credentials(format!("invalid pre-signed URL: {e}")))
    }

    async fn upload(&self, path: &Path, _key: &str) -> Result<String, UploadError> {
        ensure_artifact(path).await?;

        let body = tokio::fs::read(path).await.map_err(|source| UploadError::Read {
            path: PathBuf::from(path),
            source,
        })?;

        self.http
            .put(&self.url)
            .timeout(Duration::from_secs(300))
            .body(body)
            .send()
            .await
            .map_err(|e| UploadError::Rejected(e.to_string()))?
            .error_for_status()
            .map_err(|e| UploadError::Rejected(e.to_string()))?;

        Ok(self.object_url())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_key() {
        assert_eq!(
            object_key("ise-reports/", "FullReport_01-Jan-2024.csv"),
            "ise-reports/FullReport_01-Jan-2024.csv"
        );
        assert_eq!(object_key("", "a.csv"), "a.csv");
    }

    #[test]
    fn test_presigned_target_hides_signature() {
        let uploader =
            PresignedUrlUploader::new("https://bucket.s3.amazonaws.com/r.csv?X-Amz-Signature=abc");
        assert_eq!(uploader.target(), "https://bucket.s3.amazonaws.com/r.csv");
    }

    #[tokio::test]
    async fn test_presigned_preflight_rejects_bad_url() {
        let uploader = PresignedUrlUploader::new("not a url");
        assert!(matches!(
            uploader.preflight().await,
            Err(UploadError::Credentials(_))
        ));
    }

    #[tokio::test]
    async fn test_missing_artifact_detected_before_upload() {
        let dir = tempfile::tempdir().unwrap();
        let uploader = PresignedUrlUploader::new("https://example.invalid/upload");
        let err = uploader
            .upload(&dir.path().join("FullReport_01-Jan-2024.csv"), "k")
            .await
            .unwrap_err();
        assert!(matches!(err, UploadError::MissingArtifact { .. }));
    }

    #[test]
    fn test_s3_target_and_url() {
        let uploader = S3Uploader::new("ise-exports", "eu-west-1", None);
        assert_eq!(uploader.target(), "s3://ise-exports");
        assert_eq!(
            uploader.object_url("ise-reports/a.csv"),
            "https://ise-exports.s3.eu-west-1.amazonaws.com/ise-reports/a.csv"
        );
    }
}
