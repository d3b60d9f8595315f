//! Artifact storage: moving provider output into our own object store.
//!
//! The pipeline engine consumes storage only through the
//! [`ArtifactStorage`] trait so tests can substitute an in-memory fake.
//! Production uses [`S3ArtifactStorage`]: download from the provider CDN
//! via HTTP, upload to S3.

use async_trait::async_trait;

/// Errors from artifact download/upload.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The HTTP download request failed (network, DNS, TLS, etc.).
    #[error("Artifact download failed: {0}")]
    Download(#[from] reqwest::Error),

    /// The artifact host returned a non-2xx status code.
    #[error("Artifact host returned {status} for {url}")]
    DownloadStatus { status: u16, url: String },

    /// The object-store upload failed.
    #[error("Artifact upload failed: {0}")]
    Upload(String),
}

/// Narrow storage interface used by the pipeline engine.
#[async_trait]
pub trait ArtifactStorage: Send + Sync {
    /// Fetch an artifact from a provider-hosted URL.
    async fn download(&self, url: &str) -> Result<Vec<u8>, StorageError>;

    /// Persist artifact bytes, returning the storage id (object key) the
    /// job record stores as its output reference.
    async fn store(&self, bytes: Vec<u8>, content_type: &str) -> Result<String, StorageError>;
}

/// S3-backed artifact storage.
pub struct S3ArtifactStorage {
    http: reqwest::Client,
    s3: aws_sdk_s3::Client,
    bucket: String,
    key_prefix: String,
}

impl S3ArtifactStorage {
    /// Create storage targeting `bucket`, keying objects under `key_prefix`.
    pub fn new(s3: aws_sdk_s3::Client, bucket: String, key_prefix: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            s3,
            bucket,
            key_prefix,
        }
    }

    /// Build from ambient AWS configuration (env/instance credentials).
    pub async fn from_env(bucket: String, key_prefix: String) -> Self {
        let config = aws_config::load_from_env().await;
        Self::new(aws_sdk_s3::Client::new(&config), bucket, key_prefix)
    }

    /// File extension for a handful of content types we actually receive.
    fn extension_for(content_type: &str) -> &'static str {
        match content_type {
            "video/mp4" => "mp4",
            "video/webm" => "webm",
            "image/png" => "png",
            "image/jpeg" => "jpg",
            "image/webp" => "webp",
            _ => "bin",
        }
    }
}

#[async_trait]
impl ArtifactStorage for S3ArtifactStorage {
    async fn download(&self, url: &str) -> Result<Vec<u8>, StorageError> {
        let response = self.http.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(StorageError::DownloadStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        Ok(response.bytes().await?.to_vec())
    }

    async fn store(&self, bytes: Vec<u8>, content_type: &str) -> Result<String, StorageError> {
        let key = format!(
            "{}/{}.{}",
            self.key_prefix,
            uuid::Uuid::new_v4(),
            Self::extension_for(content_type),
        );

        let size = bytes.len();

        self.s3
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .content_type(content_type)
            .body(aws_sdk_s3::primitives::ByteStream::from(bytes))
            .send()
            .await
            .map_err(|e| StorageError::Upload(e.to_string()))?;

        tracing::debug!(key = %key, size, "Stored artifact");

        Ok(key)
    }
}
