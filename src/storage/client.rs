use std::path::PathBuf;

use async_trait::async_trait;

use crate::error::AppError;

/// Trait for blob storage of uploaded photos.
///
/// Abstracted as a trait so tests can use a temporary directory instead of S3.
#[async_trait]
pub trait StorageClient: Send + Sync {
    /// Upload content to the given key, replacing any existing object.
    async fn put_object(&self, key: &str, content: Vec<u8>) -> Result<(), AppError>;

    /// Retrieve content by key. Returns `None` if the object doesn't exist.
    async fn get_object(&self, key: &str) -> Result<Option<Vec<u8>>, AppError>;
}

/// Keys are flat file names; anything that could escape the storage root is rejected.
fn checked_key(key: &str) -> Result<&str, AppError> {
    let valid = !key.is_empty()
        && key != "."
        && key != ".."
        && !key.contains(['/', '\\'])
        && !key.starts_with('.');
    if valid {
        Ok(key)
    } else {
        Err(AppError::BadRequest(format!("Invalid file name '{}'", key)))
    }
}

/// Stores objects as files under a local directory.
pub struct LocalStorageClient {
    root: PathBuf,
}

impl LocalStorageClient {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl StorageClient for LocalStorageClient {
    async fn put_object(&self, key: &str, content: Vec<u8>) -> Result<(), AppError> {
        let path = self.root.join(checked_key(key)?);
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| AppError::Storage(format!("Failed to create upload directory: {}", e)))?;
        tokio::fs::write(&path, content)
            .await
            .map_err(|e| AppError::Storage(format!("Failed to write '{}': {}", key, e)))
    }

    async fn get_object(&self, key: &str) -> Result<Option<Vec<u8>>, AppError> {
        let path = self.root.join(checked_key(key)?);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::Storage(format!("Failed to read '{}': {}", key, e))),
        }
    }
}

/// S3 implementation of StorageClient.
pub struct S3StorageClient {
    client: aws_sdk_s3::Client,
    bucket: String,
}

impl S3StorageClient {
    /// Create a client for `bucket` using the ambient AWS configuration.
    ///
    /// `S3_ENDPOINT` (optional) selects a custom endpoint for MinIO / LocalStack.
    pub async fn from_env(bucket: String) -> Self {
        let mut config_loader = aws_config::defaults(aws_config::BehaviorVersion::latest());

        if let Ok(endpoint) = std::env::var("S3_ENDPOINT") {
            config_loader = config_loader.endpoint_url(&endpoint);
        }

        let sdk_config = config_loader.load().await;
        let client = aws_sdk_s3::Client::new(&sdk_config);

        Self { client, bucket }
    }
}

#[async_trait]
impl StorageClient for S3StorageClient {
    async fn put_object(&self, key: &str, content: Vec<u8>) -> Result<(), AppError> {
        let key = checked_key(key)?;
        let content_type = mime_guess::from_path(key).first_or_octet_stream();

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type.essence_str())
            .body(content.into())
            .send()
            .await
            .map_err(|e| AppError::Storage(format!("Failed to put object '{}': {}", key, e)))?;

        Ok(())
    }

    async fn get_object(&self, key: &str) -> Result<Option<Vec<u8>>, AppError> {
        let key = checked_key(key)?;
        match self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(output) => {
                let bytes = output
                    .body
                    .collect()
                    .await
                    .map_err(|e| AppError::Storage(format!("Failed to read body: {}", e)))?;
                Ok(Some(bytes.into_bytes().to_vec()))
            }
            Err(e) => {
                let service_err = e.into_service_error();
                if service_err.is_no_such_key() {
                    Ok(None)
                } else {
                    Err(AppError::Storage(format!(
                        "Failed to get object '{}': {}",
                        key, service_err
                    )))
                }
            }
        }
    }
}
