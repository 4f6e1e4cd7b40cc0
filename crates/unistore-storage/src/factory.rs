#[cfg(feature = "storage-local")]
use crate::LocalStorage;
#[cfg(feature = "storage-s3")]
use crate::{RemoteCredentials, RemoteStorage};
use crate::{Storage, StorageBackend, StorageConfig, StorageError, StorageResult};
use std::sync::Arc;

/// Create a storage backend based on configuration
pub async fn create_storage(config: &StorageConfig) -> StorageResult<Arc<dyn Storage>> {
    config
        .validate()
        .map_err(|e| StorageError::ConfigError(e.to_string()))?;

    let storage: Arc<dyn Storage> = match config.storage_backend {
        #[cfg(feature = "storage-s3")]
        StorageBackend::S3 => {
            let credentials = RemoteCredentials {
                access_key_id: required(&config.aws_access_key_id, "AWS_ACCESS_KEY_ID")?,
                secret_access_key: required(&config.aws_secret_access_key, "AWS_SECRET_ACCESS_KEY")?,
                session_token: config.aws_session_token.clone(),
            };
            let storage = RemoteStorage::s3(
                required(&config.s3_bucket, "S3_BUCKET")?,
                required(&config.s3_region, "S3_REGION or AWS_REGION")?,
                config.s3_endpoint.clone(),
                credentials,
                config.upload.clone(),
            )
            .await?;
            Arc::new(storage)
        }

        #[cfg(feature = "storage-s3")]
        StorageBackend::Oss => {
            let credentials = RemoteCredentials {
                access_key_id: required(&config.oss_access_key_id, "OSS_ACCESS_KEY_ID")?,
                secret_access_key: required(&config.oss_access_key_secret, "OSS_ACCESS_KEY_SECRET")?,
                session_token: None,
            };
            let storage = RemoteStorage::oss(
                required(&config.oss_bucket, "OSS_BUCKET")?,
                required(&config.oss_endpoint, "OSS_ENDPOINT")?,
                credentials,
                config.upload.clone(),
            )
            .await?;
            Arc::new(storage)
        }

        #[cfg(not(feature = "storage-s3"))]
        StorageBackend::S3 | StorageBackend::Oss => {
            return Err(StorageError::ConfigError(format!(
                "{} storage backend not available (storage-s3 feature not enabled)",
                config.storage_backend
            )))
        }

        #[cfg(feature = "storage-local")]
        StorageBackend::Local => {
            let storage = LocalStorage::new(
                required(&config.local_storage_path, "LOCAL_STORAGE_PATH")?,
                required(&config.local_public_storage_path, "LOCAL_PUBLIC_STORAGE_PATH")?,
                required(&config.local_storage_base_url, "LOCAL_STORAGE_BASE_URL")?,
                None,
            )
            .await?;
            Arc::new(storage)
        }

        #[cfg(not(feature = "storage-local"))]
        StorageBackend::Local => {
            return Err(StorageError::ConfigError(
                "Local storage backend not available (storage-local feature not enabled)"
                    .to_string(),
            ))
        }
    };

    tracing::info!(backend = %storage.backend_type(), "Storage backend created");
    Ok(storage)
}

fn required(value: &Option<String>, name: &str) -> StorageResult<String> {
    value
        .clone()
        .ok_or_else(|| StorageError::ConfigError(format!("{} not configured", name)))
}
