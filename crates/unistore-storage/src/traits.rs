//! Storage abstraction trait
//!
//! This module defines the Storage trait that all storage backends must implement.

use crate::{StorageBackend, StorageResize, Visibility};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::Stream;
use std::pin::Pin;
use std::time::Duration;
use thiserror::Error;
use tokio::io::AsyncRead;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Invalid visibility: {0}")]
    InvalidVisibility(String),

    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("{op} failed for {key}: {source}")]
    Io {
        op: &'static str,
        key: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{op} failed for {key}: {message}")]
    Transport {
        op: &'static str,
        key: String,
        message: String,
    },

    #[error("Failed to read upload source for {key}: {source}")]
    SourceRead {
        key: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Multipart upload {upload_id} for {key} was not aborted ({abort_error}) after: {cause}")]
    AbortFailed {
        key: String,
        upload_id: String,
        abort_error: String,
        #[source]
        cause: Box<StorageError>,
    },

    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl StorageError {
    pub(crate) fn io(op: &'static str, key: &str, source: std::io::Error) -> Self {
        if source.kind() == std::io::ErrorKind::NotFound {
            return StorageError::NotFound(key.to_string());
        }
        StorageError::Io {
            op,
            key: key.to_string(),
            source,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound(_))
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Stream of object content chunks
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, StorageError>> + Send>>;

/// Byte source consumed by [`Storage::put`]
pub type ByteSource = Pin<Box<dyn AsyncRead + Send + Unpin>>;

/// Storage abstraction trait
///
/// All storage backends (S3, OSS, local filesystem) implement this trait so
/// callers only deal with relative object keys. Every key is normalized by the
/// backend before use; see [`crate::path::normalize_key`].
#[async_trait]
pub trait Storage: Send + Sync {
    /// Open the object content as a stream of chunks
    async fn read(&self, key: &str) -> StorageResult<ByteStream>;

    /// Store the source stream under `key` with the given visibility
    ///
    /// The source is consumed until EOF. Backends never hold more than one
    /// upload part of it in memory.
    async fn put(&self, key: &str, source: ByteSource, visibility: Visibility) -> StorageResult<()>;

    /// Delete every given object. Missing objects are not an error.
    async fn delete(&self, keys: &[&str]) -> StorageResult<()>;

    /// Public URL of the object
    async fn url(&self, key: &str, resize: Option<&StorageResize>) -> StorageResult<String>;

    /// Signed URL granting temporary access to the object
    async fn temporary_url(
        &self,
        key: &str,
        expire_in: Duration,
        resize: Option<&StorageResize>,
    ) -> StorageResult<String>;

    /// Copy an object to a new key
    async fn copy(&self, from_key: &str, to_key: &str) -> StorageResult<()>;

    /// Size of the object in bytes
    async fn size(&self, key: &str) -> StorageResult<u64>;

    /// Last modification time of the object
    async fn last_modified(&self, key: &str) -> StorageResult<DateTime<Utc>>;

    /// Check whether an object exists
    async fn exist(&self, key: &str) -> StorageResult<bool>;

    async fn set_visibility(&self, key: &str, visibility: Visibility) -> StorageResult<()>;

    async fn get_visibility(&self, key: &str) -> StorageResult<Visibility>;

    /// Get the storage backend type
    fn backend_type(&self) -> StorageBackend;
}
