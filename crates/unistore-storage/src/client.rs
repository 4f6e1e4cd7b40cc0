//! Remote object store client seam
//!
//! [`ObjectClient`] lists the one-shot RPCs the remote backends need. The
//! multipart engine and [`crate::remote::RemoteStorage`] only talk to this
//! trait, so the AWS SDK stays behind the `storage-s3` feature.

use crate::acl::{CannedAcl, Grant};
use crate::traits::{ByteStream, StorageResult};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::time::Duration;

/// Completion descriptor of an uploaded part
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedPart {
    pub part_number: i32,
    pub etag: String,
}

/// Metadata returned by a HEAD request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectMeta {
    pub size: u64,
    pub last_modified: Option<DateTime<Utc>>,
}

#[async_trait]
pub trait ObjectClient: Send + Sync {
    /// Open a multipart upload session and return its upload id
    async fn create_multipart(
        &self,
        key: &str,
        acl: CannedAcl,
        expires_at: DateTime<Utc>,
    ) -> StorageResult<String>;

    /// Upload one part and return its ETag
    async fn upload_part(
        &self,
        key: &str,
        upload_id: &str,
        part_number: i32,
        body: Bytes,
    ) -> StorageResult<String>;

    async fn complete_multipart(
        &self,
        key: &str,
        upload_id: &str,
        parts: &[CompletedPart],
    ) -> StorageResult<()>;

    async fn abort_multipart(&self, key: &str, upload_id: &str) -> StorageResult<()>;

    async fn get_object(&self, key: &str) -> StorageResult<ByteStream>;

    /// `None` when the object does not exist
    async fn head_object(&self, key: &str) -> StorageResult<Option<ObjectMeta>>;

    async fn delete_object(&self, key: &str) -> StorageResult<()>;

    /// Bulk delete in a single request
    async fn delete_objects(&self, keys: &[String]) -> StorageResult<()>;

    async fn copy_object(&self, from_key: &str, to_key: &str) -> StorageResult<()>;

    async fn put_object_acl(&self, key: &str, acl: CannedAcl) -> StorageResult<()>;

    async fn get_object_acl(&self, key: &str) -> StorageResult<Vec<Grant>>;

    /// Presigned GET URL, optionally signing an extra query parameter
    async fn presign_get(
        &self,
        key: &str,
        expires_in: Duration,
        query: Option<(&str, &str)>,
    ) -> StorageResult<String>;
}
