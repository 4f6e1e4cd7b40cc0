use crate::acl::{to_canned_acl, visibility_from_grants};
use crate::client::ObjectClient;
use crate::multipart::MultipartUploader;
use crate::path::{encode_key, normalize_key};
use crate::traits::{ByteSource, ByteStream, Storage, StorageError, StorageResult};
use crate::{StorageBackend, StorageResize, UploadConfig, Visibility};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Minimum lifetime of an S3 presigned URL
pub const S3_MIN_SIGNED_URL_EXPIRY: Duration = Duration::from_secs(24 * 60 * 60);

/// Minimum lifetime of an OSS presigned URL
pub const OSS_MIN_SIGNED_URL_EXPIRY: Duration = Duration::from_secs(60);

const OSS_PROCESS_PARAM: &str = "x-oss-process";

/// Static credentials for a remote object store
#[derive(Clone)]
pub struct RemoteCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
}

impl fmt::Debug for RemoteCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteCredentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"[REDACTED]")
            .field(
                "session_token",
                &self.session_token.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}

/// Provider specific URL rules
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteFlavor {
    /// AWS S3, or an S3-compatible provider when `endpoint` is set
    /// (e.g., "http://localhost:9000" for MinIO)
    S3 {
        region: String,
        endpoint: Option<String>,
    },
    /// Alibaba Cloud OSS (e.g., "https://oss-cn-hangzhou.aliyuncs.com")
    Oss { endpoint: String },
}

/// Object storage backed by a remote S3-compatible store
#[derive(Clone)]
pub struct RemoteStorage {
    client: Arc<dyn ObjectClient>,
    bucket: String,
    flavor: RemoteFlavor,
    upload: UploadConfig,
}

impl RemoteStorage {
    pub fn new(
        client: Arc<dyn ObjectClient>,
        bucket: impl Into<String>,
        flavor: RemoteFlavor,
        upload: UploadConfig,
    ) -> StorageResult<Self> {
        upload
            .validate()
            .map_err(|e| StorageError::ConfigError(e.to_string()))?;

        let bucket = bucket.into();
        if bucket.is_empty() {
            return Err(StorageError::ConfigError("Bucket name is empty".to_string()));
        }

        Ok(RemoteStorage {
            client,
            bucket,
            flavor,
            upload,
        })
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn flavor(&self) -> &RemoteFlavor {
        &self.flavor
    }

    /// Generate public URL for an object
    ///
    /// For AWS S3: https://{bucket}.s3.{region}.amazonaws.com/{key}
    /// For S3-compatible providers (path-style): {endpoint}/{bucket}/{key}
    /// For OSS: https://{bucket}.{endpoint host}/{key}[?x-oss-process=...]
    fn generate_url(&self, key: &str, resize: Option<&StorageResize>) -> String {
        let key = encode_key(key);
        match &self.flavor {
            RemoteFlavor::S3 {
                endpoint: Some(endpoint),
                ..
            } => format!("{}/{}/{}", endpoint.trim_end_matches('/'), self.bucket, key),
            RemoteFlavor::S3 { region, .. } => format!(
                "https://{}.s3.{}.amazonaws.com/{}",
                self.bucket, region, key
            ),
            RemoteFlavor::Oss { endpoint } => {
                let mut url = format!(
                    "https://{}.{}/{}",
                    self.bucket,
                    strip_scheme(endpoint).trim_end_matches('/'),
                    key
                );
                if let Some(resize) = resize {
                    url.push_str(&format!(
                        "?{}={}",
                        OSS_PROCESS_PARAM,
                        urlencoding::encode(&resize.to_oss_process())
                    ));
                }
                url
            }
        }
    }

    fn min_signed_url_expiry(&self) -> Duration {
        match self.flavor {
            RemoteFlavor::S3 { .. } => S3_MIN_SIGNED_URL_EXPIRY,
            RemoteFlavor::Oss { .. } => OSS_MIN_SIGNED_URL_EXPIRY,
        }
    }

    fn provider(&self) -> &'static str {
        match self.flavor {
            RemoteFlavor::S3 { .. } => "s3",
            RemoteFlavor::Oss { .. } => "oss",
        }
    }
}

fn strip_scheme(endpoint: &str) -> &str {
    endpoint
        .strip_prefix("https://")
        .or_else(|| endpoint.strip_prefix("http://"))
        .unwrap_or(endpoint)
}

fn require_key(raw: &str) -> StorageResult<String> {
    let key = normalize_key(raw);
    if key.is_empty() {
        return Err(StorageError::InvalidKey(format!("empty object key: {:?}", raw)));
    }
    Ok(key)
}

#[async_trait]
impl Storage for RemoteStorage {
    async fn read(&self, key: &str) -> StorageResult<ByteStream> {
        let key = require_key(key)?;
        self.client.get_object(&key).await
    }

    async fn put(&self, key: &str, source: ByteSource, visibility: Visibility) -> StorageResult<()> {
        let key = require_key(key)?;
        let acl = to_canned_acl(visibility);
        let start = Instant::now();

        let summary = MultipartUploader::new(self.client.as_ref(), &self.upload)
            .upload(&key, acl, source)
            .await
            .map_err(|e| {
                tracing::error!(
                    error = %e,
                    provider = self.provider(),
                    bucket = %self.bucket,
                    key = %key,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "Remote put failed"
                );
                e
            })?;

        tracing::info!(
            provider = self.provider(),
            bucket = %self.bucket,
            key = %key,
            size_bytes = summary.bytes,
            parts = summary.parts,
            visibility = %visibility,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Remote put successful"
        );

        Ok(())
    }

    async fn delete(&self, keys: &[&str]) -> StorageResult<()> {
        let keys = keys
            .iter()
            .map(|k| require_key(k))
            .collect::<StorageResult<Vec<_>>>()?;
        let start = Instant::now();

        match keys.as_slice() {
            [] => return Ok(()),
            [key] => self.client.delete_object(key).await?,
            _ => self.client.delete_objects(&keys).await?,
        }

        tracing::info!(
            provider = self.provider(),
            bucket = %self.bucket,
            count = keys.len(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Remote delete successful"
        );

        Ok(())
    }

    async fn url(&self, key: &str, resize: Option<&StorageResize>) -> StorageResult<String> {
        let key = require_key(key)?;
        Ok(self.generate_url(&key, resize))
    }

    async fn temporary_url(
        &self,
        key: &str,
        expire_in: Duration,
        resize: Option<&StorageResize>,
    ) -> StorageResult<String> {
        let key = require_key(key)?;
        let expire_in = expire_in.max(self.min_signed_url_expiry());

        match &self.flavor {
            RemoteFlavor::S3 { .. } => self.client.presign_get(&key, expire_in, None).await,
            RemoteFlavor::Oss { .. } => {
                let process = resize.map(StorageResize::to_oss_process);
                let query = process.as_deref().map(|p| (OSS_PROCESS_PARAM, p));
                self.client.presign_get(&key, expire_in, query).await
            }
        }
    }

    async fn copy(&self, from_key: &str, to_key: &str) -> StorageResult<()> {
        let from_key = require_key(from_key)?;
        let to_key = require_key(to_key)?;
        let start = Instant::now();

        self.client.copy_object(&from_key, &to_key).await?;

        tracing::info!(
            provider = self.provider(),
            bucket = %self.bucket,
            from_key = %from_key,
            to_key = %to_key,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Remote copy successful"
        );

        Ok(())
    }

    async fn size(&self, key: &str) -> StorageResult<u64> {
        let key = require_key(key)?;
        match self.client.head_object(&key).await? {
            Some(meta) => Ok(meta.size),
            None => Err(StorageError::NotFound(key)),
        }
    }

    async fn last_modified(&self, key: &str) -> StorageResult<DateTime<Utc>> {
        let key = require_key(key)?;
        let meta = self
            .client
            .head_object(&key)
            .await?
            .ok_or_else(|| StorageError::NotFound(key.clone()))?;
        meta.last_modified.ok_or_else(|| StorageError::Transport {
            op: "last_modified",
            key,
            message: "response has no Last-Modified".to_string(),
        })
    }

    async fn exist(&self, key: &str) -> StorageResult<bool> {
        let key = require_key(key)?;
        Ok(self.client.head_object(&key).await?.is_some())
    }

    async fn set_visibility(&self, key: &str, visibility: Visibility) -> StorageResult<()> {
        let key = require_key(key)?;
        self.client
            .put_object_acl(&key, to_canned_acl(visibility))
            .await?;

        tracing::info!(
            provider = self.provider(),
            bucket = %self.bucket,
            key = %key,
            visibility = %visibility,
            "Remote visibility updated"
        );
        Ok(())
    }

    async fn get_visibility(&self, key: &str) -> StorageResult<Visibility> {
        let key = require_key(key)?;
        let grants = self.client.get_object_acl(&key).await?;
        visibility_from_grants(&grants)
    }

    fn backend_type(&self) -> StorageBackend {
        match self.flavor {
            RemoteFlavor::S3 { .. } => StorageBackend::S3,
            RemoteFlavor::Oss { .. } => StorageBackend::Oss,
        }
    }
}
