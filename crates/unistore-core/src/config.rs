//! Configuration module
//!
//! Storage configuration is read from the environment (optionally seeded from a
//! `.env` file). Each backend only requires its own variables; `validate`
//! checks the ones needed by the selected backend.

use std::env;
use std::fmt;
use std::time::Duration;

use crate::storage_types::StorageBackend;

/// Smallest part size accepted by S3-compatible multipart uploads (5 MiB).
pub const MIN_PART_SIZE: usize = 5 * 1024 * 1024;

const UPLOAD_MAX_RETRIES: u32 = 3;
const UPLOAD_RETRY_DELAY_MS: u64 = 2000;
const UPLOAD_SESSION_TTL_SECS: u64 = 6 * 60 * 60;

/// Tuning of the remote multipart upload engine
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UploadConfig {
    /// Size of every part except the last one
    pub part_size: usize,
    /// Total attempts per part, including the first one
    pub max_retries: u32,
    /// Fixed pause between two attempts of the same part
    pub retry_delay: Duration,
    /// Lifetime requested for the remote upload session
    pub session_ttl: Duration,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            part_size: MIN_PART_SIZE,
            max_retries: UPLOAD_MAX_RETRIES,
            retry_delay: Duration::from_millis(UPLOAD_RETRY_DELAY_MS),
            session_ttl: Duration::from_secs(UPLOAD_SESSION_TTL_SECS),
        }
    }
}

impl UploadConfig {
    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.part_size < MIN_PART_SIZE {
            return Err(anyhow::anyhow!(
                "UPLOAD_PART_SIZE_BYTES must be at least {} bytes, got {}",
                MIN_PART_SIZE,
                self.part_size
            ));
        }
        if self.max_retries == 0 {
            return Err(anyhow::anyhow!("UPLOAD_MAX_RETRIES must be at least 1"));
        }
        if self.session_ttl.is_zero() {
            return Err(anyhow::anyhow!("UPLOAD_SESSION_TTL_SECS must be positive"));
        }
        Ok(())
    }
}

/// Storage configuration for every supported backend
#[derive(Clone)]
pub struct StorageConfig {
    pub storage_backend: StorageBackend,
    // Local dual-tree storage
    pub local_storage_path: Option<String>,
    pub local_public_storage_path: Option<String>,
    pub local_storage_base_url: Option<String>,
    // AWS S3 (or S3-compatible providers through S3_ENDPOINT)
    pub s3_bucket: Option<String>,
    pub s3_region: Option<String>,
    pub s3_endpoint: Option<String>,
    pub aws_access_key_id: Option<String>,
    pub aws_secret_access_key: Option<String>,
    pub aws_session_token: Option<String>,
    // Alibaba OSS
    pub oss_bucket: Option<String>,
    pub oss_endpoint: Option<String>,
    pub oss_access_key_id: Option<String>,
    pub oss_access_key_secret: Option<String>,
    pub upload: UploadConfig,
}

impl StorageConfig {
    /// Load configuration from the process environment, reading `.env` first if present.
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, anyhow::Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let storage_backend = match lookup("STORAGE_BACKEND") {
            Some(value) => value.parse()?,
            None => StorageBackend::S3,
        };

        let upload = UploadConfig {
            part_size: parse_or("UPLOAD_PART_SIZE_BYTES", &lookup, MIN_PART_SIZE)?,
            max_retries: parse_or("UPLOAD_MAX_RETRIES", &lookup, UPLOAD_MAX_RETRIES)?,
            retry_delay: Duration::from_millis(parse_or(
                "UPLOAD_RETRY_DELAY_MS",
                &lookup,
                UPLOAD_RETRY_DELAY_MS,
            )?),
            session_ttl: Duration::from_secs(parse_or(
                "UPLOAD_SESSION_TTL_SECS",
                &lookup,
                UPLOAD_SESSION_TTL_SECS,
            )?),
        };

        Ok(StorageConfig {
            storage_backend,
            local_storage_path: lookup("LOCAL_STORAGE_PATH"),
            local_public_storage_path: lookup("LOCAL_PUBLIC_STORAGE_PATH"),
            local_storage_base_url: lookup("LOCAL_STORAGE_BASE_URL"),
            s3_bucket: lookup("S3_BUCKET"),
            s3_region: lookup("S3_REGION").or_else(|| lookup("AWS_REGION")),
            s3_endpoint: lookup("S3_ENDPOINT"),
            aws_access_key_id: lookup("AWS_ACCESS_KEY_ID"),
            aws_secret_access_key: lookup("AWS_SECRET_ACCESS_KEY"),
            aws_session_token: lookup("AWS_SESSION_TOKEN"),
            oss_bucket: lookup("OSS_BUCKET"),
            oss_endpoint: lookup("OSS_ENDPOINT"),
            oss_access_key_id: lookup("OSS_ACCESS_KEY_ID"),
            oss_access_key_secret: lookup("OSS_ACCESS_KEY_SECRET"),
            upload,
        })
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        match self.storage_backend {
            StorageBackend::S3 => {
                require(&self.s3_bucket, "S3_BUCKET", "S3")?;
                require(&self.s3_region, "S3_REGION or AWS_REGION", "S3")?;
                require(&self.aws_access_key_id, "AWS_ACCESS_KEY_ID", "S3")?;
                require(&self.aws_secret_access_key, "AWS_SECRET_ACCESS_KEY", "S3")?;
                self.upload.validate()?;
            }
            StorageBackend::Oss => {
                require(&self.oss_bucket, "OSS_BUCKET", "OSS")?;
                require(&self.oss_endpoint, "OSS_ENDPOINT", "OSS")?;
                require(&self.oss_access_key_id, "OSS_ACCESS_KEY_ID", "OSS")?;
                require(&self.oss_access_key_secret, "OSS_ACCESS_KEY_SECRET", "OSS")?;
                self.upload.validate()?;
            }
            StorageBackend::Local => {
                require(&self.local_storage_path, "LOCAL_STORAGE_PATH", "local")?;
                require(&self.local_public_storage_path, "LOCAL_PUBLIC_STORAGE_PATH", "local")?;
                require(&self.local_storage_base_url, "LOCAL_STORAGE_BASE_URL", "local")?;
                if self.local_storage_path == self.local_public_storage_path {
                    return Err(anyhow::anyhow!(
                        "LOCAL_STORAGE_PATH and LOCAL_PUBLIC_STORAGE_PATH must be different directories"
                    ));
                }
            }
        }
        Ok(())
    }
}

impl fmt::Debug for StorageConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redacted = |value: &Option<String>| value.as_ref().map(|_| "***");
        f.debug_struct("StorageConfig")
            .field("storage_backend", &self.storage_backend)
            .field("local_storage_path", &self.local_storage_path)
            .field("local_public_storage_path", &self.local_public_storage_path)
            .field("local_storage_base_url", &self.local_storage_base_url)
            .field("s3_bucket", &self.s3_bucket)
            .field("s3_region", &self.s3_region)
            .field("s3_endpoint", &self.s3_endpoint)
            .field("aws_access_key_id", &self.aws_access_key_id)
            .field("aws_secret_access_key", &redacted(&self.aws_secret_access_key))
            .field("aws_session_token", &redacted(&self.aws_session_token))
            .field("oss_bucket", &self.oss_bucket)
            .field("oss_endpoint", &self.oss_endpoint)
            .field("oss_access_key_id", &self.oss_access_key_id)
            .field("oss_access_key_secret", &redacted(&self.oss_access_key_secret))
            .field("upload", &self.upload)
            .finish()
    }
}

fn require(value: &Option<String>, name: &str, backend: &str) -> Result<(), anyhow::Error> {
    match value.as_deref() {
        Some(v) if !v.trim().is_empty() => Ok(()),
        _ => Err(anyhow::anyhow!(
            "{} must be set when using {} storage backend",
            name,
            backend
        )),
    }
}

fn parse_or<T, F>(name: &str, lookup: &F, default: T) -> Result<T, anyhow::Error>
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| anyhow::anyhow!("{} must be a valid number, got {:?}", name, raw)),
        None => Ok(default),
    }
}
