use crate::link::{default_link_strategy, LinkStrategy};
use crate::path::{encode_key, normalize_key, resolve_under};
use crate::traits::{ByteSource, ByteStream, Storage, StorageError, StorageResult};
use crate::{StorageBackend, StorageResize, Visibility};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use uuid::Uuid;

const COPY_BUFFER_SIZE: usize = 64 * 1024;

/// Builds a temporary download URL for a private file.
///
/// Receives the absolute private-tree path, the normalized object key and the
/// requested lifetime.
pub type SignedUrlBuilder =
    Arc<dyn Fn(&Path, &str, Duration) -> StorageResult<String> + Send + Sync>;

/// Local filesystem storage with a private and a public directory tree
///
/// Every object lives in the private tree. Public objects additionally have a
/// link at the same relative path in the public tree, which is served by an
/// external HTTP layer under `public_base_url`. Visibility is derived from the
/// presence of that link and is not stored anywhere else, so `public-read`
/// and `public-read-write` cannot be told apart once written.
#[derive(Clone)]
pub struct LocalStorage {
    private_root: PathBuf,
    public_root: PathBuf,
    public_base_url: String,
    signed_url_builder: SignedUrlBuilder,
    linker: Arc<dyn LinkStrategy>,
}

impl LocalStorage {
    /// Create a new LocalStorage instance
    ///
    /// # Arguments
    /// * `private_root` - Directory holding the content of every object (not served publicly)
    /// * `public_root` - Directory holding links to public objects (served over HTTP)
    /// * `public_base_url` - Base URL the public directory is served under (e.g., "http://localhost:8000/files")
    /// * `signed_url_builder` - Temporary URL builder for private files; `None` makes
    ///   `temporary_url` fail with `Unsupported` for private objects
    pub async fn new(
        private_root: impl Into<PathBuf>,
        public_root: impl Into<PathBuf>,
        public_base_url: impl Into<String>,
        signed_url_builder: Option<SignedUrlBuilder>,
    ) -> StorageResult<Self> {
        let private_root = prepare_root(private_root.into()).await?;
        let public_root = prepare_root(public_root.into()).await?;

        if private_root == public_root {
            return Err(StorageError::ConfigError(format!(
                "Private and public roots must differ: {}",
                private_root.display()
            )));
        }

        let signed_url_builder = signed_url_builder.unwrap_or_else(unsupported_signed_url_builder);
        let linker = default_link_strategy();

        tracing::debug!(
            private_root = %private_root.display(),
            public_root = %public_root.display(),
            link_strategy = linker.name(),
            "Local storage initialized"
        );

        Ok(LocalStorage {
            private_root,
            public_root,
            public_base_url: public_base_url.into(),
            signed_url_builder,
            linker,
        })
    }

    /// Replace the platform default link strategy
    pub fn with_link_strategy(mut self, linker: Arc<dyn LinkStrategy>) -> Self {
        self.linker = linker;
        self
    }

    pub fn private_root(&self) -> &Path {
        &self.private_root
    }

    pub fn public_root(&self) -> &Path {
        &self.public_root
    }

    fn private_path(&self, key: &str) -> PathBuf {
        resolve_under(&self.private_root, key)
    }

    fn public_path(&self, key: &str) -> PathBuf {
        resolve_under(&self.public_root, key)
    }

    /// Generate public URL for file
    fn generate_url(&self, key: &str) -> String {
        format!(
            "{}/{}",
            self.public_base_url.trim_end_matches('/'),
            encode_key(key)
        )
    }

    /// Ensure parent directory exists
    async fn ensure_parent_dir(&self, path: &Path, op: &'static str, key: &str) -> StorageResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| StorageError::Io {
                op,
                key: key.to_string(),
                source: e,
            })?;
        }
        Ok(())
    }

    async fn has_public_entry(&self, key: &str) -> bool {
        entry_exists(&self.public_path(key)).await
    }

    async fn has_private_file(&self, key: &str) -> StorageResult<bool> {
        match fs::metadata(self.private_path(key)).await {
            Ok(meta) => Ok(meta.is_file()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StorageError::io("stat", key, e)),
        }
    }

    /// Remove the public-tree entry, leaving the private content in place.
    /// Returns whether an entry was removed.
    async fn remove_public_entry(&self, key: &str) -> StorageResult<bool> {
        let public_path = self.public_path(key);
        if !entry_exists(&public_path).await {
            return Ok(false);
        }

        match fs::remove_file(&public_path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StorageError::Io {
                op: "make_private",
                key: key.to_string(),
                source: e,
            }),
        }
    }

    /// Link the private file into the public tree, replacing any stale entry.
    async fn make_public(&self, key: &str) -> StorageResult<()> {
        if !self.has_private_file(key).await? {
            return Err(StorageError::NotFound(key.to_string()));
        }

        let private_path = self.private_path(key);
        let public_path = self.public_path(key);
        self.ensure_parent_dir(&public_path, "make_public", key).await?;
        self.remove_public_entry(key).await?;

        self.linker
            .link(&private_path, &public_path)
            .await
            .map_err(|e| StorageError::Io {
                op: "make_public",
                key: key.to_string(),
                source: e,
            })?;

        tracing::debug!(
            key = %key,
            link_strategy = self.linker.name(),
            "Local storage object linked into public tree"
        );
        Ok(())
    }

    /// Stream the source into a temporary sibling and move it over the
    /// destination once the source is exhausted.
    async fn write_private(&self, key: &str, mut source: ByteSource) -> StorageResult<u64> {
        let path = self.private_path(key);
        self.ensure_parent_dir(&path, "put", key).await?;

        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| StorageError::InvalidKey(key.to_string()))?;
        let temp_path = path.with_file_name(format!(".{}.{}.tmp", file_name, Uuid::new_v4()));

        let written = async {
            let mut file = fs::File::create(&temp_path)
                .await
                .map_err(|e| StorageError::io("put", key, e))?;
            let mut buffer = vec![0u8; COPY_BUFFER_SIZE];
            let mut total: u64 = 0;

            loop {
                let read = source
                    .read(&mut buffer)
                    .await
                    .map_err(|e| StorageError::SourceRead {
                        key: key.to_string(),
                        source: e,
                    })?;
                if read == 0 {
                    break;
                }
                file.write_all(&buffer[..read])
                    .await
                    .map_err(|e| StorageError::io("put", key, e))?;
                total += read as u64;
            }

            file.sync_all()
                .await
                .map_err(|e| StorageError::io("put", key, e))?;
            Ok::<u64, StorageError>(total)
        }
        .await;

        let total = match written {
            Ok(total) => total,
            Err(e) => {
                if let Err(cleanup) = fs::remove_file(&temp_path).await {
                    tracing::warn!(
                        error = %cleanup,
                        path = %temp_path.display(),
                        "Failed to remove partial upload"
                    );
                }
                return Err(e);
            }
        };

        if let Err(e) = fs::rename(&temp_path, &path).await {
            if let Err(cleanup) = fs::remove_file(&temp_path).await {
                tracing::warn!(
                    error = %cleanup,
                    path = %temp_path.display(),
                    "Failed to remove partial upload"
                );
            }
            return Err(StorageError::io("put", key, e));
        }
        Ok(total)
    }
}

#[async_trait]
impl Storage for LocalStorage {
    async fn read(&self, key: &str) -> StorageResult<ByteStream> {
        let key = normalize_key(key);
        if !self.has_private_file(&key).await? {
            return Err(StorageError::NotFound(key));
        }

        let path = self.private_path(&key);
        let file = fs::File::open(&path)
            .await
            .map_err(|e| StorageError::io("read", &key, e))?;

        tracing::debug!(key = %key, path = %path.display(), "Local storage read opened");

        let stream = tokio_util::io::ReaderStream::new(file).map(move |chunk| {
            chunk.map_err(|e| StorageError::Io {
                op: "read",
                key: key.clone(),
                source: e,
            })
        });

        Ok(Box::pin(stream))
    }

    async fn put(&self, key: &str, source: ByteSource, visibility: Visibility) -> StorageResult<()> {
        let key = normalize_key(key);
        if key.is_empty() {
            return Err(StorageError::InvalidKey("empty object key".to_string()));
        }
        let start = Instant::now();

        let size = self.write_private(&key, source).await?;

        if visibility.is_public() {
            self.make_public(&key).await?;
        } else {
            self.remove_public_entry(&key).await?;
        }

        tracing::info!(
            key = %key,
            size_bytes = size,
            visibility = %visibility,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage put successful"
        );

        Ok(())
    }

    async fn delete(&self, keys: &[&str]) -> StorageResult<()> {
        for raw_key in keys {
            let key = normalize_key(raw_key);
            if key.is_empty() {
                return Err(StorageError::InvalidKey(raw_key.to_string()));
            }

            self.remove_public_entry(&key).await?;

            match fs::remove_file(self.private_path(&key)).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    return Err(StorageError::Io {
                        op: "delete",
                        key,
                        source: e,
                    })
                }
            }

            tracing::info!(key = %key, "Local storage delete successful");
        }
        Ok(())
    }

    async fn url(&self, key: &str, _resize: Option<&StorageResize>) -> StorageResult<String> {
        let key = normalize_key(key);
        if key.is_empty() {
            return Err(StorageError::InvalidKey("empty object key".to_string()));
        }
        if !self.has_public_entry(&key).await {
            return Err(StorageError::NotFound(key));
        }
        Ok(self.generate_url(&key))
    }

    async fn temporary_url(
        &self,
        key: &str,
        expire_in: Duration,
        resize: Option<&StorageResize>,
    ) -> StorageResult<String> {
        let key = normalize_key(key);
        if key.is_empty() {
            return Err(StorageError::InvalidKey("empty object key".to_string()));
        }

        if self.has_private_file(&key).await? {
            let path = self.private_path(&key);
            return (self.signed_url_builder)(&path, &key, expire_in);
        }

        self.url(&key, resize)
            .await
            .map_err(|_| StorageError::NotFound(key))
    }

    async fn copy(&self, from_key: &str, to_key: &str) -> StorageResult<()> {
        let from_key = normalize_key(from_key);
        let to_key = normalize_key(to_key);
        if to_key.is_empty() {
            return Err(StorageError::InvalidKey("empty destination key".to_string()));
        }
        if !self.has_private_file(&from_key).await? {
            return Err(StorageError::NotFound(from_key));
        }
        if from_key == to_key {
            return Ok(());
        }

        let from_path = self.private_path(&from_key);
        let to_path = self.private_path(&to_key);

        self.ensure_parent_dir(&to_path, "copy", &to_key).await?;
        // The copy is always private, whatever the destination was before.
        self.remove_public_entry(&to_key).await?;

        fs::copy(&from_path, &to_path)
            .await
            .map_err(|e| StorageError::Io {
                op: "copy",
                key: to_key.clone(),
                source: e,
            })?;

        tracing::info!(
            from_key = %from_key,
            to_key = %to_key,
            from_path = %from_path.display(),
            to_path = %to_path.display(),
            "Local storage copy successful"
        );

        Ok(())
    }

    async fn size(&self, key: &str) -> StorageResult<u64> {
        let key = normalize_key(key);
        let meta = private_file_metadata(&self.private_path(&key), "size", &key).await?;
        Ok(meta.len())
    }

    async fn last_modified(&self, key: &str) -> StorageResult<DateTime<Utc>> {
        let key = normalize_key(key);
        let meta = private_file_metadata(&self.private_path(&key), "last_modified", &key).await?;
        let modified = meta
            .modified()
            .map_err(|e| StorageError::io("last_modified", &key, e))?;
        Ok(DateTime::<Utc>::from(modified))
    }

    async fn exist(&self, key: &str) -> StorageResult<bool> {
        let key = normalize_key(key);
        self.has_private_file(&key).await
    }

    async fn set_visibility(&self, key: &str, visibility: Visibility) -> StorageResult<()> {
        let key = normalize_key(key);
        if key.is_empty() {
            return Err(StorageError::InvalidKey("empty object key".to_string()));
        }

        match visibility {
            Visibility::Private => {
                if self.remove_public_entry(&key).await? {
                    tracing::info!(key = %key, "Local storage object made private");
                }
            }
            Visibility::PublicRead | Visibility::PublicReadWrite => {
                if !self.has_public_entry(&key).await {
                    self.make_public(&key).await?;
                    tracing::info!(key = %key, visibility = %visibility, "Local storage object made public");
                }
            }
        }
        Ok(())
    }

    async fn get_visibility(&self, key: &str) -> StorageResult<Visibility> {
        let key = normalize_key(key);
        if key.is_empty() {
            return Err(StorageError::NotFound(key));
        }

        if self.has_public_entry(&key).await {
            return Ok(Visibility::PublicRead);
        }
        if self.has_private_file(&key).await? {
            return Ok(Visibility::Private);
        }
        Err(StorageError::NotFound(key))
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Local
    }
}

async fn prepare_root(root: PathBuf) -> StorageResult<PathBuf> {
    fs::create_dir_all(&root).await.map_err(|e| {
        StorageError::ConfigError(format!(
            "Failed to create storage directory {}: {}",
            root.display(),
            e
        ))
    })?;

    // Links must point at absolute targets.
    fs::canonicalize(&root).await.map_err(|e| {
        StorageError::ConfigError(format!(
            "Failed to canonicalize storage directory {}: {}",
            root.display(),
            e
        ))
    })
}

fn unsupported_signed_url_builder() -> SignedUrlBuilder {
    Arc::new(|_path: &Path, _key: &str, _expire_in: Duration| {
        Err(StorageError::Unsupported(
            "local storage has no signed URL builder configured".to_string(),
        ))
    })
}

/// Presence check that does not follow links, so dangling links count.
/// Directories in the public tree are never objects.
async fn entry_exists(path: &Path) -> bool {
    matches!(fs::symlink_metadata(path).await, Ok(meta) if !meta.is_dir())
}

async fn private_file_metadata(
    path: &Path,
    op: &'static str,
    key: &str,
) -> StorageResult<std::fs::Metadata> {
    let meta = fs::metadata(path)
        .await
        .map_err(|e| StorageError::io(op, key, e))?;
    if !meta.is_file() {
        return Err(StorageError::NotFound(key.to_string()));
    }
    Ok(meta)
}
