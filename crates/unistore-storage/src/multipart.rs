//! Streaming multipart upload engine
//!
//! An upload moves through `Initiated -> Uploading(part n) -> Completed` or
//! ends in `Aborted`. The source is read one part at a time, so memory use is
//! bounded by the part size whatever the object size. Each part is retried a
//! fixed number of times with a fixed delay; a part that keeps failing, or a
//! failing source, aborts the remote session. A failed completion is returned
//! as is and left to the session expiry.

use crate::acl::CannedAcl;
use crate::client::{CompletedPart, ObjectClient};
use crate::traits::{ByteSource, StorageError, StorageResult};
use crate::UploadConfig;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::time::Instant;
use tokio::io::AsyncReadExt;

/// Outcome of a completed upload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadSummary {
    pub parts: usize,
    pub bytes: u64,
}

/// Remote session opened for one `put`. Consumed by completion or abort.
struct UploadSession<'a> {
    client: &'a dyn ObjectClient,
    key: String,
    upload_id: String,
    expires_at: DateTime<Utc>,
    parts: Vec<CompletedPart>,
}

impl<'a> UploadSession<'a> {
    async fn open(
        client: &'a dyn ObjectClient,
        key: &str,
        acl: CannedAcl,
        config: &UploadConfig,
    ) -> StorageResult<UploadSession<'a>> {
        let ttl = chrono::Duration::from_std(config.session_ttl)
            .map_err(|e| StorageError::ConfigError(format!("Invalid session TTL: {}", e)))?;
        let expires_at = Utc::now()
            .checked_add_signed(ttl)
            .ok_or_else(|| StorageError::ConfigError("Session TTL out of range".to_string()))?;

        let upload_id = client.create_multipart(key, acl, expires_at).await?;

        tracing::debug!(
            key = %key,
            upload_id = %upload_id,
            acl = acl.as_str(),
            expires_at = %expires_at,
            "Multipart upload session opened"
        );

        Ok(UploadSession {
            client,
            key: key.to_string(),
            upload_id,
            expires_at,
            parts: Vec::new(),
        })
    }

    fn next_part_number(&self) -> i32 {
        self.parts.len() as i32 + 1
    }

    /// Submit `body` as the next part, retrying with a fixed delay.
    async fn upload_part(&mut self, body: Bytes, config: &UploadConfig) -> StorageResult<()> {
        let part_number = self.next_part_number();
        let mut attempt: u32 = 1;

        loop {
            tracing::debug!(
                key = %self.key,
                part_number,
                size_bytes = body.len(),
                attempt,
                "Uploading part"
            );

            match self
                .client
                .upload_part(&self.key, &self.upload_id, part_number, body.clone())
                .await
            {
                Ok(etag) => {
                    self.parts.push(CompletedPart { part_number, etag });
                    return Ok(());
                }
                Err(e) if attempt < config.max_retries => {
                    tracing::warn!(
                        error = %e,
                        key = %self.key,
                        part_number,
                        attempt,
                        max_retries = config.max_retries,
                        "Part upload failed, retrying"
                    );
                    tokio::time::sleep(config.retry_delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn complete(self) -> StorageResult<()> {
        self.client
            .complete_multipart(&self.key, &self.upload_id, &self.parts)
            .await
            .map_err(|e| {
                tracing::error!(
                    error = %e,
                    key = %self.key,
                    upload_id = %self.upload_id,
                    expires_at = %self.expires_at,
                    "Multipart upload completion failed, session left to expire"
                );
                e
            })
    }

    /// Cancel the session and hand back the error that caused it.
    ///
    /// If the cancellation itself fails the session leaks until it expires,
    /// which is reported as [`StorageError::AbortFailed`].
    async fn abort(self, cause: StorageError) -> StorageError {
        match self.client.abort_multipart(&self.key, &self.upload_id).await {
            Ok(()) => {
                tracing::warn!(
                    error = %cause,
                    key = %self.key,
                    upload_id = %self.upload_id,
                    uploaded_parts = self.parts.len(),
                    "Multipart upload aborted"
                );
                cause
            }
            Err(abort_error) => {
                tracing::error!(
                    error = %abort_error,
                    cause = %cause,
                    key = %self.key,
                    upload_id = %self.upload_id,
                    expires_at = %self.expires_at,
                    "Failed to abort multipart upload"
                );
                StorageError::AbortFailed {
                    key: self.key,
                    upload_id: self.upload_id,
                    abort_error: abort_error.to_string(),
                    cause: Box::new(cause),
                }
            }
        }
    }
}

/// Pushes a byte source to a remote store as a multipart upload
pub struct MultipartUploader<'a> {
    client: &'a dyn ObjectClient,
    config: &'a UploadConfig,
}

impl<'a> MultipartUploader<'a> {
    pub fn new(client: &'a dyn ObjectClient, config: &'a UploadConfig) -> Self {
        Self { client, config }
    }

    pub async fn upload(
        &self,
        key: &str,
        acl: CannedAcl,
        mut source: ByteSource,
    ) -> StorageResult<UploadSummary> {
        let start = Instant::now();
        let mut session = UploadSession::open(self.client, key, acl, self.config).await?;
        let mut bytes: u64 = 0;

        loop {
            let chunk = match read_chunk(&mut source, self.config.part_size).await {
                Ok(chunk) => chunk,
                Err(e) => {
                    let cause = StorageError::SourceRead {
                        key: key.to_string(),
                        source: e,
                    };
                    return Err(session.abort(cause).await);
                }
            };

            // An empty source still needs one (empty) part to materialize the object.
            if chunk.is_empty() && !session.parts.is_empty() {
                break;
            }

            let last = chunk.len() < self.config.part_size;
            bytes += chunk.len() as u64;

            let uploaded = session.upload_part(chunk, self.config).await;
            if let Err(e) = uploaded {
                return Err(session.abort(e).await);
            }
            if last {
                break;
            }
        }

        let parts = session.parts.len();
        session.complete().await?;

        tracing::info!(
            key = %key,
            parts,
            size_bytes = bytes,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Multipart upload completed"
        );

        Ok(UploadSummary { parts, bytes })
    }
}

/// Fill one part buffer from the source. A short result means EOF was reached.
async fn read_chunk(source: &mut ByteSource, part_size: usize) -> std::io::Result<Bytes> {
    let mut buffer = vec![0u8; part_size];
    let mut filled = 0;

    while filled < part_size {
        match source.read(&mut buffer[filled..]).await {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }

    buffer.truncate(filled);
    Ok(Bytes::from(buffer))
}
