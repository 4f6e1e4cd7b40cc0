use crate::acl::{CannedAcl, Grant};
use crate::client::{CompletedPart, ObjectClient, ObjectMeta};
use crate::remote::{RemoteCredentials, RemoteFlavor, RemoteStorage};
use crate::traits::{ByteStream, StorageError, StorageResult};
use crate::UploadConfig;
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::config::http::HttpResponse;
use aws_sdk_s3::config::{Credentials, Region};
use aws_sdk_s3::error::{DisplayErrorContext, SdkError};
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::{ByteStream as SdkByteStream, DateTime as SdkDateTime};
use aws_sdk_s3::types::{
    CompletedMultipartUpload, CompletedPart as SdkCompletedPart, Delete, ObjectCannedAcl,
    ObjectIdentifier,
};
use aws_sdk_s3::Client;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;

const CREDENTIALS_PROVIDER_NAME: &str = "unistore-static";

/// [`ObjectClient`] over the AWS SDK, usable with any S3-compatible endpoint
#[derive(Clone)]
pub struct AwsObjectClient {
    client: Client,
    bucket: String,
}

impl AwsObjectClient {
    /// Create a new client for one bucket
    ///
    /// # Arguments
    /// * `bucket` - Bucket name
    /// * `region` - Signing region (or region identifier for S3-compatible providers)
    /// * `endpoint_url` - Optional custom endpoint (e.g., "http://localhost:9000" for MinIO)
    /// * `force_path_style` - Address the bucket in the path instead of the host name
    /// * `credentials` - Static access key pair
    pub async fn new(
        bucket: impl Into<String>,
        region: impl Into<String>,
        endpoint_url: Option<String>,
        force_path_style: bool,
        credentials: RemoteCredentials,
    ) -> StorageResult<Self> {
        if credentials.access_key_id.is_empty() || credentials.secret_access_key.is_empty() {
            return Err(StorageError::ConfigError(
                "Remote storage credentials are empty".to_string(),
            ));
        }

        let region = region.into();
        let credentials = Credentials::new(
            credentials.access_key_id,
            credentials.secret_access_key,
            credentials.session_token,
            None,
            CREDENTIALS_PROVIDER_NAME,
        );

        let shared = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(region.clone()))
            .credentials_provider(credentials)
            .load()
            .await;

        let mut builder = aws_sdk_s3::config::Builder::from(&shared);
        if let Some(ref endpoint) = endpoint_url {
            builder = builder
                .endpoint_url(endpoint.clone())
                .force_path_style(force_path_style);
        }

        let bucket = bucket.into();
        tracing::debug!(
            bucket = %bucket,
            region = %region,
            endpoint = ?endpoint_url,
            force_path_style,
            "Remote object client initialized"
        );

        Ok(AwsObjectClient {
            client: Client::from_conf(builder.build()),
            bucket,
        })
    }
}

fn is_not_found<E>(err: &SdkError<E, HttpResponse>) -> bool {
    err.raw_response()
        .map(|response| response.status().as_u16() == 404)
        .unwrap_or(false)
}

fn transport_error<E>(op: &'static str, key: &str, err: SdkError<E, HttpResponse>) -> StorageError
where
    E: std::error::Error + 'static,
{
    StorageError::Transport {
        op,
        key: key.to_string(),
        message: DisplayErrorContext(err).to_string(),
    }
}

/// Like [`transport_error`], but a 404 becomes [`StorageError::NotFound`].
fn object_error<E>(op: &'static str, key: &str, err: SdkError<E, HttpResponse>) -> StorageError
where
    E: std::error::Error + 'static,
{
    if is_not_found(&err) {
        return StorageError::NotFound(key.to_string());
    }
    transport_error(op, key, err)
}

fn sdk_acl(acl: CannedAcl) -> ObjectCannedAcl {
    ObjectCannedAcl::from(acl.as_str())
}

fn to_chrono(value: &SdkDateTime) -> Option<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp(value.secs(), value.subsec_nanos())
}

#[async_trait]
impl ObjectClient for AwsObjectClient {
    async fn create_multipart(
        &self,
        key: &str,
        acl: CannedAcl,
        expires_at: DateTime<Utc>,
    ) -> StorageResult<String> {
        let output = self
            .client
            .create_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .acl(sdk_acl(acl))
            .expires(SdkDateTime::from_secs(expires_at.timestamp()))
            .send()
            .await
            .map_err(|e| transport_error("create_multipart", key, e))?;

        output
            .upload_id()
            .map(str::to_string)
            .ok_or_else(|| StorageError::Transport {
                op: "create_multipart",
                key: key.to_string(),
                message: "response has no upload id".to_string(),
            })
    }

    async fn upload_part(
        &self,
        key: &str,
        upload_id: &str,
        part_number: i32,
        body: Bytes,
    ) -> StorageResult<String> {
        let output = self
            .client
            .upload_part()
            .bucket(&self.bucket)
            .key(key)
            .upload_id(upload_id)
            .part_number(part_number)
            .body(SdkByteStream::from(body))
            .send()
            .await
            .map_err(|e| transport_error("upload_part", key, e))?;

        output
            .e_tag()
            .map(str::to_string)
            .ok_or_else(|| StorageError::Transport {
                op: "upload_part",
                key: key.to_string(),
                message: format!("part {} response has no ETag", part_number),
            })
    }

    async fn complete_multipart(
        &self,
        key: &str,
        upload_id: &str,
        parts: &[CompletedPart],
    ) -> StorageResult<()> {
        let parts = parts
            .iter()
            .map(|part| {
                SdkCompletedPart::builder()
                    .part_number(part.part_number)
                    .e_tag(&part.etag)
                    .build()
            })
            .collect::<Vec<_>>();

        self.client
            .complete_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .upload_id(upload_id)
            .multipart_upload(
                CompletedMultipartUpload::builder()
                    .set_parts(Some(parts))
                    .build(),
            )
            .send()
            .await
            .map_err(|e| transport_error("complete_multipart", key, e))?;
        Ok(())
    }

    async fn abort_multipart(&self, key: &str, upload_id: &str) -> StorageResult<()> {
        self.client
            .abort_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .upload_id(upload_id)
            .send()
            .await
            .map_err(|e| transport_error("abort_multipart", key, e))?;
        Ok(())
    }

    async fn get_object(&self, key: &str) -> StorageResult<ByteStream> {
        let output = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| object_error("read", key, e))?;

        let key = key.to_string();
        let stream = tokio_util::io::ReaderStream::new(output.body.into_async_read()).map(
            move |chunk| {
                chunk.map_err(|e| StorageError::Transport {
                    op: "read",
                    key: key.clone(),
                    message: e.to_string(),
                })
            },
        );

        Ok(Box::pin(stream))
    }

    async fn head_object(&self, key: &str) -> StorageResult<Option<ObjectMeta>> {
        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(output) => Ok(Some(ObjectMeta {
                size: output.content_length().unwrap_or(0).max(0) as u64,
                last_modified: output.last_modified().and_then(to_chrono),
            })),
            Err(e) if is_not_found(&e) => Ok(None),
            Err(e) => Err(transport_error("head", key, e)),
        }
    }

    async fn delete_object(&self, key: &str) -> StorageResult<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| transport_error("delete", key, e))?;
        Ok(())
    }

    async fn delete_objects(&self, keys: &[String]) -> StorageResult<()> {
        let first_key = keys.first().cloned().unwrap_or_default();
        let build_error = |e: aws_sdk_s3::error::BuildError| StorageError::Transport {
            op: "delete",
            key: first_key.clone(),
            message: e.to_string(),
        };

        let objects = keys
            .iter()
            .map(|key| ObjectIdentifier::builder().key(key).build())
            .collect::<Result<Vec<_>, _>>()
            .map_err(build_error)?;
        let delete = Delete::builder()
            .set_objects(Some(objects))
            .quiet(true)
            .build()
            .map_err(build_error)?;

        let output = self
            .client
            .delete_objects()
            .bucket(&self.bucket)
            .delete(delete)
            .send()
            .await
            .map_err(|e| transport_error("delete", &first_key, e))?;

        if let Some(failed) = output.errors().first() {
            return Err(StorageError::Transport {
                op: "delete",
                key: failed.key().unwrap_or(&first_key).to_string(),
                message: format!(
                    "{} of {} objects not deleted: {}",
                    output.errors().len(),
                    keys.len(),
                    failed.message().unwrap_or("unknown error")
                ),
            });
        }
        Ok(())
    }

    async fn copy_object(&self, from_key: &str, to_key: &str) -> StorageResult<()> {
        let copy_source = format!("{}/{}", self.bucket, crate::path::encode_key(from_key));
        self.client
            .copy_object()
            .copy_source(copy_source)
            .bucket(&self.bucket)
            .key(to_key)
            .send()
            .await
            .map_err(|e| object_error("copy", from_key, e))?;
        Ok(())
    }

    async fn put_object_acl(&self, key: &str, acl: CannedAcl) -> StorageResult<()> {
        self.client
            .put_object_acl()
            .bucket(&self.bucket)
            .key(key)
            .acl(sdk_acl(acl))
            .send()
            .await
            .map_err(|e| object_error("set_visibility", key, e))?;
        Ok(())
    }

    async fn get_object_acl(&self, key: &str) -> StorageResult<Vec<Grant>> {
        let output = self
            .client
            .get_object_acl()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| object_error("get_visibility", key, e))?;

        Ok(output
            .grants()
            .iter()
            .filter_map(|grant| {
                let permission = grant.permission()?.as_str().to_string();
                Some(Grant {
                    grantee_uri: grant
                        .grantee()
                        .and_then(|grantee| grantee.uri())
                        .map(str::to_string),
                    permission,
                })
            })
            .collect())
    }

    async fn presign_get(
        &self,
        key: &str,
        expires_in: Duration,
        query: Option<(&str, &str)>,
    ) -> StorageResult<String> {
        let config = PresigningConfig::expires_in(expires_in).map_err(|e| StorageError::Transport {
            op: "temporary_url",
            key: key.to_string(),
            message: e.to_string(),
        })?;

        let request = self.client.get_object().bucket(&self.bucket).key(key);
        let presigned = match query {
            None => request.presigned(config).await,
            Some((name, value)) => {
                // Added before signing so the parameter is covered by the signature.
                let param = format!("{}={}", name, urlencoding::encode(value));
                request
                    .customize()
                    .mutate_request(move |req| {
                        let separator = if req.uri().contains('?') { '&' } else { '?' };
                        let uri = format!("{}{}{}", req.uri(), separator, param);
                        if let Err(e) = req.set_uri(uri) {
                            tracing::warn!(error = %e, "Failed to append query to presigned request");
                        }
                    })
                    .presigned(config)
                    .await
            }
        }
        .map_err(|e| transport_error("temporary_url", key, e))?;

        tracing::debug!(key = %key, expires_in_secs = expires_in.as_secs(), "Presigned URL generated");

        Ok(presigned.uri().to_string())
    }
}

/// Signing region of an OSS endpoint, e.g. `oss-cn-hangzhou` for
/// `https://oss-cn-hangzhou.aliyuncs.com`.
fn oss_region(endpoint: &str) -> StorageResult<String> {
    let host = endpoint
        .strip_prefix("https://")
        .or_else(|| endpoint.strip_prefix("http://"))
        .unwrap_or(endpoint);
    let label = host.split('.').next().unwrap_or_default();
    let region = label.trim_end_matches("-internal");

    if region.is_empty() || !host.contains('.') {
        return Err(StorageError::ConfigError(format!(
            "Cannot derive OSS region from endpoint: {}",
            endpoint
        )));
    }
    Ok(region.to_string())
}

fn with_scheme(endpoint: &str) -> String {
    if endpoint.starts_with("https://") || endpoint.starts_with("http://") {
        endpoint.to_string()
    } else {
        format!("https://{}", endpoint)
    }
}

impl RemoteStorage {
    /// Create S3-backed storage
    ///
    /// With a custom endpoint (MinIO, DigitalOcean Spaces, ...) buckets are
    /// addressed path-style, matching the public URLs this backend generates.
    pub async fn s3(
        bucket: impl Into<String>,
        region: impl Into<String>,
        endpoint_url: Option<String>,
        credentials: RemoteCredentials,
        upload: UploadConfig,
    ) -> StorageResult<Self> {
        let bucket = bucket.into();
        let region = region.into();
        let client = AwsObjectClient::new(
            bucket.clone(),
            region.clone(),
            endpoint_url.clone(),
            true,
            credentials,
        )
        .await?;

        RemoteStorage::new(
            Arc::new(client),
            bucket,
            RemoteFlavor::S3 {
                region,
                endpoint: endpoint_url,
            },
            upload,
        )
    }

    /// Create Alibaba OSS-backed storage through its S3-compatible API
    pub async fn oss(
        bucket: impl Into<String>,
        endpoint: impl Into<String>,
        credentials: RemoteCredentials,
        upload: UploadConfig,
    ) -> StorageResult<Self> {
        let bucket = bucket.into();
        let endpoint = endpoint.into();
        let region = oss_region(&endpoint)?;
        let client = AwsObjectClient::new(
            bucket.clone(),
            region,
            Some(with_scheme(&endpoint)),
            false,
            credentials,
        )
        .await?;

        RemoteStorage::new(Arc::new(client), bucket, RemoteFlavor::Oss { endpoint }, upload)
    }
}
