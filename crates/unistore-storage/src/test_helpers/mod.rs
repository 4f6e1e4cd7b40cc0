//! Shared fixtures for unit tests

use crate::acl::{CannedAcl, Grant};
use crate::client::{CompletedPart, ObjectClient, ObjectMeta};
use crate::traits::{ByteSource, ByteStream, StorageError, StorageResult};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use std::collections::HashMap;
use std::io;
use std::pin::Pin;
use std::sync::Mutex;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::io::{AsyncRead, ReadBuf};

pub fn source(data: Vec<u8>) -> ByteSource {
    Box::pin(io::Cursor::new(data))
}

/// Deterministic non-constant payload
pub fn patterned(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

pub async fn collect(mut stream: ByteStream) -> Vec<u8> {
    let mut out = Vec::new();
    while let Some(chunk) = stream.next().await {
        out.extend_from_slice(&chunk.expect("stream chunk"));
    }
    out
}

/// Yields `remaining` zero bytes, then fails with `ConnectionReset`.
pub struct FailingReader {
    remaining: usize,
}

impl FailingReader {
    pub fn new(remaining: usize) -> Self {
        Self { remaining }
    }
}

impl AsyncRead for FailingReader {
    fn poll_read(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        if self.remaining == 0 {
            return Poll::Ready(Err(io::Error::new(
                io::ErrorKind::ConnectionReset,
                "source went away",
            )));
        }
        let n = self.remaining.min(buf.remaining());
        buf.put_slice(&vec![0u8; n]);
        self.remaining -= n;
        Poll::Ready(Ok(()))
    }
}

/// Serves its data at most `step` bytes per read.
pub struct TrickleReader {
    data: Vec<u8>,
    pos: usize,
    step: usize,
}

impl TrickleReader {
    pub fn new(data: Vec<u8>, step: usize) -> Self {
        Self { data, pos: 0, step }
    }
}

impl AsyncRead for TrickleReader {
    fn poll_read(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let end = (self.pos + self.step)
            .min(self.data.len())
            .min(self.pos + buf.remaining());
        let start = self.pos;
        buf.put_slice(&self.data[start..end]);
        self.pos = end;
        Poll::Ready(Ok(()))
    }
}

/// RPC recorded by [`MemoryObjectClient`]
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Create { key: String, acl: CannedAcl },
    UploadPart { key: String, part_number: i32, size: usize },
    Complete { key: String, part_numbers: Vec<i32> },
    Abort { key: String },
    Get { key: String },
    Head { key: String },
    Delete { key: String },
    DeleteMany { keys: Vec<String> },
    Copy { from: String, to: String },
    PutAcl { key: String, acl: CannedAcl },
    GetAcl { key: String },
    Presign { key: String, expires_in: Duration, query: Option<(String, String)> },
}

#[derive(Debug, Clone)]
struct StoredObject {
    data: Vec<u8>,
    acl: CannedAcl,
    grants: Option<Vec<Grant>>,
    last_modified: DateTime<Utc>,
}

#[derive(Debug)]
struct Session {
    key: String,
    acl: CannedAcl,
    parts: HashMap<i32, Bytes>,
}

#[derive(Default)]
struct State {
    objects: HashMap<String, StoredObject>,
    sessions: HashMap<String, Session>,
    calls: Vec<Call>,
    next_upload_id: u64,
    last_expiry: Option<DateTime<Utc>>,
    part_failures: u32,
    fail_aborts: bool,
    fail_completion: bool,
}

/// In-memory object store with fault injection
#[derive(Default)]
pub struct MemoryObjectClient {
    state: Mutex<State>,
}

fn transport(op: &'static str, key: &str) -> StorageError {
    StorageError::Transport {
        op,
        key: key.to_string(),
        message: "injected failure".to_string(),
    }
}

fn canned_grants(acl: CannedAcl) -> Vec<Grant> {
    let mut grants = vec![Grant::owner("FULL_CONTROL")];
    match acl {
        CannedAcl::Private => {}
        CannedAcl::PublicRead => grants.push(Grant::all_users("READ")),
        CannedAcl::PublicReadWrite => {
            grants.push(Grant::all_users("READ"));
            grants.push(Grant::all_users("WRITE"));
        }
    }
    grants
}

impl MemoryObjectClient {
    fn state(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    /// Fail the next `n` part uploads
    pub fn fail_next_parts(&self, n: u32) {
        self.state().part_failures = n;
    }

    pub fn fail_aborts(&self) {
        self.state().fail_aborts = true;
    }

    pub fn fail_completion(&self) {
        self.state().fail_completion = true;
    }

    pub fn insert(&self, key: &str, data: &[u8], acl: CannedAcl) {
        self.state().objects.insert(
            key.to_string(),
            StoredObject {
                data: data.to_vec(),
                acl,
                grants: None,
                last_modified: Utc::now(),
            },
        );
    }

    /// Override the grants returned for `key`
    pub fn set_grants(&self, key: &str, grants: Vec<Grant>) {
        if let Some(object) = self.state().objects.get_mut(key) {
            object.grants = Some(grants);
        }
    }

    pub fn object(&self, key: &str) -> Option<Vec<u8>> {
        self.state().objects.get(key).map(|o| o.data.clone())
    }

    pub fn object_acl(&self, key: &str) -> Option<CannedAcl> {
        self.state().objects.get(key).map(|o| o.acl)
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state().calls.clone()
    }

    pub fn count_calls(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.state().calls.iter().filter(|c| pred(c)).count()
    }

    /// `(part_number, size)` of every part upload attempt, in order
    pub fn part_uploads(&self) -> Vec<(i32, usize)> {
        self.state()
            .calls
            .iter()
            .filter_map(|c| match c {
                Call::UploadPart { part_number, size, .. } => Some((*part_number, *size)),
                _ => None,
            })
            .collect()
    }

    pub fn completed_part_numbers(&self) -> Vec<Vec<i32>> {
        self.state()
            .calls
            .iter()
            .filter_map(|c| match c {
                Call::Complete { part_numbers, .. } => Some(part_numbers.clone()),
                _ => None,
            })
            .collect()
    }

    /// Keys of sessions neither completed nor aborted
    pub fn open_sessions(&self) -> Vec<String> {
        self.state().sessions.values().map(|s| s.key.clone()).collect()
    }

    pub fn last_session_expiry(&self) -> Option<DateTime<Utc>> {
        self.state().last_expiry
    }
}

#[async_trait]
impl ObjectClient for MemoryObjectClient {
    async fn create_multipart(
        &self,
        key: &str,
        acl: CannedAcl,
        expires_at: DateTime<Utc>,
    ) -> StorageResult<String> {
        let mut state = self.state();
        state.calls.push(Call::Create { key: key.to_string(), acl });
        state.next_upload_id += 1;
        let upload_id = format!("upload-{}", state.next_upload_id);
        state.last_expiry = Some(expires_at);
        state.sessions.insert(
            upload_id.clone(),
            Session {
                key: key.to_string(),
                acl,
                parts: HashMap::new(),
            },
        );
        Ok(upload_id)
    }

    async fn upload_part(
        &self,
        key: &str,
        upload_id: &str,
        part_number: i32,
        body: Bytes,
    ) -> StorageResult<String> {
        let mut state = self.state();
        state.calls.push(Call::UploadPart {
            key: key.to_string(),
            part_number,
            size: body.len(),
        });
        if state.part_failures > 0 {
            state.part_failures -= 1;
            return Err(transport("upload_part", key));
        }
        let session = state
            .sessions
            .get_mut(upload_id)
            .ok_or_else(|| StorageError::NotFound(upload_id.to_string()))?;
        session.parts.insert(part_number, body);
        Ok(format!("\"etag-{}\"", part_number))
    }

    async fn complete_multipart(
        &self,
        key: &str,
        upload_id: &str,
        parts: &[CompletedPart],
    ) -> StorageResult<()> {
        let mut state = self.state();
        state.calls.push(Call::Complete {
            key: key.to_string(),
            part_numbers: parts.iter().map(|p| p.part_number).collect(),
        });
        if state.fail_completion {
            return Err(transport("complete_multipart", key));
        }
        let session = state
            .sessions
            .remove(upload_id)
            .ok_or_else(|| StorageError::NotFound(upload_id.to_string()))?;

        let mut data = Vec::new();
        for part in parts {
            let body = session
                .parts
                .get(&part.part_number)
                .ok_or_else(|| StorageError::NotFound(format!("part {}", part.part_number)))?;
            data.extend_from_slice(body);
        }
        state.objects.insert(
            session.key,
            StoredObject {
                data,
                acl: session.acl,
                grants: None,
                last_modified: Utc::now(),
            },
        );
        Ok(())
    }

    async fn abort_multipart(&self, key: &str, upload_id: &str) -> StorageResult<()> {
        let mut state = self.state();
        state.calls.push(Call::Abort { key: key.to_string() });
        if state.fail_aborts {
            return Err(transport("abort_multipart", key));
        }
        state.sessions.remove(upload_id);
        Ok(())
    }

    async fn get_object(&self, key: &str) -> StorageResult<ByteStream> {
        let mut state = self.state();
        state.calls.push(Call::Get { key: key.to_string() });
        let data = state
            .objects
            .get(key)
            .map(|o| o.data.clone())
            .ok_or_else(|| StorageError::NotFound(key.to_string()))?;
        let chunks: Vec<StorageResult<Bytes>> = data
            .chunks(4)
            .map(|c| Ok(Bytes::copy_from_slice(c)))
            .collect();
        Ok(Box::pin(futures::stream::iter(chunks)))
    }

    async fn head_object(&self, key: &str) -> StorageResult<Option<ObjectMeta>> {
        let mut state = self.state();
        state.calls.push(Call::Head { key: key.to_string() });
        Ok(state.objects.get(key).map(|o| ObjectMeta {
            size: o.data.len() as u64,
            last_modified: Some(o.last_modified),
        }))
    }

    async fn delete_object(&self, key: &str) -> StorageResult<()> {
        let mut state = self.state();
        state.calls.push(Call::Delete { key: key.to_string() });
        state.objects.remove(key);
        Ok(())
    }

    async fn delete_objects(&self, keys: &[String]) -> StorageResult<()> {
        let mut state = self.state();
        state.calls.push(Call::DeleteMany { keys: keys.to_vec() });
        for key in keys {
            state.objects.remove(key);
        }
        Ok(())
    }

    async fn copy_object(&self, from_key: &str, to_key: &str) -> StorageResult<()> {
        let mut state = self.state();
        state.calls.push(Call::Copy {
            from: from_key.to_string(),
            to: to_key.to_string(),
        });
        let mut object = state
            .objects
            .get(from_key)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(from_key.to_string()))?;
        object.acl = CannedAcl::Private;
        object.grants = None;
        object.last_modified = Utc::now();
        state.objects.insert(to_key.to_string(), object);
        Ok(())
    }

    async fn put_object_acl(&self, key: &str, acl: CannedAcl) -> StorageResult<()> {
        let mut state = self.state();
        state.calls.push(Call::PutAcl { key: key.to_string(), acl });
        let object = state
            .objects
            .get_mut(key)
            .ok_or_else(|| StorageError::NotFound(key.to_string()))?;
        object.acl = acl;
        object.grants = None;
        Ok(())
    }

    async fn get_object_acl(&self, key: &str) -> StorageResult<Vec<Grant>> {
        let mut state = self.state();
        state.calls.push(Call::GetAcl { key: key.to_string() });
        let object = state
            .objects
            .get(key)
            .ok_or_else(|| StorageError::NotFound(key.to_string()))?;
        Ok(object
            .grants
            .clone()
            .unwrap_or_else(|| canned_grants(object.acl)))
    }

    async fn presign_get(
        &self,
        key: &str,
        expires_in: Duration,
        query: Option<(&str, &str)>,
    ) -> StorageResult<String> {
        let mut state = self.state();
        state.calls.push(Call::Presign {
            key: key.to_string(),
            expires_in,
            query: query.map(|(k, v)| (k.to_string(), v.to_string())),
        });
        let mut url = format!("https://signed.test/{}?expires={}", key, expires_in.as_secs());
        if let Some((name, value)) = query {
            url.push_str(&format!("&{}={}", name, value));
        }
        Ok(url)
    }
}
