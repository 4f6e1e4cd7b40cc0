//! Test helpers for local storage integration tests.
//!
//! Run from workspace root: `cargo test -p unistore-storage --test local_storage_test`.

use futures::StreamExt;
use std::path::PathBuf;
use tempfile::TempDir;
use unistore_storage::{ByteSource, ByteStream, LocalStorage, SignedUrlBuilder};

pub const BASE_URL: &str = "http://localhost:8000/files";

/// Private and public trees under one temporary directory.
pub struct TestStorage {
    pub temp_dir: TempDir,
    pub private_path: PathBuf,
    pub public_path: PathBuf,
}

impl TestStorage {
    pub fn new() -> Self {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
        let private_path = temp_dir.path().join("private");
        let public_path = temp_dir.path().join("public");
        Self {
            temp_dir,
            private_path,
            public_path,
        }
    }

    pub async fn open(&self) -> LocalStorage {
        self.open_with(None).await
    }

    pub async fn open_with(&self, builder: Option<SignedUrlBuilder>) -> LocalStorage {
        LocalStorage::new(&self.private_path, &self.public_path, BASE_URL, builder)
            .await
            .expect("Failed to create local storage")
    }
}

impl Default for TestStorage {
    fn default() -> Self {
        Self::new()
    }
}

pub fn text(content: &str) -> ByteSource {
    Box::pin(std::io::Cursor::new(content.as_bytes().to_vec()))
}

pub async fn read_all(mut stream: ByteStream) -> Vec<u8> {
    let mut out = Vec::new();
    while let Some(chunk) = stream.next().await {
        out.extend_from_slice(&chunk.expect("Failed to read chunk"));
    }
    out
}
