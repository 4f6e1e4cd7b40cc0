//! Local dual-tree storage integration tests.
//!
//! Run with: `cargo test -p unistore-storage --test local_storage_test`

#![cfg(feature = "storage-local")]

mod helpers;

use chrono::Utc;
use helpers::{read_all, text, TestStorage};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use unistore_storage::{Storage, StorageError, Visibility};

const CONTENT: &str = "Hello, this is file content 😊 😅";

#[tokio::test]
async fn test_create_read_delete_file() {
    let test = TestStorage::new();
    let storage = test.open().await;
    let key = "user-files/sample.txt";

    assert!(!storage.exist(key).await.unwrap());

    storage
        .put(key, text(CONTENT), Visibility::PublicRead)
        .await
        .unwrap();
    assert!(storage.exist(key).await.unwrap());

    let content = read_all(storage.read(key).await.unwrap()).await;
    assert_eq!(content, CONTENT.as_bytes());

    storage.delete(&[key]).await.unwrap();
    assert!(!storage.exist(key).await.unwrap());
    assert!(test.public_path.join(key).symlink_metadata().is_err());
}

#[tokio::test]
async fn test_delete_many() {
    let test = TestStorage::new();
    let storage = test.open().await;

    for key in ["a.txt", "b/b.txt", "c.txt"] {
        storage.put(key, text(key), Visibility::Private).await.unwrap();
    }

    storage
        .delete(&["a.txt", "b/b.txt", "missing.txt"])
        .await
        .unwrap();

    assert!(!storage.exist("a.txt").await.unwrap());
    assert!(!storage.exist("b/b.txt").await.unwrap());
    assert!(storage.exist("c.txt").await.unwrap());
}

#[tokio::test]
async fn test_copy_file() {
    let test = TestStorage::new();
    let storage = test.open().await;

    storage
        .put("test-file-original.txt", text(CONTENT), Visibility::PublicRead)
        .await
        .unwrap();
    storage
        .copy("test-file-original.txt", "test-file-copied.txt")
        .await
        .unwrap();

    assert!(storage.exist("test-file-copied.txt").await.unwrap());
    let content = read_all(storage.read("test-file-copied.txt").await.unwrap()).await;
    assert_eq!(content, CONTENT.as_bytes());

    // The copy starts private and does not follow later writes to the source.
    assert_eq!(
        storage.get_visibility("test-file-copied.txt").await.unwrap(),
        Visibility::Private
    );
    storage
        .put("test-file-original.txt", text("changed"), Visibility::PublicRead)
        .await
        .unwrap();
    let content = read_all(storage.read("test-file-copied.txt").await.unwrap()).await;
    assert_eq!(content, CONTENT.as_bytes());
}

#[tokio::test]
async fn test_copy_missing_source() {
    let test = TestStorage::new();
    let storage = test.open().await;

    let result = storage.copy("nope.txt", "dst.txt").await;
    assert!(matches!(result, Err(StorageError::NotFound(_))));
    assert!(!storage.exist("dst.txt").await.unwrap());
}

#[tokio::test]
async fn test_visibility_transitions() {
    let test = TestStorage::new();
    let storage = test.open().await;
    let public_entry = test.public_path.join("x.txt");

    storage.put("x.txt", text(CONTENT), Visibility::Private).await.unwrap();
    assert_eq!(storage.get_visibility("x.txt").await.unwrap(), Visibility::Private);
    assert!(public_entry.symlink_metadata().is_err());

    storage
        .set_visibility("x.txt", Visibility::PublicRead)
        .await
        .unwrap();
    assert_eq!(storage.get_visibility("x.txt").await.unwrap(), Visibility::PublicRead);
    assert!(public_entry.symlink_metadata().is_ok());

    // Setting the same visibility twice is a no-op.
    storage
        .set_visibility("x.txt", Visibility::PublicRead)
        .await
        .unwrap();

    storage
        .set_visibility("x.txt", Visibility::Private)
        .await
        .unwrap();
    assert_eq!(storage.get_visibility("x.txt").await.unwrap(), Visibility::Private);
    assert!(public_entry.symlink_metadata().is_err());
    assert!(storage.exist("x.txt").await.unwrap());
}

#[tokio::test]
async fn test_public_read_write_reads_back_as_public_read() {
    let test = TestStorage::new();
    let storage = test.open().await;

    storage
        .put("rw.txt", text(CONTENT), Visibility::PublicReadWrite)
        .await
        .unwrap();

    assert_eq!(
        storage.get_visibility("rw.txt").await.unwrap(),
        Visibility::PublicRead
    );
}

#[tokio::test]
async fn test_get_visibility_missing_object() {
    let test = TestStorage::new();
    let storage = test.open().await;

    let result = storage.get_visibility("missing.txt").await;
    assert!(matches!(result, Err(StorageError::NotFound(_))));
}

#[tokio::test]
async fn test_url_requires_public_entry() {
    let test = TestStorage::new();
    let storage = test.open().await;

    storage.put("x.txt", text(CONTENT), Visibility::Private).await.unwrap();
    assert!(matches!(
        storage.url("x.txt", None).await,
        Err(StorageError::NotFound(_))
    ));

    storage
        .set_visibility("x.txt", Visibility::PublicRead)
        .await
        .unwrap();
    assert_eq!(
        storage.url("x.txt", None).await.unwrap(),
        "http://localhost:8000/files/x.txt"
    );
    assert!(matches!(
        storage.url("", None).await,
        Err(StorageError::InvalidKey(_))
    ));
}

#[tokio::test]
async fn test_temporary_url_without_builder() {
    let test = TestStorage::new();
    let storage = test.open().await;

    storage.put("x.txt", text(CONTENT), Visibility::Private).await.unwrap();
    let result = storage
        .temporary_url("x.txt", Duration::from_secs(60), None)
        .await;
    assert!(matches!(result, Err(StorageError::Unsupported(_))));

    let result = storage
        .temporary_url("missing.txt", Duration::from_secs(60), None)
        .await;
    assert!(matches!(result, Err(StorageError::NotFound(_))));
}

#[tokio::test]
async fn test_temporary_url_with_builder() {
    let test = TestStorage::new();
    let builder: unistore_storage::SignedUrlBuilder =
        Arc::new(|path: &Path, key: &str, expire_in: Duration| {
            assert!(path.is_absolute());
            assert!(path.ends_with(key));
            Ok(format!(
                "http://localhost:8000/signed/{}?expires={}",
                key,
                expire_in.as_secs()
            ))
        });
    let storage = test.open_with(Some(builder)).await;

    storage
        .put("docs/report.pdf", text(CONTENT), Visibility::Private)
        .await
        .unwrap();

    assert_eq!(
        storage
            .temporary_url("docs/report.pdf", Duration::from_secs(300), None)
            .await
            .unwrap(),
        "http://localhost:8000/signed/docs/report.pdf?expires=300"
    );
}

#[tokio::test]
async fn test_size_and_last_modified() {
    let test = TestStorage::new();
    let storage = test.open().await;
    let before = Utc::now() - chrono::Duration::seconds(5);

    storage.put("s.txt", text(CONTENT), Visibility::Private).await.unwrap();

    assert_eq!(storage.size("s.txt").await.unwrap(), CONTENT.len() as u64);
    let modified = storage.last_modified("s.txt").await.unwrap();
    assert!(modified >= before);
    assert!(modified <= Utc::now() + chrono::Duration::seconds(5));

    assert!(matches!(
        storage.size("missing.txt").await,
        Err(StorageError::NotFound(_))
    ));
    assert!(matches!(
        storage.last_modified("missing.txt").await,
        Err(StorageError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_dangling_public_link_is_replaced() {
    let test = TestStorage::new();
    let storage = test.open().await;

    storage.put("d.txt", text("one"), Visibility::PublicRead).await.unwrap();
    // Remove the private content behind the storage's back.
    std::fs::remove_file(test.private_path.join("d.txt")).unwrap();

    storage.put("d.txt", text("two"), Visibility::PublicRead).await.unwrap();

    assert_eq!(
        std::fs::read(test.public_path.join("d.txt")).unwrap(),
        b"two"
    );
}

#[tokio::test]
async fn test_roots_must_differ() {
    let test = TestStorage::new();
    let result = unistore_storage::LocalStorage::new(
        &test.private_path,
        &test.private_path,
        helpers::BASE_URL,
        None,
    )
    .await;
    assert!(matches!(result, Err(StorageError::ConfigError(_))));
}
