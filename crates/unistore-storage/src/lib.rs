//! Unistore Storage Library
//!
//! This crate provides one storage contract, the [`Storage`] trait, and its
//! implementations for the local filesystem, AWS S3 and Alibaba OSS.
//!
//! # Object keys
//!
//! Callers pass relative object paths. Every backend runs them through
//! [`normalize_key`] first: backslashes become slashes and `.`/`..` segments
//! are resolved lexically, so a key can never address anything outside the
//! backend's root or bucket.
//!
//! # Visibility
//!
//! Remote backends map [`Visibility`] to canned ACLs. The local backend keeps
//! every object in a private directory tree and exposes public objects through
//! links in a second, publicly served tree.
//!
//! # Uploads
//!
//! Remote `put` streams the source as a multipart upload with bounded memory,
//! per-part retries and an abort of the remote session on failure.

pub mod acl;
pub mod client;
pub mod factory;
pub mod link;
#[cfg(feature = "storage-local")]
pub mod local;
pub mod multipart;
pub mod path;
pub mod remote;
#[cfg(feature = "storage-s3")]
pub mod s3;
pub mod traits;

#[cfg(test)]
pub(crate) mod test_helpers;

// Re-export commonly used types
pub use acl::CannedAcl;
pub use client::ObjectClient;
pub use factory::create_storage;
pub use link::{default_link_strategy, HardLinkStrategy, LinkStrategy, SymlinkStrategy};
#[cfg(feature = "storage-local")]
pub use local::{LocalStorage, SignedUrlBuilder};
pub use multipart::{MultipartUploader, UploadSummary};
pub use path::normalize_key;
pub use remote::{RemoteCredentials, RemoteFlavor, RemoteStorage};
#[cfg(feature = "storage-s3")]
pub use s3::AwsObjectClient;
pub use traits::{ByteSource, ByteStream, Storage, StorageError, StorageResult};
pub use unistore_core::{
    StorageBackend, StorageConfig, StorageResize, UploadConfig, Visibility, MIN_PART_SIZE,
};
