//! Unistore Core Library
//!
//! Shared value types, configuration and tracing setup used by every storage
//! backend in the `unistore-storage` crate.

pub mod config;
pub mod storage_types;
pub mod telemetry;
pub mod visibility;

// Re-export commonly used types
pub use config::{StorageConfig, UploadConfig, MIN_PART_SIZE};
pub use storage_types::StorageBackend;
pub use visibility::{ParseVisibilityError, StorageResize, Visibility};
