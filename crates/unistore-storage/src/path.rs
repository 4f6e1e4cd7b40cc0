//! Object key normalization shared by every backend.
//!
//! Keys are cleaned lexically as if rooted at `/`, so `..` can never climb
//! above the configured root. Normalization never fails: any input maps to
//! some deterministic key.

use std::path::{Component, Path, PathBuf};

/// Canonicalize a client supplied object path into a storage key.
///
/// Backslashes become `/`, empty and `.` segments are dropped, and `..`
/// removes the previous segment (or nothing at the root). The result has no
/// leading or trailing slash.
pub fn normalize_key(object_path: &str) -> String {
    let unified = object_path.replace('\\', "/");
    let mut segments: Vec<&str> = Vec::new();

    for segment in unified.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }

    segments.join("/")
}

/// Resolve a normalized key below `root`.
///
/// Only normal path components are appended, so platform prefixes such as a
/// drive letter cannot replace the root.
pub(crate) fn resolve_under(root: &Path, key: &str) -> PathBuf {
    let mut path = root.to_path_buf();
    for segment in key.split('/') {
        for component in Path::new(segment).components() {
            if let Component::Normal(part) = component {
                path.push(part);
            }
        }
    }
    path
}

/// Percent-encode each segment of a normalized key for use in a URL path.
pub(crate) fn encode_key(key: &str) -> String {
    key.split('/')
        .map(urlencoding::encode)
        .collect::<Vec<_>>()
        .join("/")
}
