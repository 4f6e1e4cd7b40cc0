//! Strategies used to project a private object into the public tree.

use async_trait::async_trait;
use std::io;
use std::path::Path;
use std::sync::Arc;

/// Creates the public-tree entry pointing at a private-tree file.
#[async_trait]
pub trait LinkStrategy: Send + Sync {
    /// Create `link` so that it resolves to `target`.
    ///
    /// `target` is always an absolute path to an existing private-tree file,
    /// and nothing exists at `link` when this is called.
    async fn link(&self, target: &Path, link: &Path) -> io::Result<()>;

    fn name(&self) -> &'static str;
}

/// Symbolic link to the absolute private path
#[derive(Debug, Clone, Copy, Default)]
pub struct SymlinkStrategy;

#[async_trait]
impl LinkStrategy for SymlinkStrategy {
    async fn link(&self, target: &Path, link: &Path) -> io::Result<()> {
        create_symlink(target, link).await
    }

    fn name(&self) -> &'static str {
        "symlink"
    }
}

#[cfg(unix)]
async fn create_symlink(target: &Path, link: &Path) -> io::Result<()> {
    tokio::fs::symlink(target, link).await
}

#[cfg(windows)]
async fn create_symlink(target: &Path, link: &Path) -> io::Result<()> {
    tokio::fs::symlink_file(target, link).await
}

#[cfg(not(any(unix, windows)))]
async fn create_symlink(_target: &Path, _link: &Path) -> io::Result<()> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "symbolic links are not supported on this platform",
    ))
}

/// Hard link sharing the private file's inode
///
/// Used where creating symbolic links requires elevated privileges.
#[derive(Debug, Clone, Copy, Default)]
pub struct HardLinkStrategy;

#[async_trait]
impl LinkStrategy for HardLinkStrategy {
    async fn link(&self, target: &Path, link: &Path) -> io::Result<()> {
        tokio::fs::hard_link(target, link).await
    }

    fn name(&self) -> &'static str {
        "hard_link"
    }
}

/// Link strategy for the current platform: symlinks on unix, hard links elsewhere.
pub fn default_link_strategy() -> Arc<dyn LinkStrategy> {
    if cfg!(unix) {
        Arc::new(SymlinkStrategy)
    } else {
        Arc::new(HardLinkStrategy)
    }
}
