//! Read-only VFS operations trait.
//!
//! The embedded store contract: open by path, stat by path. Everything else
//! is derived from an open handle.

use async_trait::async_trait;
use bytes::Bytes;

use super::VfsResult;
use super::handle::FileHandle;
use super::types::{DirEntry, FileAttr};

/// Core read-only filesystem operations.
///
/// Paths are store paths (see [`crate::vfs::path`]): unrooted, with `"."`
/// naming the root. Implementations reject anything else with
/// [`VfsError::InvalidPath`](super::VfsError::InvalidPath) rather than
/// guessing; trimming loose input is the caller's job.
#[async_trait]
pub trait ReadOnlyFs: Send + Sync {
    /// Open a file or directory.
    async fn open(&self, path: &str) -> VfsResult<FileHandle>;

    // ========================================================================
    // Convenience methods (default implementations)
    // ========================================================================

    /// Get file attributes.
    ///
    /// The default opens the path and drops the handle once the attributes
    /// are read.
    async fn stat(&self, path: &str) -> VfsResult<FileAttr> {
        let handle = self.open(path).await?;
        Ok(handle.stat())
    }

    /// List every entry of a directory.
    async fn read_dir(&self, path: &str) -> VfsResult<Vec<DirEntry>> {
        let mut handle = self.open(path).await?;
        handle.read_dir(0)
    }

    /// Read entire file contents.
    async fn read_all(&self, path: &str) -> VfsResult<Bytes> {
        let mut handle = self.open(path).await?;
        handle.read_all()
    }

    /// Check if a path exists.
    async fn exists(&self, path: &str) -> bool {
        self.stat(path).await.is_ok()
    }

    /// Returns true if this filesystem is read-only.
    fn read_only(&self) -> bool {
        true
    }
}
