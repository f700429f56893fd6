//! Sub-tree views.
//!
//! A [`SubFs`] answers every query against `dir/<path>` in the store it
//! wraps, and reports paths relative to `dir` in handles and errors.

use async_trait::async_trait;
use std::sync::Arc;

use crate::vfs::error::{VfsError, VfsResult};
use crate::vfs::handle::FileHandle;
use crate::vfs::ops::ReadOnlyFs;
use crate::vfs::path;
use crate::vfs::types::FileAttr;

/// View of a store rooted at one of its directories.
#[derive(Clone)]
pub struct SubFs {
    fs: Arc<dyn ReadOnlyFs>,
    dir: String,
}

impl std::fmt::Debug for SubFs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubFs").field("dir", &self.dir).finish()
    }
}

/// Derive a view of `fs` rooted at `dir`.
///
/// Only the name is checked here. A `dir` that does not exist yields a view
/// on which every lookup fails with NotFound.
pub fn sub(fs: Arc<dyn ReadOnlyFs>, dir: &str) -> VfsResult<SubFs> {
    if !path::is_valid_path(dir) {
        return Err(VfsError::invalid_path(dir));
    }
    Ok(SubFs {
        fs,
        dir: dir.to_string(),
    })
}

impl SubFs {
    /// Directory in the wrapped store this view is rooted at.
    pub fn dir(&self) -> &str {
        &self.dir
    }

    fn full_path(&self, name: &str) -> VfsResult<String> {
        if !path::is_valid_path(name) {
            return Err(VfsError::invalid_path(name));
        }
        Ok(path::join(&self.dir, name))
    }

    /// Rewrite paths in errors from the wrapped store to view-relative ones.
    fn fix_err(&self, name: &str, full: &str, err: VfsError) -> VfsError {
        let rewrite = |p: String| if p == full { name.to_string() } else { p };
        match err {
            VfsError::NotFound(p) => VfsError::NotFound(rewrite(p)),
            VfsError::InvalidPath(p) => VfsError::InvalidPath(rewrite(p)),
            VfsError::NotADirectory(p) => VfsError::NotADirectory(rewrite(p)),
            VfsError::IsADirectory(p) => VfsError::IsADirectory(rewrite(p)),
            other => other,
        }
    }
}

#[async_trait]
impl ReadOnlyFs for SubFs {
    async fn open(&self, name: &str) -> VfsResult<FileHandle> {
        let full = self.full_path(name)?;
        match self.fs.open(&full).await {
            Ok(handle) => Ok(handle.with_path(name)),
            Err(e) => Err(self.fix_err(name, &full, e)),
        }
    }

    async fn stat(&self, name: &str) -> VfsResult<FileAttr> {
        let full = self.full_path(name)?;
        self.fs
            .stat(&full)
            .await
            .map_err(|e| self.fix_err(name, &full, e))
    }
}
