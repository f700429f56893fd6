//! Core VFS types.
//!
//! Entries are path-addressed and immutable once embedded, so these are
//! plain values that can be cloned out of the store freely.

use serde::{Deserialize, Serialize};
use std::time::SystemTime;

/// Default permissions for embedded files (`r--r--r--`).
pub const FILE_PERM: u32 = 0o444;

/// Default permissions for embedded directories (`r-xr-xr-x`).
pub const DIR_PERM: u32 = 0o555;

/// File type enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileType {
    /// Regular file.
    File,
    /// Directory.
    Directory,
}

impl FileType {
    /// Returns true if this is a regular file.
    pub fn is_file(&self) -> bool {
        matches!(self, FileType::File)
    }

    /// Returns true if this is a directory.
    pub fn is_dir(&self) -> bool {
        matches!(self, FileType::Directory)
    }
}

/// File attributes (metadata).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileAttr {
    /// Size in bytes (0 for directories).
    pub size: u64,
    /// File type.
    pub kind: FileType,
    /// Unix permissions (e.g., 0o444).
    pub perm: u32,
    /// Last modification time.
    pub mtime: SystemTime,
}

impl FileAttr {
    /// Attributes for an embedded file.
    pub fn file(size: u64, mtime: SystemTime) -> Self {
        Self {
            size,
            kind: FileType::File,
            perm: FILE_PERM,
            mtime,
        }
    }

    /// Attributes for an embedded directory.
    pub fn directory(mtime: SystemTime) -> Self {
        Self {
            size: 0,
            kind: FileType::Directory,
            perm: DIR_PERM,
            mtime,
        }
    }

    /// Returns true if this is a regular file.
    pub fn is_file(&self) -> bool {
        self.kind.is_file()
    }

    /// Returns true if this is a directory.
    pub fn is_dir(&self) -> bool {
        self.kind.is_dir()
    }

    /// Permission bits with the type bit set, `ls -l` style.
    pub fn mode_string(&self) -> String {
        let mut s = String::with_capacity(10);
        s.push(if self.is_dir() { 'd' } else { '-' });
        for shift in [6, 3, 0] {
            let bits = (self.perm >> shift) & 0o7;
            s.push(if bits & 0o4 != 0 { 'r' } else { '-' });
            s.push(if bits & 0o2 != 0 { 'w' } else { '-' });
            s.push(if bits & 0o1 != 0 { 'x' } else { '-' });
        }
        s
    }
}

/// Directory entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirEntry {
    /// Entry name (not full path).
    pub name: String,
    /// Entry type.
    pub kind: FileType,
}

impl DirEntry {
    /// Create a new directory entry.
    pub fn new(name: impl Into<String>, kind: FileType) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }

    /// Create a file entry.
    pub fn file(name: impl Into<String>) -> Self {
        Self::new(name, FileType::File)
    }

    /// Create a directory entry.
    pub fn directory(name: impl Into<String>) -> Self {
        Self::new(name, FileType::Directory)
    }

    /// Returns true if this entry is a directory.
    pub fn is_dir(&self) -> bool {
        self.kind.is_dir()
    }
}
