//! Open file and directory handles.
//!
//! A [`FileHandle`] is a private, per-call view of one store entry. File
//! handles implement [`Read`] and [`Seek`]; directory handles page through
//! their entries with [`FileHandle::read_dir`]. Dropping the handle releases
//! it.

use bytes::Bytes;
use std::io::{self, Read, Seek, SeekFrom};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::error::{VfsError, VfsResult};
use super::path;
use super::types::{DirEntry, FileAttr};

/// Counts live handles handed out by a store.
#[derive(Debug, Clone, Default)]
pub struct HandleTracker {
    open: Arc<AtomicUsize>,
}

impl HandleTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new live handle. The count drops when the guard does.
    pub fn acquire(&self) -> HandleGuard {
        self.open.fetch_add(1, Ordering::AcqRel);
        HandleGuard {
            open: Arc::clone(&self.open),
        }
    }

    /// Number of handles currently alive.
    pub fn open_handles(&self) -> usize {
        self.open.load(Ordering::Acquire)
    }
}

/// Keeps a [`HandleTracker`] count raised for as long as it lives.
#[derive(Debug)]
pub struct HandleGuard {
    open: Arc<AtomicUsize>,
}

impl Drop for HandleGuard {
    fn drop(&mut self) {
        self.open.fetch_sub(1, Ordering::AcqRel);
    }
}

#[derive(Debug)]
enum Body {
    File { data: Bytes, pos: u64 },
    Directory { entries: Arc<[DirEntry]>, cursor: usize },
}

/// An open file or directory.
#[derive(Debug)]
pub struct FileHandle {
    path: String,
    attr: FileAttr,
    body: Body,
    _guard: Option<HandleGuard>,
}

impl FileHandle {
    /// Open handle over file contents.
    pub fn file(path: impl Into<String>, attr: FileAttr, data: Bytes) -> Self {
        Self {
            path: path.into(),
            attr,
            body: Body::File { data, pos: 0 },
            _guard: None,
        }
    }

    /// Open handle over a directory listing.
    ///
    /// `entries` must already be in the store's listing order.
    pub fn directory(path: impl Into<String>, attr: FileAttr, entries: Arc<[DirEntry]>) -> Self {
        Self {
            path: path.into(),
            attr,
            body: Body::Directory { entries, cursor: 0 },
            _guard: None,
        }
    }

    /// Attach a tracker guard, released when this handle is dropped.
    pub fn tracked(mut self, guard: HandleGuard) -> Self {
        self._guard = Some(guard);
        self
    }

    /// Re-label the handle, used when a sub-view hands out a parent's handle.
    pub(crate) fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    /// Path this handle was opened at.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Base name of the opened entry.
    pub fn name(&self) -> &str {
        path::base_name(&self.path)
    }

    /// Attributes of the opened entry.
    pub fn stat(&self) -> FileAttr {
        self.attr.clone()
    }

    /// Returns true if this handle is over a directory.
    pub fn is_dir(&self) -> bool {
        matches!(self.body, Body::Directory { .. })
    }

    /// Read directory entries.
    ///
    /// With `limit > 0`, returns at most `limit` entries and fails with
    /// [`VfsError::Eof`] once the listing is exhausted. With `limit == 0`,
    /// returns everything that remains, which may be empty.
    pub fn read_dir(&mut self, limit: usize) -> VfsResult<Vec<DirEntry>> {
        let Body::Directory { entries, cursor } = &mut self.body else {
            return Err(VfsError::not_a_directory(self.path.clone()));
        };

        let remaining = &entries[*cursor..];
        if limit > 0 && remaining.is_empty() {
            return Err(VfsError::Eof);
        }

        let take = if limit == 0 {
            remaining.len()
        } else {
            limit.min(remaining.len())
        };
        let batch = remaining[..take].to_vec();
        *cursor += take;
        Ok(batch)
    }

    /// Read the rest of a file without copying.
    pub fn read_all(&mut self) -> VfsResult<Bytes> {
        match &mut self.body {
            Body::File { data, pos } => {
                let start = usize::try_from(*pos).unwrap_or(usize::MAX).min(data.len());
                *pos = data.len() as u64;
                Ok(data.slice(start..))
            }
            Body::Directory { .. } => Err(VfsError::is_a_directory(self.path.clone())),
        }
    }
}

impl Read for FileHandle {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match &mut self.body {
            Body::File { data, pos } => {
                let start = usize::try_from(*pos).unwrap_or(usize::MAX).min(data.len());
                let n = buf.len().min(data.len() - start);
                buf[..n].copy_from_slice(&data[start..start + n]);
                *pos += n as u64;
                Ok(n)
            }
            Body::Directory { .. } => Err(VfsError::is_a_directory(self.path.clone()).into()),
        }
    }
}

impl Seek for FileHandle {
    fn seek(&mut self, from: SeekFrom) -> io::Result<u64> {
        let Body::File { data, pos } = &mut self.body else {
            return Err(VfsError::is_a_directory(self.path.clone()).into());
        };

        let target = match from {
            SeekFrom::Start(n) => Some(n),
            SeekFrom::End(delta) => (data.len() as u64).checked_add_signed(delta),
            SeekFrom::Current(delta) => pos.checked_add_signed(delta),
        };
        let target = target.ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "seek before start of file")
        })?;
        *pos = target;
        Ok(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::SystemTime;

    fn text_handle(content: &'static str) -> FileHandle {
        FileHandle::file(
            "files/index.html",
            FileAttr::file(content.len() as u64, SystemTime::UNIX_EPOCH),
            Bytes::from_static(content.as_bytes()),
        )
    }

    fn dir_handle(names: &[&str]) -> FileHandle {
        let entries: Arc<[DirEntry]> = names.iter().map(|n| DirEntry::file(*n)).collect();
        FileHandle::directory("files", FileAttr::directory(SystemTime::UNIX_EPOCH), entries)
    }

    #[test]
    fn test_read_and_seek() {
        let mut h = text_handle("hello world");
        assert_eq!(h.name(), "index.html");

        let mut buf = [0u8; 5];
        h.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"hello");

        h.seek(SeekFrom::End(-5)).unwrap();
        let mut rest = String::new();
        h.read_to_string(&mut rest).unwrap();
        assert_eq!(rest, "world");

        assert!(h.seek(SeekFrom::Current(-100)).is_err());
    }

    #[test]
    fn test_read_all_from_position() {
        let mut h = text_handle("hello world");
        h.seek(SeekFrom::Start(6)).unwrap();
        assert_eq!(&h.read_all().unwrap()[..], b"world");
        assert!(h.read_all().unwrap().is_empty());
    }

    #[test]
    fn test_seek_past_end_reads_nothing() {
        let mut h = text_handle("hello");
        h.seek(SeekFrom::Start(u64::MAX)).unwrap();
        assert_eq!(h.read(&mut [0u8; 4]).unwrap(), 0);
        assert!(h.read_all().unwrap().is_empty());

        h.seek(SeekFrom::Start(1 << 40)).unwrap();
        assert_eq!(h.read(&mut [0u8; 4]).unwrap(), 0);
    }

    #[test]
    fn test_read_dir_paging() {
        let mut h = dir_handle(&["a", "b", "c"]);
        assert!(h.is_dir());

        let first = h.read_dir(2).unwrap();
        assert_eq!(first.len(), 2);
        assert_eq!(first[0].name, "a");

        let second = h.read_dir(2).unwrap();
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].name, "c");

        assert!(matches!(h.read_dir(2), Err(VfsError::Eof)));
        assert!(h.read_dir(0).unwrap().is_empty());
    }

    #[test]
    fn test_read_dir_all() {
        let mut h = dir_handle(&["a", "b"]);
        assert_eq!(h.read_dir(0).unwrap().len(), 2);
    }

    #[test]
    fn test_kind_mismatch() {
        let mut file = text_handle("x");
        assert!(matches!(file.read_dir(1), Err(VfsError::NotADirectory(_))));

        let mut dir = dir_handle(&["a"]);
        let err = dir.read(&mut [0u8; 4]).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::IsADirectory);
    }

    #[test]
    fn test_tracker_counts_live_handles() {
        let tracker = HandleTracker::new();
        let a = text_handle("a").tracked(tracker.acquire());
        let b = dir_handle(&[]).tracked(tracker.acquire());
        assert_eq!(tracker.open_handles(), 2);

        drop(a);
        assert_eq!(tracker.open_handles(), 1);
        drop(b);
        assert_eq!(tracker.open_handles(), 0);
    }
}
