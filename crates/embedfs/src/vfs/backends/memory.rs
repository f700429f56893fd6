//! In-memory byte store.
//!
//! Built once, then immutable for its whole lifetime: no lock on the read
//! path, every handle shares the same `Bytes` and listing slices.

use async_trait::async_trait;
use bytes::Bytes;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use crate::vfs::error::{VfsError, VfsResult};
use crate::vfs::handle::{FileHandle, HandleTracker};
use crate::vfs::ops::ReadOnlyFs;
use crate::vfs::path::{self, ROOT};
use crate::vfs::types::{DirEntry, FileAttr};

/// Entry in the store.
#[derive(Debug, Clone)]
enum Entry {
    File {
        data: Bytes,
        attr: FileAttr,
    },
    Directory {
        attr: FileAttr,
        children: Arc<[DirEntry]>,
    },
}

impl Entry {
    fn attr(&self) -> &FileAttr {
        match self {
            Entry::File { attr, .. } => attr,
            Entry::Directory { attr, .. } => attr,
        }
    }
}

/// Immutable in-memory filesystem.
///
/// Directory listings are sorted by name. The root `"."` always exists, even
/// in an empty store.
#[derive(Debug)]
pub struct MemoryStore {
    entries: HashMap<String, Entry>,
    handles: HandleTracker,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::empty()
    }
}

impl MemoryStore {
    /// Start building a store.
    pub fn builder() -> MemoryStoreBuilder {
        MemoryStoreBuilder::new()
    }

    /// A store containing only the root directory.
    pub fn empty() -> Self {
        let mut entries = HashMap::new();
        entries.insert(
            ROOT.to_string(),
            Entry::Directory {
                attr: FileAttr::directory(SystemTime::now()),
                children: Arc::from(Vec::new()),
            },
        );
        Self {
            entries,
            handles: HandleTracker::new(),
        }
    }

    /// Snapshot a disk directory, nested under a top-level entry named after
    /// the directory itself.
    ///
    /// Embedding `site/files` yields a store whose root holds exactly one
    /// directory, `files`.
    pub async fn embed_dir(dir: impl AsRef<Path>) -> VfsResult<Self> {
        let dir = dir.as_ref();
        let canonical = tokio::fs::canonicalize(dir).await?;
        let name = canonical
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| VfsError::invalid_path(dir.display().to_string()))?
            .to_string();
        load(&canonical, Some(name)).await
    }

    /// Snapshot the contents of a disk directory directly at the store root.
    pub async fn load_dir(dir: impl AsRef<Path>) -> VfsResult<Self> {
        load(dir.as_ref(), None).await
    }

    /// Number of entries, directories included, the root excluded.
    pub fn len(&self) -> usize {
        self.entries.len() - 1
    }

    /// Returns true if the store holds nothing but its root.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of handles opened on this store that are still alive.
    pub fn open_handles(&self) -> usize {
        self.handles.open_handles()
    }

    fn lookup(&self, path: &str) -> VfsResult<&Entry> {
        if !path::is_valid_path(path) {
            return Err(VfsError::invalid_path(path));
        }
        self.entries
            .get(path)
            .ok_or_else(|| VfsError::not_found(path))
    }
}

#[async_trait]
impl ReadOnlyFs for MemoryStore {
    async fn open(&self, path: &str) -> VfsResult<FileHandle> {
        let entry = self.lookup(path)?;
        tracing::trace!(path, "open");

        let handle = match entry {
            Entry::File { data, attr } => FileHandle::file(path, attr.clone(), data.clone()),
            Entry::Directory { attr, children } => {
                FileHandle::directory(path, attr.clone(), Arc::clone(children))
            }
        };
        Ok(handle.tracked(self.handles.acquire()))
    }

    // Answered from the entry table, no handle needed.
    async fn stat(&self, path: &str) -> VfsResult<FileAttr> {
        self.lookup(path).map(|e| e.attr().clone())
    }
}

/// Collects files and directories, then freezes them into a [`MemoryStore`].
///
/// Paths are trimmed of leading and trailing `/`. Parent directories are
/// created implicitly. Adding the same file twice keeps the last contents.
#[derive(Debug, Clone)]
pub struct MemoryStoreBuilder {
    files: BTreeMap<String, (Bytes, Option<SystemTime>)>,
    dirs: BTreeMap<String, Option<SystemTime>>,
    mtime: SystemTime,
}

impl Default for MemoryStoreBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStoreBuilder {
    pub fn new() -> Self {
        Self {
            files: BTreeMap::new(),
            dirs: BTreeMap::new(),
            mtime: SystemTime::now(),
        }
    }

    /// Modification time for entries added without one.
    pub fn mtime(mut self, mtime: SystemTime) -> Self {
        self.mtime = mtime;
        self
    }

    /// Add a file.
    pub fn file(mut self, path: &str, data: impl Into<Bytes>) -> Self {
        self.insert_file(path, data.into(), None);
        self
    }

    /// Add a file with an explicit modification time.
    pub fn file_with_mtime(mut self, path: &str, data: impl Into<Bytes>, mtime: SystemTime) -> Self {
        self.insert_file(path, data.into(), Some(mtime));
        self
    }

    /// Add a directory, which may stay empty.
    pub fn dir(mut self, path: &str) -> Self {
        self.dirs.insert(path::trim_separators(path).to_string(), None);
        self
    }

    /// Add a directory with an explicit modification time.
    pub fn dir_with_mtime(mut self, path: &str, mtime: SystemTime) -> Self {
        self.dirs
            .insert(path::trim_separators(path).to_string(), Some(mtime));
        self
    }

    fn insert_file(&mut self, path: &str, data: Bytes, mtime: Option<SystemTime>) {
        self.files
            .insert(path::trim_separators(path).to_string(), (data, mtime));
    }

    /// Freeze into an immutable store.
    ///
    /// Fails on invalid paths, on a file added at the root, and on a path
    /// that is both a file and a directory.
    pub fn build(self) -> VfsResult<MemoryStore> {
        let mut dirs: BTreeMap<String, SystemTime> = BTreeMap::new();
        dirs.insert(ROOT.to_string(), self.mtime);

        // Explicit directories plus the parents files imply; explicit mtimes win.
        let mut pending: Vec<(String, Option<SystemTime>)> =
            self.dirs.iter().map(|(p, m)| (p.clone(), *m)).collect();
        pending.extend(
            self.files
                .keys()
                .filter_map(|p| path::parent(p))
                .map(|d| (d.to_string(), None)),
        );

        while let Some((dir, mtime)) = pending.pop() {
            if !path::is_valid_path(&dir) {
                return Err(VfsError::invalid_path(dir));
            }
            if let Some(parent) = path::parent(&dir) {
                if !dirs.contains_key(parent) {
                    pending.push((parent.to_string(), None));
                }
            }
            match (dirs.get_mut(&dir), mtime) {
                (Some(existing), Some(mtime)) => *existing = mtime,
                (Some(_), None) => {}
                (None, mtime) => {
                    dirs.insert(dir, mtime.unwrap_or(self.mtime));
                }
            }
        }

        let mut listings: HashMap<String, Vec<DirEntry>> = HashMap::new();
        let mut entries: HashMap<String, Entry> = HashMap::new();

        for file in self.files.keys() {
            if file == ROOT || !path::is_valid_path(file) {
                return Err(VfsError::invalid_path(file.clone()));
            }
            if dirs.contains_key(file) {
                return Err(VfsError::other(format!(
                    "{file} is both a file and a directory"
                )));
            }
        }

        for dir in dirs.keys() {
            if let Some(parent) = path::parent(dir) {
                listings
                    .entry(parent.to_string())
                    .or_default()
                    .push(DirEntry::directory(path::base_name(dir)));
            }
        }

        for (file, (data, mtime)) in self.files {
            if let Some(parent) = path::parent(&file) {
                listings
                    .entry(parent.to_string())
                    .or_default()
                    .push(DirEntry::file(path::base_name(&file)));
            }
            let attr = FileAttr::file(data.len() as u64, mtime.unwrap_or(self.mtime));
            entries.insert(file, Entry::File { data, attr });
        }

        for (dir, mtime) in dirs {
            let mut children = listings.remove(&dir).unwrap_or_default();
            children.sort_by(|a, b| a.name.cmp(&b.name));
            entries.insert(
                dir,
                Entry::Directory {
                    attr: FileAttr::directory(mtime),
                    children: Arc::from(children),
                },
            );
        }

        Ok(MemoryStore {
            entries,
            handles: HandleTracker::new(),
        })
    }
}

/// Walk `root` on disk and build a store, optionally nesting everything
/// under `prefix`.
async fn load(root: &Path, prefix: Option<String>) -> VfsResult<MemoryStore> {
    let meta = tokio::fs::metadata(root).await?;
    if !meta.is_dir() {
        return Err(VfsError::not_a_directory(root.display().to_string()));
    }

    let mut builder = MemoryStoreBuilder::new();
    let base = prefix.unwrap_or_else(|| ROOT.to_string());
    if base != ROOT {
        builder = builder.dir_with_mtime(&base, meta.modified()?);
    }

    let mut stack: Vec<(PathBuf, String)> = vec![(root.to_path_buf(), base)];
    while let Some((disk_dir, store_dir)) = stack.pop() {
        let mut read_dir = tokio::fs::read_dir(&disk_dir).await?;
        while let Some(entry) = read_dir.next_entry().await? {
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                tracing::warn!(path = %entry.path().display(), "skipping non-UTF-8 file name");
                continue;
            };
            let store_path = path::join(&store_dir, &name);
            let file_type = entry.file_type().await?;

            if file_type.is_dir() {
                let mtime = entry.metadata().await?.modified()?;
                builder = builder.dir_with_mtime(&store_path, mtime);
                stack.push((entry.path(), store_path));
            } else if file_type.is_file() {
                let mtime = entry.metadata().await?.modified()?;
                let data = tokio::fs::read(entry.path()).await?;
                builder = builder.file_with_mtime(&store_path, data, mtime);
            } else {
                tracing::debug!(path = %entry.path().display(), "skipping non-regular file");
            }
        }
    }

    let store = builder.build()?;
    tracing::debug!(root = %root.display(), entries = store.len(), "loaded directory into memory store");
    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    fn site() -> MemoryStore {
        MemoryStore::builder()
            .file("files/index.html", "<h1>hi</h1>")
            .file("files/css/site.css", "body {}")
            .dir("files/empty")
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_open_and_read() {
        let fs = site();
        let mut h = fs.open("files/index.html").await.unwrap();
        let mut s = String::new();
        h.read_to_string(&mut s).unwrap();
        assert_eq!(s, "<h1>hi</h1>");
        assert_eq!(h.stat().size, 11);
    }

    #[tokio::test]
    async fn test_implied_parents_and_listing_order() {
        let fs = site();
        let root = fs.read_dir(".").await.unwrap();
        assert_eq!(root, vec![DirEntry::directory("files")]);

        let files = fs.read_dir("files").await.unwrap();
        let names: Vec<_> = files.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["css", "empty", "index.html"]);

        assert!(fs.stat("files/css").await.unwrap().is_dir());
        assert!(fs.read_dir("files/empty").await.unwrap().is_empty());
        assert_eq!(fs.len(), 5);
    }

    #[tokio::test]
    async fn test_not_found_and_invalid() {
        let fs = site();
        assert!(matches!(fs.open("nope").await, Err(VfsError::NotFound(_))));
        assert!(matches!(fs.open("/files").await, Err(VfsError::InvalidPath(_))));
        assert!(matches!(fs.open("files/../files").await, Err(VfsError::InvalidPath(_))));
        assert!(matches!(fs.stat("").await, Err(VfsError::InvalidPath(_))));
    }

    #[tokio::test]
    async fn test_empty_store() {
        let fs = MemoryStore::empty();
        assert!(fs.is_empty());
        assert!(fs.stat(".").await.unwrap().is_dir());
        assert!(fs.read_dir(".").await.unwrap().is_empty());

        let built = MemoryStore::builder().build().unwrap();
        assert!(built.is_empty());
    }

    #[tokio::test]
    async fn test_handles_released_on_drop() {
        let fs = site();
        let a = fs.open("files").await.unwrap();
        let _ = fs.open("missing").await;
        assert_eq!(fs.open_handles(), 1);
        drop(a);

        fs.stat("files/index.html").await.unwrap();
        fs.read_all("files/index.html").await.unwrap();
        assert_eq!(fs.open_handles(), 0);
    }

    #[test]
    fn test_build_rejects_conflicts() {
        let result = MemoryStore::builder()
            .file("a", "x")
            .file("a/b", "y")
            .build();
        assert!(matches!(result, Err(VfsError::Other(_))));

        let result = MemoryStore::builder().file("/", "x").build();
        assert!(matches!(result, Err(VfsError::InvalidPath(_))));

        let result = MemoryStore::builder().file("a/../b", "x").build();
        assert!(matches!(result, Err(VfsError::InvalidPath(_))));
    }

    #[test]
    fn test_explicit_mtime() {
        let t = SystemTime::UNIX_EPOCH;
        let fs = MemoryStore::builder()
            .mtime(t)
            .file("a/b.txt", "x")
            .build()
            .unwrap();
        match fs.entries.get("a") {
            Some(Entry::Directory { attr, .. }) => assert_eq!(attr.mtime, t),
            other => panic!("expected directory, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_embed_dir_nests_under_dir_name() {
        let tmp = tempfile::tempdir().unwrap();
        let files = tmp.path().join("files");
        std::fs::create_dir_all(files.join("css")).unwrap();
        std::fs::write(files.join("index.html"), "<h1>hi</h1>").unwrap();
        std::fs::write(files.join("css/site.css"), "body {}").unwrap();

        let fs = MemoryStore::embed_dir(&files).await.unwrap();
        assert_eq!(fs.read_dir(".").await.unwrap(), vec![DirEntry::directory("files")]);
        assert_eq!(&fs.read_all("files/css/site.css").await.unwrap()[..], b"body {}");

        let flat = MemoryStore::load_dir(&files).await.unwrap();
        assert_eq!(&flat.read_all("index.html").await.unwrap()[..], b"<h1>hi</h1>");
        assert!(flat.stat("files").await.is_err());
    }

    #[tokio::test]
    async fn test_load_missing_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let err = MemoryStore::load_dir(tmp.path().join("missing")).await.unwrap_err();
        assert!(err.is_not_found());
    }
}
