//! Embedded filesystem module.
//!
//! [`EmbeddedFs`] serves a read-only store to the host. Embedding a folder
//! usually produces a store whose root holds nothing but that folder, so on
//! construction the adapter looks at the root once: if its only entry is a
//! directory named after the configured root folder (`files` by default),
//! every later query resolves inside that directory instead.
//!
//! Query paths are trimmed of leading and trailing `/` before lookup, so
//! `/index.html`, `index.html/` and `index.html` are the same file.

use async_trait::async_trait;
use std::sync::Arc;

use crate::config::{ConfigError, EmbedConfig};
use crate::module::{
    Dispenser, FsModule, Module, ModuleInfo, ModuleRegistry, RegistryError, UnmarshalDirectives,
};
use crate::vfs::path::{self, ROOT};
use crate::vfs::{FileAttr, FileHandle, ReadOnlyFs, SubFs, VfsError, VfsResult, sub};

/// Registry identifier of the embedded filesystem module.
pub const MODULE_ID: &str = "caddy.fs.embedded";

/// The root queries resolve against.
#[derive(Clone)]
pub enum ViewRoot {
    /// The store's own root.
    Store(Arc<dyn ReadOnlyFs>),
    /// A top-level folder of the store.
    Sub { folder: String, fs: SubFs },
}

impl ViewRoot {
    fn fs(&self) -> &dyn ReadOnlyFs {
        match self {
            ViewRoot::Store(fs) => fs.as_ref(),
            ViewRoot::Sub { fs, .. } => fs,
        }
    }
}

impl std::fmt::Debug for ViewRoot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ViewRoot::Store(_) => f.write_str("Store"),
            ViewRoot::Sub { folder, .. } => f.debug_struct("Sub").field("folder", folder).finish(),
        }
    }
}

/// Read-only filesystem over an embedded store.
///
/// The effective root is decided once, in the constructor, and cannot change
/// afterwards. All queries are lock-free reads and safe to run concurrently.
#[derive(Debug, Clone)]
pub struct EmbeddedFs {
    view: ViewRoot,
    config: EmbedConfig,
}

impl EmbeddedFs {
    /// Wrap `store` with the default configuration.
    pub async fn new(store: Arc<dyn ReadOnlyFs>) -> Self {
        Self::with_config(store, EmbedConfig::default()).await
    }

    /// Wrap `store`, detecting the effective root with `config`.
    pub async fn with_config(store: Arc<dyn ReadOnlyFs>, config: EmbedConfig) -> Self {
        let view = detect_root(store, &config).await;
        Self { view, config }
    }

    /// The effective root.
    pub fn view(&self) -> &ViewRoot {
        &self.view
    }

    /// Returns true if queries resolve inside a top-level folder.
    pub fn is_rebased(&self) -> bool {
        matches!(self.view, ViewRoot::Sub { .. })
    }

    /// Name of the folder queries were rebased onto, if any.
    pub fn root_folder(&self) -> Option<&str> {
        match &self.view {
            ViewRoot::Sub { folder, .. } => Some(folder),
            ViewRoot::Store(_) => None,
        }
    }

    pub fn config(&self) -> &EmbedConfig {
        &self.config
    }
}

/// Pick the effective root for `store`.
///
/// Never fails: a root that cannot be opened or listed, or a folder that
/// cannot be turned into a view, leaves the store's own root in place.
async fn detect_root(store: Arc<dyn ReadOnlyFs>, config: &EmbedConfig) -> ViewRoot {
    let folder = config.root_folder.as_str();

    match single_top_level_folder(store.as_ref(), folder).await {
        Ok(true) => match sub(Arc::clone(&store), folder) {
            Ok(fs) => {
                tracing::debug!(folder, "rebasing embedded filesystem onto top-level folder");
                return ViewRoot::Sub {
                    folder: folder.to_string(),
                    fs,
                };
            }
            Err(e) => probe_failed(config, "deriving sub-view", &e),
        },
        Ok(false) => tracing::debug!(folder, "embedded filesystem root left as is"),
        Err(e) => probe_failed(config, "probing root", &e),
    }

    ViewRoot::Store(store)
}

/// Returns `Ok(true)` when the store root holds exactly one entry, a
/// directory named `folder`.
///
/// The root handle is dropped before this returns, on every path.
async fn single_top_level_folder(store: &dyn ReadOnlyFs, folder: &str) -> VfsResult<bool> {
    let mut root = store.open(ROOT).await?;
    if !root.is_dir() {
        return Ok(false);
    }

    let entries = match root.read_dir(2) {
        Ok(entries) => entries,
        Err(VfsError::Eof) => Vec::new(),
        Err(e) => return Err(e),
    };

    Ok(matches!(entries.as_slice(), [only] if only.is_dir() && only.name == folder))
}

fn probe_failed(config: &EmbedConfig, step: &str, err: &VfsError) {
    if config.warn_on_probe_failure {
        tracing::warn!(step, error = %err, "root detection failed, serving store root");
    } else {
        tracing::debug!(step, error = %err, "root detection failed, serving store root");
    }
}

#[async_trait]
impl ReadOnlyFs for EmbeddedFs {
    /// Open a file or directory. Store errors are returned unchanged.
    async fn open(&self, name: &str) -> VfsResult<FileHandle> {
        let name = path::trim_separators(name);
        tracing::trace!(name, "open");
        self.view.fs().open(name).await
    }

    /// Open, read attributes, release. Open failures are wrapped as
    /// [`VfsError::Stat`].
    async fn stat(&self, name: &str) -> VfsResult<FileAttr> {
        let name = path::trim_separators(name);
        let handle = self.view.fs().open(name).await.map_err(VfsError::stat)?;
        Ok(handle.stat())
    }
}

impl Module for EmbeddedFs {
    fn module_id(&self) -> &'static str {
        MODULE_ID
    }
}

impl UnmarshalDirectives for EmbeddedFs {
    // No options of its own.
    fn unmarshal_directives(&mut self, _d: &mut Dispenser) -> Result<(), ConfigError> {
        Ok(())
    }
}

/// Register the embedded filesystem module, serving `store`.
pub fn register(registry: &ModuleRegistry, store: Arc<dyn ReadOnlyFs>) -> Result<(), RegistryError> {
    register_with_config(registry, store, EmbedConfig::default())
}

/// Register the embedded filesystem module with an explicit configuration.
pub fn register_with_config(
    registry: &ModuleRegistry,
    store: Arc<dyn ReadOnlyFs>,
    config: EmbedConfig,
) -> Result<(), RegistryError> {
    registry.register(ModuleInfo::new(MODULE_ID, move || {
        let store = Arc::clone(&store);
        let config = config.clone();
        Box::pin(async move {
            Box::new(EmbeddedFs::with_config(store, config).await) as Box<dyn FsModule>
        })
    }))
}
