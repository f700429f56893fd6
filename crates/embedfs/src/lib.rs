//! # embedfs
//!
//! Read-only, in-memory filesystem for serving bundled files.
//!
//! - [`vfs`] holds the store contract ([`ReadOnlyFs`]), handles, and the
//!   [`MemoryStore`] byte store.
//! - [`EmbeddedFs`] fronts a store for the host: it trims query paths and,
//!   when the store's root is nothing but a single `files` folder, serves
//!   that folder as the root.
//! - [`module`] is the registration surface a host consumes.
//!
//! ```no_run
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! use std::sync::Arc;
//! use embedfs::{EmbeddedFs, MemoryStore, ReadOnlyFs};
//!
//! let store = MemoryStore::builder()
//!     .file("files/index.html", "<h1>hello</h1>")
//!     .build()?;
//! let fs = EmbeddedFs::new(Arc::new(store)).await;
//! let _page = fs.read_all("/index.html").await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod embedded;
pub mod module;
pub mod vfs;

pub use config::{ConfigError, DEFAULT_ROOT_FOLDER, EmbedConfig};
pub use embedded::{EmbeddedFs, MODULE_ID, ViewRoot, register, register_with_config};
pub use module::{
    Dispenser, FsModule, Module, ModuleInfo, ModuleRegistry, RegistryError, UnmarshalDirectives,
};
pub use vfs::{
    DirEntry, FileAttr, FileHandle, FileType, MemoryStore, MemoryStoreBuilder, ReadOnlyFs, SubFs,
    VfsError, VfsResult,
};
