//! Read-only virtual filesystem.
//!
//! Key components:
//!
//! - [`ReadOnlyFs`] - Open/stat contract every store implements
//! - [`FileHandle`] - Per-call open file or directory
//! - [`MemoryStore`] - Immutable in-memory byte store
//! - [`SubFs`] - View of a store rooted at one of its directories
//!
//! ## Design Decisions
//!
//! - **Path-based**: Stores are addressed by unrooted `/`-separated paths,
//!   `"."` is the root.
//! - **Strict stores, loose callers**: Stores reject non-canonical paths;
//!   adapters in front of them trim separators first.
//! - **RAII handles**: Dropping a [`FileHandle`] releases it.

pub mod backends;
mod error;
mod handle;
mod ops;
pub mod path;
mod types;

pub use backends::{MemoryStore, MemoryStoreBuilder, SubFs, sub};
pub use error::{VfsError, VfsResult};
pub use handle::{FileHandle, HandleGuard, HandleTracker};
pub use ops::ReadOnlyFs;
pub use types::{DIR_PERM, DirEntry, FILE_PERM, FileAttr, FileType};
