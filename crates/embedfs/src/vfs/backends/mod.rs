//! Store implementations.

mod memory;
mod sub;

pub use memory::{MemoryStore, MemoryStoreBuilder};
pub use sub::{SubFs, sub};
