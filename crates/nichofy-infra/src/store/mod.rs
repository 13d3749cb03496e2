//! Document store implementations.

mod cursor;
mod memory;

pub use memory::{InMemoryDocumentStore, InMemoryStoreConfig};
