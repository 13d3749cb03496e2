//! # NichoFy Infrastructure
//!
//! Concrete implementations of the ports defined in `nichofy-core`, plus the
//! services built on them: the query cache, the post repository and live
//! subscriptions.

pub mod cache;
pub mod posts;
pub mod store;

pub use cache::{QueryCache, QueryCacheConfig};
pub use posts::{LiveSubscriptions, PostRepository, Subscription};
pub use store::{InMemoryDocumentStore, InMemoryStoreConfig};
