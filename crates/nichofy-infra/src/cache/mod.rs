//! Query cache for first-page post listings.

mod query_cache;

pub use query_cache::{CacheKey, QueryCache, QueryCacheConfig};
