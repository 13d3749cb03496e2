//! Application state - shared across all handlers.

use std::sync::Arc;

use nichofy_core::ports::DocumentStore;
use nichofy_infra::{InMemoryDocumentStore, LiveSubscriptions, PostRepository, QueryCache};

use crate::config::{AppConfig, PageConfig};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub posts: Arc<PostRepository>,
    pub live: Arc<LiveSubscriptions>,
    pub cache: Arc<QueryCache>,
    pub pages: PageConfig,
}

impl AppState {
    /// Build the application state over the in-memory document store.
    pub fn new(config: &AppConfig) -> Self {
        tracing::warn!("No managed document store configured. Posts are kept in memory.");
        let store: Arc<dyn DocumentStore> =
            Arc::new(InMemoryDocumentStore::new(config.store.clone()));
        Self::with_store(store, config)
    }

    pub fn with_store(store: Arc<dyn DocumentStore>, config: &AppConfig) -> Self {
        let cache = Arc::new(QueryCache::new(config.cache.clone()));
        let posts = Arc::new(PostRepository::new(store.clone(), cache.clone()));
        let live = Arc::new(LiveSubscriptions::new(store));

        tracing::info!(cache_ttl_secs = cache.ttl().as_secs(), "Application state initialized");

        Self {
            posts,
            live,
            cache,
            pages: config.pages,
        }
    }
}
