//! Post repository - the single point of access for reading and writing posts.

use std::sync::Arc;

use nichofy_core::RepoError;
use nichofy_core::domain::{NewPost, Post, PostFilters, PostPage, PostPatch, PostQuery, PostSort, PostStats};
use nichofy_core::ports::{DocumentStore, PostDocument, StoreQuery, TimestampValue};

use crate::cache::{CacheKey, QueryCache};

/// Composes store queries, applies the free-text search and keeps the
/// query cache coherent with local writes.
///
/// Store errors are returned unchanged and never retried. The cache is only
/// invalidated after a write the store has confirmed.
pub struct PostRepository {
    store: Arc<dyn DocumentStore>,
    cache: Arc<QueryCache>,
}

impl PostRepository {
    pub fn new(store: Arc<dyn DocumentStore>, cache: Arc<QueryCache>) -> Self {
        Self { store, cache }
    }

    pub fn cache(&self) -> &Arc<QueryCache> {
        &self.cache
    }

    /// List one page of the owner's posts.
    ///
    /// The search term only filters the page the store returned, so a small
    /// page size can hide matches that sit on later pages.
    pub async fn list(&self, owner_id: &str, query: &PostQuery) -> Result<PostPage, RepoError> {
        let cache_key = query
            .is_first_page()
            .then(|| CacheKey::new(owner_id, query));

        if let Some(key) = &cache_key {
            if let Some(page) = self.cache.get(key) {
                tracing::debug!(owner_id = %owner_id, "Post list served from cache");
                return Ok(page);
            }
        }

        let epoch = self.cache.epoch(owner_id);
        let store_query = StoreQuery::scoped(owner_id, &query.filters, query.sort)
            .limit(query.page_size)
            .start_after(query.cursor.clone());

        let mut page = self.store.find(&store_query).await?;
        query.filters.apply_search(&mut page.posts);

        tracing::debug!(
            owner_id = %owner_id,
            returned = page.posts.len(),
            first_page = cache_key.is_some(),
            "Post list fetched from store"
        );

        if let Some(key) = cache_key {
            self.cache.put_if_fresh(key, page.clone(), epoch);
        }

        Ok(page)
    }

    /// Fetch one post by id, bypassing the cache.
    pub async fn get(&self, id: &str) -> Result<Option<Post>, RepoError> {
        self.store.get(id).await
    }

    /// Create a post for `owner_id` and return its store-assigned id.
    pub async fn create(&self, owner_id: &str, data: NewPost) -> Result<String, RepoError> {
        let id = self
            .store
            .insert(PostDocument::server_stamped(owner_id, data))
            .await?;

        self.cache.invalidate(owner_id);
        tracing::info!(owner_id = %owner_id, post_id = %id, "Post created");
        Ok(id)
    }

    /// Apply a partial update and refresh `updatedAt`.
    pub async fn update(&self, id: &str, patch: PostPatch) -> Result<(), RepoError> {
        let owner_id = self.owner_of(id).await?;

        self.store
            .patch(id, patch, TimestampValue::ServerTime)
            .await?;

        self.cache.invalidate(&owner_id);
        tracing::debug!(owner_id = %owner_id, post_id = %id, "Post updated");
        Ok(())
    }

    /// Flip the favorite flag and return its new value.
    pub async fn toggle_favorite(&self, id: &str) -> Result<bool, RepoError> {
        let post = self
            .store
            .get(id)
            .await?
            .ok_or_else(|| RepoError::not_found(id))?;
        let is_favorite = !post.is_favorite;

        self.store
            .patch(id, PostPatch::favorite(is_favorite), TimestampValue::ServerTime)
            .await?;

        self.cache.invalidate(&post.owner_id);
        Ok(is_favorite)
    }

    /// Delete a post. Deleting an id that no longer exists is `NotFound`.
    pub async fn delete(&self, id: &str) -> Result<(), RepoError> {
        let owner_id = self.owner_of(id).await?;

        self.store.remove(id).await?;

        self.cache.invalidate(&owner_id);
        tracing::info!(owner_id = %owner_id, post_id = %id, "Post deleted");
        Ok(())
    }

    /// Counts over every post the owner has, uncached.
    pub async fn stats(&self, owner_id: &str) -> Result<PostStats, RepoError> {
        let query = StoreQuery::scoped(owner_id, &PostFilters::default(), PostSort::default());
        let page = self.store.find(&query).await?;
        Ok(PostStats::from_posts(&page.posts))
    }

    async fn owner_of(&self, id: &str) -> Result<String, RepoError> {
        self.store
            .get(id)
            .await?
            .map(|post| post.owner_id)
            .ok_or_else(|| RepoError::not_found(id))
    }
}
