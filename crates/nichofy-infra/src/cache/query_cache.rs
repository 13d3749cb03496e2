//! Time-bounded cache of first-page post listings.
//!
//! Entries are keyed by owner, filters, sort and page size. Pagination
//! cursors are never part of a key, so only first pages are stored.
//! Every fault degrades to a miss: a poisoned lock is never an error.

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;
use std::time::Duration;

use tokio::time::Instant;

use nichofy_core::domain::{PostFilters, PostPage, PostQuery, PostSort};

const DEFAULT_TTL_SECS: u64 = 300;

/// Query cache configuration.
#[derive(Debug, Clone)]
pub struct QueryCacheConfig {
    /// Maximum age at which a cached page is still served.
    pub ttl: Duration,
}

impl Default for QueryCacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(DEFAULT_TTL_SECS),
        }
    }
}

impl QueryCacheConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Self {
            ttl: Duration::from_secs(
                std::env::var("POST_CACHE_TTL_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(DEFAULT_TTL_SECS),
            ),
        }
    }
}

/// Identifies one cached first page.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub owner_id: String,
    pub filters: PostFilters,
    pub sort: PostSort,
    pub page_size: Option<usize>,
}

impl CacheKey {
    pub fn new(owner_id: impl Into<String>, query: &PostQuery) -> Self {
        Self {
            owner_id: owner_id.into(),
            filters: query.filters.clone(),
            sort: query.sort,
            page_size: query.page_size,
        }
    }
}

struct CacheEntry {
    page: PostPage,
    stored_at: Instant,
}

#[derive(Default)]
struct CacheState {
    entries: HashMap<CacheKey, CacheEntry>,
    // Set to a fresh generation on every invalidation of the owner.
    epochs: HashMap<String, u64>,
    generation: u64,
    // Epoch of every owner without its own counter. Never decreases, so a
    // pruned owner's epoch cannot fall back to a value read before its
    // last invalidation.
    floor: u64,
}

impl CacheState {
    fn epoch(&self, owner_id: &str) -> u64 {
        self.epochs.get(owner_id).copied().unwrap_or(self.floor)
    }

    fn bump(&mut self, owner_id: &str) {
        self.generation += 1;
        self.epochs.insert(owner_id.to_string(), self.generation);
    }

    /// Forget counters of owners with no cached entry left.
    fn prune_epochs(&mut self) {
        let cached: HashSet<&str> = self.entries.keys().map(|k| k.owner_id.as_str()).collect();
        let mut floor = self.floor;
        self.epochs.retain(|owner, epoch| {
            let keep = cached.contains(owner.as_str());
            if !keep {
                floor = floor.max(*epoch);
            }
            keep
        });
        self.floor = floor;
    }
}

/// In-memory query cache shared by every repository call in one process.
pub struct QueryCache {
    state: RwLock<CacheState>,
    ttl: Duration,
}

impl QueryCache {
    pub fn new(config: QueryCacheConfig) -> Self {
        Self::with_ttl(config.ttl)
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            state: RwLock::new(CacheState::default()),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Cached page for `key`, if present and younger than the TTL.
    pub fn get(&self, key: &CacheKey) -> Option<PostPage> {
        let state = self.state.read().ok()?;
        let entry = state.entries.get(key)?;

        if entry.stored_at.elapsed() >= self.ttl {
            return None;
        }

        Some(entry.page.clone())
    }

    /// Store a page stamped with the current time.
    pub fn put(&self, key: CacheKey, page: PostPage) {
        let Ok(mut state) = self.state.write() else {
            tracing::warn!("Query cache lock poisoned, skipping put");
            return;
        };

        state.entries.insert(
            key,
            CacheEntry {
                page,
                stored_at: Instant::now(),
            },
        );
    }

    /// Invalidation counter for `owner_id`, read before a store round-trip.
    pub fn epoch(&self, owner_id: &str) -> u64 {
        self.state
            .read()
            .map(|state| state.epoch(owner_id))
            // Matches no stored epoch, so the page fetched after it is never cached.
            .unwrap_or(u64::MAX)
    }

    /// Store a page only if the owner has not been invalidated since `epoch`
    /// was read. Returns whether the page was stored.
    pub fn put_if_fresh(&self, key: CacheKey, page: PostPage, epoch: u64) -> bool {
        let Ok(mut state) = self.state.write() else {
            return false;
        };

        if state.epoch(&key.owner_id) != epoch {
            tracing::debug!(owner_id = %key.owner_id, "Discarding page fetched before invalidation");
            return false;
        }

        state.entries.insert(
            key,
            CacheEntry {
                page,
                stored_at: Instant::now(),
            },
        );
        true
    }

    /// Drop every entry belonging to `owner_id`. Returns the number removed.
    pub fn invalidate(&self, owner_id: &str) -> usize {
        let mut state = match self.state.write() {
            Ok(state) => state,
            Err(poisoned) => {
                // Nothing in a poisoned map can be trusted, so drop all of it.
                let mut state = poisoned.into_inner();
                let removed = state.entries.len();
                state.entries.clear();
                state.bump(owner_id);
                drop(state);
                self.state.clear_poison();
                return removed;
            }
        };

        let before = state.entries.len();
        state.entries.retain(|key, _| key.owner_id != owner_id);
        state.bump(owner_id);
        let removed = before - state.entries.len();

        tracing::debug!(owner_id = %owner_id, removed, "Query cache invalidated");
        removed
    }

    /// Remove all entries past the TTL and the invalidation counters of
    /// owners left without entries. Returns the number of entries removed.
    pub fn sweep_expired(&self) -> usize {
        let Ok(mut state) = self.state.write() else {
            return 0;
        };

        let ttl = self.ttl;
        let before = state.entries.len();
        state
            .entries
            .retain(|_, entry| entry.stored_at.elapsed() < ttl);
        state.prune_epochs();
        before - state.entries.len()
    }

    /// Drop everything. Used when the cache is disposed.
    pub fn clear(&self) {
        match self.state.write() {
            Ok(mut state) => state.entries.clear(),
            Err(poisoned) => {
                poisoned.into_inner().entries.clear();
                self.state.clear_poison();
            }
        }
    }

    pub fn len(&self) -> usize {
        self.state.read().map(|s| s.entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for QueryCache {
    fn default() -> Self {
        Self::new(QueryCacheConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nichofy_core::domain::SortField;

    fn key(owner: &str, niche: &str) -> CacheKey {
        CacheKey::new(
            owner,
            &PostQuery::new(PostFilters::default().niche(niche)).page_size(10),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_get_within_ttl() {
        let cache = QueryCache::with_ttl(Duration::from_secs(60));
        cache.put(key("ana", "Direito"), PostPage::default());

        tokio::time::advance(Duration::from_secs(59)).await;
        assert_eq!(cache.get(&key("ana", "Direito")), Some(PostPage::default()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_entry_is_a_miss() {
        let cache = QueryCache::with_ttl(Duration::from_secs(60));
        cache.put(key("ana", "Direito"), PostPage::default());

        tokio::time::advance(Duration::from_secs(60)).await;
        assert_eq!(cache.get(&key("ana", "Direito")), None);
        assert_eq!(cache.len(), 1);

        assert_eq!(cache.sweep_expired(), 1);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_key_covers_sort_and_page_size() {
        let cache = QueryCache::default();
        let base = PostQuery::new(PostFilters::default());
        cache.put(CacheKey::new("ana", &base), PostPage::default());

        let resorted = base.clone().sorted(nichofy_core::domain::PostSort::asc(SortField::Title));
        assert_eq!(cache.get(&CacheKey::new("ana", &resorted)), None);
        assert_eq!(cache.get(&CacheKey::new("ana", &base.page_size(5))), None);
    }

    #[tokio::test]
    async fn test_invalidate_is_scoped_to_owner() {
        let cache = QueryCache::default();
        cache.put(key("ana", "Direito"), PostPage::default());
        cache.put(key("ana", "Saude"), PostPage::default());
        cache.put(key("bruno", "Direito"), PostPage::default());

        assert_eq!(cache.invalidate("ana"), 2);
        assert_eq!(cache.get(&key("ana", "Direito")), None);
        assert!(cache.get(&key("bruno", "Direito")).is_some());
    }

    #[tokio::test]
    async fn test_put_if_fresh_rejects_pages_from_before_invalidation() {
        let cache = QueryCache::default();
        let epoch = cache.epoch("ana");

        cache.invalidate("ana");
        assert!(!cache.put_if_fresh(key("ana", "Direito"), PostPage::default(), epoch));
        assert!(cache.is_empty());

        let epoch = cache.epoch("ana");
        assert!(cache.put_if_fresh(key("ana", "Direito"), PostPage::default(), epoch));
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_sweep_prunes_epochs_without_reviving_stale_reads() {
        let cache = QueryCache::default();
        cache.put(key("bruno", "Direito"), PostPage::default());
        let stale = cache.epoch("ana");

        cache.invalidate("ana");
        cache.invalidate("bruno");
        cache.put(key("bruno", "Saude"), PostPage::default());
        cache.sweep_expired();

        {
            let state = cache.state.read().unwrap();
            assert!(!state.epochs.contains_key("ana"));
            assert!(state.epochs.contains_key("bruno"));
        }

        // The read from before the invalidation stays rejected after pruning.
        assert!(!cache.put_if_fresh(key("ana", "Direito"), PostPage::default(), stale));
        let epoch = cache.epoch("ana");
        assert!(cache.put_if_fresh(key("ana", "Direito"), PostPage::default(), epoch));
    }
}
