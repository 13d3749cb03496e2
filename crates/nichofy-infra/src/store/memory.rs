//! In-memory document store.
//!
//! Implements the full `DocumentStore` contract inside one process: equality
//! filters, ordering, limits, cursors, server timestamps and standing
//! queries. Used when no managed store is configured and by tests.
//! Note: Data is lost on process restart.

use std::cmp::Ordering as SortOrdering;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use tokio::sync::{RwLock, broadcast, mpsc};

use nichofy_core::RepoError;
use nichofy_core::domain::{Post, PostPage, PostPatch};
use nichofy_core::ports::{DocumentStore, PostDocument, SnapshotStream, StoreQuery, TimestampValue};

use super::cursor::CursorPosition;

type Documents = Arc<RwLock<HashMap<String, Post>>>;

/// In-memory store configuration.
#[derive(Debug, Clone)]
pub struct InMemoryStoreConfig {
    /// Capacity of the change feed and of each snapshot stream.
    pub watch_buffer: usize,
}

impl Default for InMemoryStoreConfig {
    fn default() -> Self {
        Self { watch_buffer: 100 }
    }
}

impl InMemoryStoreConfig {
    pub fn from_env() -> Self {
        Self {
            watch_buffer: std::env::var("STORE_WATCH_BUFFER")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|n: &usize| *n > 0)
                .unwrap_or(100),
        }
    }
}

#[derive(Debug, Clone)]
enum ChangeEvent {
    Written { owner_id: String },
    Disconnected { reason: String },
}

/// In-memory document store holding the post collection.
#[derive(Clone)]
pub struct InMemoryDocumentStore {
    documents: Documents,
    changes: broadcast::Sender<ChangeEvent>,
    last_stamp: Arc<Mutex<DateTime<Utc>>>,
    offline: Arc<AtomicBool>,
    find_calls: Arc<AtomicUsize>,
    watch_buffer: usize,
}

impl InMemoryDocumentStore {
    pub fn new(config: InMemoryStoreConfig) -> Self {
        let watch_buffer = config.watch_buffer.max(1);
        Self {
            documents: Arc::new(RwLock::new(HashMap::new())),
            changes: broadcast::channel(watch_buffer).0,
            last_stamp: Arc::new(Mutex::new(DateTime::<Utc>::MIN_UTC)),
            offline: Arc::new(AtomicBool::new(false)),
            find_calls: Arc::new(AtomicUsize::new(0)),
            watch_buffer,
        }
    }

    /// Number of `find` calls executed so far.
    pub fn find_calls(&self) -> usize {
        self.find_calls.load(Ordering::Relaxed)
    }

    /// Simulate losing (or regaining) the connection. Going offline fails
    /// every later operation and ends every open snapshot stream with a
    /// connectivity error.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
        if offline {
            let _ = self.changes.send(ChangeEvent::Disconnected {
                reason: "store connection lost".to_string(),
            });
            tracing::warn!("In-memory store switched offline");
        } else {
            tracing::info!("In-memory store back online");
        }
    }

    pub async fn len(&self) -> usize {
        self.documents.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    fn ensure_online(&self) -> Result<(), RepoError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(RepoError::Connection("store is offline".to_string()));
        }
        Ok(())
    }

    /// Current server time, strictly later than any time issued before.
    fn server_now(&self) -> DateTime<Utc> {
        let mut last = self.last_stamp.lock().unwrap_or_else(PoisonError::into_inner);
        let next = Utc::now().max(*last + TimeDelta::microseconds(1));
        *last = next;
        next
    }

    fn resolve(&self, value: TimestampValue, server_time: &mut Option<DateTime<Utc>>) -> DateTime<Utc> {
        match value {
            TimestampValue::At(at) => at,
            // One write sees a single server time for every sentinel it carries.
            TimestampValue::ServerTime => *server_time.get_or_insert_with(|| self.server_now()),
        }
    }

    fn notify(&self, owner_id: String) {
        // No receivers just means nobody is watching.
        let _ = self.changes.send(ChangeEvent::Written { owner_id });
    }
}

impl Default for InMemoryDocumentStore {
    fn default() -> Self {
        Self::new(InMemoryStoreConfig::default())
    }
}

fn evaluate(documents: &HashMap<String, Post>, query: &StoreQuery) -> Result<PostPage, RepoError> {
    if query.limit == Some(0) {
        return Err(RepoError::Query("limit must be positive".to_string()));
    }

    let order = query.order_by;
    let mut matched: Vec<&Post> = documents.values().filter(|p| query.matches(p)).collect();
    matched.sort_by(|a, b| order.compare(a, b));

    let start = match &query.start_after {
        Some(cursor) => {
            let position = CursorPosition::decode(cursor, order)?;
            matched
                .iter()
                .position(|post| {
                    order.compare_positions(
                        (&order.value_of(post), post.id.as_str()),
                        (&position.value, position.id.as_str()),
                    ) == SortOrdering::Greater
                })
                .unwrap_or(matched.len())
        }
        None => 0,
    };

    let remaining = &matched[start..];
    let take = query.limit.map_or(remaining.len(), |limit| limit.min(remaining.len()));
    let posts: Vec<Post> = remaining[..take].iter().map(|post| (*post).clone()).collect();

    let next_cursor = match posts.last() {
        Some(last) if take < remaining.len() => Some(CursorPosition::of(last, order).encode()?),
        _ => None,
    };

    Ok(PostPage { posts, next_cursor })
}

async fn snapshot(documents: &Documents, query: &StoreQuery) -> Result<Vec<Post>, RepoError> {
    let documents = documents.read().await;
    evaluate(&documents, query).map(|page| page.posts)
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn find(&self, query: &StoreQuery) -> Result<PostPage, RepoError> {
        self.ensure_online()?;
        self.find_calls.fetch_add(1, Ordering::Relaxed);

        tracing::debug!(
            owner_id = %query.owner_id,
            filters = ?query.filters.iter().map(|f| f.field()).collect::<Vec<_>>(),
            order_by = %query.order_by.field,
            limit = ?query.limit,
            "Executing post query"
        );

        let documents = self.documents.read().await;
        evaluate(&documents, query)
    }

    async fn get(&self, id: &str) -> Result<Option<Post>, RepoError> {
        self.ensure_online()?;
        Ok(self.documents.read().await.get(id).cloned())
    }

    async fn insert(&self, document: PostDocument) -> Result<String, RepoError> {
        self.ensure_online()?;

        let mut server_time = None;
        let created_at = self.resolve(document.created_at, &mut server_time);
        let updated_at = self.resolve(document.updated_at, &mut server_time);
        if created_at > updated_at {
            return Err(RepoError::Query(
                "createdAt must not be later than updatedAt".to_string(),
            ));
        }

        let id = uuid::Uuid::new_v4().to_string();
        let data = document.data;
        let post = Post {
            id: id.clone(),
            owner_id: document.owner_id.clone(),
            title: data.title,
            body: data.body,
            prompt_text: data.prompt_text,
            image_ref: data.image_ref,
            category: data.category,
            niche: data.niche,
            is_favorite: data.is_favorite,
            created_at,
            updated_at,
            tags: data.tags,
        };

        self.documents.write().await.insert(id.clone(), post);
        self.notify(document.owner_id);

        Ok(id)
    }

    async fn patch(
        &self,
        id: &str,
        patch: PostPatch,
        updated_at: TimestampValue,
    ) -> Result<(), RepoError> {
        self.ensure_online()?;

        let owner_id = {
            let mut documents = self.documents.write().await;
            let post = documents.get_mut(id).ok_or_else(|| RepoError::not_found(id))?;

            let updated_at = self.resolve(updated_at, &mut None);
            if updated_at < post.created_at {
                return Err(RepoError::Query(
                    "updatedAt must not be earlier than createdAt".to_string(),
                ));
            }

            post.apply(patch);
            post.updated_at = updated_at;
            post.owner_id.clone()
        };

        self.notify(owner_id);
        Ok(())
    }

    async fn remove(&self, id: &str) -> Result<(), RepoError> {
        self.ensure_online()?;

        let removed = self
            .documents
            .write()
            .await
            .remove(id)
            .ok_or_else(|| RepoError::not_found(id))?;

        self.notify(removed.owner_id);
        Ok(())
    }

    async fn watch(&self, query: StoreQuery) -> Result<SnapshotStream, RepoError> {
        self.ensure_online()?;

        // Standing queries have no resume point.
        let query = query.start_after(None);
        // Subscribe before the first read so no write slips between the two.
        let mut changes = self.changes.subscribe();
        let documents = self.documents.clone();
        let (tx, rx) = mpsc::channel(self.watch_buffer);

        tokio::spawn(async move {
            let mut last = match snapshot(&documents, &query).await {
                Ok(posts) => posts,
                Err(e) => {
                    let _ = tx.send(Err(e)).await;
                    return;
                }
            };
            if tx.send(Ok(last.clone())).await.is_err() {
                return;
            }

            loop {
                let event = tokio::select! {
                    _ = tx.closed() => break,
                    event = changes.recv() => event,
                };

                let refresh = match event {
                    Ok(ChangeEvent::Written { owner_id }) => owner_id == query.owner_id,
                    Ok(ChangeEvent::Disconnected { reason }) => {
                        let _ = tx.send(Err(RepoError::Connection(reason))).await;
                        break;
                    }
                    Err(broadcast::error::RecvError::Lagged(count)) => {
                        tracing::warn!(
                            owner_id = %query.owner_id,
                            lagged = count,
                            "Change feed lagged, recomputing snapshot"
                        );
                        true
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                };

                if !refresh {
                    continue;
                }

                match snapshot(&documents, &query).await {
                    Ok(posts) if posts != last => {
                        last = posts.clone();
                        if tx.send(Ok(posts)).await.is_err() {
                            break;
                        }
                    }
                    Ok(_) => {}
                    Err(e) => {
                        let _ = tx.send(Err(e)).await;
                        break;
                    }
                }
            }

            tracing::debug!(owner_id = %query.owner_id, "Standing query closed");
        });

        Ok(rx)
    }
}
