//! Live subscriptions - push the owner's current posts to a view on every change.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::task::JoinHandle;

use nichofy_core::RepoError;
use nichofy_core::domain::{Post, PostQuery};
use nichofy_core::ports::{DocumentStore, StoreQuery};

type UpdateHandler = Box<dyn Fn(Vec<Post>) + Send + Sync>;
type ErrorHandler = Box<dyn Fn(RepoError) + Send + Sync>;

/// Opens standing queries against the document store.
pub struct LiveSubscriptions {
    store: Arc<dyn DocumentStore>,
}

impl LiveSubscriptions {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Subscribe to the owner's posts matching `query`.
    ///
    /// `on_update` receives the full result set, search applied, first for
    /// the current state and then after every change to it. The query's
    /// cursor is ignored. Transport errors end the subscription and are
    /// logged.
    pub async fn subscribe<F>(
        &self,
        owner_id: &str,
        query: &PostQuery,
        on_update: F,
    ) -> Result<Subscription, RepoError>
    where
        F: Fn(Vec<Post>) + Send + Sync + 'static,
    {
        self.start(owner_id, query, Box::new(on_update), None).await
    }

    /// Like [`subscribe`](Self::subscribe), with transport errors handed to
    /// `on_error` instead of the log. The caller decides whether to
    /// resubscribe.
    pub async fn subscribe_with_errors<F, E>(
        &self,
        owner_id: &str,
        query: &PostQuery,
        on_update: F,
        on_error: E,
    ) -> Result<Subscription, RepoError>
    where
        F: Fn(Vec<Post>) + Send + Sync + 'static,
        E: Fn(RepoError) + Send + Sync + 'static,
    {
        self.start(owner_id, query, Box::new(on_update), Some(Box::new(on_error)))
            .await
    }

    async fn start(
        &self,
        owner_id: &str,
        query: &PostQuery,
        on_update: UpdateHandler,
        on_error: Option<ErrorHandler>,
    ) -> Result<Subscription, RepoError> {
        let store_query =
            StoreQuery::scoped(owner_id, &query.filters, query.sort).limit(query.page_size);
        let mut snapshots = self.store.watch(store_query).await?;

        let active = Arc::new(AtomicBool::new(true));
        let filters = query.filters.clone();
        let owner = owner_id.to_string();

        let task = tokio::spawn({
            let active = active.clone();
            async move {
                tracing::info!(owner_id = %owner, "Live subscription started");

                while let Some(snapshot) = snapshots.recv().await {
                    if !active.load(Ordering::Acquire) {
                        break;
                    }

                    match snapshot {
                        Ok(mut posts) => {
                            filters.apply_search(&mut posts);
                            on_update(posts);
                        }
                        Err(e) => {
                            active.store(false, Ordering::Release);
                            match &on_error {
                                Some(handler) => handler(e),
                                None => tracing::warn!(
                                    owner_id = %owner,
                                    error = %e,
                                    "Live subscription failed"
                                ),
                            }
                            break;
                        }
                    }
                }

                active.store(false, Ordering::Release);
                tracing::debug!(owner_id = %owner, "Live subscription ended");
            }
        });

        Ok(Subscription {
            owner_id: owner_id.to_string(),
            active,
            task: Mutex::new(Some(task)),
        })
    }
}

/// Handle to one live subscription. Dropping it detaches the listener.
pub struct Subscription {
    owner_id: String,
    active: Arc<AtomicBool>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl Subscription {
    /// Whether snapshots can still arrive.
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    pub fn owner_id(&self) -> &str {
        &self.owner_id
    }

    /// Detach the listener. Once this returns no further `on_update` call
    /// happens. Calling it again is a no-op.
    pub async fn unsubscribe(&self) {
        self.active.store(false, Ordering::Release);

        let task = self.task.lock().ok().and_then(|mut task| task.take());
        if let Some(task) = task {
            task.abort();
            // Wait out a delivery that was already running.
            let _ = task.await;
            tracing::info!(owner_id = %self.owner_id, "Live subscription cancelled");
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.active.store(false, Ordering::Release);
        if let Ok(task) = self.task.get_mut() {
            if let Some(task) = task.take() {
                task.abort();
            }
        }
    }
}
