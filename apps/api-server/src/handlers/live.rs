//! Server-sent events feed backed by a live subscription.

use std::convert::Infallible;
use std::sync::Mutex;

use actix_web::http::header::{CACHE_CONTROL, CONTENT_TYPE};
use actix_web::{HttpResponse, web};
use serde::Serialize;
use tokio::sync::{oneshot, watch};

use nichofy_infra::Subscription;
use nichofy_shared::dto::ListPostsParams;

use super::posts::{build_query, post_response};
use crate::middleware::error::{AppError, AppResult};
use crate::middleware::owner::Owner;
use crate::state::AppState;

fn sse_event<T: Serialize>(event: &str, data: &T) -> web::Bytes {
    let json = serde_json::to_string(data).unwrap_or_else(|_| "null".to_string());
    web::Bytes::from(format!("event: {event}\ndata: {json}\n\n"))
}

/// Body state of one open feed. Only the newest undelivered snapshot is
/// kept, so a slow client skips intermediate states instead of queueing them.
struct LiveFeed {
    snapshots: watch::Receiver<Option<web::Bytes>>,
    error: Option<oneshot::Receiver<web::Bytes>>,
    _subscription: Subscription,
}

impl LiveFeed {
    async fn next_chunk(&mut self) -> Option<web::Bytes> {
        loop {
            if self.snapshots.changed().await.is_err() {
                // The subscription ended. A store error, if any, is the last event.
                return match self.error.take() {
                    Some(error) => error.await.ok(),
                    None => None,
                };
            }

            if let Some(chunk) = self.snapshots.borrow_and_update().clone() {
                return Some(chunk);
            }
        }
    }
}

/// GET /api/posts/live
///
/// Emits a `snapshot` event with the full result set on connect and after
/// every change, and a final `error` event if the store connection drops.
/// The subscription lives exactly as long as the response stream.
pub async fn live(
    state: web::Data<AppState>,
    owner: Owner,
    params: web::Query<ListPostsParams>,
) -> AppResult<HttpResponse> {
    let mut params = params.into_inner();
    params.cursor = None;
    let query = build_query(params, &state.pages)?;

    let (snapshot_tx, snapshots) = watch::channel(None);
    let (error_tx, error) = oneshot::channel();
    let error_tx = Mutex::new(Some(error_tx));

    let subscription = state
        .live
        .subscribe_with_errors(
            owner.as_str(),
            &query,
            move |posts| {
                let posts: Vec<_> = posts.into_iter().map(post_response).collect();
                snapshot_tx.send_replace(Some(sse_event("snapshot", &posts)));
            },
            move |err| {
                tracing::warn!(error = %err, "Live feed closed by store error");
                let chunk = sse_event("error", &AppError::from(err).problem());
                if let Some(tx) = error_tx.lock().ok().and_then(|mut tx| tx.take()) {
                    let _ = tx.send(chunk);
                }
            },
        )
        .await?;

    tracing::debug!(owner_id = %owner.as_str(), "Live feed opened");

    let feed = LiveFeed {
        snapshots,
        error: Some(error),
        _subscription: subscription,
    };
    let stream = futures::stream::unfold(feed, |mut feed| async move {
        feed.next_chunk()
            .await
            .map(|chunk| (Ok::<_, Infallible>(chunk), feed))
    });

    Ok(HttpResponse::Ok()
        .insert_header((CONTENT_TYPE, "text/event-stream"))
        .insert_header((CACHE_CONTROL, "no-cache"))
        .streaming(stream))
}
