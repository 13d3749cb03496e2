//! Document store port - the managed database holding the post collection.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::mpsc;

use crate::domain::{Cursor, NewPost, Post, PostFilters, PostPage, PostPatch, PostSort};
use crate::error::RepoError;

/// Timestamp written with a document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TimestampValue {
    /// Let the store stamp its own current time.
    #[default]
    ServerTime,
    At(DateTime<Utc>),
}

/// Equality filter on a named post field.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FieldFilter {
    Niche(String),
    Category(String),
    IsFavorite(bool),
}

impl FieldFilter {
    pub fn field(&self) -> &'static str {
        match self {
            FieldFilter::Niche(_) => "niche",
            FieldFilter::Category(_) => "category",
            FieldFilter::IsFavorite(_) => "isFavorite",
        }
    }

    pub fn matches(&self, post: &Post) -> bool {
        match self {
            FieldFilter::Niche(niche) => &post.niche == niche,
            FieldFilter::Category(category) => &post.category == category,
            FieldFilter::IsFavorite(is_favorite) => post.is_favorite == *is_favorite,
        }
    }
}

/// A query the store executes: owner scope, equality filters, one order,
/// an optional limit and resume cursor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreQuery {
    pub owner_id: String,
    pub filters: Vec<FieldFilter>,
    pub order_by: PostSort,
    pub limit: Option<usize>,
    pub start_after: Option<Cursor>,
}

impl StoreQuery {
    /// Owner scope plus every declared equality filter. The free-text search
    /// term has no store counterpart and is dropped here.
    pub fn scoped(owner_id: impl Into<String>, filters: &PostFilters, order_by: PostSort) -> Self {
        let mut equals = Vec::new();
        if let Some(niche) = &filters.niche {
            equals.push(FieldFilter::Niche(niche.clone()));
        }
        if let Some(category) = &filters.category {
            equals.push(FieldFilter::Category(category.clone()));
        }
        if let Some(is_favorite) = filters.is_favorite {
            equals.push(FieldFilter::IsFavorite(is_favorite));
        }

        Self {
            owner_id: owner_id.into(),
            filters: equals,
            order_by,
            limit: None,
            start_after: None,
        }
    }

    pub fn limit(mut self, limit: Option<usize>) -> Self {
        self.limit = limit;
        self
    }

    pub fn start_after(mut self, cursor: Option<Cursor>) -> Self {
        self.start_after = cursor;
        self
    }

    pub fn matches(&self, post: &Post) -> bool {
        post.owner_id == self.owner_id && self.filters.iter().all(|f| f.matches(post))
    }
}

/// A new document as handed to the store.
#[derive(Debug, Clone, PartialEq)]
pub struct PostDocument {
    pub owner_id: String,
    pub data: NewPost,
    pub created_at: TimestampValue,
    pub updated_at: TimestampValue,
}

impl PostDocument {
    /// Both timestamps assigned by the store.
    pub fn server_stamped(owner_id: impl Into<String>, data: NewPost) -> Self {
        Self {
            owner_id: owner_id.into(),
            data,
            created_at: TimestampValue::ServerTime,
            updated_at: TimestampValue::ServerTime,
        }
    }
}

/// Push feed of full result sets for a standing query.
///
/// Each item is a complete, point-in-time snapshot. An `Err` item ends the feed.
pub type SnapshotStream = mpsc::Receiver<Result<Vec<Post>, RepoError>>;

/// Document store trait - abstraction over the managed post collection.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Execute a filtered, ordered, optionally paged query.
    async fn find(&self, query: &StoreQuery) -> Result<PostPage, RepoError>;

    /// Fetch one document by id.
    async fn get(&self, id: &str) -> Result<Option<Post>, RepoError>;

    /// Insert a document and return its store-assigned id.
    async fn insert(&self, document: PostDocument) -> Result<String, RepoError>;

    /// Partially update a document. Fails with `NotFound` if it is gone.
    async fn patch(
        &self,
        id: &str,
        patch: PostPatch,
        updated_at: TimestampValue,
    ) -> Result<(), RepoError>;

    /// Delete a document. Fails with `NotFound` if it is gone.
    async fn remove(&self, id: &str) -> Result<(), RepoError>;

    /// Open a standing query. The stream starts with the current result set
    /// and receives a new snapshot whenever that set changes.
    async fn watch(&self, query: StoreQuery) -> Result<SnapshotStream, RepoError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{SortDirection, SortField};

    #[test]
    fn scoped_query_drops_search_and_keeps_equality_filters() {
        let filters = PostFilters::default()
            .niche("Direito")
            .favorite(true)
            .search("dicas");
        let query = StoreQuery::scoped("owner-1", &filters, PostSort::asc(SortField::Title));

        assert_eq!(query.owner_id, "owner-1");
        assert_eq!(
            query.filters,
            vec![
                FieldFilter::Niche("Direito".to_string()),
                FieldFilter::IsFavorite(true)
            ]
        );
        assert_eq!(query.order_by.direction, SortDirection::Asc);
        assert_eq!(query.limit, None);
    }
}
