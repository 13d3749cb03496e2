//! Query vocabulary for listing posts: filters, sort order, pagination.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::post::Post;
use crate::error::DomainError;

/// Equality filters plus the client-side free-text search.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostFilters {
    pub niche: Option<String>,
    pub category: Option<String>,
    pub is_favorite: Option<bool>,
    pub search_term: Option<String>,
}

impl PostFilters {
    pub fn niche(mut self, niche: impl Into<String>) -> Self {
        self.niche = Some(niche.into());
        self
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn favorite(mut self, is_favorite: bool) -> Self {
        self.is_favorite = Some(is_favorite);
        self
    }

    pub fn search(mut self, term: impl Into<String>) -> Self {
        self.search_term = Some(term.into());
        self
    }

    /// The effective search term, as given. Blank terms do not filter.
    pub fn effective_search(&self) -> Option<&str> {
        self.search_term
            .as_deref()
            .filter(|term| !term.trim().is_empty())
    }

    /// Whether a post passes the equality filters (search excluded).
    pub fn matches(&self, post: &Post) -> bool {
        self.niche.as_ref().is_none_or(|niche| &post.niche == niche)
            && self
                .category
                .as_ref()
                .is_none_or(|category| &post.category == category)
            && self
                .is_favorite
                .is_none_or(|is_favorite| post.is_favorite == is_favorite)
    }

    /// Keep only the posts matching the search term, preserving order.
    pub fn apply_search(&self, posts: &mut Vec<Post>) {
        if let Some(term) = self.effective_search() {
            posts.retain(|post| post.matches_search(term));
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortField {
    #[default]
    CreatedAt,
    Title,
    Category,
    Niche,
}

impl SortField {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortField::CreatedAt => "createdAt",
            SortField::Title => "title",
            SortField::Category => "category",
            SortField::Niche => "niche",
        }
    }
}

impl fmt::Display for SortField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortField {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "createdAt" | "created_at" => Ok(SortField::CreatedAt),
            "title" => Ok(SortField::Title),
            "category" => Ok(SortField::Category),
            "niche" => Ok(SortField::Niche),
            other => Err(DomainError::Validation(format!(
                "unknown sort field: {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

impl FromStr for SortDirection {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "asc" => Ok(SortDirection::Asc),
            "desc" => Ok(SortDirection::Desc),
            other => Err(DomainError::Validation(format!(
                "unknown sort direction: {other}"
            ))),
        }
    }
}

/// The value a post is ordered by under a given [`SortField`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SortValue {
    Time(DateTime<Utc>),
    Text(String),
}

/// Sort order. Defaults to newest first.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PostSort {
    pub field: SortField,
    pub direction: SortDirection,
}

impl PostSort {
    pub fn new(field: SortField, direction: SortDirection) -> Self {
        Self { field, direction }
    }

    pub fn asc(field: SortField) -> Self {
        Self::new(field, SortDirection::Asc)
    }

    pub fn desc(field: SortField) -> Self {
        Self::new(field, SortDirection::Desc)
    }

    pub fn value_of(&self, post: &Post) -> SortValue {
        match self.field {
            SortField::CreatedAt => SortValue::Time(post.created_at),
            SortField::Title => SortValue::Text(post.title.clone()),
            SortField::Category => SortValue::Text(post.category.clone()),
            SortField::Niche => SortValue::Text(post.niche.clone()),
        }
    }

    /// Compare a `(value, id)` position under this order. Ties break on id
    /// in the same direction.
    pub fn compare_positions(&self, a: (&SortValue, &str), b: (&SortValue, &str)) -> Ordering {
        let ordering = a.0.cmp(b.0).then_with(|| a.1.cmp(b.1));
        match self.direction {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        }
    }

    pub fn compare(&self, a: &Post, b: &Post) -> Ordering {
        self.compare_positions(
            (&self.value_of(a), a.id.as_str()),
            (&self.value_of(b), b.id.as_str()),
        )
    }
}

/// Opaque token marking where a paginated query resumes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cursor(String);

impl Cursor {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Everything a `list` call needs besides the owner.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostQuery {
    pub filters: PostFilters,
    pub sort: PostSort,
    pub page_size: Option<usize>,
    pub cursor: Option<Cursor>,
}

impl PostQuery {
    pub fn new(filters: PostFilters) -> Self {
        Self {
            filters,
            ..Self::default()
        }
    }

    pub fn sorted(mut self, sort: PostSort) -> Self {
        self.sort = sort;
        self
    }

    pub fn page_size(mut self, page_size: usize) -> Self {
        self.page_size = Some(page_size);
        self
    }

    pub fn after(mut self, cursor: Cursor) -> Self {
        self.cursor = Some(cursor);
        self
    }

    pub fn is_first_page(&self) -> bool {
        self.cursor.is_none()
    }
}

/// One page of results.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostPage {
    pub posts: Vec<Post>,
    /// Present when more matching documents follow this page.
    pub next_cursor: Option<Cursor>,
}
