use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::DomainError;

/// Post entity - one piece of generated social-media content.
///
/// `id`, `owner_id` and `created_at` are fixed once the store has written the
/// document. Only the fields of [`PostPatch`] can change afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: String,
    pub owner_id: String,
    pub title: String,
    pub body: String,
    pub prompt_text: String,
    pub image_ref: Option<String>,
    pub category: String,
    pub niche: String,
    pub is_favorite: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl Post {
    /// Case-insensitive substring match against title, body and prompt text.
    pub fn matches_search(&self, term: &str) -> bool {
        let needle = term.to_lowercase();
        [&self.title, &self.body, &self.prompt_text]
            .iter()
            .any(|field| field.to_lowercase().contains(&needle))
    }

    /// Apply a partial update in place. Timestamps are left to the caller.
    pub fn apply(&mut self, patch: PostPatch) {
        if let Some(title) = patch.title {
            self.title = title;
        }
        if let Some(body) = patch.body {
            self.body = body;
        }
        if let Some(prompt_text) = patch.prompt_text {
            self.prompt_text = prompt_text;
        }
        if let Some(image_ref) = patch.image_ref {
            self.image_ref = image_ref;
        }
        if let Some(category) = patch.category {
            self.category = category;
        }
        if let Some(niche) = patch.niche {
            self.niche = niche;
        }
        if let Some(is_favorite) = patch.is_favorite {
            self.is_favorite = is_favorite;
        }
        if let Some(tags) = patch.tags {
            self.tags = tags;
        }
    }
}

/// Payload for creating a post. The store assigns id and timestamps.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPost {
    pub title: String,
    pub body: String,
    #[serde(default)]
    pub prompt_text: String,
    #[serde(default)]
    pub image_ref: Option<String>,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub niche: String,
    #[serde(default)]
    pub is_favorite: bool,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl NewPost {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
            ..Self::default()
        }
    }

    pub fn with_prompt(mut self, prompt_text: impl Into<String>) -> Self {
        self.prompt_text = prompt_text.into();
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    pub fn with_niche(mut self, niche: impl Into<String>) -> Self {
        self.niche = niche.into();
        self
    }

    pub fn favorite(mut self) -> Self {
        self.is_favorite = true;
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    /// Reject posts that would render as empty cards.
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.title.trim().is_empty() {
            return Err(DomainError::Validation("title must not be blank".to_string()));
        }
        if self.body.trim().is_empty() {
            return Err(DomainError::Validation("body must not be blank".to_string()));
        }
        Ok(())
    }
}

/// Partial update. `None` leaves a field untouched.
///
/// `image_ref` is doubly optional: `Some(None)` clears the image.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_text: Option<String>,
    #[serde(
        default,
        deserialize_with = "present_or_null",
        skip_serializing_if = "Option::is_none"
    )]
    pub image_ref: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub niche: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_favorite: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
}

impl PostPatch {
    /// Reject edits that would blank a field [`NewPost::validate`] requires.
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.title.as_deref().is_some_and(|t| t.trim().is_empty()) {
            return Err(DomainError::Validation("title must not be blank".to_string()));
        }
        if self.body.as_deref().is_some_and(|b| b.trim().is_empty()) {
            return Err(DomainError::Validation("body must not be blank".to_string()));
        }
        Ok(())
    }

    pub fn favorite(is_favorite: bool) -> Self {
        Self {
            is_favorite: Some(is_favorite),
            ..Self::default()
        }
    }

    pub fn content(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            body: Some(body.into()),
            ..Self::default()
        }
    }
}

// An explicit `null` means "clear", an absent key means "keep".
fn present_or_null<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Dashboard summary for one owner.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostStats {
    pub total: usize,
    pub favorites: usize,
    pub by_niche: BTreeMap<String, usize>,
    pub by_category: BTreeMap<String, usize>,
}

impl PostStats {
    pub fn from_posts<'a>(posts: impl IntoIterator<Item = &'a Post>) -> Self {
        let mut stats = Self::default();
        for post in posts {
            stats.total += 1;
            if post.is_favorite {
                stats.favorites += 1;
            }
            *stats.by_niche.entry(post.niche.clone()).or_default() += 1;
            *stats.by_category.entry(post.category.clone()).or_default() += 1;
        }
        stats
    }
}
