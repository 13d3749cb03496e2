//! Data Transfer Objects - request/response types for the post API.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Query string accepted by the list and live endpoints.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListPostsParams {
    pub niche: Option<String>,
    pub category: Option<String>,
    pub favorite: Option<bool>,
    pub search: Option<String>,
    /// `createdAt`, `title`, `category` or `niche`.
    pub sort: Option<String>,
    /// `asc` or `desc`.
    pub direction: Option<String>,
    pub page_size: Option<usize>,
    pub cursor: Option<String>,
}

/// Request to create a post.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePostRequest {
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

/// Response to a successful create.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatedResponse {
    pub id: String,
}

/// A post as rendered by the dashboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostResponse {
    pub id: String,
    pub owner_id: String,
    pub title: String,
    pub body: String,
    pub prompt_text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_ref: Option<String>,
    pub category: String,
    pub niche: String,
    pub is_favorite: bool,
    pub created_at: String,
    pub updated_at: String,
    pub tags: Vec<String>,
}

/// One page of posts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostPageResponse {
    pub posts: Vec<PostResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}

/// New favorite state after a toggle.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FavoriteResponse {
    pub id: String,
    pub is_favorite: bool,
}

/// Dashboard summary counts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostStatsResponse {
    pub total: usize,
    pub favorites: usize,
    pub by_niche: BTreeMap<String, usize>,
    pub by_category: BTreeMap<String, usize>,
}
