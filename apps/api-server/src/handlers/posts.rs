//! Post handlers. Every route is scoped to the calling owner.

use actix_web::{HttpResponse, web};

use nichofy_core::domain::{
    Cursor, NewPost, Post, PostFilters, PostPage, PostPatch, PostQuery, PostSort, PostStats,
    SortDirection, SortField,
};
use nichofy_shared::ApiResponse;
use nichofy_shared::dto::{
    CreatePostRequest, CreatedResponse, FavoriteResponse, ListPostsParams, PostPageResponse,
    PostResponse, PostStatsResponse,
};

use crate::config::PageConfig;
use crate::middleware::error::{AppError, AppResult};
use crate::middleware::owner::Owner;
use crate::state::AppState;

/// Translate query-string parameters into a repository query.
pub(crate) fn build_query(params: ListPostsParams, pages: &PageConfig) -> AppResult<PostQuery> {
    let field = params
        .sort
        .as_deref()
        .map(str::parse::<SortField>)
        .transpose()?
        .unwrap_or_default();
    let direction = params
        .direction
        .as_deref()
        .map(str::parse::<SortDirection>)
        .transpose()?
        .unwrap_or_default();

    let filters = PostFilters {
        niche: params.niche,
        category: params.category,
        is_favorite: params.favorite,
        search_term: params.search,
    };

    let mut query = PostQuery::new(filters)
        .sorted(PostSort::new(field, direction))
        .page_size(pages.resolve(params.page_size));
    query.cursor = params.cursor.filter(|c| !c.is_empty()).map(Cursor::new);
    Ok(query)
}

pub(crate) fn post_response(post: Post) -> PostResponse {
    PostResponse {
        id: post.id,
        owner_id: post.owner_id,
        title: post.title,
        body: post.body,
        prompt_text: post.prompt_text,
        image_ref: post.image_ref,
        category: post.category,
        niche: post.niche,
        is_favorite: post.is_favorite,
        created_at: post.created_at.to_rfc3339(),
        updated_at: post.updated_at.to_rfc3339(),
        tags: post.tags,
    }
}

pub(crate) fn page_response(page: PostPage) -> PostPageResponse {
    PostPageResponse {
        posts: page.posts.into_iter().map(post_response).collect(),
        next_cursor: page.next_cursor.map(|c| c.as_str().to_string()),
    }
}

fn stats_response(stats: PostStats) -> PostStatsResponse {
    PostStatsResponse {
        total: stats.total,
        favorites: stats.favorites,
        by_niche: stats.by_niche,
        by_category: stats.by_category,
    }
}

/// Load a post and check it belongs to `owner`. Someone else's post is
/// reported exactly like a missing one.
async fn owned_post(state: &AppState, owner: &Owner, id: &str) -> AppResult<Post> {
    match state.posts.get(id).await? {
        Some(post) if post.owner_id == owner.as_str() => Ok(post),
        _ => Err(AppError::NotFound(format!("post {} not found", id))),
    }
}

/// GET /api/posts
pub async fn list(
    state: web::Data<AppState>,
    owner: Owner,
    params: web::Query<ListPostsParams>,
) -> AppResult<HttpResponse> {
    let query = build_query(params.into_inner(), &state.pages)?;
    let page = state.posts.list(owner.as_str(), &query).await?;

    Ok(HttpResponse::Ok().json(ApiResponse::ok(page_response(page))))
}

/// GET /api/posts/stats
pub async fn stats(state: web::Data<AppState>, owner: Owner) -> AppResult<HttpResponse> {
    let stats = state.posts.stats(owner.as_str()).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(stats_response(stats))))
}

/// GET /api/posts/{id}
pub async fn get(
    state: web::Data<AppState>,
    owner: Owner,
    path: web::Path<String>,
) -> AppResult<HttpResponse> {
    let post = owned_post(&state, &owner, &path).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(post_response(post))))
}

/// POST /api/posts
pub async fn create(
    state: web::Data<AppState>,
    owner: Owner,
    body: web::Json<CreatePostRequest>,
) -> AppResult<HttpResponse> {
    let req = body.into_inner();
    let data = NewPost {
        title: req.title,
        body: req.body,
        prompt_text: req.prompt_text,
        image_ref: req.image_ref,
        category: req.category,
        niche: req.niche,
        is_favorite: req.is_favorite,
        tags: req.tags,
    };
    data.validate()?;

    let id = state.posts.create(owner.as_str(), data).await?;
    Ok(HttpResponse::Created().json(ApiResponse::ok(CreatedResponse { id })))
}

/// PATCH /api/posts/{id}
pub async fn update(
    state: web::Data<AppState>,
    owner: Owner,
    path: web::Path<String>,
    body: web::Json<PostPatch>,
) -> AppResult<HttpResponse> {
    let patch = body.into_inner();
    patch.validate()?;

    owned_post(&state, &owner, &path).await?;
    state.posts.update(&path, patch).await?;

    let post = owned_post(&state, &owner, &path).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(post_response(post))))
}

/// POST /api/posts/{id}/favorite
pub async fn toggle_favorite(
    state: web::Data<AppState>,
    owner: Owner,
    path: web::Path<String>,
) -> AppResult<HttpResponse> {
    owned_post(&state, &owner, &path).await?;
    let is_favorite = state.posts.toggle_favorite(&path).await?;

    Ok(HttpResponse::Ok().json(ApiResponse::ok(FavoriteResponse {
        id: path.into_inner(),
        is_favorite,
    })))
}

/// DELETE /api/posts/{id}
pub async fn delete(
    state: web::Data<AppState>,
    owner: Owner,
    path: web::Path<String>,
) -> AppResult<HttpResponse> {
    owned_post(&state, &owner, &path).await?;
    state.posts.delete(&path).await?;
    Ok(HttpResponse::NoContent().finish())
}
