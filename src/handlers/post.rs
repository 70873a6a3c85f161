use crate::error::{AppError, AppResult};
use crate::middleware::MaybeViewer;
use crate::models::PostModel;
use crate::response::{ApiResponse, PaginatedResponse, PaginationQuery};
use crate::services::audit::{action, AuditLog};
use crate::services::cache::CacheService;
use crate::services::interaction::InteractionService;
use crate::services::post::{PostListFilter, PostService};
use crate::services::visibility::{AuthorDirectory, AuthorView, ViewerContext};
use crate::utils::{excerpt, render_markdown};
use axum::{extract::Path, extract::Query, response::IntoResponse, Extension, Json};
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

const EXCERPT_CHARS: usize = 200;

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreatePostRequest {
    pub category_id: i32,
    /// Post title (1-200 characters)
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    /// Post content (Markdown supported)
    #[validate(length(min = 1, max = 50000))]
    pub content: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdatePostRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(length(min = 1, max = 50000))]
    pub content: String,
}

/// Full post, as returned by the detail and write endpoints.
#[derive(Debug, Serialize, ToSchema)]
pub struct PostResponse {
    pub id: i32,
    pub author: AuthorView,
    pub category_id: i32,
    pub title: String,
    /// Post content (Markdown)
    pub content: String,
    /// Rendered, sanitized HTML
    pub content_html: String,
    pub view_count: i32,
    pub like_count: i32,
    pub comment_count: i32,
    pub favorite_count: i32,
    pub is_pinned: bool,
    pub is_locked: bool,
    /// Null for anonymous callers
    pub is_liked: Option<bool>,
    pub is_favorited: Option<bool>,
    pub created_at: String,
    pub updated_at: String,
}

impl PostResponse {
    pub fn new(p: PostModel, author: AuthorView) -> Self {
        let content_html = render_markdown(&p.content);
        Self {
            id: p.id,
            author,
            category_id: p.category_id,
            title: p.title,
            content: p.content,
            content_html,
            view_count: p.view_count,
            like_count: p.like_count,
            comment_count: p.comment_count,
            favorite_count: p.favorite_count,
            is_pinned: p.is_pinned,
            is_locked: p.is_locked,
            is_liked: None,
            is_favorited: None,
            created_at: p.created_at.to_string(),
            updated_at: p.updated_at.to_string(),
        }
    }
}

/// List entry: plain-text excerpt instead of the body.
#[derive(Debug, Serialize, ToSchema)]
pub struct PostSummary {
    pub id: i32,
    pub author: AuthorView,
    pub category_id: i32,
    pub title: String,
    pub excerpt: String,
    pub view_count: i32,
    pub like_count: i32,
    pub comment_count: i32,
    pub favorite_count: i32,
    pub is_pinned: bool,
    pub is_locked: bool,
    pub created_at: String,
}

impl PostSummary {
    fn new(p: PostModel, author: AuthorView) -> Self {
        Self {
            id: p.id,
            author,
            category_id: p.category_id,
            excerpt: excerpt(&p.content, EXCERPT_CHARS),
            title: p.title,
            view_count: p.view_count,
            like_count: p.like_count,
            comment_count: p.comment_count,
            favorite_count: p.favorite_count,
            is_pinned: p.is_pinned,
            is_locked: p.is_locked,
            created_at: p.created_at.to_string(),
        }
    }
}

/// Mask authors for a page of posts with two queries in total.
pub(crate) async fn summarize_posts(
    db: &DatabaseConnection,
    posts: Vec<PostModel>,
) -> AppResult<Vec<PostSummary>> {
    let directory = AuthorDirectory::load(
        db,
        posts.iter().map(|p| p.author_id),
        posts.iter().map(|p| p.category_id),
    )
    .await?;
    Ok(posts
        .into_iter()
        .map(|p| {
            let author = directory.author(p.author_id, p.category_id);
            PostSummary::new(p, author)
        })
        .collect())
}

pub(crate) async fn present_post(db: &DatabaseConnection, post: PostModel) -> AppResult<PostResponse> {
    let directory = AuthorDirectory::load(db, [post.author_id], [post.category_id]).await?;
    let author = directory.author(post.author_id, post.category_id);
    Ok(PostResponse::new(post, author))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct PostListQuery {
    pub page: Option<u64>,
    pub per_page: Option<u64>,
    pub category_id: Option<i32>,
    pub author_id: Option<i32>,
}

#[utoipa::path(
    get,
    path = "/api/v1/posts",
    params(
        ("page" = Option<u64>, Query, description = "Page number"),
        ("per_page" = Option<u64>, Query, description = "Items per page"),
        ("category_id" = Option<i32>, Query, description = "Filter by category"),
        ("author_id" = Option<i32>, Query, description = "Filter by author"),
    ),
    responses(
        (status = 200, description = "List of posts", body = PaginatedResponse<PostSummary>),
    ),
    tag = "posts"
)]
pub async fn list_posts(
    Extension(db): Extension<DatabaseConnection>,
    Query(params): Query<PostListQuery>,
) -> AppResult<impl IntoResponse> {
    let (page, per_page) = PaginationQuery {
        page: params.page,
        per_page: params.per_page,
    }
    .resolve();

    let filter = PostListFilter {
        category_id: params.category_id,
        author_id: params.author_id,
    };
    let (posts, total) = PostService::new(db.clone())
        .list(filter, page, per_page)
        .await?;
    let items = summarize_posts(&db, posts).await?;

    Ok(ApiResponse::ok(PaginatedResponse::new(
        items, total, page, per_page,
    )))
}

#[utoipa::path(
    get,
    path = "/api/v1/posts/{id}",
    params(("id" = i32, Path, description = "Post ID")),
    responses(
        (status = 200, description = "Post details", body = PostResponse),
        (status = 404, description = "Post not found", body = AppError),
    ),
    tag = "posts"
)]
pub async fn get_post(
    Extension(db): Extension<DatabaseConnection>,
    MaybeViewer(viewer): MaybeViewer,
    Path(id): Path<i32>,
) -> AppResult<impl IntoResponse> {
    let post = PostService::new(db.clone()).view(id).await?;
    let mut response = present_post(&db, post).await?;

    if let Some(v) = viewer {
        let (liked, favorited) = InteractionService::new(db)
            .post_flags(v.user_id, id)
            .await?;
        response.is_liked = Some(liked);
        response.is_favorited = Some(favorited);
    }

    Ok(ApiResponse::ok(response))
}

#[utoipa::path(
    post,
    path = "/api/v1/posts",
    security(("jwt_token" = [])),
    request_body = CreatePostRequest,
    responses(
        (status = 200, description = "Post created", body = PostResponse),
        (status = 400, description = "Validation error", body = AppError),
        (status = 401, description = "Unauthorized", body = AppError),
    ),
    tag = "posts"
)]
pub async fn create_post(
    Extension(db): Extension<DatabaseConnection>,
    cache: Option<Extension<CacheService>>,
    viewer: ViewerContext,
    Json(payload): Json<CreatePostRequest>,
) -> AppResult<impl IntoResponse> {
    payload
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let post = PostService::new(db.clone())
        .with_cache(cache.map(|c| c.0))
        .create(
            viewer.user_id,
            payload.category_id,
            payload.title.trim(),
            &payload.content,
        )
        .await?;

    Ok(ApiResponse::ok(present_post(&db, post).await?))
}

#[utoipa::path(
    put,
    path = "/api/v1/posts/{id}",
    security(("jwt_token" = [])),
    params(("id" = i32, Path, description = "Post ID")),
    request_body = UpdatePostRequest,
    responses(
        (status = 200, description = "Post updated", body = PostResponse),
        (status = 403, description = "Not the author", body = AppError),
        (status = 404, description = "Post not found", body = AppError),
    ),
    tag = "posts"
)]
pub async fn update_post(
    Extension(db): Extension<DatabaseConnection>,
    viewer: ViewerContext,
    Path(id): Path<i32>,
    Json(payload): Json<UpdatePostRequest>,
) -> AppResult<impl IntoResponse> {
    payload
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let post = PostService::new(db.clone())
        .update(&viewer, id, payload.title.trim(), &payload.content)
        .await?;

    Ok(ApiResponse::ok(present_post(&db, post).await?))
}

#[utoipa::path(
    delete,
    path = "/api/v1/posts/{id}",
    security(("jwt_token" = [])),
    params(("id" = i32, Path, description = "Post ID")),
    responses(
        (status = 200, description = "Post moved to trash", body = String),
        (status = 403, description = "Not the author", body = AppError),
        (status = 404, description = "Post not found or already deleted", body = AppError),
    ),
    tag = "posts"
)]
pub async fn delete_post(
    Extension(db): Extension<DatabaseConnection>,
    cache: Option<Extension<CacheService>>,
    viewer: ViewerContext,
    Path(id): Path<i32>,
) -> AppResult<impl IntoResponse> {
    let post = PostService::new(db.clone())
        .with_cache(cache.map(|c| c.0))
        .soft_delete(&viewer, id)
        .await?;

    if post.author_id != viewer.user_id {
        AuditLog::new(db).record(
            viewer.user_id,
            action::DELETE_POST,
            "post",
            post.id,
            format!("moved post '{}' to trash", post.title),
        );
    }
    Ok(ApiResponse::ok("Post deleted"))
}

#[utoipa::path(
    post,
    path = "/api/v1/posts/{id}/restore",
    security(("jwt_token" = [])),
    params(("id" = i32, Path, description = "Post ID")),
    responses(
        (status = 200, description = "Post restored", body = PostResponse),
        (status = 404, description = "Post not found or not deleted", body = AppError),
    ),
    tag = "posts"
)]
pub async fn restore_post(
    Extension(db): Extension<DatabaseConnection>,
    cache: Option<Extension<CacheService>>,
    viewer: ViewerContext,
    Path(id): Path<i32>,
) -> AppResult<impl IntoResponse> {
    let post = PostService::new(db.clone())
        .with_cache(cache.map(|c| c.0))
        .restore(&viewer, id)
        .await?;

    if post.author_id != viewer.user_id {
        AuditLog::new(db.clone()).record(
            viewer.user_id,
            action::RESTORE_POST,
            "post",
            post.id,
            format!("restored post '{}'", post.title),
        );
    }
    Ok(ApiResponse::ok(present_post(&db, post).await?))
}

#[utoipa::path(
    put,
    path = "/api/v1/posts/{id}/pin",
    security(("jwt_token" = [])),
    params(("id" = i32, Path, description = "Post ID")),
    responses(
        (status = 200, description = "Post pin toggled", body = PostResponse),
        (status = 403, description = "Admin only", body = AppError),
    ),
    tag = "posts"
)]
pub async fn pin_post(
    Extension(db): Extension<DatabaseConnection>,
    viewer: ViewerContext,
    Path(id): Path<i32>,
) -> AppResult<impl IntoResponse> {
    viewer.ensure_admin()?;

    let post = PostService::new(db.clone()).toggle_pin(id).await?;
    AuditLog::new(db.clone()).record(
        viewer.user_id,
        action::PIN_POST,
        "post",
        post.id,
        if post.is_pinned { "pinned" } else { "unpinned" },
    );
    Ok(ApiResponse::ok(present_post(&db, post).await?))
}

#[utoipa::path(
    put,
    path = "/api/v1/posts/{id}/lock",
    security(("jwt_token" = [])),
    params(("id" = i32, Path, description = "Post ID")),
    responses(
        (status = 200, description = "Post lock toggled", body = PostResponse),
        (status = 403, description = "Admin only", body = AppError),
    ),
    tag = "posts"
)]
pub async fn lock_post(
    Extension(db): Extension<DatabaseConnection>,
    viewer: ViewerContext,
    Path(id): Path<i32>,
) -> AppResult<impl IntoResponse> {
    viewer.ensure_admin()?;

    let post = PostService::new(db.clone()).toggle_lock(id).await?;
    AuditLog::new(db.clone()).record(
        viewer.user_id,
        action::LOCK_POST,
        "post",
        post.id,
        if post.is_locked { "locked" } else { "unlocked" },
    );
    Ok(ApiResponse::ok(present_post(&db, post).await?))
}
