use crate::error::{AppError, AppResult};
use crate::handlers::post::{summarize_posts, PostSummary};
use crate::models::LikeTarget;
use crate::response::{ApiResponse, PaginatedResponse, PaginationQuery};
use crate::services::interaction::{InteractionService, ToggleOutcome};
use crate::services::notification::{kind, NewNotification, NotificationService};
use crate::services::visibility::ViewerContext;
use crate::websocket::hub::PushHub;
use axum::{extract::Path, extract::Query, response::IntoResponse, Extension};
use sea_orm::DatabaseConnection;
use serde::Serialize;
use utoipa::ToSchema;

/// The count is the value written by this request; clients should display
/// it rather than adjust their own copy.
#[derive(Debug, Serialize, ToSchema)]
pub struct LikeResponse {
    pub is_liked: bool,
    pub like_count: i32,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct FavoriteResponse {
    pub is_favorited: bool,
    pub favorite_count: i32,
}

impl From<ToggleOutcome> for LikeResponse {
    fn from(o: ToggleOutcome) -> Self {
        Self {
            is_liked: o.active,
            like_count: o.count,
        }
    }
}

impl From<ToggleOutcome> for FavoriteResponse {
    fn from(o: ToggleOutcome) -> Self {
        Self {
            is_favorited: o.active,
            favorite_count: o.count,
        }
    }
}

/// Notification for the owner of the liked or favorited content.
fn owner_notification<'a>(
    viewer: &ViewerContext,
    outcome: &ToggleOutcome,
    kind: &'a str,
    target_type: &'a str,
    target_id: i32,
    message: &'a str,
) -> NewNotification<'a> {
    NewNotification {
        user_id: outcome.target.owner_id,
        actor_id: viewer.user_id,
        kind,
        target_type,
        target_id,
        message,
        actor_hidden: outcome.target.anonymous,
    }
}

#[utoipa::path(
    post,
    path = "/api/v1/posts/{id}/like",
    security(("jwt_token" = [])),
    params(("id" = i32, Path, description = "Post ID")),
    responses(
        (status = 200, description = "Post liked", body = LikeResponse),
        (status = 404, description = "Post not found", body = AppError),
        (status = 409, description = "ALREADY_ACTIVE", body = AppError),
    ),
    tag = "interactions"
)]
pub async fn like_post(
    Extension(db): Extension<DatabaseConnection>,
    Extension(hub): Extension<PushHub>,
    viewer: ViewerContext,
    Path(id): Path<i32>,
) -> AppResult<impl IntoResponse> {
    let outcome = InteractionService::new(db.clone())
        .like(viewer.user_id, LikeTarget::Post, id)
        .await?;
    NotificationService::new(db, hub)
        .notify_best_effort(owner_notification(
            &viewer,
            &outcome,
            kind::LIKE_POST,
            "post",
            id,
            "liked your post",
        ))
        .await;
    Ok(ApiResponse::ok(LikeResponse::from(outcome)))
}

#[utoipa::path(
    delete,
    path = "/api/v1/posts/{id}/like",
    security(("jwt_token" = [])),
    params(("id" = i32, Path, description = "Post ID")),
    responses(
        (status = 200, description = "Like removed", body = LikeResponse),
        (status = 404, description = "Post not found", body = AppError),
        (status = 409, description = "NOT_ACTIVE", body = AppError),
    ),
    tag = "interactions"
)]
pub async fn unlike_post(
    Extension(db): Extension<DatabaseConnection>,
    viewer: ViewerContext,
    Path(id): Path<i32>,
) -> AppResult<impl IntoResponse> {
    let outcome = InteractionService::new(db)
        .unlike(viewer.user_id, LikeTarget::Post, id)
        .await?;
    Ok(ApiResponse::ok(LikeResponse::from(outcome)))
}

#[utoipa::path(
    post,
    path = "/api/v1/comments/{id}/like",
    security(("jwt_token" = [])),
    params(("id" = i32, Path, description = "Comment ID")),
    responses(
        (status = 200, description = "Comment liked", body = LikeResponse),
        (status = 404, description = "Comment not found", body = AppError),
        (status = 409, description = "ALREADY_ACTIVE", body = AppError),
    ),
    tag = "interactions"
)]
pub async fn like_comment(
    Extension(db): Extension<DatabaseConnection>,
    Extension(hub): Extension<PushHub>,
    viewer: ViewerContext,
    Path(id): Path<i32>,
) -> AppResult<impl IntoResponse> {
    let outcome = InteractionService::new(db.clone())
        .like(viewer.user_id, LikeTarget::Comment, id)
        .await?;
    NotificationService::new(db, hub)
        .notify_best_effort(owner_notification(
            &viewer,
            &outcome,
            kind::LIKE_COMMENT,
            "comment",
            id,
            "liked your comment",
        ))
        .await;
    Ok(ApiResponse::ok(LikeResponse::from(outcome)))
}

#[utoipa::path(
    delete,
    path = "/api/v1/comments/{id}/like",
    security(("jwt_token" = [])),
    params(("id" = i32, Path, description = "Comment ID")),
    responses(
        (status = 200, description = "Like removed", body = LikeResponse),
        (status = 404, description = "Comment not found", body = AppError),
        (status = 409, description = "NOT_ACTIVE", body = AppError),
    ),
    tag = "interactions"
)]
pub async fn unlike_comment(
    Extension(db): Extension<DatabaseConnection>,
    viewer: ViewerContext,
    Path(id): Path<i32>,
) -> AppResult<impl IntoResponse> {
    let outcome = InteractionService::new(db)
        .unlike(viewer.user_id, LikeTarget::Comment, id)
        .await?;
    Ok(ApiResponse::ok(LikeResponse::from(outcome)))
}

#[utoipa::path(
    post,
    path = "/api/v1/posts/{id}/favorite",
    security(("jwt_token" = [])),
    params(("id" = i32, Path, description = "Post ID")),
    responses(
        (status = 200, description = "Post favorited", body = FavoriteResponse),
        (status = 404, description = "Post not found", body = AppError),
        (status = 409, description = "ALREADY_ACTIVE", body = AppError),
    ),
    tag = "interactions"
)]
pub async fn favorite_post(
    Extension(db): Extension<DatabaseConnection>,
    Extension(hub): Extension<PushHub>,
    viewer: ViewerContext,
    Path(id): Path<i32>,
) -> AppResult<impl IntoResponse> {
    let outcome = InteractionService::new(db.clone())
        .favorite(viewer.user_id, id)
        .await?;
    NotificationService::new(db, hub)
        .notify_best_effort(owner_notification(
            &viewer,
            &outcome,
            kind::FAVORITE_POST,
            "post",
            id,
            "saved your post to favorites",
        ))
        .await;
    Ok(ApiResponse::ok(FavoriteResponse::from(outcome)))
}

#[utoipa::path(
    delete,
    path = "/api/v1/posts/{id}/favorite",
    security(("jwt_token" = [])),
    params(("id" = i32, Path, description = "Post ID")),
    responses(
        (status = 200, description = "Favorite removed", body = FavoriteResponse),
        (status = 404, description = "Post not found", body = AppError),
        (status = 409, description = "NOT_ACTIVE", body = AppError),
    ),
    tag = "interactions"
)]
pub async fn unfavorite_post(
    Extension(db): Extension<DatabaseConnection>,
    viewer: ViewerContext,
    Path(id): Path<i32>,
) -> AppResult<impl IntoResponse> {
    let outcome = InteractionService::new(db)
        .unfavorite(viewer.user_id, id)
        .await?;
    Ok(ApiResponse::ok(FavoriteResponse::from(outcome)))
}

#[utoipa::path(
    get,
    path = "/api/v1/favorites",
    security(("jwt_token" = [])),
    params(
        ("page" = Option<u64>, Query, description = "Page number"),
        ("per_page" = Option<u64>, Query, description = "Items per page"),
    ),
    responses(
        (status = 200, description = "Favorited posts", body = PaginatedResponse<PostSummary>),
        (status = 401, description = "Unauthorized", body = AppError),
    ),
    tag = "interactions"
)]
pub async fn list_favorites(
    Extension(db): Extension<DatabaseConnection>,
    viewer: ViewerContext,
    Query(params): Query<PaginationQuery>,
) -> AppResult<impl IntoResponse> {
    let (page, per_page) = params.resolve();
    let (posts, total) = InteractionService::new(db.clone())
        .list_favorites(viewer.user_id, page, per_page)
        .await?;
    let items = summarize_posts(&db, posts).await?;

    Ok(ApiResponse::ok(PaginatedResponse::new(
        items, total, page, per_page,
    )))
}
