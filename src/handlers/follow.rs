use crate::error::{AppError, AppResult};
use crate::handlers::user::UserSummary;
use crate::middleware::MaybeViewer;
use crate::response::{ApiResponse, PaginatedResponse, PaginationQuery};
use crate::services::follow::{FollowOutcome, FollowService};
use crate::services::notification::{kind, NewNotification, NotificationService};
use crate::services::visibility::ViewerContext;
use crate::websocket::hub::PushHub;
use axum::{extract::Path, extract::Query, response::IntoResponse, Extension};
use sea_orm::DatabaseConnection;
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Debug, Serialize, ToSchema)]
pub struct FollowResponse {
    pub is_following: bool,
    /// Followers of the target after this request
    pub follower_count: u64,
}

impl From<FollowOutcome> for FollowResponse {
    fn from(o: FollowOutcome) -> Self {
        Self {
            is_following: o.following,
            follower_count: o.follower_count,
        }
    }
}

#[utoipa::path(
    post,
    path = "/api/v1/users/{id}/follow",
    security(("jwt_token" = [])),
    params(("id" = i32, Path, description = "User to follow")),
    responses(
        (status = 200, description = "Now following", body = FollowResponse),
        (status = 400, description = "Cannot follow yourself", body = AppError),
        (status = 403, description = "Target account is not active", body = AppError),
        (status = 404, description = "User not found", body = AppError),
        (status = 409, description = "ALREADY_ACTIVE", body = AppError),
    ),
    tag = "follows"
)]
pub async fn follow_user(
    Extension(db): Extension<DatabaseConnection>,
    Extension(hub): Extension<PushHub>,
    viewer: ViewerContext,
    Path(id): Path<i32>,
) -> AppResult<impl IntoResponse> {
    let outcome = FollowService::new(db.clone())
        .follow(&viewer, id)
        .await?;

    NotificationService::new(db, hub)
        .notify_best_effort(NewNotification {
            user_id: id,
            actor_id: viewer.user_id,
            kind: kind::FOLLOW,
            target_type: "user",
            target_id: viewer.user_id,
            message: "started following you",
            actor_hidden: false,
        })
        .await;

    Ok(ApiResponse::ok(FollowResponse::from(outcome)))
}

#[utoipa::path(
    delete,
    path = "/api/v1/users/{id}/follow",
    security(("jwt_token" = [])),
    params(("id" = i32, Path, description = "User to unfollow")),
    responses(
        (status = 200, description = "No longer following", body = FollowResponse),
        (status = 400, description = "Cannot unfollow yourself", body = AppError),
        (status = 404, description = "User not found", body = AppError),
        (status = 409, description = "NOT_ACTIVE", body = AppError),
    ),
    tag = "follows"
)]
pub async fn unfollow_user(
    Extension(db): Extension<DatabaseConnection>,
    viewer: ViewerContext,
    Path(id): Path<i32>,
) -> AppResult<impl IntoResponse> {
    let outcome = FollowService::new(db).unfollow(&viewer, id).await?;
    Ok(ApiResponse::ok(FollowResponse::from(outcome)))
}

#[utoipa::path(
    get,
    path = "/api/v1/users/{id}/followers",
    params(
        ("id" = i32, Path, description = "User ID"),
        ("page" = Option<u64>, Query, description = "Page number"),
        ("per_page" = Option<u64>, Query, description = "Items per page"),
    ),
    responses(
        (status = 200, description = "Followers", body = PaginatedResponse<UserSummary>),
    ),
    tag = "follows"
)]
pub async fn list_followers(
    Extension(db): Extension<DatabaseConnection>,
    MaybeViewer(viewer): MaybeViewer,
    Path(id): Path<i32>,
    Query(params): Query<PaginationQuery>,
) -> AppResult<impl IntoResponse> {
    let (page, per_page) = params.resolve();
    let (users, total) = FollowService::new(db)
        .list_followers(viewer.as_ref(), id, page, per_page)
        .await?;
    let items: Vec<UserSummary> = users.into_iter().map(UserSummary::from).collect();

    Ok(ApiResponse::ok(PaginatedResponse::new(
        items, total, page, per_page,
    )))
}

#[utoipa::path(
    get,
    path = "/api/v1/users/{id}/following",
    params(
        ("id" = i32, Path, description = "User ID"),
        ("page" = Option<u64>, Query, description = "Page number"),
        ("per_page" = Option<u64>, Query, description = "Items per page"),
    ),
    responses(
        (status = 200, description = "Followed users", body = PaginatedResponse<UserSummary>),
    ),
    tag = "follows"
)]
pub async fn list_following(
    Extension(db): Extension<DatabaseConnection>,
    MaybeViewer(viewer): MaybeViewer,
    Path(id): Path<i32>,
    Query(params): Query<PaginationQuery>,
) -> AppResult<impl IntoResponse> {
    let (page, per_page) = params.resolve();
    let (users, total) = FollowService::new(db)
        .list_following(viewer.as_ref(), id, page, per_page)
        .await?;
    let items: Vec<UserSummary> = users.into_iter().map(UserSummary::from).collect();

    Ok(ApiResponse::ok(PaginatedResponse::new(
        items, total, page, per_page,
    )))
}
