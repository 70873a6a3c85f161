use crate::error::{AppError, AppResult};
use crate::middleware::MaybeViewer;
use crate::models::UserModel;
use crate::response::ApiResponse;
use crate::services::follow::FollowService;
use crate::services::user::UserService;
use crate::services::visibility::{find_visible_user, ViewerContext};
use axum::{extract::Path, response::IntoResponse, Extension, Json};
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

/// Public view of a user. Email and status stay private.
#[derive(Debug, Serialize, ToSchema)]
pub struct UserProfileResponse {
    pub id: i32,
    pub username: String,
    pub avatar_url: Option<String>,
    pub bio: Option<String>,
    pub role: String,
    pub follower_count: u64,
    pub following_count: u64,
    /// Whether the caller follows this user; null for anonymous callers
    pub is_following: Option<bool>,
    pub created_at: String,
}

/// Entry in follower/following lists.
#[derive(Debug, Serialize, ToSchema)]
pub struct UserSummary {
    pub id: i32,
    pub username: String,
    pub avatar_url: Option<String>,
}

impl From<UserModel> for UserSummary {
    fn from(u: UserModel) -> Self {
        Self {
            id: u.id,
            username: u.username,
            avatar_url: u.avatar_url,
        }
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateProfileRequest {
    #[validate(length(max = 500))]
    pub bio: Option<String>,
    #[validate(url, length(max = 500))]
    pub avatar_url: Option<String>,
}

#[utoipa::path(
    get,
    path = "/api/v1/users/{id}",
    params(("id" = i32, Path, description = "User ID")),
    responses(
        (status = 200, description = "User profile", body = UserProfileResponse),
        (status = 404, description = "User not found", body = AppError),
    ),
    tag = "users"
)]
pub async fn get_user_profile(
    Extension(db): Extension<DatabaseConnection>,
    MaybeViewer(viewer): MaybeViewer,
    Path(id): Path<i32>,
) -> AppResult<impl IntoResponse> {
    let user = find_visible_user(&db, viewer.as_ref(), id).await?;

    let follows = FollowService::new(db);
    let (follower_count, following_count) = follows.counts(user.id).await?;
    let is_following = match viewer {
        Some(v) => Some(follows.is_following(v.user_id, user.id).await?),
        None => None,
    };

    Ok(ApiResponse::ok(UserProfileResponse {
        id: user.id,
        username: user.username,
        avatar_url: user.avatar_url,
        bio: user.bio,
        role: user.role,
        follower_count,
        following_count,
        is_following,
        created_at: user.created_at.to_string(),
    }))
}

#[utoipa::path(
    put,
    path = "/api/v1/auth/profile",
    security(("jwt_token" = [])),
    request_body = UpdateProfileRequest,
    responses(
        (status = 200, description = "Profile updated", body = crate::handlers::auth::UserResponse),
        (status = 400, description = "Validation error", body = AppError),
        (status = 401, description = "Unauthorized", body = AppError),
    ),
    tag = "users"
)]
pub async fn update_profile(
    Extension(db): Extension<DatabaseConnection>,
    viewer: ViewerContext,
    Json(payload): Json<UpdateProfileRequest>,
) -> AppResult<impl IntoResponse> {
    payload
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let service = UserService::new(db);
    let user = service
        .update_profile(viewer.user_id, payload.bio, payload.avatar_url)
        .await?;

    Ok(ApiResponse::ok(crate::handlers::auth::UserResponse::from(
        user,
    )))
}
