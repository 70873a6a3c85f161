use crate::error::{AppError, AppResult};
use crate::models::{AdminLogModel, Role, UserModel, UserStatus};
use crate::response::{ApiResponse, PaginatedResponse, PaginationQuery};
use crate::services::admin::{AdminService, AdminStats, UserPatch};
use crate::services::audit::{action, AuditLog};
use crate::services::cache::CacheService;
use crate::services::cascade::{CascadeReport, CascadeService};
use crate::services::category::CACHE_KEY_CATEGORY_LIST;
use crate::services::comment::CommentService;
use crate::services::counter::{self, ReconcileReport};
use crate::services::post::PostService;
use crate::services::visibility::{UserListQuery, ViewerContext};
use axum::{extract::Path, extract::Query, response::IntoResponse, Extension, Json};
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

#[derive(Debug, Serialize, ToSchema)]
pub struct AdminUserResponse {
    pub id: i32,
    pub username: String,
    pub email: String,
    pub avatar_url: Option<String>,
    pub bio: Option<String>,
    pub role: String,
    pub status: String,
    pub created_at: String,
    pub updated_at: String,
}

impl From<UserModel> for AdminUserResponse {
    fn from(u: UserModel) -> Self {
        Self {
            id: u.id,
            username: u.username,
            email: u.email,
            avatar_url: u.avatar_url,
            bio: u.bio,
            role: u.role,
            status: u.status,
            created_at: u.created_at.to_string(),
            updated_at: u.updated_at.to_string(),
        }
    }
}

/// Query string for the user list. Only these filters exist.
#[derive(Debug, Deserialize, ToSchema)]
pub struct AdminUserListQuery {
    pub page: Option<u64>,
    pub per_page: Option<u64>,
    pub role: Option<Role>,
    pub status: Option<UserStatus>,
    /// Matched against username and email
    pub keyword: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateUserRequest {
    #[validate(length(min = 3, max = 50))]
    pub username: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    #[validate(length(max = 500))]
    pub bio: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateRoleRequest {
    /// user, admin or super_admin
    pub role: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ResetPasswordResponse {
    pub user: AdminUserResponse,
    /// One-off password to hand to the user
    pub temporary_password: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AuditLogResponse {
    pub id: i32,
    pub admin_id: i32,
    pub action: String,
    pub target_type: String,
    pub target_id: i32,
    pub description: String,
    pub created_at: String,
}

impl From<AdminLogModel> for AuditLogResponse {
    fn from(l: AdminLogModel) -> Self {
        Self {
            id: l.id,
            admin_id: l.admin_id,
            action: l.action,
            target_type: l.target_type,
            target_id: l.target_id,
            description: l.description,
            created_at: l.created_at.to_string(),
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AuditLogQuery {
    pub page: Option<u64>,
    pub per_page: Option<u64>,
    pub action: Option<String>,
}

#[utoipa::path(
    get,
    path = "/api/v1/admin/stats",
    security(("jwt_token" = [])),
    responses(
        (status = 200, description = "Platform statistics", body = AdminStats),
        (status = 403, description = "Admin only", body = AppError),
    ),
    tag = "admin"
)]
pub async fn get_stats(
    Extension(db): Extension<DatabaseConnection>,
    viewer: ViewerContext,
) -> AppResult<impl IntoResponse> {
    viewer.ensure_admin()?;
    let stats = AdminService::new(db).get_stats(&viewer).await?;
    Ok(ApiResponse::ok(stats))
}

#[utoipa::path(
    get,
    path = "/api/v1/admin/users",
    security(("jwt_token" = [])),
    params(
        ("page" = Option<u64>, Query, description = "Page number"),
        ("per_page" = Option<u64>, Query, description = "Items per page"),
        ("role" = Option<Role>, Query, description = "Filter by role"),
        ("status" = Option<UserStatus>, Query, description = "Filter by status"),
        ("keyword" = Option<String>, Query, description = "Username or email contains"),
    ),
    responses(
        (status = 200, description = "Users visible to the caller", body = PaginatedResponse<AdminUserResponse>),
        (status = 403, description = "Admin only", body = AppError),
    ),
    tag = "admin"
)]
pub async fn list_users(
    Extension(db): Extension<DatabaseConnection>,
    viewer: ViewerContext,
    Query(params): Query<AdminUserListQuery>,
) -> AppResult<impl IntoResponse> {
    viewer.ensure_admin()?;
    let (page, per_page) = PaginationQuery {
        page: params.page,
        per_page: params.per_page,
    }
    .resolve();
    let query = UserListQuery {
        role: params.role,
        status: params.status,
        keyword: params.keyword,
    };

    let (users, total) = AdminService::new(db)
        .list_users(&viewer, &query, page, per_page)
        .await?;
    let items: Vec<AdminUserResponse> = users.into_iter().map(AdminUserResponse::from).collect();

    Ok(ApiResponse::ok(PaginatedResponse::new(
        items, total, page, per_page,
    )))
}

#[utoipa::path(
    get,
    path = "/api/v1/admin/users/{id}",
    security(("jwt_token" = [])),
    params(("id" = i32, Path, description = "User ID")),
    responses(
        (status = 200, description = "User details", body = AdminUserResponse),
        (status = 404, description = "User not found", body = AppError),
    ),
    tag = "admin"
)]
pub async fn get_user(
    Extension(db): Extension<DatabaseConnection>,
    viewer: ViewerContext,
    Path(id): Path<i32>,
) -> AppResult<impl IntoResponse> {
    viewer.ensure_admin()?;
    let user = AdminService::new(db).get_user(&viewer, id).await?;
    Ok(ApiResponse::ok(AdminUserResponse::from(user)))
}

#[utoipa::path(
    put,
    path = "/api/v1/admin/users/{id}",
    security(("jwt_token" = [])),
    params(("id" = i32, Path, description = "User ID")),
    request_body = UpdateUserRequest,
    responses(
        (status = 200, description = "User updated", body = AdminUserResponse),
        (status = 404, description = "User not found", body = AppError),
        (status = 409, description = "Username or email taken", body = AppError),
    ),
    tag = "admin"
)]
pub async fn update_user(
    Extension(db): Extension<DatabaseConnection>,
    viewer: ViewerContext,
    Path(id): Path<i32>,
    Json(payload): Json<UpdateUserRequest>,
) -> AppResult<impl IntoResponse> {
    viewer.ensure_admin()?;
    payload
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let patch = UserPatch {
        username: payload.username.map(|s| s.trim().to_string()),
        email: payload.email.map(|s| s.trim().to_string()),
        bio: payload.bio,
    };
    let user = AdminService::new(db.clone())
        .update_user(&viewer, id, patch)
        .await?;

    AuditLog::new(db).record(
        viewer.user_id,
        action::UPDATE_USER,
        "user",
        user.id,
        format!("edited profile of '{}'", user.username),
    );
    Ok(ApiResponse::ok(AdminUserResponse::from(user)))
}

/// Shared shape of the status-changing endpoints.
async fn status_action<F, Fut>(
    db: DatabaseConnection,
    viewer: ViewerContext,
    id: i32,
    audit_action: &'static str,
    run: F,
) -> AppResult<AdminUserResponse>
where
    F: FnOnce(AdminService) -> Fut,
    Fut: std::future::Future<Output = AppResult<UserModel>>,
{
    viewer.ensure_admin()?;
    let user = run(AdminService::new(db.clone())).await?;
    AuditLog::new(db).record(
        viewer.user_id,
        audit_action,
        "user",
        id,
        format!("'{}' is now {}", user.username, user.status),
    );
    Ok(AdminUserResponse::from(user))
}

#[utoipa::path(
    put,
    path = "/api/v1/admin/users/{id}/ban",
    security(("jwt_token" = [])),
    params(("id" = i32, Path, description = "User ID")),
    responses(
        (status = 200, description = "User banned", body = AdminUserResponse),
        (status = 400, description = "Not active, or your own account", body = AppError),
        (status = 404, description = "User not found", body = AppError),
    ),
    tag = "admin"
)]
pub async fn ban_user(
    Extension(db): Extension<DatabaseConnection>,
    viewer: ViewerContext,
    Path(id): Path<i32>,
) -> AppResult<impl IntoResponse> {
    let user = status_action(db, viewer, id, action::BAN_USER, |s| async move {
        s.ban_user(&viewer, id).await
    })
    .await?;
    Ok(ApiResponse::ok(user))
}

#[utoipa::path(
    put,
    path = "/api/v1/admin/users/{id}/unban",
    security(("jwt_token" = [])),
    params(("id" = i32, Path, description = "User ID")),
    responses(
        (status = 200, description = "User unbanned", body = AdminUserResponse),
        (status = 400, description = "Not banned", body = AppError),
        (status = 404, description = "User not found", body = AppError),
    ),
    tag = "admin"
)]
pub async fn unban_user(
    Extension(db): Extension<DatabaseConnection>,
    viewer: ViewerContext,
    Path(id): Path<i32>,
) -> AppResult<impl IntoResponse> {
    let user = status_action(db, viewer, id, action::UNBAN_USER, |s| async move {
        s.unban_user(&viewer, id).await
    })
    .await?;
    Ok(ApiResponse::ok(user))
}

#[utoipa::path(
    put,
    path = "/api/v1/admin/users/{id}/approve",
    security(("jwt_token" = [])),
    params(("id" = i32, Path, description = "User ID")),
    responses(
        (status = 200, description = "Registration approved", body = AdminUserResponse),
        (status = 400, description = "Not pending or rejected", body = AppError),
        (status = 404, description = "User not found", body = AppError),
    ),
    tag = "admin"
)]
pub async fn approve_user(
    Extension(db): Extension<DatabaseConnection>,
    viewer: ViewerContext,
    Path(id): Path<i32>,
) -> AppResult<impl IntoResponse> {
    let user = status_action(db, viewer, id, action::APPROVE_USER, |s| async move {
        s.approve_user(&viewer, id).await
    })
    .await?;
    Ok(ApiResponse::ok(user))
}

#[utoipa::path(
    put,
    path = "/api/v1/admin/users/{id}/reject",
    security(("jwt_token" = [])),
    params(("id" = i32, Path, description = "User ID")),
    responses(
        (status = 200, description = "Registration rejected", body = AdminUserResponse),
        (status = 400, description = "Not pending", body = AppError),
        (status = 404, description = "User not found", body = AppError),
    ),
    tag = "admin"
)]
pub async fn reject_user(
    Extension(db): Extension<DatabaseConnection>,
    viewer: ViewerContext,
    Path(id): Path<i32>,
) -> AppResult<impl IntoResponse> {
    let user = status_action(db, viewer, id, action::REJECT_USER, |s| async move {
        s.reject_user(&viewer, id).await
    })
    .await?;
    Ok(ApiResponse::ok(user))
}

#[utoipa::path(
    post,
    path = "/api/v1/admin/users/{id}/reset-password",
    security(("jwt_token" = [])),
    params(("id" = i32, Path, description = "User ID")),
    responses(
        (status = 200, description = "Password reset", body = ResetPasswordResponse),
        (status = 404, description = "User not found", body = AppError),
    ),
    tag = "admin"
)]
pub async fn reset_password(
    Extension(db): Extension<DatabaseConnection>,
    viewer: ViewerContext,
    Path(id): Path<i32>,
) -> AppResult<impl IntoResponse> {
    viewer.ensure_admin()?;
    let (user, temporary_password) = AdminService::new(db.clone())
        .reset_password(&viewer, id)
        .await?;

    AuditLog::new(db).record(
        viewer.user_id,
        action::RESET_PASSWORD,
        "user",
        user.id,
        format!("reset password of '{}'", user.username),
    );
    Ok(ApiResponse::ok(ResetPasswordResponse {
        user: AdminUserResponse::from(user),
        temporary_password,
    }))
}

#[utoipa::path(
    put,
    path = "/api/v1/admin/users/{id}/role",
    security(("jwt_token" = [])),
    params(("id" = i32, Path, description = "User ID")),
    request_body = UpdateRoleRequest,
    responses(
        (status = 200, description = "Role updated", body = AdminUserResponse),
        (status = 400, description = "Invalid role or your own account", body = AppError),
        (status = 403, description = "Super admin only", body = AppError),
    ),
    tag = "admin"
)]
pub async fn update_user_role(
    Extension(db): Extension<DatabaseConnection>,
    viewer: ViewerContext,
    Path(id): Path<i32>,
    Json(payload): Json<UpdateRoleRequest>,
) -> AppResult<impl IntoResponse> {
    let role: Role = payload.role.parse().map_err(AppError::Validation)?;
    let user = AdminService::new(db.clone())
        .update_user_role(&viewer, id, role)
        .await?;

    AuditLog::new(db).record(
        viewer.user_id,
        action::UPDATE_ROLE,
        "user",
        user.id,
        format!("set role of '{}' to {}", user.username, role),
    );
    Ok(ApiResponse::ok(AdminUserResponse::from(user)))
}

#[utoipa::path(
    delete,
    path = "/api/v1/admin/posts/{id}",
    security(("jwt_token" = [])),
    params(("id" = i32, Path, description = "Post ID")),
    responses(
        (status = 200, description = "Post and its dependents removed", body = CascadeReport),
        (status = 404, description = "Post not found", body = AppError),
    ),
    tag = "admin"
)]
pub async fn hard_delete_post(
    Extension(db): Extension<DatabaseConnection>,
    cache: Option<Extension<CacheService>>,
    viewer: ViewerContext,
    Path(id): Path<i32>,
) -> AppResult<impl IntoResponse> {
    viewer.ensure_admin()?;
    let (post, report) = CascadeService::new(db.clone()).hard_delete_post(id).await?;

    if let Some(Extension(cache)) = cache {
        cache.invalidate(CACHE_KEY_CATEGORY_LIST).await;
    }
    AuditLog::new(db).record(
        viewer.user_id,
        action::DELETE_POST,
        "post",
        post.id,
        format!(
            "permanently deleted post '{}' with {} comments",
            post.title, report.comments_removed
        ),
    );
    Ok(ApiResponse::ok(report))
}

#[utoipa::path(
    delete,
    path = "/api/v1/admin/comments/{id}",
    security(("jwt_token" = [])),
    params(("id" = i32, Path, description = "Comment ID")),
    responses(
        (status = 200, description = "Comment subtree removed", body = CascadeReport),
        (status = 404, description = "Comment not found", body = AppError),
    ),
    tag = "admin"
)]
pub async fn hard_delete_comment(
    Extension(db): Extension<DatabaseConnection>,
    viewer: ViewerContext,
    Path(id): Path<i32>,
) -> AppResult<impl IntoResponse> {
    viewer.ensure_admin()?;
    let (comment, report) = CascadeService::new(db.clone())
        .hard_delete_comment(id)
        .await?;

    AuditLog::new(db).record(
        viewer.user_id,
        action::DELETE_COMMENT,
        "comment",
        comment.id,
        format!(
            "permanently deleted comment on post {} ({} comments removed)",
            comment.post_id, report.comments_removed
        ),
    );
    Ok(ApiResponse::ok(report))
}

#[utoipa::path(
    post,
    path = "/api/v1/admin/posts/{id}/restore",
    security(("jwt_token" = [])),
    params(("id" = i32, Path, description = "Post ID")),
    responses(
        (status = 200, description = "Post restored", body = String),
        (status = 404, description = "Post not found or not deleted", body = AppError),
    ),
    tag = "admin"
)]
pub async fn admin_restore_post(
    Extension(db): Extension<DatabaseConnection>,
    cache: Option<Extension<CacheService>>,
    viewer: ViewerContext,
    Path(id): Path<i32>,
) -> AppResult<impl IntoResponse> {
    viewer.ensure_admin()?;
    let post = PostService::new(db.clone())
        .with_cache(cache.map(|c| c.0))
        .restore(&viewer, id)
        .await?;

    AuditLog::new(db).record(
        viewer.user_id,
        action::RESTORE_POST,
        "post",
        post.id,
        format!("restored post '{}'", post.title),
    );
    Ok(ApiResponse::ok("Post restored"))
}

#[utoipa::path(
    post,
    path = "/api/v1/admin/comments/{id}/restore",
    security(("jwt_token" = [])),
    params(("id" = i32, Path, description = "Comment ID")),
    responses(
        (status = 200, description = "Comment restored", body = String),
        (status = 404, description = "Comment not found or not deleted", body = AppError),
    ),
    tag = "admin"
)]
pub async fn admin_restore_comment(
    Extension(db): Extension<DatabaseConnection>,
    viewer: ViewerContext,
    Path(id): Path<i32>,
) -> AppResult<impl IntoResponse> {
    viewer.ensure_admin()?;
    let comment = CommentService::new(db.clone()).restore(&viewer, id).await?;

    AuditLog::new(db).record(
        viewer.user_id,
        action::RESTORE_COMMENT,
        "comment",
        comment.id,
        format!("restored comment on post {}", comment.post_id),
    );
    Ok(ApiResponse::ok("Comment restored"))
}

#[utoipa::path(
    post,
    path = "/api/v1/admin/reconcile",
    security(("jwt_token" = [])),
    responses(
        (status = 200, description = "Counters recomputed from fact tables", body = ReconcileReport),
        (status = 403, description = "Super admin only", body = AppError),
    ),
    tag = "admin"
)]
pub async fn reconcile_counters(
    Extension(db): Extension<DatabaseConnection>,
    cache: Option<Extension<CacheService>>,
    viewer: ViewerContext,
) -> AppResult<impl IntoResponse> {
    viewer.ensure_super_admin()?;
    let report = counter::reconcile_all(&db).await?;

    if let Some(Extension(cache)) = cache {
        cache.invalidate(CACHE_KEY_CATEGORY_LIST).await;
    }
    AuditLog::new(db).record(
        viewer.user_id,
        action::RECONCILE_COUNTERS,
        "system",
        0,
        format!("corrected {} counter rows", report.total_corrected),
    );
    Ok(ApiResponse::ok(report))
}

#[utoipa::path(
    get,
    path = "/api/v1/admin/audit-logs",
    security(("jwt_token" = [])),
    params(
        ("page" = Option<u64>, Query, description = "Page number"),
        ("per_page" = Option<u64>, Query, description = "Items per page"),
        ("action" = Option<String>, Query, description = "Filter by action"),
    ),
    responses(
        (status = 200, description = "Audit log, newest first", body = PaginatedResponse<AuditLogResponse>),
        (status = 403, description = "Admin only", body = AppError),
    ),
    tag = "admin"
)]
pub async fn list_audit_logs(
    Extension(db): Extension<DatabaseConnection>,
    viewer: ViewerContext,
    Query(params): Query<AuditLogQuery>,
) -> AppResult<impl IntoResponse> {
    viewer.ensure_admin()?;
    let (page, per_page) = PaginationQuery {
        page: params.page,
        per_page: params.per_page,
    }
    .resolve();

    let (logs, total) = AuditLog::new(db)
        .list(params.action.as_deref(), page, per_page)
        .await?;
    let items: Vec<AuditLogResponse> = logs.into_iter().map(AuditLogResponse::from).collect();

    Ok(ApiResponse::ok(PaginatedResponse::new(
        items, total, page, per_page,
    )))
}
