use crate::error::{AppError, AppResult};
use crate::models::NotificationModel;
use crate::response::{ApiResponse, PaginatedResponse, PaginationQuery};
use crate::services::notification::{visible_actor, NotificationService};
use crate::services::visibility::ViewerContext;
use crate::websocket::hub::PushHub;
use axum::{extract::Path, extract::Query, response::IntoResponse, Extension};
use sea_orm::DatabaseConnection;
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Debug, Serialize, ToSchema)]
pub struct NotificationResponse {
    pub id: i32,
    pub kind: String,
    /// Null when the activity happened in an anonymous category
    pub actor_id: Option<i32>,
    pub target_type: String,
    pub target_id: i32,
    pub message: String,
    pub is_read: bool,
    pub read_at: Option<String>,
    pub created_at: String,
}

impl From<NotificationModel> for NotificationResponse {
    fn from(n: NotificationModel) -> Self {
        Self {
            id: n.id,
            actor_id: visible_actor(&n),
            kind: n.kind,
            target_type: n.target_type,
            target_id: n.target_id,
            message: n.message,
            is_read: n.is_read,
            read_at: n.read_at.map(|t| t.to_string()),
            created_at: n.created_at.to_string(),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UnreadCountResponse {
    pub count: u64,
}

#[utoipa::path(
    get,
    path = "/api/v1/notifications",
    security(("jwt_token" = [])),
    params(
        ("page" = Option<u64>, Query, description = "Page number"),
        ("per_page" = Option<u64>, Query, description = "Items per page"),
    ),
    responses(
        (status = 200, description = "List of notifications", body = PaginatedResponse<NotificationResponse>),
        (status = 401, description = "Unauthorized", body = AppError),
    ),
    tag = "notifications"
)]
pub async fn list_notifications(
    Extension(db): Extension<DatabaseConnection>,
    Extension(hub): Extension<PushHub>,
    viewer: ViewerContext,
    Query(params): Query<PaginationQuery>,
) -> AppResult<impl IntoResponse> {
    let (page, per_page) = params.resolve();
    let (items, total) = NotificationService::new(db, hub)
        .list_for_user(viewer.user_id, page, per_page)
        .await?;
    let items: Vec<NotificationResponse> =
        items.into_iter().map(NotificationResponse::from).collect();

    Ok(ApiResponse::ok(PaginatedResponse::new(
        items, total, page, per_page,
    )))
}

#[utoipa::path(
    get,
    path = "/api/v1/notifications/unread-count",
    security(("jwt_token" = [])),
    responses(
        (status = 200, description = "Unread notification count", body = UnreadCountResponse),
        (status = 401, description = "Unauthorized", body = AppError),
    ),
    tag = "notifications"
)]
pub async fn unread_count(
    Extension(db): Extension<DatabaseConnection>,
    Extension(hub): Extension<PushHub>,
    viewer: ViewerContext,
) -> AppResult<impl IntoResponse> {
    let count = NotificationService::new(db, hub)
        .unread_count(viewer.user_id)
        .await?;
    Ok(ApiResponse::ok(UnreadCountResponse { count }))
}

#[utoipa::path(
    put,
    path = "/api/v1/notifications/{id}/read",
    security(("jwt_token" = [])),
    params(("id" = i32, Path, description = "Notification ID")),
    responses(
        (status = 200, description = "Notification marked read", body = NotificationResponse),
        (status = 404, description = "Not found", body = AppError),
    ),
    tag = "notifications"
)]
pub async fn mark_read(
    Extension(db): Extension<DatabaseConnection>,
    Extension(hub): Extension<PushHub>,
    viewer: ViewerContext,
    Path(id): Path<i32>,
) -> AppResult<impl IntoResponse> {
    let notification = NotificationService::new(db, hub)
        .mark_read(id, viewer.user_id)
        .await?;
    Ok(ApiResponse::ok(NotificationResponse::from(notification)))
}

#[utoipa::path(
    put,
    path = "/api/v1/notifications/read-all",
    security(("jwt_token" = [])),
    responses(
        (status = 200, description = "All notifications marked read", body = UnreadCountResponse),
        (status = 401, description = "Unauthorized", body = AppError),
    ),
    tag = "notifications"
)]
pub async fn mark_all_read(
    Extension(db): Extension<DatabaseConnection>,
    Extension(hub): Extension<PushHub>,
    viewer: ViewerContext,
) -> AppResult<impl IntoResponse> {
    let count = NotificationService::new(db, hub)
        .mark_all_read(viewer.user_id)
        .await?;
    Ok(ApiResponse::ok(UnreadCountResponse { count }))
}
