use crate::error::{AppError, AppResult};
use crate::models::MessageModel;
use crate::response::{ApiResponse, PaginatedResponse, PaginationQuery};
use crate::services::message::MessageService;
use crate::services::user::load_users;
use crate::services::visibility::{mask_author, AuthorView, ViewerContext};
use crate::websocket::hub::PushHub;
use axum::{extract::Path, extract::Query, response::IntoResponse, Extension, Json};
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Content is trimmed and must then be 1 to 2000 characters.
#[derive(Debug, Deserialize, ToSchema)]
pub struct SendMessageRequest {
    pub receiver_id: i32,
    pub content: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MessageResponse {
    pub id: i32,
    pub sender_id: i32,
    pub receiver_id: i32,
    pub content: String,
    pub is_read: bool,
    pub read_at: Option<String>,
    pub created_at: String,
}

impl From<MessageModel> for MessageResponse {
    fn from(m: MessageModel) -> Self {
        Self {
            id: m.id,
            sender_id: m.sender_id,
            receiver_id: m.receiver_id,
            content: m.content,
            is_read: m.is_read,
            read_at: m.read_at.map(|t| t.to_string()),
            created_at: m.created_at.to_string(),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ConversationResponse {
    pub counterparty: AuthorView,
    pub last_message: MessageResponse,
    /// Unread messages received from this counterparty
    pub unread_count: u64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UnreadTotalResponse {
    pub count: u64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MarkedReadResponse {
    pub marked: u64,
}

#[utoipa::path(
    post,
    path = "/api/v1/messages",
    security(("jwt_token" = [])),
    request_body = SendMessageRequest,
    responses(
        (status = 200, description = "Message sent", body = MessageResponse),
        (status = 400, description = "Empty, too long or addressed to yourself", body = AppError),
        (status = 403, description = "Recipient is not active", body = AppError),
        (status = 404, description = "Recipient not found", body = AppError),
    ),
    tag = "messages"
)]
pub async fn send_message(
    Extension(db): Extension<DatabaseConnection>,
    Extension(hub): Extension<PushHub>,
    viewer: ViewerContext,
    Json(payload): Json<SendMessageRequest>,
) -> AppResult<impl IntoResponse> {
    let message = MessageService::new(db, hub)
        .send(&viewer, payload.receiver_id, &payload.content)
        .await?;
    Ok(ApiResponse::ok(MessageResponse::from(message)))
}

#[utoipa::path(
    get,
    path = "/api/v1/messages/conversations",
    security(("jwt_token" = [])),
    responses(
        (status = 200, description = "Conversations, most recent first", body = Vec<ConversationResponse>),
        (status = 401, description = "Unauthorized", body = AppError),
    ),
    tag = "messages"
)]
pub async fn list_conversations(
    Extension(db): Extension<DatabaseConnection>,
    Extension(hub): Extension<PushHub>,
    viewer: ViewerContext,
) -> AppResult<impl IntoResponse> {
    let conversations = MessageService::new(db.clone(), hub)
        .list_conversations(viewer.user_id)
        .await?;
    let users = load_users(&db, conversations.iter().map(|c| c.counterparty_id)).await?;

    let response: Vec<ConversationResponse> = conversations
        .into_iter()
        .map(|c| ConversationResponse {
            counterparty: mask_author(c.counterparty_id, users.get(&c.counterparty_id), false),
            last_message: MessageResponse::from(c.last_message),
            unread_count: c.unread_count,
        })
        .collect();
    Ok(ApiResponse::ok(response))
}

#[utoipa::path(
    get,
    path = "/api/v1/messages/with/{user_id}",
    security(("jwt_token" = [])),
    params(
        ("user_id" = i32, Path, description = "Counterparty user ID"),
        ("page" = Option<u64>, Query, description = "Page number"),
        ("per_page" = Option<u64>, Query, description = "Items per page"),
    ),
    responses(
        (status = 200, description = "Thread, oldest first", body = PaginatedResponse<MessageResponse>),
        (status = 404, description = "User not found", body = AppError),
    ),
    tag = "messages"
)]
pub async fn list_messages(
    Extension(db): Extension<DatabaseConnection>,
    Extension(hub): Extension<PushHub>,
    viewer: ViewerContext,
    Path(user_id): Path<i32>,
    Query(params): Query<PaginationQuery>,
) -> AppResult<impl IntoResponse> {
    let (page, per_page) = params.resolve();
    let (messages, total) = MessageService::new(db, hub)
        .list_messages(&viewer, user_id, page, per_page)
        .await?;
    let items: Vec<MessageResponse> = messages.into_iter().map(MessageResponse::from).collect();

    Ok(ApiResponse::ok(PaginatedResponse::new(
        items, total, page, per_page,
    )))
}

#[utoipa::path(
    put,
    path = "/api/v1/messages/with/{user_id}/read",
    security(("jwt_token" = [])),
    params(("user_id" = i32, Path, description = "Counterparty user ID")),
    responses(
        (status = 200, description = "Received messages marked read", body = MarkedReadResponse),
    ),
    tag = "messages"
)]
pub async fn mark_conversation_read(
    Extension(db): Extension<DatabaseConnection>,
    Extension(hub): Extension<PushHub>,
    viewer: ViewerContext,
    Path(user_id): Path<i32>,
) -> AppResult<impl IntoResponse> {
    let marked = MessageService::new(db, hub)
        .mark_conversation_read(viewer.user_id, user_id)
        .await?;
    Ok(ApiResponse::ok(MarkedReadResponse { marked }))
}

#[utoipa::path(
    put,
    path = "/api/v1/messages/{id}/read",
    security(("jwt_token" = [])),
    params(("id" = i32, Path, description = "Message ID")),
    responses(
        (status = 200, description = "Message marked read", body = MessageResponse),
        (status = 404, description = "Not found or not the receiver", body = AppError),
    ),
    tag = "messages"
)]
pub async fn mark_message_read(
    Extension(db): Extension<DatabaseConnection>,
    Extension(hub): Extension<PushHub>,
    viewer: ViewerContext,
    Path(id): Path<i32>,
) -> AppResult<impl IntoResponse> {
    let message = MessageService::new(db, hub)
        .mark_message_read(viewer.user_id, id)
        .await?;
    Ok(ApiResponse::ok(MessageResponse::from(message)))
}

#[utoipa::path(
    get,
    path = "/api/v1/messages/unread-count",
    security(("jwt_token" = [])),
    responses(
        (status = 200, description = "Unread messages across all conversations", body = UnreadTotalResponse),
    ),
    tag = "messages"
)]
pub async fn unread_total(
    Extension(db): Extension<DatabaseConnection>,
    Extension(hub): Extension<PushHub>,
    viewer: ViewerContext,
) -> AppResult<impl IntoResponse> {
    let count = MessageService::new(db, hub)
        .unread_total(viewer.user_id)
        .await?;
    Ok(ApiResponse::ok(UnreadTotalResponse { count }))
}
