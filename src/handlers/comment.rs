use crate::error::{AppError, AppResult};
use crate::models::CommentModel;
use crate::response::ApiResponse;
use crate::services::audit::{action, AuditLog};
use crate::services::category;
use crate::services::comment::CommentService;
use crate::services::notification::{kind, NewNotification, NotificationService};
use crate::services::post::PostService;
use crate::services::visibility::{AuthorDirectory, AuthorView, ViewerContext};
use crate::utils::render_markdown;
use crate::websocket::hub::PushHub;
use axum::{extract::Path, response::IntoResponse, Extension, Json};
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use utoipa::ToSchema;
use validator::Validate;

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateCommentRequest {
    /// Comment being replied to, if any
    pub parent_id: Option<i32>,
    #[validate(length(min = 1, max = 10000))]
    pub content: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateCommentRequest {
    #[validate(length(min = 1, max = 10000))]
    pub content: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CommentResponse {
    pub id: i32,
    pub post_id: i32,
    pub parent_id: Option<i32>,
    pub author: AuthorView,
    pub content: String,
    pub content_html: String,
    pub like_count: i32,
    pub reply_count: i32,
    pub created_at: String,
    pub updated_at: String,
}

impl CommentResponse {
    fn new(c: CommentModel, author: AuthorView) -> Self {
        let content_html = render_markdown(&c.content);
        Self {
            id: c.id,
            post_id: c.post_id,
            parent_id: c.parent_id,
            author,
            content: c.content,
            content_html,
            like_count: c.like_count,
            reply_count: c.reply_count,
            created_at: c.created_at.to_string(),
            updated_at: c.updated_at.to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CommentTreeNode {
    #[serde(flatten)]
    pub comment: CommentResponse,
    pub children: Vec<CommentTreeNode>,
}

impl utoipa::ToSchema for CommentTreeNode {
    fn name() -> std::borrow::Cow<'static, str> {
        "CommentTreeNode".into()
    }
}

impl utoipa::PartialSchema for CommentTreeNode {
    fn schema() -> utoipa::openapi::RefOr<utoipa::openapi::schema::Schema> {
        use utoipa::openapi::schema::{AllOfBuilder, ArrayBuilder, ObjectBuilder, Schema, Type};
        use utoipa::openapi::Ref;
        utoipa::openapi::RefOr::T(Schema::AllOf(
            AllOfBuilder::new()
                .item(Ref::from_schema_name("CommentResponse"))
                .item(
                    ObjectBuilder::new()
                        .schema_type(Type::Object)
                        .property(
                            "children",
                            ArrayBuilder::new()
                                .items(Ref::from_schema_name("CommentTreeNode"))
                                .build(),
                        )
                        .required("children")
                        .build(),
                )
                .build(),
        ))
    }
}

/// Nest comments under their parents, keeping input order among siblings.
/// A comment whose parent is not in the list (soft-deleted) becomes a root.
fn build_comment_tree(comments: Vec<CommentResponse>) -> Vec<CommentTreeNode> {
    let present: HashSet<i32> = comments.iter().map(|c| c.id).collect();
    let mut roots = Vec::new();
    let mut children_of: HashMap<i32, Vec<CommentResponse>> = HashMap::new();

    for comment in comments {
        match comment.parent_id {
            Some(parent) if present.contains(&parent) && parent != comment.id => {
                children_of.entry(parent).or_default().push(comment);
            }
            _ => roots.push(comment),
        }
    }

    fn attach(
        comment: CommentResponse,
        children_of: &mut HashMap<i32, Vec<CommentResponse>>,
    ) -> CommentTreeNode {
        let children = children_of
            .remove(&comment.id)
            .unwrap_or_default()
            .into_iter()
            .map(|child| attach(child, children_of))
            .collect();
        CommentTreeNode { comment, children }
    }

    roots
        .into_iter()
        .map(|root| attach(root, &mut children_of))
        .collect()
}

async fn present_comment(
    db: &DatabaseConnection,
    comment: CommentModel,
    category_id: i32,
) -> AppResult<CommentResponse> {
    let directory = AuthorDirectory::load(db, [comment.author_id], [category_id]).await?;
    let author = directory.author(comment.author_id, category_id);
    Ok(CommentResponse::new(comment, author))
}

#[utoipa::path(
    get,
    path = "/api/v1/posts/{post_id}/comments",
    params(("post_id" = i32, Path, description = "Post ID")),
    responses(
        (status = 200, description = "Comment tree", body = Vec<CommentTreeNode>),
        (status = 404, description = "Post not found", body = AppError),
    ),
    tag = "comments"
)]
pub async fn list_comments(
    Extension(db): Extension<DatabaseConnection>,
    Path(post_id): Path<i32>,
) -> AppResult<impl IntoResponse> {
    let post = PostService::new(db.clone()).get_live(post_id).await?;
    let comments = CommentService::new(db.clone()).list_by_post(post_id).await?;

    let directory = AuthorDirectory::load(
        &db,
        comments.iter().map(|c| c.author_id),
        [post.category_id],
    )
    .await?;
    let responses = comments
        .into_iter()
        .map(|c| {
            let author = directory.author(c.author_id, post.category_id);
            CommentResponse::new(c, author)
        })
        .collect();

    Ok(ApiResponse::ok(build_comment_tree(responses)))
}

#[utoipa::path(
    post,
    path = "/api/v1/posts/{post_id}/comments",
    security(("jwt_token" = [])),
    params(("post_id" = i32, Path, description = "Post ID")),
    request_body = CreateCommentRequest,
    responses(
        (status = 200, description = "Comment created", body = CommentResponse),
        (status = 400, description = "Invalid parent or too deep", body = AppError),
        (status = 403, description = "Post is locked", body = AppError),
        (status = 404, description = "Post not found", body = AppError),
    ),
    tag = "comments"
)]
pub async fn create_comment(
    Extension(db): Extension<DatabaseConnection>,
    Extension(hub): Extension<PushHub>,
    viewer: ViewerContext,
    Path(post_id): Path<i32>,
    Json(payload): Json<CreateCommentRequest>,
) -> AppResult<impl IntoResponse> {
    payload
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let created = CommentService::new(db.clone())
        .create(viewer.user_id, post_id, payload.parent_id, &payload.content)
        .await?;
    let anonymous = category::is_anonymous(&db, created.post.category_id).await?;

    let notifications = NotificationService::new(db.clone(), hub);
    if let Some(parent) = &created.parent {
        notifications
            .notify_best_effort(NewNotification {
                user_id: parent.author_id,
                actor_id: viewer.user_id,
                kind: kind::REPLY_TO_COMMENT,
                target_type: "comment",
                target_id: parent.id,
                message: "replied to your comment",
                actor_hidden: anonymous,
            })
            .await;
    }
    if created.parent.as_ref().map(|p| p.author_id) != Some(created.post.author_id) {
        notifications
            .notify_best_effort(NewNotification {
                user_id: created.post.author_id,
                actor_id: viewer.user_id,
                kind: kind::COMMENT_ON_POST,
                target_type: "post",
                target_id: created.post.id,
                message: "commented on your post",
                actor_hidden: anonymous,
            })
            .await;
    }

    let response = present_comment(&db, created.comment, created.post.category_id).await?;
    Ok(ApiResponse::ok(response))
}

#[utoipa::path(
    put,
    path = "/api/v1/comments/{id}",
    security(("jwt_token" = [])),
    params(("id" = i32, Path, description = "Comment ID")),
    request_body = UpdateCommentRequest,
    responses(
        (status = 200, description = "Comment updated", body = CommentResponse),
        (status = 403, description = "Not the author", body = AppError),
        (status = 404, description = "Comment not found", body = AppError),
    ),
    tag = "comments"
)]
pub async fn update_comment(
    Extension(db): Extension<DatabaseConnection>,
    viewer: ViewerContext,
    Path(id): Path<i32>,
    Json(payload): Json<UpdateCommentRequest>,
) -> AppResult<impl IntoResponse> {
    payload
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let comment = CommentService::new(db.clone())
        .update(&viewer, id, &payload.content)
        .await?;
    let post = PostService::new(db.clone()).get_live(comment.post_id).await?;

    Ok(ApiResponse::ok(
        present_comment(&db, comment, post.category_id).await?,
    ))
}

#[utoipa::path(
    delete,
    path = "/api/v1/comments/{id}",
    security(("jwt_token" = [])),
    params(("id" = i32, Path, description = "Comment ID")),
    responses(
        (status = 200, description = "Comment moved to trash", body = String),
        (status = 403, description = "Not the author", body = AppError),
        (status = 404, description = "Comment not found or already deleted", body = AppError),
    ),
    tag = "comments"
)]
pub async fn delete_comment(
    Extension(db): Extension<DatabaseConnection>,
    viewer: ViewerContext,
    Path(id): Path<i32>,
) -> AppResult<impl IntoResponse> {
    let comment = CommentService::new(db.clone())
        .soft_delete(&viewer, id)
        .await?;

    if comment.author_id != viewer.user_id {
        AuditLog::new(db).record(
            viewer.user_id,
            action::DELETE_COMMENT,
            "comment",
            comment.id,
            format!("moved comment on post {} to trash", comment.post_id),
        );
    }
    Ok(ApiResponse::ok("Comment deleted"))
}

#[utoipa::path(
    post,
    path = "/api/v1/comments/{id}/restore",
    security(("jwt_token" = [])),
    params(("id" = i32, Path, description = "Comment ID")),
    responses(
        (status = 200, description = "Comment restored", body = String),
        (status = 404, description = "Comment not found or not deleted", body = AppError),
    ),
    tag = "comments"
)]
pub async fn restore_comment(
    Extension(db): Extension<DatabaseConnection>,
    viewer: ViewerContext,
    Path(id): Path<i32>,
) -> AppResult<impl IntoResponse> {
    let comment = CommentService::new(db.clone()).restore(&viewer, id).await?;

    if comment.author_id != viewer.user_id {
        AuditLog::new(db).record(
            viewer.user_id,
            action::RESTORE_COMMENT,
            "comment",
            comment.id,
            format!("restored comment on post {}", comment.post_id),
        );
    }
    Ok(ApiResponse::ok("Comment restored"))
}
