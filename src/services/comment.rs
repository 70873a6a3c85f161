use crate::{
    error::{AppError, AppResult},
    models::{comment, Comment, CommentModel, PostModel},
    services::{
        counter::{self, CounterField},
        post::find_live_post,
        visibility::ViewerContext,
    },
};
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection,
    EntityTrait, QueryFilter, QueryOrder, TransactionTrait,
};

pub const MAX_DEPTH: u32 = 10;

pub struct CommentService {
    db: DatabaseConnection,
}

/// A new comment together with what it was attached to, for notifications.
pub struct CreatedComment {
    pub comment: CommentModel,
    pub post: PostModel,
    pub parent: Option<CommentModel>,
}

pub(crate) async fn find_live_comment<C: ConnectionTrait>(
    conn: &C,
    id: i32,
) -> AppResult<CommentModel> {
    Comment::find_by_id(id)
        .filter(comment::Column::IsDeleted.eq(false))
        .one(conn)
        .await?
        .ok_or(AppError::NotFound)
}

impl CommentService {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub async fn list_by_post(&self, post_id: i32) -> AppResult<Vec<CommentModel>> {
        find_live_post(&self.db, post_id).await?;
        let comments = Comment::find()
            .filter(comment::Column::PostId.eq(post_id))
            .filter(comment::Column::IsDeleted.eq(false))
            .order_by_asc(comment::Column::CreatedAt)
            .order_by_asc(comment::Column::Id)
            .all(&self.db)
            .await?;
        Ok(comments)
    }

    pub async fn create(
        &self,
        author_id: i32,
        post_id: i32,
        parent_id: Option<i32>,
        content: &str,
    ) -> AppResult<CreatedComment> {
        let txn = self.db.begin().await?;

        let post = find_live_post(&txn, post_id).await?;
        if post.is_locked {
            return Err(AppError::Forbidden("Post is locked".to_string()));
        }

        let parent = match parent_id {
            Some(pid) => Some(validate_parent(&txn, pid, post_id).await?),
            None => None,
        };

        let now = chrono::Utc::now().naive_utc();
        let new_comment = comment::ActiveModel {
            post_id: sea_orm::ActiveValue::Set(post_id),
            author_id: sea_orm::ActiveValue::Set(author_id),
            parent_id: sea_orm::ActiveValue::Set(parent_id),
            content: sea_orm::ActiveValue::Set(content.to_string()),
            like_count: sea_orm::ActiveValue::Set(0),
            reply_count: sea_orm::ActiveValue::Set(0),
            is_deleted: sea_orm::ActiveValue::Set(false),
            deleted_at: sea_orm::ActiveValue::Set(None),
            created_at: sea_orm::ActiveValue::Set(now),
            updated_at: sea_orm::ActiveValue::Set(now),
            ..Default::default()
        };
        let comment = new_comment.insert(&txn).await?;

        let mut post = post;
        post.comment_count =
            counter::apply_delta(&txn, CounterField::PostComments, post_id, 1).await?;
        let parent = match parent {
            Some(mut parent) => {
                parent.reply_count =
                    counter::apply_delta(&txn, CounterField::CommentReplies, parent.id, 1).await?;
                Some(parent)
            }
            None => None,
        };

        txn.commit().await?;
        Ok(CreatedComment {
            comment,
            post,
            parent,
        })
    }

    pub async fn update(
        &self,
        viewer: &ViewerContext,
        id: i32,
        content: &str,
    ) -> AppResult<CommentModel> {
        let existing = find_live_comment(&self.db, id).await?;
        if existing.author_id != viewer.user_id {
            return Err(AppError::Forbidden(
                "Only the author can edit this comment".to_string(),
            ));
        }

        let mut active: comment::ActiveModel = existing.into();
        active.content = sea_orm::ActiveValue::Set(content.to_string());
        active.updated_at = sea_orm::ActiveValue::Set(chrono::Utc::now().naive_utc());
        Ok(active.update(&self.db).await?)
    }

    pub async fn soft_delete(&self, viewer: &ViewerContext, id: i32) -> AppResult<CommentModel> {
        let existing = find_live_comment(&self.db, id).await?;
        viewer.ensure_owner_or_admin(existing.author_id)?;

        let txn = self.db.begin().await?;
        let now = chrono::Utc::now().naive_utc();
        let result = Comment::update_many()
            .col_expr(comment::Column::IsDeleted, Expr::value(true))
            .col_expr(comment::Column::DeletedAt, Expr::value(now))
            .filter(comment::Column::Id.eq(id))
            .filter(comment::Column::IsDeleted.eq(false))
            .exec(&txn)
            .await?;
        if result.rows_affected == 0 {
            return Err(AppError::NotFound);
        }
        apply_visibility_change(&txn, &existing, -1).await?;
        txn.commit().await?;
        Ok(existing)
    }

    pub async fn restore(&self, viewer: &ViewerContext, id: i32) -> AppResult<CommentModel> {
        let existing = Comment::find_by_id(id)
            .filter(comment::Column::IsDeleted.eq(true))
            .one(&self.db)
            .await?
            .ok_or(AppError::NotFound)?;
        viewer.ensure_owner_or_admin(existing.author_id)?;

        let txn = self.db.begin().await?;
        let result = Comment::update_many()
            .col_expr(comment::Column::IsDeleted, Expr::value(false))
            .col_expr(
                comment::Column::DeletedAt,
                Expr::value(Option::<chrono::NaiveDateTime>::None),
            )
            .filter(comment::Column::Id.eq(id))
            .filter(comment::Column::IsDeleted.eq(true))
            .exec(&txn)
            .await?;
        if result.rows_affected == 0 {
            return Err(AppError::NotFound);
        }
        apply_visibility_change(&txn, &existing, 1).await?;
        let restored = find_live_comment(&txn, id).await?;
        txn.commit().await?;
        Ok(restored)
    }
}

/// Counter effects of a comment entering (+1) or leaving (-1) the visible set.
async fn apply_visibility_change<C: ConnectionTrait>(
    conn: &C,
    comment: &CommentModel,
    delta: i32,
) -> AppResult<()> {
    counter::apply_delta(conn, CounterField::PostComments, comment.post_id, delta).await?;
    if let Some(parent_id) = comment.parent_id {
        counter::apply_delta(conn, CounterField::CommentReplies, parent_id, delta).await?;
    }
    Ok(())
}

async fn validate_parent<C: ConnectionTrait>(
    conn: &C,
    parent_id: i32,
    post_id: i32,
) -> AppResult<CommentModel> {
    let parent = find_live_comment(conn, parent_id)
        .await
        .map_err(|_| AppError::Validation("Parent comment not found".to_string()))?;

    if parent.post_id != post_id {
        return Err(AppError::Validation(
            "Parent comment belongs to a different post".to_string(),
        ));
    }

    if depth_of(conn, &parent).await? >= MAX_DEPTH {
        return Err(AppError::Validation(
            "Maximum comment nesting depth reached".to_string(),
        ));
    }

    Ok(parent)
}

/// 1 for a top-level comment, stopping once the limit is passed.
async fn depth_of<C: ConnectionTrait>(conn: &C, comment: &CommentModel) -> AppResult<u32> {
    let mut depth = 1u32;
    let mut current = comment.parent_id;

    while let Some(id) = current {
        depth += 1;
        if depth > MAX_DEPTH {
            break;
        }
        current = Comment::find_by_id(id)
            .one(conn)
            .await?
            .and_then(|c| c.parent_id);
    }

    Ok(depth)
}
