use crate::{
    error::{map_unique_violation, AppError, AppResult},
    models::{favorite, like, post, Favorite, Like, LikeTarget, Post, PostModel},
    services::{
        category,
        comment::find_live_comment,
        counter::{self, CounterField},
        post::find_live_post,
    },
};
use sea_orm::{
    sea_query::Query, ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection,
    EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, TransactionTrait,
};

/// Result of an activate or deactivate, with the counter value written in
/// the same transaction.
#[derive(Debug, Clone, Copy)]
pub struct ToggleOutcome {
    pub active: bool,
    pub count: i32,
    pub target: TargetInfo,
}

/// What a like or favorite points at, resolved inside the transaction.
#[derive(Debug, Clone, Copy)]
pub struct TargetInfo {
    pub owner_id: i32,
    pub post_id: i32,
    pub anonymous: bool,
}

fn like_counter(target: LikeTarget) -> CounterField {
    match target {
        LikeTarget::Post => CounterField::PostLikes,
        LikeTarget::Comment => CounterField::CommentLikes,
    }
}

/// Missing and soft-deleted targets both resolve to NotFound, including a
/// live comment under a deleted post.
async fn resolve_target<C: ConnectionTrait>(
    conn: &C,
    target: LikeTarget,
    target_id: i32,
) -> AppResult<TargetInfo> {
    let (owner_id, post) = match target {
        LikeTarget::Post => {
            let post = find_live_post(conn, target_id).await?;
            (post.author_id, post)
        }
        LikeTarget::Comment => {
            let comment = find_live_comment(conn, target_id).await?;
            (comment.author_id, find_live_post(conn, comment.post_id).await?)
        }
    };

    Ok(TargetInfo {
        owner_id,
        post_id: post.id,
        anonymous: category::is_anonymous(conn, post.category_id).await?,
    })
}

fn like_filter(user_id: i32, target: LikeTarget, target_id: i32) -> sea_orm::Condition {
    sea_orm::Condition::all()
        .add(like::Column::UserId.eq(user_id))
        .add(like::Column::TargetType.eq(target.as_str()))
        .add(like::Column::TargetId.eq(target_id))
}

pub struct InteractionService {
    db: DatabaseConnection,
}

impl InteractionService {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub async fn like(
        &self,
        user_id: i32,
        target: LikeTarget,
        target_id: i32,
    ) -> AppResult<ToggleOutcome> {
        let txn = self.db.begin().await?;
        let info = resolve_target(&txn, target, target_id).await?;

        let existing = Like::find()
            .filter(like_filter(user_id, target, target_id))
            .one(&txn)
            .await?;
        if existing.is_some() {
            return Err(AppError::AlreadyActive("Already liked".to_string()));
        }

        like::ActiveModel {
            user_id: sea_orm::ActiveValue::Set(user_id),
            target_type: sea_orm::ActiveValue::Set(target.as_str().to_string()),
            target_id: sea_orm::ActiveValue::Set(target_id),
            created_at: sea_orm::ActiveValue::Set(chrono::Utc::now().naive_utc()),
            ..Default::default()
        }
        .insert(&txn)
        .await
        .map_err(|e| map_unique_violation(e, "Already liked"))?;

        let count = counter::apply_delta(&txn, like_counter(target), target_id, 1).await?;
        txn.commit().await?;

        Ok(ToggleOutcome {
            active: true,
            count,
            target: info,
        })
    }

    pub async fn unlike(
        &self,
        user_id: i32,
        target: LikeTarget,
        target_id: i32,
    ) -> AppResult<ToggleOutcome> {
        let txn = self.db.begin().await?;
        let info = resolve_target(&txn, target, target_id).await?;

        let removed = Like::delete_many()
            .filter(like_filter(user_id, target, target_id))
            .exec(&txn)
            .await?;
        if removed.rows_affected == 0 {
            return Err(AppError::NotActive("Not liked yet".to_string()));
        }

        let count = counter::apply_delta(&txn, like_counter(target), target_id, -1).await?;
        txn.commit().await?;

        Ok(ToggleOutcome {
            active: false,
            count,
            target: info,
        })
    }

    pub async fn favorite(&self, user_id: i32, post_id: i32) -> AppResult<ToggleOutcome> {
        let txn = self.db.begin().await?;
        let info = resolve_target(&txn, LikeTarget::Post, post_id).await?;

        let existing = Favorite::find()
            .filter(favorite::Column::UserId.eq(user_id))
            .filter(favorite::Column::PostId.eq(post_id))
            .one(&txn)
            .await?;
        if existing.is_some() {
            return Err(AppError::AlreadyActive("Already favorited".to_string()));
        }

        favorite::ActiveModel {
            user_id: sea_orm::ActiveValue::Set(user_id),
            post_id: sea_orm::ActiveValue::Set(post_id),
            created_at: sea_orm::ActiveValue::Set(chrono::Utc::now().naive_utc()),
            ..Default::default()
        }
        .insert(&txn)
        .await
        .map_err(|e| map_unique_violation(e, "Already favorited"))?;

        let count = counter::apply_delta(&txn, CounterField::PostFavorites, post_id, 1).await?;
        txn.commit().await?;

        Ok(ToggleOutcome {
            active: true,
            count,
            target: info,
        })
    }

    pub async fn unfavorite(&self, user_id: i32, post_id: i32) -> AppResult<ToggleOutcome> {
        let txn = self.db.begin().await?;
        let info = resolve_target(&txn, LikeTarget::Post, post_id).await?;

        let removed = Favorite::delete_many()
            .filter(favorite::Column::UserId.eq(user_id))
            .filter(favorite::Column::PostId.eq(post_id))
            .exec(&txn)
            .await?;
        if removed.rows_affected == 0 {
            return Err(AppError::NotActive("Not favorited yet".to_string()));
        }

        let count = counter::apply_delta(&txn, CounterField::PostFavorites, post_id, -1).await?;
        txn.commit().await?;

        Ok(ToggleOutcome {
            active: false,
            count,
            target: info,
        })
    }

    /// Whether the viewer has liked and favorited the post.
    pub async fn post_flags(&self, user_id: i32, post_id: i32) -> AppResult<(bool, bool)> {
        let liked = Like::find()
            .filter(like_filter(user_id, LikeTarget::Post, post_id))
            .count(&self.db)
            .await?
            > 0;
        let favorited = Favorite::find()
            .filter(favorite::Column::UserId.eq(user_id))
            .filter(favorite::Column::PostId.eq(post_id))
            .count(&self.db)
            .await?
            > 0;
        Ok((liked, favorited))
    }

    /// Favorited posts that are still live.
    pub async fn list_favorites(
        &self,
        user_id: i32,
        page: u64,
        per_page: u64,
    ) -> AppResult<(Vec<PostModel>, u64)> {
        let favorited = Query::select()
            .column(favorite::Column::PostId)
            .from(Favorite)
            .and_where(favorite::Column::UserId.eq(user_id))
            .to_owned();

        let paginator = Post::find()
            .filter(post::Column::Id.in_subquery(favorited))
            .filter(post::Column::IsDeleted.eq(false))
            .order_by_desc(post::Column::CreatedAt)
            .paginate(&self.db, per_page);

        let total = paginator.num_items().await?;
        let posts = paginator.fetch_page(page.saturating_sub(1)).await?;
        Ok((posts, total))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn like_targets_map_to_their_own_counter() {
        assert_eq!(like_counter(LikeTarget::Post), CounterField::PostLikes);
        assert_eq!(like_counter(LikeTarget::Comment), CounterField::CommentLikes);
    }

    #[test]
    fn like_filter_pins_all_three_keys() {
        use sea_orm::{DbBackend, QueryTrait};
        let sql = Like::find()
            .filter(like_filter(3, LikeTarget::Comment, 9))
            .build(DbBackend::Postgres)
            .to_string();
        assert!(sql.contains(r#""user_id" = 3"#));
        assert!(sql.contains(r#""target_type" = 'comment'"#));
        assert!(sql.contains(r#""target_id" = 9"#));
    }
}
