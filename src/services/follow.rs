use crate::{
    error::{map_unique_violation, AppError, AppResult},
    models::{follow, user, Follow, User, UserModel},
    services::visibility::{find_visible_user, hidden_user_ids, ViewerContext},
};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, TransactionTrait,
};
use std::collections::HashMap;

pub struct FollowService {
    db: DatabaseConnection,
}

#[derive(Debug, Clone, Copy)]
pub struct FollowOutcome {
    pub following: bool,
    pub follower_count: u64,
}

async fn follower_count<C: ConnectionTrait>(conn: &C, user_id: i32) -> AppResult<u64> {
    Ok(Follow::find()
        .filter(follow::Column::FollowingId.eq(user_id))
        .count(conn)
        .await?)
}

impl FollowService {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Unfollowing a deactivated account stays possible. Accounts hidden
    /// from the viewer are reported as missing.
    async fn check_target<C: ConnectionTrait>(
        conn: &C,
        viewer: &ViewerContext,
        following_id: i32,
        require_active: bool,
    ) -> AppResult<UserModel> {
        if viewer.user_id == following_id {
            return Err(AppError::Validation("Cannot follow yourself".to_string()));
        }

        let target = find_visible_user(conn, Some(viewer), following_id).await?;
        if require_active && !target.is_active() {
            return Err(AppError::Forbidden(
                "This account is deactivated".to_string(),
            ));
        }
        Ok(target)
    }

    pub async fn follow(
        &self,
        viewer: &ViewerContext,
        following_id: i32,
    ) -> AppResult<FollowOutcome> {
        let follower_id = viewer.user_id;
        let txn = self.db.begin().await?;
        Self::check_target(&txn, viewer, following_id, true).await?;

        let existing = Follow::find()
            .filter(follow::Column::FollowerId.eq(follower_id))
            .filter(follow::Column::FollowingId.eq(following_id))
            .one(&txn)
            .await?;
        if existing.is_some() {
            return Err(AppError::AlreadyActive("Already following".to_string()));
        }

        follow::ActiveModel {
            follower_id: sea_orm::ActiveValue::Set(follower_id),
            following_id: sea_orm::ActiveValue::Set(following_id),
            created_at: sea_orm::ActiveValue::Set(chrono::Utc::now().naive_utc()),
            ..Default::default()
        }
        .insert(&txn)
        .await
        .map_err(|e| map_unique_violation(e, "Already following"))?;

        let count = follower_count(&txn, following_id).await?;
        txn.commit().await?;

        Ok(FollowOutcome {
            following: true,
            follower_count: count,
        })
    }

    pub async fn unfollow(
        &self,
        viewer: &ViewerContext,
        following_id: i32,
    ) -> AppResult<FollowOutcome> {
        let follower_id = viewer.user_id;
        let txn = self.db.begin().await?;
        Self::check_target(&txn, viewer, following_id, false).await?;

        let removed = Follow::delete_many()
            .filter(follow::Column::FollowerId.eq(follower_id))
            .filter(follow::Column::FollowingId.eq(following_id))
            .exec(&txn)
            .await?;
        if removed.rows_affected == 0 {
            return Err(AppError::NotActive("Not following".to_string()));
        }

        let count = follower_count(&txn, following_id).await?;
        txn.commit().await?;

        Ok(FollowOutcome {
            following: false,
            follower_count: count,
        })
    }

    pub async fn is_following(&self, follower_id: i32, following_id: i32) -> AppResult<bool> {
        let count = Follow::find()
            .filter(follow::Column::FollowerId.eq(follower_id))
            .filter(follow::Column::FollowingId.eq(following_id))
            .count(&self.db)
            .await?;
        Ok(count > 0)
    }

    /// `(followers, following)` for a profile page.
    pub async fn counts(&self, user_id: i32) -> AppResult<(u64, u64)> {
        let followers = follower_count(&self.db, user_id).await?;
        let following = Follow::find()
            .filter(follow::Column::FollowerId.eq(user_id))
            .count(&self.db)
            .await?;
        Ok((followers, following))
    }

    /// Users who follow `user_id`, most recent first.
    pub async fn list_followers(
        &self,
        viewer: Option<&ViewerContext>,
        user_id: i32,
        page: u64,
        per_page: u64,
    ) -> AppResult<(Vec<UserModel>, u64)> {
        let mut query = Follow::find().filter(follow::Column::FollowingId.eq(user_id));
        if let Some(hidden) = hidden_user_ids(viewer) {
            query = query.filter(follow::Column::FollowerId.not_in_subquery(hidden));
        }
        let paginator = query
            .order_by_desc(follow::Column::CreatedAt)
            .paginate(&self.db, per_page);

        let total = paginator.num_items().await?;
        let follows = paginator.fetch_page(page.saturating_sub(1)).await?;
        let ids = follows.iter().map(|f| f.follower_id).collect();
        Ok((self.users_in_order(ids).await?, total))
    }

    /// Users `user_id` follows, most recent first.
    pub async fn list_following(
        &self,
        viewer: Option<&ViewerContext>,
        user_id: i32,
        page: u64,
        per_page: u64,
    ) -> AppResult<(Vec<UserModel>, u64)> {
        let mut query = Follow::find().filter(follow::Column::FollowerId.eq(user_id));
        if let Some(hidden) = hidden_user_ids(viewer) {
            query = query.filter(follow::Column::FollowingId.not_in_subquery(hidden));
        }
        let paginator = query
            .order_by_desc(follow::Column::CreatedAt)
            .paginate(&self.db, per_page);

        let total = paginator.num_items().await?;
        let follows = paginator.fetch_page(page.saturating_sub(1)).await?;
        let ids = follows.iter().map(|f| f.following_id).collect();
        Ok((self.users_in_order(ids).await?, total))
    }

    async fn users_in_order(&self, ids: Vec<i32>) -> AppResult<Vec<UserModel>> {
        if ids.is_empty() {
            return Ok(vec![]);
        }
        let mut by_id: HashMap<i32, UserModel> = User::find()
            .filter(user::Column::Id.is_in(ids.clone()))
            .all(&self.db)
            .await?
            .into_iter()
            .map(|u| (u.id, u))
            .collect();
        Ok(ids.into_iter().filter_map(|id| by_id.remove(&id)).collect())
    }
}
