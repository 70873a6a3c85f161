//! Admin-only hard deletes. Dependents are removed explicitly, in one
//! transaction, so counters of surviving rows can be corrected on the way.

use crate::{
    error::{AppError, AppResult},
    models::{
        comment, favorite, like, notification, Comment, CommentModel, Favorite, Like, LikeTarget,
        Notification, Post, PostModel,
    },
    services::counter::{self, CounterField},
};
use sea_orm::{
    ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    TransactionTrait,
};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use utoipa::ToSchema;

#[derive(Debug, Default, Clone, Serialize, ToSchema)]
pub struct CascadeReport {
    pub comments_removed: u64,
    pub likes_removed: u64,
    pub favorites_removed: u64,
    pub notifications_removed: u64,
}

/// `root` and every comment below it, given `(id, parent_id)` pairs for the
/// whole post. Cycles cannot occur in stored data but are tolerated.
pub fn collect_subtree(root: i32, edges: &[(i32, Option<i32>)]) -> Vec<i32> {
    let mut children: HashMap<i32, Vec<i32>> = HashMap::new();
    for &(id, parent) in edges {
        if let Some(parent) = parent {
            children.entry(parent).or_default().push(id);
        }
    }

    let mut seen = HashSet::from([root]);
    let mut out = vec![root];
    let mut stack = vec![root];
    while let Some(id) = stack.pop() {
        for &child in children.get(&id).into_iter().flatten() {
            if seen.insert(child) {
                out.push(child);
                stack.push(child);
            }
        }
    }
    out
}

pub struct CascadeService {
    db: DatabaseConnection,
}

impl CascadeService {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Remove a post with its comments, likes, favorites and notifications.
    /// The category count drops only if the post was still live.
    pub async fn hard_delete_post(&self, post_id: i32) -> AppResult<(PostModel, CascadeReport)> {
        let txn = self.db.begin().await?;
        let post = Post::find_by_id(post_id)
            .one(&txn)
            .await?
            .ok_or(AppError::NotFound)?;

        let comment_ids: Vec<i32> = Comment::find()
            .filter(comment::Column::PostId.eq(post_id))
            .all(&txn)
            .await?
            .into_iter()
            .map(|c| c.id)
            .collect();

        let mut report = CascadeReport {
            likes_removed: delete_likes(&txn, LikeTarget::Comment, &comment_ids).await?
                + delete_likes(&txn, LikeTarget::Post, &[post_id]).await?,
            notifications_removed: delete_notifications(&txn, &[post_id], &comment_ids).await?,
            ..Default::default()
        };

        report.favorites_removed = Favorite::delete_many()
            .filter(favorite::Column::PostId.eq(post_id))
            .exec(&txn)
            .await?
            .rows_affected;

        report.comments_removed = Comment::delete_many()
            .filter(comment::Column::PostId.eq(post_id))
            .exec(&txn)
            .await?
            .rows_affected;

        Post::delete_by_id(post_id).exec(&txn).await?;

        if !post.is_deleted {
            counter::apply_delta(&txn, CounterField::CategoryPosts, post.category_id, -1).await?;
        }

        txn.commit().await?;
        tracing::info!(post_id, ?report, "post hard-deleted");
        Ok((post, report))
    }

    /// Remove a comment and all replies below it. Only comments that were
    /// still live come off the post's count, and the parent's reply count
    /// drops only if the target itself was live.
    pub async fn hard_delete_comment(
        &self,
        comment_id: i32,
    ) -> AppResult<(CommentModel, CascadeReport)> {
        let txn = self.db.begin().await?;
        let target = Comment::find_by_id(comment_id)
            .one(&txn)
            .await?
            .ok_or(AppError::NotFound)?;

        let siblings = Comment::find()
            .filter(comment::Column::PostId.eq(target.post_id))
            .all(&txn)
            .await?;
        let edges: Vec<(i32, Option<i32>)> = siblings.iter().map(|c| (c.id, c.parent_id)).collect();
        let subtree = collect_subtree(comment_id, &edges);
        let in_subtree: HashSet<i32> = subtree.iter().copied().collect();
        let live_removed = siblings
            .iter()
            .filter(|c| in_subtree.contains(&c.id) && !c.is_deleted)
            .count() as i32;

        let mut report = CascadeReport {
            likes_removed: delete_likes(&txn, LikeTarget::Comment, &subtree).await?,
            notifications_removed: delete_notifications(&txn, &[], &subtree).await?,
            ..Default::default()
        };

        report.comments_removed = Comment::delete_many()
            .filter(comment::Column::Id.is_in(subtree))
            .exec(&txn)
            .await?
            .rows_affected;

        if live_removed > 0 {
            counter::apply_delta(&txn, CounterField::PostComments, target.post_id, -live_removed)
                .await?;
        }
        if let (false, Some(parent_id)) = (target.is_deleted, target.parent_id) {
            counter::apply_delta(&txn, CounterField::CommentReplies, parent_id, -1).await?;
        }

        txn.commit().await?;
        tracing::info!(comment_id, live_removed, ?report, "comment hard-deleted");
        Ok((target, report))
    }
}

async fn delete_likes<C: ConnectionTrait>(
    conn: &C,
    target: LikeTarget,
    ids: &[i32],
) -> AppResult<u64> {
    if ids.is_empty() {
        return Ok(0);
    }
    Ok(Like::delete_many()
        .filter(like::Column::TargetType.eq(target.as_str()))
        .filter(like::Column::TargetId.is_in(ids.to_vec()))
        .exec(conn)
        .await?
        .rows_affected)
}

async fn delete_notifications<C: ConnectionTrait>(
    conn: &C,
    post_ids: &[i32],
    comment_ids: &[i32],
) -> AppResult<u64> {
    let mut any = Condition::any();
    if !post_ids.is_empty() {
        any = any.add(
            Condition::all()
                .add(notification::Column::TargetType.eq(LikeTarget::Post.as_str()))
                .add(notification::Column::TargetId.is_in(post_ids.to_vec())),
        );
    }
    if !comment_ids.is_empty() {
        any = any.add(
            Condition::all()
                .add(notification::Column::TargetType.eq(LikeTarget::Comment.as_str()))
                .add(notification::Column::TargetId.is_in(comment_ids.to_vec())),
        );
    }
    if any.is_empty() {
        return Ok(0);
    }
    Ok(Notification::delete_many()
        .filter(any)
        .exec(conn)
        .await?
        .rows_affected)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leaf_subtree_is_itself() {
        let edges = [(1, None), (2, Some(1))];
        assert_eq!(collect_subtree(2, &edges), vec![2]);
    }

    #[test]
    fn subtree_includes_all_descendants_only() {
        let edges = [
            (1, None),
            (2, Some(1)),
            (3, Some(2)),
            (4, Some(1)),
            (5, None),
            (6, Some(5)),
        ];
        let mut got = collect_subtree(1, &edges);
        got.sort();
        assert_eq!(got, vec![1, 2, 3, 4]);
    }

    #[test]
    fn cycles_do_not_loop() {
        let edges = [(1, Some(2)), (2, Some(1))];
        let mut got = collect_subtree(1, &edges);
        got.sort();
        assert_eq!(got, vec![1, 2]);
    }
}
