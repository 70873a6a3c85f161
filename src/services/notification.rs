use crate::{
    error::{AppError, AppResult},
    models::{notification, Notification, NotificationModel},
    websocket::hub::{PushEvent, PushHub},
};
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder,
};

/// Notification kinds written by the handlers.
pub mod kind {
    pub const LIKE_POST: &str = "like_post";
    pub const LIKE_COMMENT: &str = "like_comment";
    pub const FAVORITE_POST: &str = "favorite_post";
    pub const COMMENT_ON_POST: &str = "comment_on_post";
    pub const REPLY_TO_COMMENT: &str = "reply_to_comment";
    pub const FOLLOW: &str = "follow";
}

/// Input for [`NotificationService::notify`].
pub struct NewNotification<'a> {
    pub user_id: i32,
    pub actor_id: i32,
    pub kind: &'a str,
    pub target_type: &'a str,
    pub target_id: i32,
    pub message: &'a str,
    /// Activity inside an anonymous category keeps the actor out of responses.
    pub actor_hidden: bool,
}

pub struct NotificationService {
    db: DatabaseConnection,
    hub: PushHub,
}

impl NotificationService {
    pub fn new(db: DatabaseConnection, hub: PushHub) -> Self {
        Self { db, hub }
    }

    /// Persist and push. Self-actions are skipped.
    pub async fn notify(&self, new: NewNotification<'_>) -> AppResult<()> {
        if new.user_id == new.actor_id {
            return Ok(());
        }

        let saved = notification::ActiveModel {
            user_id: sea_orm::ActiveValue::Set(new.user_id),
            kind: sea_orm::ActiveValue::Set(new.kind.to_string()),
            actor_id: sea_orm::ActiveValue::Set(new.actor_id),
            actor_hidden: sea_orm::ActiveValue::Set(new.actor_hidden),
            target_type: sea_orm::ActiveValue::Set(new.target_type.to_string()),
            target_id: sea_orm::ActiveValue::Set(new.target_id),
            message: sea_orm::ActiveValue::Set(new.message.to_string()),
            is_read: sea_orm::ActiveValue::Set(false),
            read_at: sea_orm::ActiveValue::Set(None),
            created_at: sea_orm::ActiveValue::Set(chrono::Utc::now().naive_utc()),
            ..Default::default()
        }
        .insert(&self.db)
        .await?;

        self.hub.push(
            new.user_id,
            &PushEvent::Notification(serde_json::json!({
                "id": saved.id,
                "kind": &saved.kind,
                "actor_id": visible_actor(&saved),
                "message": &saved.message,
                "target_type": &saved.target_type,
                "target_id": saved.target_id,
                "created_at": saved.created_at.to_string(),
            })),
        );

        Ok(())
    }

    /// Fire-and-forget variant used by handlers after the primary write.
    pub async fn notify_best_effort(&self, new: NewNotification<'_>) {
        let kind = new.kind;
        if let Err(e) = self.notify(new).await {
            tracing::warn!("notification '{}' not delivered: {}", kind, e);
        }
    }

    pub async fn list_for_user(
        &self,
        user_id: i32,
        page: u64,
        per_page: u64,
    ) -> AppResult<(Vec<NotificationModel>, u64)> {
        let paginator = Notification::find()
            .filter(notification::Column::UserId.eq(user_id))
            .order_by_desc(notification::Column::CreatedAt)
            .order_by_desc(notification::Column::Id)
            .paginate(&self.db, per_page);

        let total = paginator.num_items().await?;
        let items = paginator.fetch_page(page.saturating_sub(1)).await?;
        Ok((items, total))
    }

    pub async fn unread_count(&self, user_id: i32) -> AppResult<u64> {
        let count = Notification::find()
            .filter(notification::Column::UserId.eq(user_id))
            .filter(notification::Column::IsRead.eq(false))
            .count(&self.db)
            .await?;
        Ok(count)
    }

    /// Other users' notifications are reported as missing. Marking twice
    /// keeps the first `read_at`.
    pub async fn mark_read(&self, id: i32, user_id: i32) -> AppResult<NotificationModel> {
        let existing = Notification::find_by_id(id)
            .filter(notification::Column::UserId.eq(user_id))
            .one(&self.db)
            .await?
            .ok_or(AppError::NotFound)?;
        if existing.is_read {
            return Ok(existing);
        }

        let mut active: notification::ActiveModel = existing.into();
        active.is_read = sea_orm::ActiveValue::Set(true);
        active.read_at = sea_orm::ActiveValue::Set(Some(chrono::Utc::now().naive_utc()));
        Ok(active.update(&self.db).await?)
    }

    pub async fn mark_all_read(&self, user_id: i32) -> AppResult<u64> {
        let result = Notification::update_many()
            .col_expr(notification::Column::IsRead, Expr::value(true))
            .col_expr(
                notification::Column::ReadAt,
                Expr::value(chrono::Utc::now().naive_utc()),
            )
            .filter(notification::Column::UserId.eq(user_id))
            .filter(notification::Column::IsRead.eq(false))
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected)
    }
}

/// Actor id as exposed to the recipient.
pub fn visible_actor(n: &NotificationModel) -> Option<i32> {
    (!n.actor_hidden).then_some(n.actor_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;

    fn notification(actor_hidden: bool) -> NotificationModel {
        NotificationModel {
            id: 1,
            user_id: 2,
            kind: kind::LIKE_POST.to_string(),
            actor_id: 3,
            actor_hidden,
            target_type: "post".to_string(),
            target_id: 4,
            message: "liked".to_string(),
            is_read: false,
            read_at: None,
            created_at: NaiveDateTime::default(),
        }
    }

    #[test]
    fn hidden_actor_is_not_exposed() {
        assert_eq!(visible_actor(&notification(true)), None);
    }

    #[test]
    fn visible_actor_is_exposed() {
        assert_eq!(visible_actor(&notification(false)), Some(3));
    }
}
