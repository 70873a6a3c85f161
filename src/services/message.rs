use crate::{
    error::{AppError, AppResult},
    models::{message, Message, MessageModel},
    services::visibility::{find_visible_user, ViewerContext},
    websocket::hub::{PushEvent, PushHub},
};
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder,
};
use std::collections::HashMap;

pub const MAX_MESSAGE_LEN: usize = 2000;

/// One row of the inbox: everything exchanged with a single counterparty.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversationSummary {
    pub counterparty_id: i32,
    pub last_message: MessageModel,
    pub unread_count: u64,
}

/// Group `messages` by the other participant. The latest message wins by
/// `(created_at, id)`; unread counts only messages `user_id` received.
/// Newest conversation first.
pub fn aggregate_conversations(user_id: i32, messages: &[MessageModel]) -> Vec<ConversationSummary> {
    let mut groups: HashMap<i32, ConversationSummary> = HashMap::new();

    for msg in messages {
        if msg.sender_id != user_id && msg.receiver_id != user_id {
            continue;
        }
        let unread = u64::from(msg.receiver_id == user_id && !msg.is_read);
        let counterparty_id = msg.counterparty(user_id);

        groups
            .entry(counterparty_id)
            .and_modify(|c| {
                if (msg.created_at, msg.id) > (c.last_message.created_at, c.last_message.id) {
                    c.last_message = msg.clone();
                }
                c.unread_count += unread;
            })
            .or_insert_with(|| ConversationSummary {
                counterparty_id,
                last_message: msg.clone(),
                unread_count: unread,
            });
    }

    let mut out: Vec<ConversationSummary> = groups.into_values().collect();
    out.sort_by(|a, b| {
        (b.last_message.created_at, b.last_message.id)
            .cmp(&(a.last_message.created_at, a.last_message.id))
    });
    out
}

pub struct MessageService {
    db: DatabaseConnection,
    hub: PushHub,
}

impl MessageService {
    pub fn new(db: DatabaseConnection, hub: PushHub) -> Self {
        Self { db, hub }
    }

    /// Recipients hidden from the sender are reported as missing.
    pub async fn send(
        &self,
        viewer: &ViewerContext,
        receiver_id: i32,
        content: &str,
    ) -> AppResult<MessageModel> {
        let sender_id = viewer.user_id;
        if sender_id == receiver_id {
            return Err(AppError::Validation(
                "Cannot send a message to yourself".to_string(),
            ));
        }
        let content = content.trim();
        if content.is_empty() || content.chars().count() > MAX_MESSAGE_LEN {
            return Err(AppError::Validation(format!(
                "Message must be 1-{} characters",
                MAX_MESSAGE_LEN
            )));
        }

        let receiver = find_visible_user(&self.db, Some(viewer), receiver_id).await?;
        if !receiver.is_active() {
            return Err(AppError::Forbidden(
                "Recipient account is deactivated".to_string(),
            ));
        }

        let saved = message::ActiveModel {
            sender_id: sea_orm::ActiveValue::Set(sender_id),
            receiver_id: sea_orm::ActiveValue::Set(receiver_id),
            content: sea_orm::ActiveValue::Set(content.to_string()),
            is_read: sea_orm::ActiveValue::Set(false),
            read_at: sea_orm::ActiveValue::Set(None),
            created_at: sea_orm::ActiveValue::Set(chrono::Utc::now().naive_utc()),
            ..Default::default()
        }
        .insert(&self.db)
        .await?;

        self.hub.push(
            receiver_id,
            &PushEvent::Message(serde_json::json!({
                "id": saved.id,
                "sender_id": saved.sender_id,
                "content": &saved.content,
                "created_at": saved.created_at.to_string(),
            })),
        );

        Ok(saved)
    }

    /// Recomputed from the message table on every call.
    pub async fn list_conversations(&self, user_id: i32) -> AppResult<Vec<ConversationSummary>> {
        let messages = Message::find()
            .filter(
                Condition::any()
                    .add(message::Column::SenderId.eq(user_id))
                    .add(message::Column::ReceiverId.eq(user_id)),
            )
            .all(&self.db)
            .await?;
        Ok(aggregate_conversations(user_id, &messages))
    }

    /// Thread between the viewer and `other_id`, oldest first.
    pub async fn list_messages(
        &self,
        viewer: &ViewerContext,
        other_id: i32,
        page: u64,
        per_page: u64,
    ) -> AppResult<(Vec<MessageModel>, u64)> {
        let user_id = viewer.user_id;
        find_visible_user(&self.db, Some(viewer), other_id).await?;

        let paginator = Message::find()
            .filter(thread(user_id, other_id))
            .order_by_asc(message::Column::CreatedAt)
            .order_by_asc(message::Column::Id)
            .paginate(&self.db, per_page);

        let total = paginator.num_items().await?;
        let items = paginator.fetch_page(page.saturating_sub(1)).await?;
        Ok((items, total))
    }

    /// Flip every unread message `user_id` received from `other_id`.
    pub async fn mark_conversation_read(&self, user_id: i32, other_id: i32) -> AppResult<u64> {
        let now = chrono::Utc::now().naive_utc();
        let result = Message::update_many()
            .col_expr(message::Column::IsRead, Expr::value(true))
            .col_expr(message::Column::ReadAt, Expr::value(now))
            .filter(message::Column::ReceiverId.eq(user_id))
            .filter(message::Column::SenderId.eq(other_id))
            .filter(message::Column::IsRead.eq(false))
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected)
    }

    /// Only the receiver may mark a message; `read_at` is written once.
    pub async fn mark_message_read(&self, user_id: i32, id: i32) -> AppResult<MessageModel> {
        let existing = Message::find_by_id(id)
            .filter(message::Column::ReceiverId.eq(user_id))
            .one(&self.db)
            .await?
            .ok_or(AppError::NotFound)?;
        if existing.is_read {
            return Ok(existing);
        }

        Message::update_many()
            .col_expr(message::Column::IsRead, Expr::value(true))
            .col_expr(
                message::Column::ReadAt,
                Expr::value(chrono::Utc::now().naive_utc()),
            )
            .filter(message::Column::Id.eq(id))
            .filter(message::Column::IsRead.eq(false))
            .exec(&self.db)
            .await?;

        Message::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or(AppError::NotFound)
    }

    pub async fn unread_total(&self, user_id: i32) -> AppResult<u64> {
        Ok(Message::find()
            .filter(message::Column::ReceiverId.eq(user_id))
            .filter(message::Column::IsRead.eq(false))
            .count(&self.db)
            .await?)
    }
}

fn thread(a: i32, b: i32) -> Condition {
    Condition::any()
        .add(
            Condition::all()
                .add(message::Column::SenderId.eq(a))
                .add(message::Column::ReceiverId.eq(b)),
        )
        .add(
            Condition::all()
                .add(message::Column::SenderId.eq(b))
                .add(message::Column::ReceiverId.eq(a)),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;

    fn msg(id: i32, from: i32, to: i32, t: i64, read: bool) -> MessageModel {
        let at = NaiveDateTime::default() + chrono::Duration::seconds(t);
        MessageModel {
            id,
            sender_id: from,
            receiver_id: to,
            content: format!("m{}", id),
            is_read: read,
            read_at: read.then_some(at),
            created_at: at,
        }
    }

    #[test]
    fn conversations_ordered_by_latest_message() {
        let messages = vec![
            msg(1, 2, 1, 1, false), // A: user2 -> user1, unread
            msg(2, 2, 1, 3, true),  // B: user2 -> user1, read
            msg(3, 3, 1, 2, false), // C: user3 -> user1, unread
        ];
        let convs = aggregate_conversations(1, &messages);

        assert_eq!(convs.len(), 2);
        assert_eq!(convs[0].counterparty_id, 2);
        assert_eq!(convs[0].last_message.id, 2);
        assert_eq!(convs[0].unread_count, 1);
        assert_eq!(convs[1].counterparty_id, 3);
        assert_eq!(convs[1].unread_count, 1);
    }

    #[test]
    fn sent_messages_never_count_as_unread() {
        let messages = vec![msg(1, 1, 2, 1, false), msg(2, 1, 2, 2, false)];
        let convs = aggregate_conversations(1, &messages);
        assert_eq!(convs.len(), 1);
        assert_eq!(convs[0].unread_count, 0);
        assert_eq!(convs[0].counterparty_id, 2);
    }

    #[test]
    fn same_timestamp_breaks_tie_on_id() {
        let messages = vec![msg(7, 2, 1, 5, true), msg(9, 1, 2, 5, true), msg(8, 2, 1, 5, true)];
        let convs = aggregate_conversations(1, &messages);
        assert_eq!(convs[0].last_message.id, 9);
    }

    #[test]
    fn unread_is_scoped_per_counterparty() {
        let messages = vec![
            msg(1, 2, 1, 1, false),
            msg(2, 2, 1, 2, false),
            msg(3, 3, 1, 3, false),
        ];
        let convs = aggregate_conversations(1, &messages);
        let by_peer: HashMap<i32, u64> = convs
            .iter()
            .map(|c| (c.counterparty_id, c.unread_count))
            .collect();
        assert_eq!(by_peer[&2], 2);
        assert_eq!(by_peer[&3], 1);
    }

    #[test]
    fn unrelated_messages_are_ignored() {
        let messages = vec![msg(1, 4, 5, 1, false)];
        assert!(aggregate_conversations(1, &messages).is_empty());
    }

    #[test]
    fn empty_inbox() {
        assert!(aggregate_conversations(1, &[]).is_empty());
    }
}
