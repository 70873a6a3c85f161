use dashmap::DashMap;
use serde::Serialize;
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};
use tokio::sync::mpsc;

pub type WsSender = mpsc::UnboundedSender<String>;

/// Frame pushed to a connected client: `{"type": ..., "data": ...}`.
#[derive(Debug, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum PushEvent {
    Notification(serde_json::Value),
    Message(serde_json::Value),
}

/// Live WebSocket connections per user. A user may hold several.
#[derive(Clone, Default)]
pub struct PushHub {
    connections: Arc<DashMap<i32, Vec<(u64, WsSender)>>>,
    next_conn_id: Arc<AtomicU64>,
}

impl PushHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, user_id: i32) -> (u64, mpsc::UnboundedReceiver<String>) {
        let conn_id = self.next_conn_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();
        self.connections
            .entry(user_id)
            .or_default()
            .push((conn_id, tx));
        (conn_id, rx)
    }

    pub fn unsubscribe(&self, user_id: i32, conn_id: u64) {
        self.connections
            .remove_if_mut(&user_id, |_, senders| {
                senders.retain(|(id, _)| *id != conn_id);
                senders.is_empty()
            });
    }

    pub fn is_online(&self, user_id: i32) -> bool {
        self.connections.contains_key(&user_id)
    }

    /// Deliver to every open connection of `user_id`, dropping closed ones.
    pub fn push(&self, user_id: i32, event: &PushEvent) {
        if !self.is_online(user_id) {
            return;
        }
        let frame = match serde_json::to_string(event) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!("failed to encode push event: {}", e);
                return;
            }
        };
        self.connections.remove_if_mut(&user_id, |_, senders| {
            senders.retain(|(_, sender)| sender.send(frame.clone()).is_ok());
            senders.is_empty()
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn pushes_reach_every_connection_of_the_user() {
        let hub = PushHub::new();
        let (_, mut a) = hub.subscribe(1);
        let (_, mut b) = hub.subscribe(1);
        let (_, mut other) = hub.subscribe(2);

        hub.push(1, &PushEvent::Message(serde_json::json!({"id": 5})));

        let frame = a.recv().await.unwrap();
        assert_eq!(frame, r#"{"type":"message","data":{"id":5}}"#);
        assert_eq!(b.recv().await.unwrap(), frame);
        assert!(other.try_recv().is_err());
    }

    #[test]
    fn closed_connections_are_pruned() {
        let hub = PushHub::new();
        let (_, rx) = hub.subscribe(1);
        drop(rx);
        hub.push(1, &PushEvent::Notification(serde_json::json!({})));
        assert!(!hub.is_online(1));
    }

    #[test]
    fn unsubscribe_removes_only_that_connection() {
        let hub = PushHub::new();
        let (first, _rx1) = hub.subscribe(1);
        let (_second, _rx2) = hub.subscribe(1);
        hub.unsubscribe(1, first);
        assert!(hub.is_online(1));
    }
}
