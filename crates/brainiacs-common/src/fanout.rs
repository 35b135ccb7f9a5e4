//! Notification fan-out — the only writer of outbound realtime events.
//!
//! Events go onto one broadcast channel; every gateway connection task holds
//! a receiver and keeps what the presence registry says is addressed to it.
//! Delivery is at-most-once: a send with nobody listening is not an error.

use serde::Serialize;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::gateway_event::{EventTarget, EventType, GatewayEvent};
use crate::presence::PresenceRegistry;

#[derive(Clone)]
pub struct Fanout {
    tx: broadcast::Sender<GatewayEvent>,
    presence: PresenceRegistry,
}

impl Fanout {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self {
            tx,
            presence: PresenceRegistry::new(),
        }
    }

    pub fn presence(&self) -> &PresenceRegistry {
        &self.presence
    }

    pub fn subscribe(&self) -> broadcast::Receiver<GatewayEvent> {
        self.tx.subscribe()
    }

    fn publish(&self, event: EventType, data: impl Serialize, target: EventTarget) {
        let data = match serde_json::to_value(data) {
            Ok(data) => data,
            Err(e) => {
                tracing::error!(event = %event, "Failed to serialize event payload: {e}");
                return;
            }
        };
        // Err only means no receivers are currently attached.
        let receivers = self
            .tx
            .send(GatewayEvent::new(event, data, target))
            .unwrap_or(0);
        tracing::trace!(event = %event, ?target, receivers, "Event published");
    }

    /// Board-room broadcast.
    pub fn to_board(&self, board_id: Uuid, event: EventType, data: impl Serialize) {
        self.publish(event, data, EventTarget::Board(board_id));
    }

    /// Push to one user's connections. Returns whether the user was online;
    /// an offline user simply misses the push.
    pub async fn to_user(&self, user_id: Uuid, event: EventType, data: impl Serialize) -> bool {
        if !self.presence.is_online(user_id).await {
            tracing::debug!(user_id = %user_id, event = %event, "Recipient offline, push skipped");
            return false;
        }
        self.publish(event, data, EventTarget::User(user_id));
        true
    }

    /// Global broadcast.
    pub fn to_all(&self, event: EventType, data: impl Serialize) {
        self.publish(event, data, EventTarget::All);
    }
}

impl Default for Fanout {
    fn default() -> Self {
        Self::new(crate::config::GatewayConfig::default().broadcast_capacity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_to_user_skips_offline_recipient() {
        let fanout = Fanout::new(16);
        let mut rx = fanout.subscribe();
        let user = Uuid::now_v7();

        assert!(!fanout.to_user(user, EventType::JoinRequestSent, "hello").await);
        assert!(rx.try_recv().is_err());

        let conn = Uuid::now_v7();
        fanout.presence().connect(conn).await;
        fanout.presence().identify(conn, user, []).await;
        assert!(fanout.to_user(user, EventType::JoinRequestSent, "hello").await);

        let event = rx.recv().await.unwrap();
        assert_eq!(event.event, EventType::JoinRequestSent);
        assert_eq!(event.target, EventTarget::User(user));
    }

    #[test]
    fn test_publish_without_receivers_is_silent() {
        let fanout = Fanout::new(4);
        fanout.to_all(EventType::JoinRequestsUpdated, serde_json::json!({}));
        fanout.to_board(Uuid::now_v7(), EventType::NewMessage, serde_json::json!({}));
    }
}
