//! Presence registry — which realtime connections are open, who they belong
//! to, and which boards they listen on.
//!
//! Process-local and in-memory. It starts empty, gains entries as sockets
//! connect and identify, loses them on disconnect, and is discarded at
//! shutdown. Clients re-identify after reconnecting; nothing is resumed.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::gateway_event::{EventTarget, GatewayEvent};

/// One open realtime connection.
#[derive(Debug, Clone, Default)]
pub struct Connection {
    /// Set by `identify`; anonymous until then.
    pub user_id: Option<Uuid>,
    pub boards: HashSet<Uuid>,
    pub connected_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Default)]
struct Registry {
    connections: HashMap<Uuid, Connection>,
    /// Reverse index: a user can have several tabs open.
    by_user: HashMap<Uuid, HashSet<Uuid>>,
}

impl Registry {
    fn detach_user(&mut self, connection_id: Uuid, user_id: Uuid) {
        if let Some(set) = self.by_user.get_mut(&user_id) {
            set.remove(&connection_id);
            if set.is_empty() {
                self.by_user.remove(&user_id);
            }
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PresenceRegistry {
    inner: Arc<RwLock<Registry>>,
}

impl PresenceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn connect(&self, connection_id: Uuid) {
        let mut registry = self.inner.write().await;
        registry.connections.insert(
            connection_id,
            Connection {
                connected_at: chrono::Utc::now(),
                ..Default::default()
            },
        );
        tracing::debug!(connection_id = %connection_id, total = registry.connections.len(), "Connection registered");
    }

    /// Bind a connection to a user. Re-identifying as someone else moves the
    /// connection; its board subscriptions are replaced by `boards`.
    pub async fn identify(&self, connection_id: Uuid, user_id: Uuid, boards: impl IntoIterator<Item = Uuid>) -> bool {
        let mut registry = self.inner.write().await;
        let previous = match registry.connections.get_mut(&connection_id) {
            Some(connection) => {
                let previous = connection.user_id.replace(user_id);
                connection.boards = boards.into_iter().collect();
                previous
            }
            None => return false,
        };
        if let Some(previous) = previous.filter(|p| *p != user_id) {
            registry.detach_user(connection_id, previous);
        }
        registry.by_user.entry(user_id).or_default().insert(connection_id);
        true
    }

    /// Returns whether the subscription is new.
    pub async fn subscribe(&self, connection_id: Uuid, board_id: Uuid) -> bool {
        self.inner
            .write()
            .await
            .connections
            .get_mut(&connection_id)
            .is_some_and(|c| c.boards.insert(board_id))
    }

    pub async fn unsubscribe(&self, connection_id: Uuid, board_id: Uuid) -> bool {
        self.inner
            .write()
            .await
            .connections
            .get_mut(&connection_id)
            .is_some_and(|c| c.boards.remove(&board_id))
    }

    /// Subscribe every connection of `user_id` to `board_id`.
    pub async fn subscribe_user(&self, user_id: Uuid, board_id: Uuid) {
        let mut registry = self.inner.write().await;
        let ids: Vec<Uuid> = registry
            .by_user
            .get(&user_id)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default();
        for id in ids {
            if let Some(connection) = registry.connections.get_mut(&id) {
                connection.boards.insert(board_id);
            }
        }
    }

    /// Remove the connection and its identity entry. Returns the user it was
    /// identified as, if any.
    pub async fn disconnect(&self, connection_id: Uuid) -> Option<Uuid> {
        let mut registry = self.inner.write().await;
        let connection = registry.connections.remove(&connection_id)?;
        if let Some(user_id) = connection.user_id {
            registry.detach_user(connection_id, user_id);
        }
        connection.user_id
    }

    /// A user is online while at least one of their connections is open.
    pub async fn is_online(&self, user_id: Uuid) -> bool {
        self.inner.read().await.by_user.contains_key(&user_id)
    }

    pub async fn connection(&self, connection_id: Uuid) -> Option<Connection> {
        self.inner.read().await.connections.get(&connection_id).cloned()
    }

    pub async fn active_count(&self) -> usize {
        self.inner.read().await.connections.len()
    }

    /// Whether `event` is addressed to `connection_id`.
    pub async fn should_deliver(&self, connection_id: Uuid, event: &GatewayEvent) -> bool {
        let registry = self.inner.read().await;
        let Some(connection) = registry.connections.get(&connection_id) else {
            return false;
        };
        match event.target {
            EventTarget::All => true,
            EventTarget::Board(board_id) => connection.boards.contains(&board_id),
            EventTarget::User(user_id) => connection.user_id == Some(user_id),
        }
    }
}
