//! One gateway connection's view of the world.
//!
//! A [`Session`] lives on the receive side of a socket and turns client ops
//! into replies. An [`EventFilter`] lives on the send side and decides which
//! fanned-out events belong to this connection. Both read and write the same
//! presence entry, keyed by the connection id.

use brainiacs_api::routes::messages;
use brainiacs_common::error::{BrainiacsError, BrainiacsResult};
use brainiacs_common::gateway_event::{EventType, GatewayEvent};
use brainiacs_common::models::{Board, CreateMessageRequest, UserProfile, Visibility};
use brainiacs_common::presence::PresenceRegistry;
use brainiacs_common::snowflake;
use brainiacs_db::repository::{boards, users};
use std::sync::Arc;
use uuid::Uuid;

use crate::GatewayState;
use crate::protocol::{ClientOp, ServerOp};

pub struct Session {
    state: Arc<GatewayState>,
    connection_id: Uuid,
    user: Option<UserProfile>,
}

impl Session {
    /// Register a fresh, anonymous connection.
    pub async fn open(state: Arc<GatewayState>) -> Self {
        let connection_id = snowflake::generate_id();
        state.presence().connect(connection_id).await;
        Self {
            state,
            connection_id,
            user: None,
        }
    }

    pub fn connection_id(&self) -> Uuid {
        self.connection_id
    }

    pub fn user(&self) -> Option<&UserProfile> {
        self.user.as_ref()
    }

    pub fn hello(&self) -> ServerOp {
        ServerOp::Hello {
            heartbeat_interval: self.state.heartbeat_interval_ms,
        }
    }

    pub fn filter(&self) -> EventFilter {
        EventFilter {
            presence: self.state.presence().clone(),
            connection_id: self.connection_id,
        }
    }

    /// Handle one client op. Failures become an `error` frame for this
    /// connection only.
    pub async fn handle(&mut self, op: ClientOp) -> Option<ServerOp> {
        let result = match op {
            ClientOp::Identify { user_email } => self.identify(&user_email).await.map(Some),
            ClientOp::SendMessage { board_id, message } => {
                self.send_message(board_id, message).await.map(|_| None)
            }
            ClientOp::JoinBoard { board_id } => self.join_board(board_id).await.map(Some),
            ClientOp::LeaveBoard { board_id } => self.leave_board(board_id).await.map(Some),
            ClientOp::Heartbeat => Ok(Some(ServerOp::HeartbeatAck {
                timestamp: chrono::Utc::now().timestamp_millis(),
            })),
        };

        result.unwrap_or_else(|e| {
            tracing::debug!(
                connection_id = %self.connection_id,
                user_id = ?self.user().map(|u| u.id),
                "Gateway op failed: {e}"
            );
            Some(ServerOp::error(&e))
        })
    }

    fn require_identified(&self) -> BrainiacsResult<&UserProfile> {
        self.user
            .as_ref()
            .ok_or_else(|| BrainiacsError::forbidden("Identify before using this connection"))
    }

    async fn identify(&mut self, email: &str) -> BrainiacsResult<ServerOp> {
        let db = &self.state.app.db;
        let user = db
            .timed("find user by email", users::find_by_email(&db.pool, email.trim()))
            .await?
            .ok_or_else(|| BrainiacsError::not_found("User"))?;
        let member_of = db
            .timed("list member boards", boards::list_boards_for_member(&db.pool, user.id))
            .await?;

        self.state
            .presence()
            .identify(self.connection_id, user.id, member_of.iter().map(|b| b.id))
            .await;

        tracing::info!(
            connection_id = %self.connection_id,
            user_id = %user.id,
            boards = member_of.len(),
            "Gateway READY sent"
        );
        let ready = ServerOp::Ready {
            connection_id: self.connection_id,
            user: user.clone(),
            boards: member_of.iter().map(Board::summary).collect(),
        };
        self.user = Some(user);
        Ok(ready)
    }

    async fn send_message(&self, board_id: Uuid, message: CreateMessageRequest) -> BrainiacsResult<()> {
        let user = self.require_identified()?;
        if message.sender_id != user.id {
            return Err(BrainiacsError::forbidden(
                "senderId must match the identified user",
            ));
        }
        messages::post_message(&self.state.app, board_id, message).await?;
        Ok(())
    }

    async fn join_board(&self, board_id: Uuid) -> BrainiacsResult<ServerOp> {
        let user = self.require_identified()?;
        let board = self.state.app.db.load_board(board_id).await?;
        if board.visibility == Visibility::Private && !board.is_member(user.id) {
            return Err(BrainiacsError::forbidden(
                "Only members can listen to a private board",
            ));
        }
        self.state.presence().subscribe(self.connection_id, board_id).await;
        Ok(ServerOp::Subscribed { board_id })
    }

    async fn leave_board(&self, board_id: Uuid) -> BrainiacsResult<ServerOp> {
        self.require_identified()?;
        self.state.presence().unsubscribe(self.connection_id, board_id).await;
        Ok(ServerOp::Unsubscribed { board_id })
    }

    /// Drop the presence entry. Returns the user the connection was bound to.
    pub async fn close(self) -> Option<Uuid> {
        self.state.presence().disconnect(self.connection_id).await
    }
}

/// Send-side filter over the shared broadcast stream.
#[derive(Clone)]
pub struct EventFilter {
    presence: PresenceRegistry,
    connection_id: Uuid,
}

impl EventFilter {
    /// The frame to send for `event`, or `None` if it is not addressed to this
    /// connection. A `member-added` naming this connection's own user
    /// subscribes it to the board before the check.
    pub async fn admit(&self, event: &GatewayEvent) -> Option<ServerOp> {
        if event.event == EventType::MemberAdded {
            self.follow_new_membership(event).await;
        }
        self.presence
            .should_deliver(self.connection_id, event)
            .await
            .then(|| ServerOp::dispatch(event))
    }

    async fn follow_new_membership(&self, event: &GatewayEvent) {
        let Some(board_id) = event.board_id() else {
            return;
        };
        let added = event.data["member"]["userId"]
            .as_str()
            .and_then(|raw| raw.parse::<Uuid>().ok());
        let Some(connection) = self.presence.connection(self.connection_id).await else {
            return;
        };
        if added.is_some() && connection.user_id == added {
            self.presence.subscribe(self.connection_id, board_id).await;
        }
    }
}
