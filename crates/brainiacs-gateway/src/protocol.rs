//! Gateway wire protocol.
//!
//! Every frame is `{"op": <name>, "d": <payload>}`. Ops are named, not
//! numbered. Server events arrive wrapped in a `dispatch` frame.

use brainiacs_common::error::BrainiacsError;
use brainiacs_common::gateway_event::{EventType, GatewayEvent};
use brainiacs_common::models::{BoardSummary, CreateMessageRequest, UserProfile};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Client → server.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "op", content = "d", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ClientOp {
    /// Bind this connection to a user and subscribe it to their boards.
    Identify { user_email: String },

    /// Post a message exactly as `PUT /boards/:id/messages` would.
    SendMessage {
        board_id: Uuid,
        #[serde(flatten)]
        message: CreateMessageRequest,
    },

    JoinBoard { board_id: Uuid },

    LeaveBoard { board_id: Uuid },

    Heartbeat,
}

/// Server → client.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "op", content = "d", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ServerOp {
    /// First frame on every connection.
    Hello { heartbeat_interval: u64 },

    Ready {
        connection_id: Uuid,
        user: UserProfile,
        boards: Vec<BoardSummary>,
    },

    HeartbeatAck { timestamp: i64 },

    Subscribed { board_id: Uuid },

    Unsubscribed { board_id: Uuid },

    Dispatch {
        event: EventType,
        data: serde_json::Value,
    },

    /// A client op failed. Same codes as the REST error envelope.
    Error { code: String, message: String },
}

impl ServerOp {
    pub fn dispatch(event: &GatewayEvent) -> Self {
        Self::Dispatch {
            event: event.event,
            data: event.data.clone(),
        }
    }

    pub fn error(err: &BrainiacsError) -> Self {
        Self::Error {
            code: err.error_code().to_string(),
            message: err.client_message(),
        }
    }
}
