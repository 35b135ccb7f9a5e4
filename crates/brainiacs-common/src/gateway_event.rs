//! Gateway event types — shared between API and Gateway crates.
//!
//! The API emits events after a mutation has been persisted and the gateway
//! forwards them to the connected clients the target selects.
//! This module lives in `brainiacs-common` so both crates can use it without circular deps.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Named events pushed to clients. The wire names are fixed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventType {
    #[serde(rename = "newMessage")]
    NewMessage,
    #[serde(rename = "messageUpdated")]
    MessageUpdated,
    #[serde(rename = "pollUpdated")]
    PollUpdated,
    #[serde(rename = "pollRemoved")]
    PollRemoved,
    #[serde(rename = "member-added")]
    MemberAdded,
    #[serde(rename = "join-request-sent")]
    JoinRequestSent,
    #[serde(rename = "join-requests-updated")]
    JoinRequestsUpdated,
}

impl EventType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NewMessage => "newMessage",
            Self::MessageUpdated => "messageUpdated",
            Self::PollUpdated => "pollUpdated",
            Self::PollRemoved => "pollRemoved",
            Self::MemberAdded => "member-added",
            Self::JoinRequestSent => "join-request-sent",
            Self::JoinRequestsUpdated => "join-requests-updated",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Who an event is addressed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "camelCase")]
pub enum EventTarget {
    /// Every connection subscribed to the board.
    Board(Uuid),
    /// Every connection identified as the user.
    User(Uuid),
    /// Every connection.
    All,
}

/// Events broadcast through the gateway to connected clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayEvent {
    pub event: EventType,
    /// Event payload as JSON
    pub data: serde_json::Value,
    pub target: EventTarget,
}

impl GatewayEvent {
    pub fn new(event: EventType, data: serde_json::Value, target: EventTarget) -> Self {
        Self {
            event,
            data,
            target,
        }
    }

    /// The board this event belongs to, if it is board-scoped.
    pub fn board_id(&self) -> Option<Uuid> {
        match self.target {
            EventTarget::Board(id) => Some(id),
            _ => None,
        }
    }
}
