//! Join request model — asynchronous requests to add a user to a board.
//!
//! Lives outside the board document and outlives connections, so a receiver
//! who was offline when it was sent can still find it by polling.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::board::Board;
use super::user::{UserProfile, UserRef};
use crate::error::{BrainiacsError, BrainiacsResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JoinRequestStatus {
    Pending,
    Accepted,
    Rejected,
}

impl JoinRequestStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
        }
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl fmt::Display for JoinRequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JoinRequestStatus {
    type Err = BrainiacsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "accepted" => Ok(Self::Accepted),
            "rejected" => Ok(Self::Rejected),
            other => Err(BrainiacsError::validation(format!(
                "Unknown join request status '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinRequest {
    pub id: Uuid,
    pub board_id: Uuid,
    /// Board name at send time
    pub board_name: String,
    pub sender: UserRef,
    pub receiver: UserRef,
    pub status: JoinRequestStatus,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

/// What happened when a resolution was applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Pending → terminal.
    Applied,
    /// Already in the requested terminal state.
    Unchanged,
}

impl JoinRequest {
    pub fn new(
        id: Uuid,
        board: &Board,
        sender: &UserProfile,
        receiver: &UserProfile,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            board_id: board.id,
            board_name: board.name.clone(),
            sender: UserRef::from(sender),
            receiver: UserRef::from(receiver),
            status: JoinRequestStatus::Pending,
            created_at: now,
            resolved_at: None,
        }
    }

    /// Move to `accepted` or `rejected`. Repeating the current terminal status
    /// is accepted as a no-op; switching between terminal states is not.
    pub fn resolve(&mut self, status: JoinRequestStatus, now: DateTime<Utc>) -> BrainiacsResult<Resolution> {
        if !status.is_terminal() {
            return Err(BrainiacsError::validation(
                "Status must be 'accepted' or 'rejected'",
            ));
        }
        match self.status {
            JoinRequestStatus::Pending => {
                self.status = status;
                self.resolved_at = Some(now);
                Ok(Resolution::Applied)
            }
            current if current == status => Ok(Resolution::Unchanged),
            current => Err(BrainiacsError::conflict(format!(
                "Join request was already {current}"
            ))),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateJoinRequestRequest {
    pub board_id: Uuid,
    pub sender_id: Uuid,
    pub receiver_id: Uuid,
}

/// Status arrives as a raw string so unknown values surface as a
/// validation error rather than a body-parse failure.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolveJoinRequestRequest {
    pub status: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinRequestFilter {
    pub receiver_id: Option<Uuid>,
    pub sender_id: Option<Uuid>,
    pub board_id: Option<Uuid>,
    pub status: Option<JoinRequestStatus>,
}
