//! Member model — a user's participation in a board.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::user::{UserProfile, UserRef};
use crate::error::BrainiacsError;

/// Board-level role. Closed set: anything else is rejected at the boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemberRole {
    Admin,
    Member,
}

impl fmt::Display for MemberRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Admin => f.write_str("admin"),
            Self::Member => f.write_str("member"),
        }
    }
}

impl FromStr for MemberRole {
    type Err = BrainiacsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Self::Admin),
            "member" => Ok(Self::Member),
            other => Err(BrainiacsError::validation(format!("Unknown role '{other}'"))),
        }
    }
}

/// A user's membership on a board, with profile fields cached at add time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Member {
    #[serde(flatten)]
    pub user: UserRef,
    pub role: MemberRole,
}

impl Member {
    pub fn new(profile: &UserProfile, role: MemberRole) -> Self {
        Self {
            user: UserRef::from(profile),
            role,
        }
    }

    pub fn user_id(&self) -> uuid::Uuid {
        self.user.user_id
    }
}
