//! User model — the profile store's view of a person.
//!
//! Profile CRUD belongs to an external service; boards only read profiles and
//! copy the displayable fields into members, votes and join requests.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A profile as stored in the user-profile store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub avatar: Option<String>,
}

/// Denormalized snapshot of a profile, captured when a member is added, a
/// vote is cast, or a join request is sent. Not kept in sync afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRef {
    pub user_id: Uuid,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub avatar: Option<String>,
}

impl From<&UserProfile> for UserRef {
    fn from(profile: &UserProfile) -> Self {
        Self {
            user_id: profile.id,
            name: profile.name.clone(),
            email: profile.email.clone(),
            avatar: profile.avatar.clone(),
        }
    }
}

/// Rebuild a profile from a snapshot when the live profile is unavailable.
impl From<&UserRef> for UserProfile {
    fn from(snapshot: &UserRef) -> Self {
        Self {
            id: snapshot.user_id,
            name: snapshot.name.clone(),
            email: snapshot.email.clone(),
            avatar: snapshot.avatar.clone(),
        }
    }
}

impl UserRef {
    /// Refresh the displayable fields from a live profile, keeping the id.
    pub fn with_profile(mut self, profile: &UserProfile) -> Self {
        self.name = profile.name.clone();
        self.email = profile.email.clone();
        self.avatar = profile.avatar.clone();
        self
    }
}
