//! Message model — one entry in a board's chat thread.
//!
//! Lifecycle: active → (edited)* → deleted. Deleted is terminal. Seen-by and
//! reactions are orthogonal to that lifecycle; the pin is an independent
//! overlay that goes stale on its own once its expiry passes.
//!
//! All mutations here are pure: the caller loads a board, applies one of
//! these methods, and writes the board back under its version stamp.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;
use validator::Validate;

use super::member::MemberRole;
use crate::error::{BrainiacsError, BrainiacsResult};
use crate::expiry;

/// A message in a board thread.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: Uuid,
    pub sender_id: Uuid,
    /// Sender display name at send time
    pub sender_name: String,
    /// Sender role at send time
    pub role: MemberRole,
    /// `None` once the message is soft-deleted
    pub text: Option<String>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub edited_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub seen_by: BTreeSet<Uuid>,
    /// Symbol → users. A user appears under at most one symbol.
    #[serde(default)]
    pub reactions: BTreeMap<Reaction, BTreeSet<Uuid>>,
    #[serde(default)]
    pub pin: Option<Pin>,
    #[serde(default)]
    pub deleted: Option<Deletion>,
}

/// File attachment metadata. The file itself lives in external storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    #[validate(length(min = 1, max = 2048, message = "Attachment url must be 1-2048 characters"))]
    pub url: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub content_type: Option<String>,
    #[serde(default)]
    pub size: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pin {
    pub pinned_by: Uuid,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Deletion {
    pub deleted_by: Uuid,
    pub deleted_at: DateTime<Utc>,
}

/// The reaction palette. Serialized as the emoji itself; deserialized through
/// [`FromStr`] so names and bare emoji are accepted too.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Reaction {
    #[serde(rename = "👍")]
    Like,
    #[serde(rename = "❤️")]
    Love,
    #[serde(rename = "😂")]
    Laugh,
    #[serde(rename = "😮")]
    Wow,
    #[serde(rename = "😢")]
    Sad,
    #[serde(rename = "😡")]
    Angry,
    #[serde(rename = "🎉")]
    Party,
}

impl Reaction {
    pub const ALL: [Reaction; 7] = [
        Self::Like,
        Self::Love,
        Self::Laugh,
        Self::Wow,
        Self::Sad,
        Self::Angry,
        Self::Party,
    ];

    pub fn emoji(self) -> &'static str {
        match self {
            Self::Like => "👍",
            Self::Love => "❤️",
            Self::Laugh => "😂",
            Self::Wow => "😮",
            Self::Sad => "😢",
            Self::Angry => "😡",
            Self::Party => "🎉",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Like => "like",
            Self::Love => "love",
            Self::Laugh => "laugh",
            Self::Wow => "wow",
            Self::Sad => "sad",
            Self::Angry => "angry",
            Self::Party => "party",
        }
    }
}

impl fmt::Display for Reaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.emoji())
    }
}

/// Accepts the emoji (with or without the emoji variation selector) or its name.
impl FromStr for Reaction {
    type Err = BrainiacsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().trim_end_matches('\u{FE0F}');
        Self::ALL
            .into_iter()
            .find(|r| {
                r.emoji().trim_end_matches('\u{FE0F}') == wanted
                    || r.name().eq_ignore_ascii_case(wanted)
            })
            .ok_or_else(|| BrainiacsError::validation(format!("Unsupported reaction '{s}'")))
    }
}

impl<'de> Deserialize<'de> for Reaction {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

impl Message {
    /// Build a new message. At least one of text or attachments is required.
    pub fn new(
        id: Uuid,
        sender_id: Uuid,
        sender_name: String,
        role: MemberRole,
        text: Option<String>,
        attachments: Vec<Attachment>,
        now: DateTime<Utc>,
    ) -> BrainiacsResult<Self> {
        let sender_name = sender_name.trim().to_string();
        if sender_name.is_empty() {
            return Err(BrainiacsError::validation("senderName is required"));
        }
        let text = text
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());
        if text.is_none() && attachments.is_empty() {
            return Err(BrainiacsError::validation(
                "A message needs text or at least one attachment",
            ));
        }

        Ok(Self {
            id,
            sender_id,
            sender_name,
            role,
            text,
            attachments,
            created_at: now,
            edited_at: None,
            seen_by: BTreeSet::new(),
            reactions: BTreeMap::new(),
            pin: None,
            deleted: None,
        })
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted.is_some()
    }

    fn ensure_not_deleted(&self) -> BrainiacsResult<()> {
        if self.is_deleted() {
            return Err(BrainiacsError::validation("Message has been deleted"));
        }
        Ok(())
    }

    /// Replace the text in place. Send time, seen-by and reactions are untouched.
    pub fn edit(
        &mut self,
        text: &str,
        edited_by: Option<Uuid>,
        now: DateTime<Utc>,
    ) -> BrainiacsResult<()> {
        self.ensure_not_deleted()?;
        if edited_by.is_some_and(|editor| editor != self.sender_id) {
            return Err(BrainiacsError::forbidden("Only the sender can edit a message"));
        }
        let text = text.trim();
        if text.is_empty() && self.attachments.is_empty() {
            return Err(BrainiacsError::validation(
                "A message needs text or at least one attachment",
            ));
        }
        self.text = (!text.is_empty()).then(|| text.to_string());
        self.edited_at = Some(now);
        Ok(())
    }

    /// Soft delete: only the sender may do it. Attachments and reactions stay.
    /// Deleting an already deleted message leaves the first deletion record.
    pub fn soft_delete(&mut self, deleted_by: Uuid, now: DateTime<Utc>) -> BrainiacsResult<()> {
        if deleted_by != self.sender_id {
            return Err(BrainiacsError::forbidden(
                "Only the sender can delete a message",
            ));
        }
        if self.is_deleted() {
            return Ok(());
        }
        self.text = None;
        self.deleted = Some(Deletion {
            deleted_by,
            deleted_at: now,
        });
        Ok(())
    }

    /// Add `user_id` to the seen-by set. Returns whether the set grew.
    pub fn mark_seen(&mut self, user_id: Uuid) -> bool {
        self.seen_by.insert(user_id)
    }

    /// The symbol `user_id` currently reacts with, if any.
    pub fn reaction_of(&self, user_id: Uuid) -> Option<Reaction> {
        self.reactions
            .iter()
            .find(|(_, users)| users.contains(&user_id))
            .map(|(reaction, _)| *reaction)
    }

    /// Evict the user's current reaction, then add `reaction` if given.
    /// Symbols left without users are dropped from the map.
    pub fn set_reaction(&mut self, user_id: Uuid, reaction: Option<Reaction>) -> BrainiacsResult<()> {
        self.ensure_not_deleted()?;
        self.clear_reaction(user_id);
        if let Some(reaction) = reaction {
            self.reactions.entry(reaction).or_default().insert(user_id);
        }
        Ok(())
    }

    /// Remove the user's reaction only if it is `reaction`. Returns whether
    /// anything changed.
    pub fn remove_reaction(&mut self, user_id: Uuid, reaction: Reaction) -> bool {
        if self.reaction_of(user_id) != Some(reaction) {
            return false;
        }
        self.clear_reaction(user_id);
        true
    }

    fn clear_reaction(&mut self, user_id: Uuid) {
        self.reactions.retain(|_, users| {
            users.remove(&user_id);
            !users.is_empty()
        });
    }

    /// Pin for `duration_days`. Zero days yields a pin that is already stale.
    pub fn pin(&mut self, pinned_by: Uuid, duration_days: u32, now: DateTime<Utc>) -> BrainiacsResult<()> {
        self.ensure_not_deleted()?;
        let expires_at = now
            .checked_add_signed(Duration::days(i64::from(duration_days)))
            .ok_or_else(|| BrainiacsError::validation("pinDuration is out of range"))?;
        self.pin = Some(Pin {
            pinned_by,
            expires_at,
        });
        Ok(())
    }

    pub fn unpin(&mut self) {
        self.pin = None;
    }

    /// Pinned means a pin record exists and its expiry has not passed.
    pub fn is_pinned(&self, now: DateTime<Utc>) -> bool {
        self.pin
            .as_ref()
            .is_some_and(|pin| !expiry::has_expired(pin.expires_at, now))
    }

    /// Drop a pin whose expiry has passed. Used on read copies so clients see
    /// `pin: null` for anything not currently pinned.
    pub fn clear_stale_pin(&mut self, now: DateTime<Utc>) {
        if !self.is_pinned(now) {
            self.pin = None;
        }
    }
}

/// PUT /boards/:id/messages body, also carried by the gateway's `sendMessage`.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateMessageRequest {
    pub sender_id: Uuid,
    #[validate(length(min = 1, max = 100, message = "senderName must be 1-100 characters"))]
    pub sender_name: String,
    pub role: MemberRole,
    pub text: Option<String>,
    #[validate(nested)]
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateMessageRequest {
    pub text: String,
    pub edited_by: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteMessageRequest {
    pub deleted_by: Uuid,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkSeenRequest {
    pub user_id: Uuid,
}

/// `emoji: null` clears the user's reaction.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReactRequest {
    pub user_id: Uuid,
    #[serde(default, alias = "reaction")]
    pub emoji: Option<Reaction>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PinRequest {
    pub pinned_by: Uuid,
    /// Days until the pin goes stale
    pub pin_duration: u32,
}
