//! Board model — the aggregate document.
//!
//! A board owns its members, its message thread and its polls. Every write to
//! any of those is a write to the board: the store loads the whole document,
//! one of the methods below mutates it, and the store replaces it under the
//! version it was loaded at.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::member::{Member, MemberRole};
use super::message::Message;
use super::poll::{Poll, PollPolicy};
use super::user::UserProfile;
use crate::error::{BrainiacsError, BrainiacsResult};
use crate::expiry;
use crate::snowflake;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    #[default]
    Public,
    Private,
}

impl Visibility {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Private => "private",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Board {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub visibility: Visibility,
    #[serde(default)]
    pub theme: Option<String>,
    pub created_by: Uuid,
    #[serde(default)]
    pub members: Vec<Member>,
    /// Append order is arrival order.
    #[serde(default)]
    pub messages: Vec<Message>,
    #[serde(default)]
    pub polls: Vec<Poll>,
    pub created_at: DateTime<Utc>,
}

impl Board {
    /// A new board whose only member is its creator, as admin.
    pub fn new(
        id: Uuid,
        name: &str,
        description: Option<String>,
        visibility: Option<Visibility>,
        theme: Option<String>,
        creator: &UserProfile,
        now: DateTime<Utc>,
    ) -> BrainiacsResult<Self> {
        let name = name.trim();
        if name.is_empty() {
            return Err(BrainiacsError::validation("Board name is required"));
        }
        Ok(Self {
            id,
            name: name.to_string(),
            description,
            visibility: visibility.unwrap_or_default(),
            theme,
            created_by: creator.id,
            members: vec![Member::new(creator, MemberRole::Admin)],
            messages: Vec::new(),
            polls: Vec::new(),
            created_at: now,
        })
    }

    pub fn member(&self, user_id: Uuid) -> Option<&Member> {
        self.members.iter().find(|m| m.user_id() == user_id)
    }

    pub fn is_member(&self, user_id: Uuid) -> bool {
        self.member(user_id).is_some()
    }

    pub fn member_ids(&self) -> Vec<Uuid> {
        self.members.iter().map(Member::user_id).collect()
    }

    /// Append `profile` with `role` unless already present. Returns whether
    /// the member list changed. Existing members are never re-roled here.
    pub fn add_member(&mut self, profile: &UserProfile, role: MemberRole) -> bool {
        if self.is_member(profile.id) {
            return false;
        }
        self.members.push(Member::new(profile, role));
        true
    }

    /// Merge scalar fields and append any new members as `member`.
    /// Returns the members that were actually added.
    pub fn apply_patch(
        &mut self,
        patch: &UpdateBoardRequest,
        new_members: &[UserProfile],
    ) -> BrainiacsResult<Vec<Member>> {
        if let Some(name) = &patch.name {
            let name = name.trim();
            if name.is_empty() {
                return Err(BrainiacsError::validation("Board name cannot be empty"));
            }
            self.name = name.to_string();
        }
        if let Some(description) = &patch.description {
            self.description = Some(description.clone());
        }
        if let Some(visibility) = patch.visibility {
            self.visibility = visibility;
        }
        if let Some(theme) = &patch.theme {
            self.theme = Some(theme.clone());
        }

        let mut added = Vec::new();
        for profile in new_members {
            if self.add_member(profile, MemberRole::Member) {
                added.push(Member::new(profile, MemberRole::Member));
            }
        }
        Ok(added)
    }

    // ── Message thread ────────────────────────────────────────────────────

    pub fn message(&self, message_id: Uuid) -> BrainiacsResult<&Message> {
        self.messages
            .iter()
            .find(|m| m.id == message_id)
            .ok_or_else(|| BrainiacsError::not_found("Message"))
    }

    pub fn message_mut(&mut self, message_id: Uuid) -> BrainiacsResult<&mut Message> {
        self.messages
            .iter_mut()
            .find(|m| m.id == message_id)
            .ok_or_else(|| BrainiacsError::not_found("Message"))
    }

    pub fn append_message(&mut self, message: Message) -> &Message {
        self.messages.push(message);
        &self.messages[self.messages.len() - 1]
    }

    pub fn last_message(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Messages whose seen-by set does not contain `viewer`.
    pub fn unseen_count(&self, viewer: Uuid) -> usize {
        self.messages
            .iter()
            .filter(|m| !m.seen_by.contains(&viewer))
            .count()
    }

    // ── Polls ─────────────────────────────────────────────────────────────

    /// Open a poll, unless `created_by` already opened one on this board
    /// within the cooldown window.
    pub fn create_poll(
        &mut self,
        question: &str,
        options: &[String],
        created_by: Uuid,
        now: DateTime<Utc>,
        policy: &PollPolicy,
    ) -> BrainiacsResult<&Poll> {
        let window_start = now - policy.cooldown;
        let newest_recent = self
            .polls
            .iter()
            .filter(|p| p.created_by == created_by && p.created_at > window_start)
            .map(|p| p.created_at)
            .max();
        if let Some(created_at) = newest_recent {
            return Err(BrainiacsError::RateLimited {
                retry_after_ms: expiry::remaining_ms(created_at + policy.cooldown, now),
            });
        }

        let poll = Poll::new(
            snowflake::generate_id(),
            question,
            options,
            created_by,
            now,
            policy,
        )?;
        self.polls.push(poll);
        Ok(&self.polls[self.polls.len() - 1])
    }

    pub fn poll_mut(&mut self, poll_id: Uuid) -> BrainiacsResult<&mut Poll> {
        self.polls
            .iter_mut()
            .find(|p| p.id == poll_id)
            .ok_or_else(|| BrainiacsError::not_found("Poll"))
    }

    pub fn remove_poll(&mut self, poll_id: Uuid) -> BrainiacsResult<Poll> {
        let position = self
            .polls
            .iter()
            .position(|p| p.id == poll_id)
            .ok_or_else(|| BrainiacsError::not_found("Poll"))?;
        Ok(self.polls.remove(position))
    }

    /// Deactivate expired polls. Returns whether any flag flipped.
    pub fn refresh_polls(&mut self, now: DateTime<Utc>) -> bool {
        self.polls
            .iter_mut()
            .fold(false, |changed, poll| poll.refresh_active(now) | changed)
    }

    /// Bring time-derived state up to date on a copy meant for clients:
    /// stale pins are cleared and expired polls show as inactive.
    pub fn normalized_for_read(mut self, now: DateTime<Utc>) -> Self {
        for message in &mut self.messages {
            message.clear_stale_pin(now);
        }
        self.refresh_polls(now);
        self
    }

    pub fn summary(&self) -> BoardSummary {
        BoardSummary {
            id: self.id,
            name: self.name.clone(),
            description: self.description.clone(),
            visibility: self.visibility,
            theme: self.theme.clone(),
            created_by: self.created_by,
            member_count: self.members.len(),
            created_at: self.created_at,
        }
    }
}

/// Lightweight listing entry used by search.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardSummary {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub visibility: Visibility,
    pub theme: Option<String>,
    pub created_by: Uuid,
    pub member_count: usize,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateBoardRequest {
    #[validate(length(min = 1, max = 100, message = "Board name must be 1-100 characters"))]
    pub name: String,
    #[validate(length(max = 1000, message = "Description must be at most 1000 characters"))]
    pub description: Option<String>,
    pub visibility: Option<Visibility>,
    pub theme: Option<String>,
    pub created_by: Uuid,
}

/// A member reference in a board patch: a bare id or `{ "userId": … }`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum MemberReference {
    Id(String),
    #[serde(rename_all = "camelCase")]
    Object { user_id: String },
}

impl MemberReference {
    pub fn user_id(&self) -> BrainiacsResult<Uuid> {
        match self {
            Self::Id(raw) | Self::Object { user_id: raw } => snowflake::parse_id(raw, "members.userId"),
        }
    }
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateBoardRequest {
    #[validate(length(min = 1, max = 100, message = "Board name must be 1-100 characters"))]
    pub name: Option<String>,
    #[validate(length(max = 1000, message = "Description must be at most 1000 characters"))]
    pub description: Option<String>,
    pub visibility: Option<Visibility>,
    pub theme: Option<String>,
    pub members: Option<Vec<MemberReference>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn profile(name: &str) -> UserProfile {
        UserProfile {
            id: Uuid::now_v7(),
            name: name.into(),
            email: format!("{name}@example.com"),
            avatar: None,
        }
    }

    fn board(creator: &UserProfile) -> Board {
        Board::new(Uuid::now_v7(), "Sprint 1", None, None, None, creator, Utc::now()).unwrap()
    }

    #[test]
    fn test_creator_is_sole_admin() {
        let ada = profile("ada");
        let board = board(&ada);
        assert_eq!(board.members.len(), 1);
        let admins: Vec<_> = board
            .members
            .iter()
            .filter(|m| m.role == MemberRole::Admin)
            .collect();
        assert_eq!(admins.len(), 1);
        assert_eq!(admins[0].user_id(), ada.id);
        assert_eq!(board.visibility, Visibility::Public);
    }

    #[test]
    fn test_blank_name_rejected() {
        let err = Board::new(Uuid::now_v7(), "  ", None, None, None, &profile("ada"), Utc::now())
            .unwrap_err();
        assert!(matches!(err, BrainiacsError::Validation { .. }));
    }

    #[test]
    fn test_patch_appends_without_rerole() {
        let ada = profile("ada");
        let bob = profile("bob");
        let mut board = board(&ada);

        let patch = UpdateBoardRequest {
            theme: Some("dark".into()),
            ..Default::default()
        };
        let added = board.apply_patch(&patch, &[ada.clone(), bob.clone(), bob.clone()]).unwrap();

        assert_eq!(added.len(), 1);
        assert_eq!(added[0].user_id(), bob.id);
        assert_eq!(board.members.len(), 2);
        assert_eq!(board.member(ada.id).unwrap().role, MemberRole::Admin);
        assert_eq!(board.member(bob.id).unwrap().role, MemberRole::Member);
        assert_eq!(board.theme.as_deref(), Some("dark"));
        assert_eq!(board.name, "Sprint 1");
    }

    #[test]
    fn test_member_reference_forms() {
        let id = Uuid::now_v7();
        let refs: Vec<MemberReference> =
            serde_json::from_value(serde_json::json!([id.to_string(), { "userId": id.to_string() }]))
                .unwrap();
        assert!(refs.iter().all(|r| r.user_id().unwrap() == id));

        let bad = MemberReference::Object { user_id: "nope".into() };
        assert!(matches!(bad.user_id(), Err(BrainiacsError::Validation { .. })));
    }

    #[test]
    fn test_poll_cooldown_per_creator() {
        let ada = profile("ada");
        let bob = profile("bob");
        let mut board = board(&ada);
        let policy = PollPolicy::default();
        let now = Utc::now();
        let options = ["A".to_string(), "B".to_string()];

        board.create_poll("First?", &options, ada.id, now, &policy).unwrap();

        let err = board
            .create_poll("Second?", &options, ada.id, now + Duration::hours(1), &policy)
            .unwrap_err();
        match err {
            BrainiacsError::RateLimited { retry_after_ms } => {
                assert_eq!(retry_after_ms, Duration::hours(23).num_milliseconds() as u64);
            }
            other => panic!("expected rate limit, got {other:?}"),
        }

        // Another creator is not throttled, and the window rolls.
        board.create_poll("Bob's", &options, bob.id, now, &policy).unwrap();
        board
            .create_poll("Next day", &options, ada.id, now + Duration::hours(25), &policy)
            .unwrap();
        assert_eq!(board.polls.len(), 3);
    }

    #[test]
    fn test_remove_unknown_poll() {
        let mut board = board(&profile("ada"));
        assert!(matches!(
            board.remove_poll(Uuid::now_v7()),
            Err(BrainiacsError::NotFound { .. })
        ));
    }

    #[test]
    fn test_normalized_for_read_clears_time_derived_state() {
        let ada = profile("ada");
        let mut board = board(&ada);
        let now = Utc::now();
        let message = Message::new(
            Uuid::now_v7(),
            ada.id,
            ada.name.clone(),
            MemberRole::Admin,
            Some("hi".into()),
            vec![],
            now,
        )
        .unwrap();
        let message_id = board.append_message(message).id;
        board.message_mut(message_id).unwrap().pin(ada.id, 0, now).unwrap();
        board
            .create_poll("Q", &["A".to_string(), "B".to_string()], ada.id, now, &PollPolicy::default())
            .unwrap();

        let view = board.clone().normalized_for_read(now + Duration::hours(25));
        assert!(view.messages[0].pin.is_none());
        assert!(!view.polls[0].is_active);
        // The stored copy is untouched.
        assert!(board.messages[0].pin.is_some());
        assert!(board.polls[0].is_active);
    }

    #[test]
    fn test_unseen_count_and_last_message() {
        let ada = profile("ada");
        let bob = profile("bob");
        let mut board = board(&ada);
        for text in ["one", "two"] {
            let msg = Message::new(
                Uuid::now_v7(),
                ada.id,
                ada.name.clone(),
                MemberRole::Admin,
                Some(text.into()),
                vec![],
                Utc::now(),
            )
            .unwrap();
            board.append_message(msg);
        }
        board.messages[0].mark_seen(bob.id);

        assert_eq!(board.unseen_count(bob.id), 1);
        assert_eq!(board.unseen_count(ada.id), 2);
        assert_eq!(board.last_message().unwrap().text.as_deref(), Some("two"));
    }
}
