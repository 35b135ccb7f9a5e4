//! Poll model — time-boxed questions with per-option voting.
//!
//! A user may vote on several options of the same poll but only once per
//! option. `is_active` is a stored flag that is recomputed from `expires_at`
//! whenever polls are listed; the expiry helper is the source of truth.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::user::{UserProfile, UserRef};
use crate::config::LimitsConfig;
use crate::error::{BrainiacsError, BrainiacsResult};
use crate::expiry;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Poll {
    pub id: Uuid,
    pub question: String,
    pub options: Vec<PollOption>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PollOption {
    pub text: String,
    #[serde(default)]
    pub votes: Vec<Vote>,
}

/// A vote with the voter's profile as it was when the vote was cast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vote {
    #[serde(flatten)]
    pub voter: UserRef,
    pub voted_at: DateTime<Utc>,
}

/// Limits applied when a poll is created.
#[derive(Debug, Clone, Copy)]
pub struct PollPolicy {
    pub duration: Duration,
    pub cooldown: Duration,
    pub max_options: usize,
}

impl From<&LimitsConfig> for PollPolicy {
    fn from(limits: &LimitsConfig) -> Self {
        Self {
            duration: limits.poll_duration(),
            cooldown: limits.poll_cooldown(),
            max_options: limits.max_poll_options as usize,
        }
    }
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self::from(&LimitsConfig::default())
    }
}

impl Poll {
    /// Build an active poll. Question and options are trimmed; at least two
    /// non-blank options are required.
    pub fn new(
        id: Uuid,
        question: &str,
        options: &[String],
        created_by: Uuid,
        now: DateTime<Utc>,
        policy: &PollPolicy,
    ) -> BrainiacsResult<Self> {
        let question = question.trim();
        if question.is_empty() {
            return Err(BrainiacsError::validation("Poll question is required"));
        }
        let options: Vec<PollOption> = options
            .iter()
            .map(|text| text.trim())
            .filter(|text| !text.is_empty())
            .map(|text| PollOption {
                text: text.to_string(),
                votes: Vec::new(),
            })
            .collect();
        if options.len() < 2 || options.len() > policy.max_options {
            return Err(BrainiacsError::validation(format!(
                "A poll needs between 2 and {} non-empty options",
                policy.max_options
            )));
        }

        Ok(Self {
            id,
            question: question.to_string(),
            options,
            created_by,
            created_at: now,
            expires_at: now + policy.duration,
            is_active: true,
        })
    }

    /// Whether votes are still accepted, judged by the clock, not the flag.
    pub fn is_open(&self, now: DateTime<Utc>) -> bool {
        !expiry::has_expired(self.expires_at, now)
    }

    /// Flip `is_active` off once expired. Returns whether the flag changed.
    /// An inactive poll never becomes active again.
    pub fn refresh_active(&mut self, now: DateTime<Utc>) -> bool {
        if self.is_active && !self.is_open(now) {
            self.is_active = false;
            return true;
        }
        false
    }

    fn open_option_mut(&mut self, option_index: usize, now: DateTime<Utc>) -> BrainiacsResult<&mut PollOption> {
        if !self.is_open(now) {
            return Err(BrainiacsError::validation("Poll has expired"));
        }
        let count = self.options.len();
        self.options.get_mut(option_index).ok_or_else(|| {
            BrainiacsError::validation(format!(
                "optionIndex {option_index} is out of range (poll has {count} options)"
            ))
        })
    }

    /// Cast a vote on one option. Voting twice on the same option conflicts;
    /// voting on a different option of the same poll is allowed.
    pub fn vote(
        &mut self,
        option_index: usize,
        voter: &UserProfile,
        now: DateTime<Utc>,
    ) -> BrainiacsResult<()> {
        let option = self.open_option_mut(option_index, now)?;
        if option.has_vote_from(voter.id) {
            return Err(BrainiacsError::conflict(
                "User has already voted for this option",
            ));
        }
        option.votes.push(Vote {
            voter: UserRef::from(voter),
            voted_at: now,
        });
        Ok(())
    }

    /// Retract exactly one vote of `user_id` from an option.
    pub fn remove_vote(
        &mut self,
        option_index: usize,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> BrainiacsResult<()> {
        let option = self.open_option_mut(option_index, now)?;
        let position = option
            .votes
            .iter()
            .position(|v| v.voter.user_id == user_id)
            .ok_or_else(|| BrainiacsError::validation("User has not voted for this option"))?;
        option.votes.remove(position);
        Ok(())
    }

    pub fn total_votes(&self) -> usize {
        self.options.iter().map(|o| o.votes.len()).sum()
    }
}

impl PollOption {
    pub fn has_vote_from(&self, user_id: Uuid) -> bool {
        self.votes.iter().any(|v| v.voter.user_id == user_id)
    }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreatePollRequest {
    #[validate(length(min = 1, max = 300, message = "Question must be 1-300 characters"))]
    pub question: String,
    pub options: Vec<String>,
    pub created_by: Uuid,
}

/// Body of both `/vote` and `/remove-vote`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteRequest {
    pub user_id: Uuid,
    pub option_index: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(name: &str) -> UserProfile {
        UserProfile {
            id: Uuid::now_v7(),
            name: name.into(),
            email: format!("{name}@example.com"),
            avatar: None,
        }
    }

    fn poll(now: DateTime<Utc>) -> Poll {
        Poll::new(
            Uuid::now_v7(),
            "Lunch?",
            &["A".to_string(), "B".to_string()],
            Uuid::now_v7(),
            now,
            &PollPolicy::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_new_poll_window() {
        let now = Utc::now();
        let poll = poll(now);
        assert!(poll.is_active);
        assert_eq!(poll.expires_at, now + Duration::hours(24));
    }

    #[test]
    fn test_poll_needs_two_options() {
        let err = Poll::new(
            Uuid::now_v7(),
            "Only one?",
            &["A".to_string(), "  ".to_string()],
            Uuid::now_v7(),
            Utc::now(),
            &PollPolicy::default(),
        )
        .unwrap_err();
        assert!(matches!(err, BrainiacsError::Validation { .. }));
    }

    #[test]
    fn test_second_vote_on_same_option_conflicts() {
        let now = Utc::now();
        let mut poll = poll(now);
        let ada = profile("ada");

        poll.vote(0, &ada, now).unwrap();
        let err = poll.vote(0, &ada, now).unwrap_err();
        assert!(matches!(err, BrainiacsError::Conflict { .. }));
        assert_eq!(poll.options[0].votes.len(), 1);

        // Other options remain open to the same voter.
        poll.vote(1, &ada, now).unwrap();
        assert_eq!(poll.total_votes(), 2);
    }

    #[test]
    fn test_remove_vote() {
        let now = Utc::now();
        let mut poll = poll(now);
        let ada = profile("ada");

        let err = poll.remove_vote(0, ada.id, now).unwrap_err();
        assert!(matches!(err, BrainiacsError::Validation { .. }));

        poll.vote(0, &ada, now).unwrap();
        poll.remove_vote(0, ada.id, now).unwrap();
        assert!(poll.options[0].votes.is_empty());
    }

    #[test]
    fn test_out_of_range_option() {
        let now = Utc::now();
        let mut poll = poll(now);
        assert!(poll.vote(5, &profile("ada"), now).is_err());
    }

    #[test]
    fn test_expired_poll_flips_and_rejects_votes() {
        let now = Utc::now();
        let mut poll = poll(now);
        let later = now + Duration::hours(24);

        assert!(!poll.refresh_active(now));
        assert!(poll.refresh_active(later));
        assert!(!poll.is_active);
        assert!(!poll.refresh_active(later), "flip happens once");

        let err = poll.vote(0, &profile("ada"), later).unwrap_err();
        assert!(matches!(err, BrainiacsError::Validation { .. }));
    }
}
