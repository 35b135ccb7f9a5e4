//! Board projection — the read-side view of a board for clients that are not
//! listening on the gateway.
//!
//! Building a view never writes: time-derived state (stale pins, expired
//! polls) is corrected on the copy that is returned, not in the store.

use brainiacs_common::error::BrainiacsResult;
use brainiacs_common::models::{Board, Member, Message, UserProfile};
use brainiacs_db::repository::users;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use uuid::Uuid;

use crate::AppState;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardView {
    #[serde(flatten)]
    pub board: Board,
    /// Only present when a viewer was supplied.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unseen_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_message: Option<Message>,
}

/// Assemble a view from a loaded board and whatever profiles resolved.
/// Members without a live profile keep the fields cached on the board.
pub fn project(
    board: Board,
    profiles: &[UserProfile],
    viewer: Option<Uuid>,
    now: DateTime<Utc>,
) -> BoardView {
    let by_id: HashMap<Uuid, &UserProfile> = profiles.iter().map(|p| (p.id, p)).collect();
    let mut board = board.normalized_for_read(now);
    board.members = board
        .members
        .into_iter()
        .map(|member| match by_id.get(&member.user_id()) {
            Some(profile) => Member {
                user: member.user.with_profile(profile),
                role: member.role,
            },
            None => member,
        })
        .collect();

    let (unseen_count, last_message) = match viewer {
        Some(viewer) => (
            Some(board.unseen_count(viewer)),
            board.last_message().cloned(),
        ),
        None => (None, None),
    };

    BoardView {
        board,
        unseen_count,
        last_message,
    }
}

/// Load a board and build its view. A failed profile lookup degrades to the
/// cached member fields instead of failing the read.
pub async fn load_view(state: &AppState, board_id: Uuid, viewer: Option<Uuid>) -> BrainiacsResult<BoardView> {
    let board = state.db.load_board(board_id).await?;
    let profiles = match state
        .db
        .timed("load member profiles", users::find_by_ids(&state.db.pool, &board.member_ids()))
        .await
    {
        Ok(profiles) => profiles,
        Err(e) => {
            tracing::warn!(board_id = %board_id, "Member profile lookup failed, using cached fields: {e}");
            Vec::new()
        }
    };
    Ok(project(board, &profiles, viewer, Utc::now()))
}
