//! Poll routes — create (rate limited), list (with lazy expiry), vote,
//! retract, remove.

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{delete, get, patch},
};
use brainiacs_common::{
    error::BrainiacsResult,
    gateway_event::EventType,
    models::{CreatePollRequest, Poll, PollPolicy, VoteRequest},
    validation::validate_request,
};
use chrono::Utc;
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

use crate::AppState;
use crate::extract::{ApiJson, ApiPath};

/// Poll routes.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/boards/{board_id}/polls",
            get(list_polls).post(create_poll),
        )
        .route("/boards/{board_id}/polls/{poll_id}", delete(remove_poll))
        .route("/boards/{board_id}/polls/{poll_id}/vote", patch(vote))
        .route("/boards/{board_id}/polls/{poll_id}/remove-vote", patch(remove_vote))
}

fn announce(state: &AppState, board_id: Uuid, poll: &Poll) {
    state.fanout.to_board(
        board_id,
        EventType::PollUpdated,
        json!({ "boardId": board_id, "poll": poll }),
    );
}

/// POST /api/v1/boards/:board_id/polls — Open a poll; one per creator per
/// board per cooldown window.
async fn create_poll(
    State(state): State<Arc<AppState>>,
    ApiPath(board_id): ApiPath<Uuid>,
    ApiJson(body): ApiJson<CreatePollRequest>,
) -> BrainiacsResult<(StatusCode, Json<Poll>)> {
    validate_request(&body)?;
    let policy = PollPolicy::from(&state.limits);
    let now = Utc::now();

    let (_, poll) = state
        .db
        .modify_board(board_id, |board| {
            board
                .create_poll(&body.question, &body.options, body.created_by, now, &policy)
                .cloned()
        })
        .await?;

    announce(&state, board_id, &poll);
    tracing::info!(poll_id = %poll.id, board_id = %board_id, created_by = %poll.created_by, "Poll created");
    Ok((StatusCode::CREATED, Json(poll)))
}

/// GET /api/v1/boards/:board_id/polls — List polls, persisting any expiry
/// flips discovered on the way.
async fn list_polls(
    State(state): State<Arc<AppState>>,
    ApiPath(board_id): ApiPath<Uuid>,
) -> BrainiacsResult<Json<Vec<Poll>>> {
    let now = Utc::now();
    let mut board = state.db.load_board(board_id).await?;

    if board.refresh_polls(now) {
        let (stored, _) = state
            .db
            .modify_board(board_id, |board| Ok(board.refresh_polls(now)))
            .await?;
        tracing::debug!(board_id = %board_id, "Expired polls deactivated");
        board = stored;
    }

    Ok(Json(board.polls))
}

/// PATCH /api/v1/boards/:board_id/polls/:poll_id/vote
async fn vote(
    State(state): State<Arc<AppState>>,
    ApiPath((board_id, poll_id)): ApiPath<(Uuid, Uuid)>,
    ApiJson(body): ApiJson<VoteRequest>,
) -> BrainiacsResult<Json<Poll>> {
    let voter = state.db.require_user(body.user_id).await?;
    let now = Utc::now();

    let (_, poll) = state
        .db
        .modify_board(board_id, |board| {
            let poll = board.poll_mut(poll_id)?;
            poll.vote(body.option_index, &voter, now)?;
            Ok(poll.clone())
        })
        .await?;

    announce(&state, board_id, &poll);
    tracing::debug!(
        poll_id = %poll_id,
        voter = %voter.id,
        option = body.option_index,
        total = poll.total_votes(),
        "Vote cast"
    );
    Ok(Json(poll))
}

/// PATCH /api/v1/boards/:board_id/polls/:poll_id/remove-vote
async fn remove_vote(
    State(state): State<Arc<AppState>>,
    ApiPath((board_id, poll_id)): ApiPath<(Uuid, Uuid)>,
    ApiJson(body): ApiJson<VoteRequest>,
) -> BrainiacsResult<Json<Poll>> {
    let now = Utc::now();
    let (_, poll) = state
        .db
        .modify_board(board_id, |board| {
            let poll = board.poll_mut(poll_id)?;
            poll.remove_vote(body.option_index, body.user_id, now)?;
            Ok(poll.clone())
        })
        .await?;

    announce(&state, board_id, &poll);
    Ok(Json(poll))
}

/// DELETE /api/v1/boards/:board_id/polls/:poll_id
async fn remove_poll(
    State(state): State<Arc<AppState>>,
    ApiPath((board_id, poll_id)): ApiPath<(Uuid, Uuid)>,
) -> BrainiacsResult<StatusCode> {
    state
        .db
        .modify_board(board_id, |board| board.remove_poll(poll_id).map(|_| ()))
        .await?;

    state.fanout.to_board(
        board_id,
        EventType::PollRemoved,
        json!({ "boardId": board_id, "pollId": poll_id }),
    );
    tracing::info!(poll_id = %poll_id, board_id = %board_id, "Poll removed");
    Ok(StatusCode::NO_CONTENT)
}
