//! Message routes — post, edit, soft delete, seen, reactions, pins.
//!
//! This is the core of chat. Every successful mutation emits a board-room
//! event carrying the message as stored, so connected clients replace their
//! copy wholesale instead of patching it.

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{delete, patch, put},
};
use brainiacs_common::{
    error::{BrainiacsError, BrainiacsResult},
    gateway_event::EventType,
    models::{
        Board, CreateMessageRequest, DeleteMessageRequest, MarkSeenRequest, Message, PinRequest,
        ReactRequest, Reaction, UpdateMessageRequest,
    },
    snowflake,
    validation::{bounded_text, validate_request},
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

use crate::AppState;
use crate::extract::{ApiJson, ApiPath, ApiQuery};

/// Message routes.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/boards/{board_id}/messages", put(send_message))
        .route(
            "/boards/{board_id}/messages/{message_id}",
            patch(edit_message).delete(delete_message),
        )
        .route("/boards/{board_id}/messages/{message_id}/seen", patch(mark_seen))
        .route("/boards/{board_id}/messages/{message_id}/react", patch(react))
        .route("/boards/{board_id}/messages/{message_id}/pin", patch(pin_message))
        .route("/boards/{board_id}/messages/{message_id}/unpin", patch(unpin_message))
        .route(
            "/boards/{board_id}/messages/{message_id}/reactions/{emoji}",
            delete(remove_reaction),
        )
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReactorParams {
    user_id: Uuid,
}

/// Validate, append and announce a message. Shared by the REST route and the
/// gateway's `sendMessage` op so both paths behave identically.
pub async fn post_message(
    state: &AppState,
    board_id: Uuid,
    body: CreateMessageRequest,
) -> BrainiacsResult<Message> {
    validate_request(&body)?;
    if let Some(text) = body.text.as_deref().filter(|t| !t.trim().is_empty()) {
        bounded_text(text, "text", state.limits.max_message_length)?;
    }
    if body.attachments.len() > state.limits.max_attachment_count as usize {
        return Err(BrainiacsError::validation(format!(
            "At most {} attachments per message",
            state.limits.max_attachment_count
        )));
    }

    let message = Message::new(
        snowflake::generate_id(),
        body.sender_id,
        body.sender_name,
        body.role,
        body.text,
        body.attachments,
        Utc::now(),
    )?;

    let (_, message) = state
        .db
        .modify_board(board_id, |board| Ok(board.append_message(message.clone()).clone()))
        .await?;

    state.fanout.to_board(
        board_id,
        EventType::NewMessage,
        json!({ "boardId": board_id, "message": message }),
    );
    tracing::debug!(
        message_id = %message.id,
        board_id = %board_id,
        sender = %message.sender_id,
        "Message sent"
    );
    Ok(message)
}

/// Apply `mutate` to one message of a board, persist, and announce the
/// message's new state. A mutation that changes nothing is neither written
/// nor announced.
async fn update_message<F>(
    state: &AppState,
    board_id: Uuid,
    message_id: Uuid,
    mut mutate: F,
) -> BrainiacsResult<Message>
where
    F: FnMut(&mut Message) -> BrainiacsResult<()>,
{
    let (_, (message, changed)) = state
        .db
        .modify_board(board_id, |board: &mut Board| {
            let message = board.message_mut(message_id)?;
            let before = message.clone();
            mutate(message)?;
            Ok((message.clone(), *message != before))
        })
        .await?;

    if changed {
        state.fanout.to_board(
            board_id,
            EventType::MessageUpdated,
            json!({ "boardId": board_id, "message": message }),
        );
    }
    Ok(message)
}

/// PUT /api/v1/boards/:board_id/messages — Post a message.
async fn send_message(
    State(state): State<Arc<AppState>>,
    ApiPath(board_id): ApiPath<Uuid>,
    ApiJson(body): ApiJson<CreateMessageRequest>,
) -> BrainiacsResult<(StatusCode, Json<Message>)> {
    let message = post_message(&state, board_id, body).await?;
    Ok((StatusCode::CREATED, Json(message)))
}

/// PATCH /api/v1/boards/:board_id/messages/:message_id — Edit text in place.
async fn edit_message(
    State(state): State<Arc<AppState>>,
    ApiPath((board_id, message_id)): ApiPath<(Uuid, Uuid)>,
    ApiJson(body): ApiJson<UpdateMessageRequest>,
) -> BrainiacsResult<Json<Message>> {
    if !body.text.trim().is_empty() {
        bounded_text(&body.text, "text", state.limits.max_message_length)?;
    }
    let now = Utc::now();
    let message = update_message(&state, board_id, message_id, |m| {
        m.edit(&body.text, body.edited_by, now)
    })
    .await?;

    tracing::debug!(message_id = %message_id, board_id = %board_id, "Message edited");
    Ok(Json(message))
}

/// DELETE /api/v1/boards/:board_id/messages/:message_id — Soft delete (sender only).
async fn delete_message(
    State(state): State<Arc<AppState>>,
    ApiPath((board_id, message_id)): ApiPath<(Uuid, Uuid)>,
    ApiJson(body): ApiJson<DeleteMessageRequest>,
) -> BrainiacsResult<Json<Message>> {
    let now = Utc::now();
    let message = update_message(&state, board_id, message_id, |m| {
        m.soft_delete(body.deleted_by, now)
    })
    .await?;

    tracing::debug!(
        message_id = %message_id,
        board_id = %board_id,
        deleted_by = %body.deleted_by,
        "Message deleted"
    );
    Ok(Json(message))
}

/// PATCH /api/v1/boards/:board_id/messages/:message_id/seen
async fn mark_seen(
    State(state): State<Arc<AppState>>,
    ApiPath((board_id, message_id)): ApiPath<(Uuid, Uuid)>,
    ApiJson(body): ApiJson<MarkSeenRequest>,
) -> BrainiacsResult<Json<Message>> {
    let message = update_message(&state, board_id, message_id, |m| {
        m.mark_seen(body.user_id);
        Ok(())
    })
    .await?;
    Ok(Json(message))
}

/// PATCH /api/v1/boards/:board_id/messages/:message_id/react — Set or clear
/// the caller's single reaction.
async fn react(
    State(state): State<Arc<AppState>>,
    ApiPath((board_id, message_id)): ApiPath<(Uuid, Uuid)>,
    ApiJson(body): ApiJson<ReactRequest>,
) -> BrainiacsResult<Json<Message>> {
    let message = update_message(&state, board_id, message_id, |m| {
        m.set_reaction(body.user_id, body.emoji)
    })
    .await?;
    Ok(Json(message))
}

/// DELETE /api/v1/boards/:board_id/messages/:message_id/reactions/:emoji?userId=
async fn remove_reaction(
    State(state): State<Arc<AppState>>,
    ApiPath((board_id, message_id, emoji)): ApiPath<(Uuid, Uuid, String)>,
    ApiQuery(params): ApiQuery<ReactorParams>,
) -> BrainiacsResult<Json<Message>> {
    let reaction: Reaction = emoji.parse()?;
    let message = update_message(&state, board_id, message_id, |m| {
        m.remove_reaction(params.user_id, reaction);
        Ok(())
    })
    .await?;
    Ok(Json(message))
}

/// PATCH /api/v1/boards/:board_id/messages/:message_id/pin
async fn pin_message(
    State(state): State<Arc<AppState>>,
    ApiPath((board_id, message_id)): ApiPath<(Uuid, Uuid)>,
    ApiJson(body): ApiJson<PinRequest>,
) -> BrainiacsResult<Json<Message>> {
    if body.pin_duration > state.limits.max_pin_days {
        return Err(BrainiacsError::validation(format!(
            "pinDuration must be at most {} days",
            state.limits.max_pin_days
        )));
    }
    let now = Utc::now();
    let message = update_message(&state, board_id, message_id, |m| {
        m.pin(body.pinned_by, body.pin_duration, now)
    })
    .await?;

    tracing::debug!(message_id = %message_id, board_id = %board_id, days = body.pin_duration, "Message pinned");
    Ok(Json(message))
}

/// PATCH /api/v1/boards/:board_id/messages/:message_id/unpin
async fn unpin_message(
    State(state): State<Arc<AppState>>,
    ApiPath((board_id, message_id)): ApiPath<(Uuid, Uuid)>,
) -> BrainiacsResult<Json<Message>> {
    let message = update_message(&state, board_id, message_id, |m| {
        m.unpin();
        Ok(())
    })
    .await?;
    Ok(Json(message))
}
