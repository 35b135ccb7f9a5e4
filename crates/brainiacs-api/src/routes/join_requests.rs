//! Join request routes — send, poll, resolve.
//!
//! Accepting is two single-document writes with no transaction around them:
//! the member is appended to the board first (idempotently), then the request
//! row leaves `pending`. If the second write fails, repeating the PATCH
//! finishes the job without adding the member twice.

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::get,
};
use brainiacs_common::{
    error::{BrainiacsError, BrainiacsResult},
    gateway_event::EventType,
    models::{
        CreateJoinRequestRequest, JoinRequest, JoinRequestFilter, JoinRequestStatus, Member, MemberRole,
        Resolution, ResolveJoinRequestRequest, UserProfile,
    },
    snowflake,
};
use brainiacs_db::repository::join_requests;
use chrono::Utc;
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

use crate::AppState;
use crate::extract::{ApiJson, ApiPath, ApiQuery};

/// Join request routes.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/join-requests",
            get(list_requests).post(create_request),
        )
        .route(
            "/join-requests/{request_id}",
            get(get_request).patch(resolve_request),
        )
}

async fn find_request(state: &AppState, request_id: Uuid) -> BrainiacsResult<JoinRequest> {
    state
        .db
        .timed("load join request", join_requests::find_request(&state.db.pool, request_id))
        .await?
        .ok_or_else(|| BrainiacsError::not_found("Join request"))
}

fn duplicate_pending() -> BrainiacsError {
    BrainiacsError::conflict("A pending join request already exists for this user")
}

/// POST /api/v1/join-requests — Persist a pending request and push it to the
/// receiver if they are connected.
async fn create_request(
    State(state): State<Arc<AppState>>,
    ApiJson(body): ApiJson<CreateJoinRequestRequest>,
) -> BrainiacsResult<(StatusCode, Json<JoinRequest>)> {
    let board = state.db.load_board(body.board_id).await?;
    let sender = state.db.require_user(body.sender_id).await?;
    let receiver = state.db.require_user(body.receiver_id).await?;

    if board.is_member(receiver.id) {
        return Err(BrainiacsError::conflict("User is already a member of this board"));
    }
    // Fast path; the insert below is what actually enforces one pending
    // request per receiver per board.
    let pending = state
        .db
        .timed(
            "find pending join request",
            join_requests::find_pending(&state.db.pool, board.id, receiver.id),
        )
        .await?;
    if pending.is_some() {
        return Err(duplicate_pending());
    }

    let request = JoinRequest::new(snowflake::generate_id(), &board, &sender, &receiver, Utc::now());
    let inserted = state
        .db
        .timed("insert join request", join_requests::insert_request(&state.db.pool, &request))
        .await?;
    if !inserted {
        return Err(duplicate_pending());
    }

    let delivered = state
        .fanout
        .to_user(receiver.id, EventType::JoinRequestSent, &request)
        .await;
    tracing::info!(
        request_id = %request.id,
        board_id = %board.id,
        receiver = %receiver.id,
        delivered,
        "Join request sent"
    );
    Ok((StatusCode::CREATED, Json(request)))
}

/// GET /api/v1/join-requests?receiverId&senderId&boardId&status
async fn list_requests(
    State(state): State<Arc<AppState>>,
    ApiQuery(filter): ApiQuery<JoinRequestFilter>,
) -> BrainiacsResult<Json<Vec<JoinRequest>>> {
    let requests = state
        .db
        .timed("list join requests", join_requests::list_requests(&state.db.pool, &filter))
        .await?;
    Ok(Json(requests))
}

/// GET /api/v1/join-requests/:request_id
async fn get_request(
    State(state): State<Arc<AppState>>,
    ApiPath(request_id): ApiPath<Uuid>,
) -> BrainiacsResult<Json<JoinRequest>> {
    Ok(Json(find_request(&state, request_id).await?))
}

/// PATCH /api/v1/join-requests/:request_id — Accept or reject.
async fn resolve_request(
    State(state): State<Arc<AppState>>,
    ApiPath(request_id): ApiPath<Uuid>,
    ApiJson(body): ApiJson<ResolveJoinRequestRequest>,
) -> BrainiacsResult<Json<JoinRequest>> {
    let status: JoinRequestStatus = body.status.trim().parse()?;
    let mut request = find_request(&state, request_id).await?;
    let now = Utc::now();

    // Validates the transition without writing anything yet.
    let resolution = request.resolve(status, now)?;

    if status == JoinRequestStatus::Accepted {
        // Prefer the live profile for the cached member fields.
        let profile = match state.db.require_user(request.receiver.user_id).await {
            Ok(profile) => profile,
            Err(BrainiacsError::NotFound { .. }) => UserProfile::from(&request.receiver),
            Err(e) => return Err(e),
        };
        let (_, added) = state
            .db
            .modify_board(request.board_id, |board| {
                Ok(board.add_member(&profile, MemberRole::Member))
            })
            .await?;

        if added {
            let member = Member::new(&profile, MemberRole::Member);
            state.fanout.to_board(
                request.board_id,
                EventType::MemberAdded,
                json!({ "boardId": request.board_id, "member": member }),
            );
        }
    }

    if resolution == Resolution::Applied {
        let written = state
            .db
            .timed(
                "resolve join request",
                join_requests::resolve_request(&state.db.pool, request_id, status, now),
            )
            .await?;
        if !written {
            // Someone else resolved it between our read and write.
            let current = find_request(&state, request_id).await?;
            if current.status != status {
                return Err(BrainiacsError::conflict(format!(
                    "Join request was already {}",
                    current.status
                )));
            }
            request = current;
        }
    }

    state.fanout.to_all(EventType::JoinRequestsUpdated, &request);
    tracing::info!(request_id = %request_id, status = %status, "Join request resolved");
    Ok(Json(request))
}
