//! Board routes — create, read, patch, delete, list and search.
//!
//! Membership changes made through a patch are announced to the board room
//! as `member-added`, one event per member actually appended.

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::get,
};
use brainiacs_common::{
    error::BrainiacsResult,
    gateway_event::EventType,
    models::{Board, BoardSummary, CreateBoardRequest, UpdateBoardRequest, UserProfile},
    snowflake,
    validation::validate_request,
};
use brainiacs_db::repository::boards;
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

use crate::AppState;
use crate::extract::{ApiJson, ApiPath, ApiQuery};
use crate::projection::{self, BoardView};

const SEARCH_LIMIT: i64 = 50;

/// Board routes.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/boards", get(list_boards).post(create_board))
        .route("/boards/search", get(search_boards))
        .route(
            "/boards/{board_id}",
            get(get_board).put(update_board).delete(delete_board),
        )
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListParams {
    user_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ViewParams {
    viewer_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
struct SearchParams {
    query: String,
}

/// POST /api/v1/boards — Create a board with its creator as sole admin.
async fn create_board(
    State(state): State<Arc<AppState>>,
    ApiJson(body): ApiJson<CreateBoardRequest>,
) -> BrainiacsResult<(StatusCode, Json<Board>)> {
    validate_request(&body)?;
    let creator = state.db.require_user(body.created_by).await?;

    let board = Board::new(
        snowflake::generate_id(),
        &body.name,
        body.description,
        body.visibility,
        body.theme,
        &creator,
        Utc::now(),
    )?;
    state.db.insert_board(&board).await?;

    tracing::info!(board_id = %board.id, creator = %creator.id, "Board created");
    Ok((StatusCode::CREATED, Json(board)))
}

/// GET /api/v1/boards?userId= — All boards, or only those `userId` belongs to.
async fn list_boards(
    State(state): State<Arc<AppState>>,
    ApiQuery(params): ApiQuery<ListParams>,
) -> BrainiacsResult<Json<Vec<Board>>> {
    let rows = match params.user_id {
        Some(user_id) => {
            state
                .db
                .timed("list member boards", boards::list_boards_for_member(&state.db.pool, user_id))
                .await?
        }
        None => state.db.timed("list boards", boards::list_boards(&state.db.pool)).await?,
    };
    let now = Utc::now();
    Ok(Json(
        rows.into_iter()
            .map(|board| board.normalized_for_read(now))
            .collect(),
    ))
}

/// GET /api/v1/boards/search?query= — Case-insensitive name search.
async fn search_boards(
    State(state): State<Arc<AppState>>,
    ApiQuery(params): ApiQuery<SearchParams>,
) -> BrainiacsResult<Json<Vec<BoardSummary>>> {
    let query = params.query.trim();
    if query.is_empty() {
        return Ok(Json(Vec::new()));
    }
    let found = state
        .db
        .timed("search boards", boards::search_boards(&state.db.pool, query, SEARCH_LIMIT))
        .await?;
    Ok(Json(found.iter().map(Board::summary).collect()))
}

/// GET /api/v1/boards/:board_id?viewerId= — Board projection.
async fn get_board(
    State(state): State<Arc<AppState>>,
    ApiPath(board_id): ApiPath<Uuid>,
    ApiQuery(params): ApiQuery<ViewParams>,
) -> BrainiacsResult<Json<BoardView>> {
    Ok(Json(
        projection::load_view(&state, board_id, params.viewer_id).await?,
    ))
}

/// PUT /api/v1/boards/:board_id — Merge scalar fields, append new members.
async fn update_board(
    State(state): State<Arc<AppState>>,
    ApiPath(board_id): ApiPath<Uuid>,
    ApiJson(patch): ApiJson<UpdateBoardRequest>,
) -> BrainiacsResult<Json<Board>> {
    validate_request(&patch)?;

    // Resolve every referenced user before touching the board, so a bad
    // reference rejects the whole patch.
    let mut candidates: Vec<UserProfile> = Vec::new();
    for reference in patch.members.iter().flatten() {
        let user_id = reference.user_id()?;
        if candidates.iter().any(|p| p.id == user_id) {
            continue;
        }
        candidates.push(state.db.require_user(user_id).await?);
    }

    let (board, added) = state
        .db
        .modify_board(board_id, |board| board.apply_patch(&patch, &candidates))
        .await?;

    for member in &added {
        state.fanout.to_board(
            board_id,
            EventType::MemberAdded,
            json!({ "boardId": board_id, "member": member }),
        );
    }

    tracing::info!(board_id = %board_id, added = added.len(), "Board updated");
    Ok(Json(board.normalized_for_read(Utc::now())))
}

/// DELETE /api/v1/boards/:board_id — Remove the board with everything in it.
async fn delete_board(
    State(state): State<Arc<AppState>>,
    ApiPath(board_id): ApiPath<Uuid>,
) -> BrainiacsResult<StatusCode> {
    state.db.delete_board(board_id).await?;
    tracing::info!(board_id = %board_id, "Board deleted");
    Ok(StatusCode::NO_CONTENT)
}
