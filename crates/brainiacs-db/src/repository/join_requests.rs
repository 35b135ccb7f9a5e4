//! Join request repository.
//!
//! Join requests are independent rows, not part of the board document, so
//! they survive board edits and can be polled by receivers who were offline.

use brainiacs_common::models::{JoinRequest, JoinRequestFilter, JoinRequestStatus};
use chrono::{DateTime, Utc};
use sqlx::any::AnyRow;
use sqlx::{AnyPool, Row};
use uuid::Uuid;

use crate::any_compat::{get_datetime, get_json, get_opt_datetime, get_uuid, timestamp, to_json};

const COLUMNS: &str =
    "id, board_id, board_name, sender, receiver, status, created_at, resolved_at";

fn request_from_row(row: &AnyRow) -> Result<JoinRequest, sqlx::Error> {
    let status: String = row.try_get("status")?;
    Ok(JoinRequest {
        id: get_uuid(row, "id")?,
        board_id: get_uuid(row, "board_id")?,
        board_name: row.try_get("board_name")?,
        sender: get_json(row, "sender")?,
        receiver: get_json(row, "receiver")?,
        status: status
            .parse::<JoinRequestStatus>()
            .map_err(|e| sqlx::Error::Decode(e.to_string().into()))?,
        created_at: get_datetime(row, "created_at")?,
        resolved_at: get_opt_datetime(row, "resolved_at")?,
    })
}

/// Store a new request. Returns false when the receiver already has a
/// pending request on the board; the partial unique index decides, so two
/// concurrent sends cannot both land.
pub async fn insert_request(pool: &AnyPool, request: &JoinRequest) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        INSERT INTO join_requests
            (id, board_id, board_name, sender_id, receiver_id, sender, receiver, status, created_at, resolved_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        ON CONFLICT DO NOTHING
        "#,
    )
    .bind(request.id.to_string())
    .bind(request.board_id.to_string())
    .bind(&request.board_name)
    .bind(request.sender.user_id.to_string())
    .bind(request.receiver.user_id.to_string())
    .bind(to_json(&request.sender)?)
    .bind(to_json(&request.receiver)?)
    .bind(request.status.as_str())
    .bind(timestamp(request.created_at))
    .bind(request.resolved_at.map(timestamp))
    .execute(pool)
    .await?;
    Ok(result.rows_affected() == 1)
}

pub async fn find_request(pool: &AnyPool, id: Uuid) -> Result<Option<JoinRequest>, sqlx::Error> {
    sqlx::query(&format!("SELECT {COLUMNS} FROM join_requests WHERE id = $1"))
        .bind(id.to_string())
        .fetch_optional(pool)
        .await?
        .as_ref()
        .map(request_from_row)
        .transpose()
}

/// The pending request for `receiver_id` on `board_id`, if one exists.
pub async fn find_pending(
    pool: &AnyPool,
    board_id: Uuid,
    receiver_id: Uuid,
) -> Result<Option<JoinRequest>, sqlx::Error> {
    sqlx::query(&format!(
        "SELECT {COLUMNS} FROM join_requests WHERE board_id = $1 AND receiver_id = $2 AND status = 'pending'"
    ))
    .bind(board_id.to_string())
    .bind(receiver_id.to_string())
    .fetch_optional(pool)
    .await?
    .as_ref()
    .map(request_from_row)
    .transpose()
}

/// Move a request out of `pending`. Only a pending row is updated, so a
/// terminal status is never overwritten. Returns whether the row changed.
pub async fn resolve_request(
    pool: &AnyPool,
    id: Uuid,
    status: JoinRequestStatus,
    resolved_at: DateTime<Utc>,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE join_requests SET status = $1, resolved_at = $2 WHERE id = $3 AND status = 'pending'",
    )
    .bind(status.as_str())
    .bind(timestamp(resolved_at))
    .bind(id.to_string())
    .execute(pool)
    .await?;
    Ok(result.rows_affected() == 1)
}

/// Newest first. Every filter field is optional.
pub async fn list_requests(
    pool: &AnyPool,
    filter: &JoinRequestFilter,
) -> Result<Vec<JoinRequest>, sqlx::Error> {
    let mut clauses = Vec::new();
    let mut binds: Vec<String> = Vec::new();
    let mut push = |column: &str, value: String| {
        binds.push(value);
        clauses.push(format!("{column} = ${}", binds.len()));
    };
    if let Some(receiver_id) = filter.receiver_id {
        push("receiver_id", receiver_id.to_string());
    }
    if let Some(sender_id) = filter.sender_id {
        push("sender_id", sender_id.to_string());
    }
    if let Some(board_id) = filter.board_id {
        push("board_id", board_id.to_string());
    }
    if let Some(status) = filter.status {
        push("status", status.as_str().to_string());
    }

    let mut sql = format!("SELECT {COLUMNS} FROM join_requests");
    if !clauses.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&clauses.join(" AND "));
    }
    sql.push_str(" ORDER BY created_at DESC");

    let mut query = sqlx::query(&sql);
    for value in binds {
        query = query.bind(value);
    }
    query
        .fetch_all(pool)
        .await?
        .iter()
        .map(request_from_row)
        .collect()
}
