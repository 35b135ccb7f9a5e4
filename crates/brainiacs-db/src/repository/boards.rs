//! Board repository — the board aggregate as one versioned JSON document.
//!
//! Writes never touch part of a document: the whole board is replaced, and
//! only if the row still has the version it was read at.

use brainiacs_common::models::Board;
use chrono::Utc;
use sqlx::AnyPool;
use sqlx::Row;
use sqlx::any::AnyRow;
use uuid::Uuid;

use crate::any_compat::{contains_pattern, get_json, json_array_contains, timestamp, to_json};

/// A board together with the version it was read at.
#[derive(Debug, Clone)]
pub struct StoredBoard {
    pub board: Board,
    pub version: i64,
}

fn stored_from_row(row: &AnyRow) -> Result<StoredBoard, sqlx::Error> {
    Ok(StoredBoard {
        board: get_json(row, "document")?,
        version: row.try_get("version")?,
    })
}

fn boards_from_rows(rows: &[AnyRow]) -> Result<Vec<Board>, sqlx::Error> {
    rows.iter().map(|row| get_json(row, "document")).collect()
}

/// Insert a new board at version 1.
pub async fn insert_board(pool: &AnyPool, board: &Board) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO boards (id, name, visibility, member_ids, document, version, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, 1, $6, $7)
        "#,
    )
    .bind(board.id.to_string())
    .bind(&board.name)
    .bind(board.visibility.as_str())
    .bind(to_json(&board.member_ids())?)
    .bind(to_json(board)?)
    .bind(timestamp(board.created_at))
    .bind(timestamp(Utc::now()))
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn find_board(pool: &AnyPool, id: Uuid) -> Result<Option<StoredBoard>, sqlx::Error> {
    sqlx::query("SELECT document, version FROM boards WHERE id = $1")
        .bind(id.to_string())
        .fetch_optional(pool)
        .await?
        .as_ref()
        .map(stored_from_row)
        .transpose()
}

/// Conditional replace. Returns `false` when another writer got there first
/// (or the board was deleted) and nothing was written.
pub async fn replace_board(
    pool: &AnyPool,
    board: &Board,
    expected_version: i64,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE boards SET
            name = $1,
            visibility = $2,
            member_ids = $3,
            document = $4,
            version = version + 1,
            updated_at = $5
        WHERE id = $6 AND version = $7
        "#,
    )
    .bind(&board.name)
    .bind(board.visibility.as_str())
    .bind(to_json(&board.member_ids())?)
    .bind(to_json(board)?)
    .bind(timestamp(Utc::now()))
    .bind(board.id.to_string())
    .bind(expected_version)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() == 1)
}

/// Returns whether a row was deleted.
pub async fn delete_board(pool: &AnyPool, id: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM boards WHERE id = $1")
        .bind(id.to_string())
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// All boards, oldest first.
pub async fn list_boards(pool: &AnyPool) -> Result<Vec<Board>, sqlx::Error> {
    let rows = sqlx::query("SELECT document FROM boards ORDER BY created_at ASC")
        .fetch_all(pool)
        .await?;
    boards_from_rows(&rows)
}

/// Boards on which `user_id` is a member, oldest first.
pub async fn list_boards_for_member(pool: &AnyPool, user_id: Uuid) -> Result<Vec<Board>, sqlx::Error> {
    let rows = sqlx::query(
        "SELECT document FROM boards WHERE member_ids LIKE $1 ORDER BY created_at ASC",
    )
    .bind(json_array_contains(user_id))
    .fetch_all(pool)
    .await?;
    boards_from_rows(&rows)
}

/// Case-insensitive substring match on the board name.
pub async fn search_boards(pool: &AnyPool, query: &str, limit: i64) -> Result<Vec<Board>, sqlx::Error> {
    let rows = sqlx::query(
        r#"
        SELECT document FROM boards
        WHERE LOWER(name) LIKE $1 ESCAPE '\'
        ORDER BY name ASC
        LIMIT $2
        "#,
    )
    .bind(contains_pattern(query))
    .bind(limit)
    .fetch_all(pool)
    .await?;
    boards_from_rows(&rows)
}
