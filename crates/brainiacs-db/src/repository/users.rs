//! User repository — the local copy of the profile store.
//!
//! Boards only ever read profiles; rows are written by the `add-user`
//! command or by whatever service owns profile CRUD.

use brainiacs_common::models::UserProfile;
use chrono::Utc;
use sqlx::any::AnyRow;
use sqlx::{AnyPool, Row};
use uuid::Uuid;

use crate::any_compat::{get_uuid, timestamp};

fn profile_from_row(row: &AnyRow) -> Result<UserProfile, sqlx::Error> {
    Ok(UserProfile {
        id: get_uuid(row, "id")?,
        name: row.try_get("name")?,
        email: row.try_get("email")?,
        avatar: row.try_get("avatar")?,
    })
}

pub async fn create_user(pool: &AnyPool, profile: &UserProfile) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO users (id, name, email, avatar, created_at)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(profile.id.to_string())
    .bind(&profile.name)
    .bind(&profile.email)
    .bind(profile.avatar.clone())
    .bind(timestamp(Utc::now()))
    .execute(pool)
    .await?;
    Ok(())
}

/// Find a user by their unique ID.
pub async fn find_by_id(pool: &AnyPool, id: Uuid) -> Result<Option<UserProfile>, sqlx::Error> {
    sqlx::query("SELECT id, name, email, avatar FROM users WHERE id = $1")
        .bind(id.to_string())
        .fetch_optional(pool)
        .await?
        .as_ref()
        .map(profile_from_row)
        .transpose()
}

/// Find a user by email (case-insensitive).
pub async fn find_by_email(pool: &AnyPool, email: &str) -> Result<Option<UserProfile>, sqlx::Error> {
    sqlx::query("SELECT id, name, email, avatar FROM users WHERE LOWER(email) = LOWER($1)")
        .bind(email.trim())
        .fetch_optional(pool)
        .await?
        .as_ref()
        .map(profile_from_row)
        .transpose()
}

/// Resolve several ids at once. Unknown ids are simply absent from the result.
pub async fn find_by_ids(pool: &AnyPool, ids: &[Uuid]) -> Result<Vec<UserProfile>, sqlx::Error> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    let placeholders: Vec<String> = (1..=ids.len()).map(|i| format!("${i}")).collect();
    let sql = format!(
        "SELECT id, name, email, avatar FROM users WHERE id IN ({})",
        placeholders.join(", ")
    );
    let mut query = sqlx::query(&sql);
    for id in ids {
        query = query.bind(id.to_string());
    }
    query
        .fetch_all(pool)
        .await?
        .iter()
        .map(profile_from_row)
        .collect()
}
