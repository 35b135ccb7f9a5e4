//! # brainiacs-db
//!
//! Storage layer for Brainiacs. One `sqlx::AnyPool` backs everything:
//! PostgreSQL in production, SQLite for single-node installs and tests.
//!
//! - **boards** — one JSON document per board, guarded by a version column
//! - **join_requests** — standalone rows that outlive connections
//! - **users** — the local copy of the profile store
//!
//! The store gives atomicity per statement and nothing more. Board writes
//! go through [`Database::modify_board`], which retries a pure mutation until
//! its conditional replace wins or the retry budget runs out.

pub mod any_compat;
pub mod repository;

use std::future::Future;

use brainiacs_common::config::{AppConfig, StoreSettings};
use brainiacs_common::error::{BrainiacsError, BrainiacsResult};
use brainiacs_common::models::{Board, UserProfile};
use sqlx::AnyPool;
use uuid::Uuid;

use repository::{boards, users};

/// Shared database state passed through Axum extractors.
#[derive(Clone)]
pub struct Database {
    pub pool: AnyPool,
    pub settings: StoreSettings,
}

impl Database {
    /// Connect using the application config.
    pub async fn connect(config: &AppConfig) -> anyhow::Result<Self> {
        Self::connect_with(
            &config.database.url,
            config.database.max_connections,
            config.database.min_connections,
            StoreSettings::from(&config.database),
        )
        .await
    }

    pub async fn connect_with(
        url: &str,
        max_connections: u32,
        min_connections: u32,
        settings: StoreSettings,
    ) -> anyhow::Result<Self> {
        sqlx::any::install_default_drivers();
        tracing::info!(backend = backend_name(url), "Connecting to database...");
        let pool = sqlx::any::AnyPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(settings.operation_timeout)
            .connect(url)
            .await?;
        tracing::info!("Connected to database");
        Ok(Self { pool, settings })
    }

    /// Run database migrations.
    pub async fn migrate(&self) -> anyhow::Result<()> {
        tracing::info!("Running database migrations...");
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        tracing::info!("Migrations complete");
        Ok(())
    }

    /// Health check — verify the database is reachable.
    pub async fn health_check(&self) -> bool {
        self.timed("health check", sqlx::query("SELECT 1").execute(&self.pool))
            .await
            .is_ok()
    }

    /// Bound one store round-trip by the configured operation timeout.
    pub async fn timed<T, F>(&self, operation: &str, fut: F) -> BrainiacsResult<T>
    where
        F: Future<Output = Result<T, sqlx::Error>>,
    {
        match tokio::time::timeout(self.settings.operation_timeout, fut).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(BrainiacsError::Timeout {
                operation: operation.to_string(),
            }),
        }
    }

    // ── Boards ────────────────────────────────────────────────────────────

    pub async fn load_board(&self, id: Uuid) -> BrainiacsResult<Board> {
        self.timed("load board", boards::find_board(&self.pool, id))
            .await?
            .map(|stored| stored.board)
            .ok_or_else(|| BrainiacsError::not_found("Board"))
    }

    pub async fn insert_board(&self, board: &Board) -> BrainiacsResult<()> {
        self.timed("insert board", boards::insert_board(&self.pool, board))
            .await
    }

    pub async fn delete_board(&self, id: Uuid) -> BrainiacsResult<()> {
        if self.timed("delete board", boards::delete_board(&self.pool, id)).await? {
            Ok(())
        } else {
            Err(BrainiacsError::not_found("Board"))
        }
    }

    /// Read-modify-write on one board under optimistic concurrency.
    ///
    /// `mutate` runs against a freshly loaded copy and must be free of side
    /// effects: it may run several times. An `Err` from it aborts without
    /// writing, and so does leaving the board equal to what was loaded. When
    /// every attempt loses the race the call fails with
    /// [`BrainiacsError::Contention`].
    pub async fn modify_board<T, F>(&self, id: Uuid, mut mutate: F) -> BrainiacsResult<(Board, T)>
    where
        F: FnMut(&mut Board) -> BrainiacsResult<T>,
    {
        let attempts = self.settings.max_write_retries.max(1);
        for attempt in 1..=attempts {
            let stored = self
                .timed("load board", boards::find_board(&self.pool, id))
                .await?
                .ok_or_else(|| BrainiacsError::not_found("Board"))?;
            let mut board = stored.board.clone();
            let output = mutate(&mut board)?;

            if board == stored.board {
                tracing::trace!(board_id = %id, version = stored.version, "Board unchanged, write skipped");
                return Ok((board, output));
            }
            if self
                .timed("replace board", boards::replace_board(&self.pool, &board, stored.version))
                .await?
            {
                return Ok((board, output));
            }
            tracing::debug!(board_id = %id, attempt, version = stored.version, "Board write lost a race, retrying");
        }

        tracing::warn!(board_id = %id, attempts, "Board write retries exhausted");
        Err(BrainiacsError::Contention {
            resource: "Board".into(),
        })
    }

    // ── Users ─────────────────────────────────────────────────────────────

    /// Resolve a profile or fail with `NotFound("User")`.
    pub async fn require_user(&self, id: Uuid) -> BrainiacsResult<UserProfile> {
        self.timed("load user", users::find_by_id(&self.pool, id))
            .await?
            .ok_or_else(|| BrainiacsError::not_found("User"))
    }
}

fn backend_name(url: &str) -> &'static str {
    if url.starts_with("sqlite:") {
        "sqlite"
    } else {
        "postgres"
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use std::time::Duration;

    /// Fresh in-memory store. A single connection keeps every query on the
    /// same SQLite database.
    pub async fn memory_db() -> Database {
        let settings = StoreSettings {
            operation_timeout: Duration::from_secs(5),
            max_write_retries: 5,
        };
        let db = Database::connect_with("sqlite::memory:", 1, 1, settings)
            .await
            .expect("connect sqlite");
        db.migrate().await.expect("migrate");
        db
    }

    pub async fn user(db: &Database, name: &str) -> UserProfile {
        let profile = UserProfile {
            id: Uuid::now_v7(),
            name: name.to_string(),
            email: format!("{name}@example.com"),
            avatar: None,
        };
        users::create_user(&db.pool, &profile).await.expect("create user");
        profile
    }
}
