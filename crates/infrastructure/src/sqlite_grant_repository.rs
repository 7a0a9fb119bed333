//! SQLite-backed grant repository using the `temp_ranks` table.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use async_trait::async_trait;
use sqlx::SqlitePool;
use sqlx::migrate::Migrator;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use tokio::sync::OnceCell;
use tracing::{info, warn};

use temprank_application::GrantRepository;
use temprank_core::{AppError, AppResult, GranteeId};
use temprank_domain::{GrantRecord, RankName};

static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// SQLite implementation of the grant repository port.
pub struct SqliteGrantRepository {
    database_path: PathBuf,
    pool: OnceCell<SqlitePool>,
}

impl SqliteGrantRepository {
    /// Creates a repository for the database file at `database_path`.
    ///
    /// Nothing is opened until [`GrantRepository::initialize`] runs.
    #[must_use]
    pub fn new(database_path: impl Into<PathBuf>) -> Self {
        Self {
            database_path: database_path.into(),
            pool: OnceCell::new(),
        }
    }

    /// Returns the database file location.
    #[must_use]
    pub fn database_path(&self) -> &Path {
        self.database_path.as_path()
    }

    fn pool(&self) -> AppResult<&SqlitePool> {
        self.pool.get().ok_or_else(|| {
            AppError::StorageUnavailable(format!(
                "sqlite database '{}' is not initialized",
                self.database_path.display()
            ))
        })
    }

    async fn connect(&self) -> AppResult<SqlitePool> {
        if let Some(parent) = self
            .database_path
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
        {
            tokio::fs::create_dir_all(parent).await.map_err(|error| {
                AppError::StorageUnavailable(format!(
                    "failed to create data directory '{}': {error}",
                    parent.display()
                ))
            })?;
        }

        let options = SqliteConnectOptions::new()
            .filename(&self.database_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Full);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(|error| {
                AppError::StorageUnavailable(format!(
                    "failed to open sqlite database '{}': {error}",
                    self.database_path.display()
                ))
            })?;

        MIGRATOR.run(&pool).await.map_err(|error| {
            AppError::StorageUnavailable(format!("failed to migrate sqlite database: {error}"))
        })?;

        Ok(pool)
    }
}

#[async_trait]
impl GrantRepository for SqliteGrantRepository {
    async fn initialize(&self) -> AppResult<()> {
        self.pool.get_or_try_init(|| self.connect()).await?;

        info!(
            database = %self.database_path.display(),
            "connected to sqlite grant database"
        );
        Ok(())
    }

    async fn close(&self) -> AppResult<()> {
        if let Some(pool) = self.pool.get() {
            pool.close().await;
            info!("sqlite grant database connection closed");
        }
        Ok(())
    }

    async fn load_all_grants(&self) -> AppResult<Vec<GrantRecord>> {
        let rows = sqlx::query_as::<_, TempRankRow>(
            r#"
            SELECT player_uuid, rank_name, expiration_timestamp, is_paused, time_left_millis
            FROM temp_ranks
            "#,
        )
        .fetch_all(self.pool()?)
        .await
        .map_err(|error| {
            AppError::StorageUnavailable(format!("failed to load temporary ranks: {error}"))
        })?;

        Ok(rows
            .into_iter()
            .filter_map(|row| {
                let player_uuid = row.player_uuid.clone();
                row.into_record()
                    .inspect_err(|error| {
                        warn!(
                            player_uuid = %player_uuid,
                            error = %error,
                            "skipping unreadable temporary rank row"
                        );
                    })
                    .ok()
            })
            .collect())
    }

    async fn save_grant(&self, record: &GrantRecord) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO temp_ranks (
                player_uuid,
                rank_name,
                expiration_timestamp,
                is_paused,
                time_left_millis
            )
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT (player_uuid) DO UPDATE
            SET
                rank_name = excluded.rank_name,
                expiration_timestamp = excluded.expiration_timestamp,
                is_paused = excluded.is_paused,
                time_left_millis = excluded.time_left_millis
            "#,
        )
        .bind(record.grantee_id().to_string())
        .bind(record.rank_name().as_str())
        .bind(record.expires_at_ms())
        .bind(record.is_paused())
        .bind(record.frozen_remaining_ms())
        .execute(self.pool()?)
        .await
        .map_err(|error| {
            AppError::StorageUnavailable(format!(
                "failed to save temporary rank for '{}': {error}",
                record.grantee_id()
            ))
        })?;

        Ok(())
    }

    async fn remove_grant(&self, grantee_id: GranteeId) -> AppResult<()> {
        sqlx::query(
            r#"
            DELETE FROM temp_ranks
            WHERE player_uuid = ?1
            "#,
        )
        .bind(grantee_id.to_string())
        .execute(self.pool()?)
        .await
        .map_err(|error| {
            AppError::StorageUnavailable(format!(
                "failed to remove temporary rank for '{grantee_id}': {error}"
            ))
        })?;

        Ok(())
    }

    async fn find_grant(&self, grantee_id: GranteeId) -> AppResult<Option<GrantRecord>> {
        let row = sqlx::query_as::<_, TempRankRow>(
            r#"
            SELECT player_uuid, rank_name, expiration_timestamp, is_paused, time_left_millis
            FROM temp_ranks
            WHERE player_uuid = ?1
            "#,
        )
        .bind(grantee_id.to_string())
        .fetch_optional(self.pool()?)
        .await
        .map_err(|error| {
            AppError::StorageUnavailable(format!(
                "failed to find temporary rank for '{grantee_id}': {error}"
            ))
        })?;

        row.map(TempRankRow::into_record).transpose()
    }

    async fn remove_expired_grants(&self, now_ms: i64) -> AppResult<u64> {
        let result = sqlx::query(
            r#"
            DELETE FROM temp_ranks
            WHERE is_paused = 0
              AND expiration_timestamp <= ?1
            "#,
        )
        .bind(now_ms)
        .execute(self.pool()?)
        .await
        .map_err(|error| {
            AppError::StorageUnavailable(format!(
                "failed to remove expired temporary ranks: {error}"
            ))
        })?;

        Ok(result.rows_affected())
    }

    fn provider_name(&self) -> &'static str {
        "SQLite"
    }
}

#[derive(Debug, sqlx::FromRow)]
struct TempRankRow {
    player_uuid: String,
    rank_name: String,
    expiration_timestamp: i64,
    is_paused: bool,
    time_left_millis: i64,
}

impl TempRankRow {
    fn into_record(self) -> AppResult<GrantRecord> {
        Ok(GrantRecord::from_storage(
            GranteeId::from_str(self.player_uuid.as_str())?,
            RankName::new(self.rank_name)?,
            self.expiration_timestamp,
            self.is_paused,
            self.time_left_millis,
        ))
    }
}

#[cfg(test)]
mod tests;
