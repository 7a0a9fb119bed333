use std::path::PathBuf;

use async_trait::async_trait;

use temprank_application::GrantRepository;
use temprank_core::{AppResult, GranteeId};
use temprank_domain::GrantRecord;

use crate::{JsonFileGrantRepository, SqliteGrantRepository};

/// Storage backend selection resolved from configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GrantStoreConfig {
    /// Embedded SQLite database file.
    Sqlite {
        /// Database file location.
        database_path: PathBuf,
    },
    /// Single JSON document.
    JsonFile {
        /// Document location.
        data_path: PathBuf,
    },
}

/// Grant repository dispatching to the configured backend.
pub enum GrantStore {
    /// SQLite backend.
    Sqlite(SqliteGrantRepository),
    /// JSON file backend.
    JsonFile(JsonFileGrantRepository),
}

impl GrantStore {
    /// Builds an uninitialized store for the configured backend.
    #[must_use]
    pub fn from_config(config: GrantStoreConfig) -> Self {
        match config {
            GrantStoreConfig::Sqlite { database_path } => {
                Self::Sqlite(SqliteGrantRepository::new(database_path))
            }
            GrantStoreConfig::JsonFile { data_path } => {
                Self::JsonFile(JsonFileGrantRepository::new(data_path))
            }
        }
    }

    fn backend(&self) -> &dyn GrantRepository {
        match self {
            Self::Sqlite(repository) => repository,
            Self::JsonFile(repository) => repository,
        }
    }
}

#[async_trait]
impl GrantRepository for GrantStore {
    async fn initialize(&self) -> AppResult<()> {
        self.backend().initialize().await
    }

    async fn close(&self) -> AppResult<()> {
        self.backend().close().await
    }

    async fn load_all_grants(&self) -> AppResult<Vec<GrantRecord>> {
        self.backend().load_all_grants().await
    }

    async fn save_grant(&self, record: &GrantRecord) -> AppResult<()> {
        self.backend().save_grant(record).await
    }

    async fn remove_grant(&self, grantee_id: GranteeId) -> AppResult<()> {
        self.backend().remove_grant(grantee_id).await
    }

    async fn find_grant(&self, grantee_id: GranteeId) -> AppResult<Option<GrantRecord>> {
        self.backend().find_grant(grantee_id).await
    }

    async fn has_grant(&self, grantee_id: GranteeId) -> AppResult<bool> {
        self.backend().has_grant(grantee_id).await
    }

    async fn remove_expired_grants(&self, now_ms: i64) -> AppResult<u64> {
        self.backend().remove_expired_grants(now_ms).await
    }

    fn provider_name(&self) -> &'static str {
        self.backend().provider_name()
    }
}
