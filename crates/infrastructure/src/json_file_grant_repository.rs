//! Flat-file grant repository storing one JSON document.
//!
//! The document maps grantee UUIDs to grant fields. The whole map is kept in
//! memory and rewritten through a temp file plus rename on every change, so a
//! crash never leaves a half-written document behind.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;
use tracing::{info, warn};

use temprank_application::GrantRepository;
use temprank_core::{AppError, AppResult, GranteeId};
use temprank_domain::{GrantRecord, RankName};

/// JSON file implementation of the grant repository port.
pub struct JsonFileGrantRepository {
    data_path: PathBuf,
    grants: RwLock<HashMap<GranteeId, GrantRecord>>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredGrant {
    rank_name: String,
    expiration_timestamp: i64,
    #[serde(default)]
    is_paused: bool,
    #[serde(default)]
    time_left_millis: i64,
}

impl JsonFileGrantRepository {
    /// Creates a repository for the document at `data_path`.
    #[must_use]
    pub fn new(data_path: impl Into<PathBuf>) -> Self {
        Self {
            data_path: data_path.into(),
            grants: RwLock::new(HashMap::new()),
        }
    }

    /// Returns the document location.
    #[must_use]
    pub fn data_path(&self) -> &Path {
        self.data_path.as_path()
    }

    async fn read_document(&self) -> AppResult<HashMap<GranteeId, GrantRecord>> {
        let contents = tokio::fs::read_to_string(&self.data_path)
            .await
            .map_err(|error| {
                AppError::StorageUnavailable(format!(
                    "failed to read grant file '{}': {error}",
                    self.data_path.display()
                ))
            })?;

        if contents.trim().is_empty() {
            return Ok(HashMap::new());
        }

        let document: BTreeMap<String, StoredGrant> = serde_json::from_str(contents.as_str())
            .map_err(|error| {
                AppError::StorageUnavailable(format!(
                    "grant file '{}' is not valid JSON: {error}",
                    self.data_path.display()
                ))
            })?;

        let mut grants = HashMap::with_capacity(document.len());
        for (key, stored) in document {
            match decode_grant(key.as_str(), stored) {
                Ok(record) => {
                    grants.insert(record.grantee_id(), record);
                }
                Err(error) => {
                    warn!(key = %key, error = %error, "skipping invalid entry in grant file");
                }
            }
        }

        Ok(grants)
    }

    async fn write_document(&self, grants: &HashMap<GranteeId, GrantRecord>) -> AppResult<()> {
        let document: BTreeMap<String, StoredGrant> = grants
            .values()
            .map(|record| (record.grantee_id().to_string(), encode_grant(record)))
            .collect();
        let contents = serde_json::to_vec_pretty(&document).map_err(|error| {
            AppError::Internal(format!("failed to serialize grant file: {error}"))
        })?;

        let temp_path = self.temp_path();
        let write_failed = |error: std::io::Error| {
            AppError::StorageUnavailable(format!(
                "failed to write grant file '{}': {error}",
                self.data_path.display()
            ))
        };

        let mut file = tokio::fs::File::create(&temp_path)
            .await
            .map_err(write_failed)?;
        file.write_all(&contents).await.map_err(write_failed)?;
        file.sync_all().await.map_err(write_failed)?;
        drop(file);

        tokio::fs::rename(&temp_path, &self.data_path)
            .await
            .map_err(write_failed)
    }

    fn temp_path(&self) -> PathBuf {
        let mut file_name = self
            .data_path
            .file_name()
            .map(|name| name.to_os_string())
            .unwrap_or_default();
        file_name.push(".tmp");
        self.data_path.with_file_name(file_name)
    }

    /// Applies `change` to a copy of the map, persists it, then publishes it.
    ///
    /// The in-memory map is left untouched when the write fails.
    async fn mutate<T>(
        &self,
        change: impl FnOnce(&mut HashMap<GranteeId, GrantRecord>) -> (T, bool),
    ) -> AppResult<T> {
        let mut grants = self.grants.write().await;
        let mut next = grants.clone();
        let (output, changed) = change(&mut next);

        if changed {
            self.write_document(&next).await?;
            *grants = next;
        }

        Ok(output)
    }
}

#[async_trait]
impl GrantRepository for JsonFileGrantRepository {
    async fn initialize(&self) -> AppResult<()> {
        if let Some(parent) = self
            .data_path
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

        let exists = tokio::fs::try_exists(&self.data_path)
            .await
            .map_err(|error| {
                AppError::StorageUnavailable(format!(
                    "failed to inspect grant file '{}': {error}",
                    self.data_path.display()
                ))
            })?;

        if !exists {
            self.write_document(&HashMap::new()).await?;
            info!(file = %self.data_path.display(), "created new grant file");
        }

        let loaded = self.read_document().await?;
        info!(
            file = %self.data_path.display(),
            grants = loaded.len(),
            "loaded temporary rank records from grant file"
        );
        *self.grants.write().await = loaded;

        Ok(())
    }

    async fn close(&self) -> AppResult<()> {
        let grants = self.grants.read().await;
        self.write_document(&grants).await?;
        info!("grant file storage closed");
        Ok(())
    }

    async fn load_all_grants(&self) -> AppResult<Vec<GrantRecord>> {
        Ok(self.grants.read().await.values().cloned().collect())
    }

    async fn save_grant(&self, record: &GrantRecord) -> AppResult<()> {
        self.mutate(|grants| {
            grants.insert(record.grantee_id(), record.clone());
            ((), true)
        })
        .await
    }

    async fn remove_grant(&self, grantee_id: GranteeId) -> AppResult<()> {
        self.mutate(|grants| ((), grants.remove(&grantee_id).is_some()))
            .await
    }

    async fn find_grant(&self, grantee_id: GranteeId) -> AppResult<Option<GrantRecord>> {
        Ok(self.grants.read().await.get(&grantee_id).cloned())
    }

    async fn has_grant(&self, grantee_id: GranteeId) -> AppResult<bool> {
        Ok(self.grants.read().await.contains_key(&grantee_id))
    }

    async fn remove_expired_grants(&self, now_ms: i64) -> AppResult<u64> {
        self.mutate(|grants| {
            let before = grants.len();
            grants.retain(|_, record| !record.is_expired_at(now_ms));
            let removed = before - grants.len();
            (u64::try_from(removed).unwrap_or(u64::MAX), removed > 0)
        })
        .await
    }

    fn provider_name(&self) -> &'static str {
        "JSON"
    }
}

fn encode_grant(record: &GrantRecord) -> StoredGrant {
    StoredGrant {
        rank_name: record.rank_name().as_str().to_owned(),
        expiration_timestamp: record.expires_at_ms(),
        is_paused: record.is_paused(),
        time_left_millis: record.frozen_remaining_ms(),
    }
}

fn decode_grant(key: &str, stored: StoredGrant) -> AppResult<GrantRecord> {
    Ok(GrantRecord::from_storage(
        GranteeId::from_str(key)?,
        RankName::new(stored.rank_name)?,
        stored.expiration_timestamp,
        stored.is_paused,
        stored.time_left_millis,
    ))
}

#[cfg(test)]
mod tests;
