use async_trait::async_trait;

use temprank_core::{AppResult, GranteeId};
use temprank_domain::GrantRecord;

/// Durable storage port for grant records.
///
/// Every mutating call is durable before it returns, and reads observe the
/// latest write made by the same process.
#[async_trait]
pub trait GrantRepository: Send + Sync {
    /// Opens or creates the backing store.
    ///
    /// Fails with `AppError::StorageUnavailable` when the backend cannot be
    /// reached or created.
    async fn initialize(&self) -> AppResult<()>;

    /// Flushes and releases backend resources.
    async fn close(&self) -> AppResult<()>;

    /// Returns every stored grant. Order is unspecified.
    async fn load_all_grants(&self) -> AppResult<Vec<GrantRecord>>;

    /// Inserts or replaces the grant keyed by its grantee.
    async fn save_grant(&self, record: &GrantRecord) -> AppResult<()>;

    /// Deletes the grant for a grantee. Absent grants are a no-op.
    async fn remove_grant(&self, grantee_id: GranteeId) -> AppResult<()>;

    /// Finds the grant for a grantee.
    async fn find_grant(&self, grantee_id: GranteeId) -> AppResult<Option<GrantRecord>>;

    /// Returns whether a grantee has a stored grant.
    async fn has_grant(&self, grantee_id: GranteeId) -> AppResult<bool> {
        Ok(self.find_grant(grantee_id).await?.is_some())
    }

    /// Deletes running grants whose expiry is at or before `now_ms` and
    /// returns how many were removed. Paused grants are never removed.
    async fn remove_expired_grants(&self, now_ms: i64) -> AppResult<u64>;

    /// Returns a short human name for the backend.
    fn provider_name(&self) -> &'static str;
}
