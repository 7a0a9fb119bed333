use async_trait::async_trait;

use temprank_core::{AppResult, GranteeId};

/// External privilege system that owns group membership.
///
/// Both calls are idempotent membership toggles.
#[async_trait]
pub trait GrantAuthority: Send + Sync {
    /// Adds the grantee to a rank.
    async fn add_rank(&self, grantee_id: GranteeId, rank_name: &str) -> AppResult<()>;

    /// Removes the grantee from a rank.
    async fn remove_rank(&self, grantee_id: GranteeId, rank_name: &str) -> AppResult<()>;
}
