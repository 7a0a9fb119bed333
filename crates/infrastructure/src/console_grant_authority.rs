//! Console grant authority for development. Logs membership changes to tracing output.

use async_trait::async_trait;
use tracing::info;

use temprank_application::GrantAuthority;
use temprank_core::{AppResult, GranteeId};

/// Development authority that logs rank membership changes instead of applying them.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleGrantAuthority;

impl ConsoleGrantAuthority {
    /// Creates a new console authority.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl GrantAuthority for ConsoleGrantAuthority {
    async fn add_rank(&self, grantee_id: GranteeId, rank_name: &str) -> AppResult<()> {
        info!(grantee_id = %grantee_id, rank = rank_name, "authority: added rank membership");
        Ok(())
    }

    async fn remove_rank(&self, grantee_id: GranteeId, rank_name: &str) -> AppResult<()> {
        info!(grantee_id = %grantee_id, rank = rank_name, "authority: removed rank membership");
        Ok(())
    }
}
