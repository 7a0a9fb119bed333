use super::*;

impl GrantScheduler {
    /// Removes a grantee's temporary rank and restores the default group.
    ///
    /// Returns the removed grant, or `None` when the grantee had none.
    pub async fn revoke(&self, grantee_id: GranteeId) -> AppResult<Option<GrantRecord>> {
        let _guard = self.state.locks.lock(grantee_id).await;

        let Some(record) = self
            .state
            .repository
            .find_grant(grantee_id)
            .await
            .inspect_err(|error| log_storage_failure("revoke", grantee_id, error))?
        else {
            return Ok(None);
        };

        self.release_locked(&record).await?;

        info!(
            grantee_id = %grantee_id,
            rank = %record.rank_name(),
            default_group = %self.settings().default_group,
            "manually removed temporary rank {} from {}, reverted to {}",
            record.rank_name(),
            grantee_id,
            self.settings().default_group
        );

        Ok(Some(record))
    }

    /// Expires a grantee's grant of `rank_name`.
    ///
    /// Returns `false` when the grant is already gone or now holds another
    /// rank.
    pub async fn expire(&self, grantee_id: GranteeId, rank_name: &str) -> AppResult<bool> {
        let _guard = self.state.locks.lock(grantee_id).await;

        let record = self
            .state
            .repository
            .find_grant(grantee_id)
            .await
            .inspect_err(|error| log_storage_failure("expire", grantee_id, error))?;

        match record {
            Some(record) if record.holds_rank(rank_name) => {
                self.expire_locked(&record).await?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    /// Expires a grantee's grant only if, under the grantee lock, it is
    /// still running and past its expiry.
    pub(super) async fn expire_if_due(&self, grantee_id: GranteeId) -> AppResult<bool> {
        let _guard = self.state.locks.lock(grantee_id).await;

        let record = self
            .state
            .repository
            .find_grant(grantee_id)
            .await
            .inspect_err(|error| log_storage_failure("expire", grantee_id, error))?;

        match record {
            Some(record) if record.is_expired_at(self.now_ms()) => {
                self.expire_locked(&record).await?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    pub(super) async fn expire_locked(&self, record: &GrantRecord) -> AppResult<()> {
        self.release_locked(record).await?;

        info!(
            grantee_id = %record.grantee_id(),
            rank = %record.rank_name(),
            default_group = %self.settings().default_group,
            "rank {} expired for {}, reverted to {}",
            record.rank_name(),
            record.grantee_id(),
            self.settings().default_group
        );

        Ok(())
    }

    async fn release_locked(&self, record: &GrantRecord) -> AppResult<()> {
        let grantee_id = record.grantee_id();
        let authority = &self.state.authority;

        authority
            .remove_rank(grantee_id, record.rank_name().as_str())
            .await?;
        authority
            .add_rank(grantee_id, self.settings().default_group.as_str())
            .await?;

        self.state
            .repository
            .remove_grant(grantee_id)
            .await
            .inspect_err(|error| log_storage_failure("remove", grantee_id, error))?;

        self.disarm_locked(grantee_id).await;
        Ok(())
    }
}
