use super::*;

impl GrantScheduler {
    /// Closes the pause gate and freezes every running grant.
    ///
    /// Already paused grants are left untouched, so repeated calls do not
    /// drift. Returns how many grants were frozen by this call. A grantee
    /// whose update fails is logged and skipped; calling again retries it.
    pub async fn pause_all(&self) -> AppResult<usize> {
        self.state.gate_closed.store(true, Ordering::SeqCst);

        let records = self.state.repository.load_all_grants().await?;
        let mut frozen = 0_usize;

        for record in records.into_iter().filter(|record| !record.is_paused()) {
            let grantee_id = record.grantee_id();
            match self.freeze_one(grantee_id).await {
                Ok(true) => frozen += 1,
                Ok(false) => {}
                Err(error) => log_storage_failure("pause", grantee_id, &error),
            }
        }

        info!(frozen = frozen, "paused all grant timers");
        Ok(frozen)
    }

    /// Opens the pause gate and restarts every frozen grant.
    ///
    /// Running grants are left untouched. Returns how many grants were
    /// resumed by this call.
    pub async fn resume_all(&self) -> AppResult<usize> {
        self.state.gate_closed.store(false, Ordering::SeqCst);

        let records = self.state.repository.load_all_grants().await?;
        let mut resumed = 0_usize;

        for record in records.into_iter().filter(GrantRecord::is_paused) {
            let grantee_id = record.grantee_id();
            match self.thaw_one(grantee_id).await {
                Ok(true) => resumed += 1,
                Ok(false) => {}
                Err(error) => log_storage_failure("resume", grantee_id, &error),
            }
        }

        info!(resumed = resumed, "resumed all grant timers");
        Ok(resumed)
    }

    async fn freeze_one(&self, grantee_id: GranteeId) -> AppResult<bool> {
        let _guard = self.state.locks.lock(grantee_id).await;

        let Some(mut record) = self.state.repository.find_grant(grantee_id).await? else {
            return Ok(false);
        };

        if !record.freeze(self.now_ms()) {
            return Ok(false);
        }

        self.state.repository.save_grant(&record).await?;
        self.disarm_locked(grantee_id).await;

        debug!(
            grantee_id = %grantee_id,
            frozen_remaining_ms = record.frozen_remaining_ms(),
            "froze grant countdown"
        );
        Ok(true)
    }

    async fn thaw_one(&self, grantee_id: GranteeId) -> AppResult<bool> {
        let _guard = self.state.locks.lock(grantee_id).await;

        let Some(mut record) = self.state.repository.find_grant(grantee_id).await? else {
            return Ok(false);
        };

        if !record.thaw(self.now_ms()) {
            return Ok(false);
        }

        self.state.repository.save_grant(&record).await?;
        self.arm_locked(&record).await?;

        debug!(
            grantee_id = %grantee_id,
            expires_at = %format_instant(record.expires_at_ms()),
            "restarted grant countdown"
        );
        Ok(true)
    }
}
