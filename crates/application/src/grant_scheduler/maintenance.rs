use super::*;

impl GrantScheduler {
    /// Rebuilds timers from storage after a restart.
    ///
    /// Expired grants are revoked, running grants are armed and paused grants
    /// stay untimed. Must complete before assignments are served.
    pub async fn reconcile(&self) -> AppResult<ReconcileSummary> {
        let records = self.state.repository.load_all_grants().await?;
        let mut summary = ReconcileSummary::default();

        for record in records {
            let grantee_id = record.grantee_id();
            let _guard = self.state.locks.lock(grantee_id).await;

            let outcome = if record.is_paused() {
                summary.paused += 1;
                Ok(())
            } else if record.is_expired_at(self.now_ms()) {
                summary.expired += 1;
                self.expire_locked(&record).await
            } else {
                summary.armed += 1;
                self.arm_locked(&record).await
            };

            if let Err(error) = outcome {
                warn!(
                    grantee_id = %grantee_id,
                    error = %error,
                    "failed to reconcile grant"
                );
            }
        }

        info!(
            provider = self.provider_name(),
            expired = summary.expired,
            armed = summary.armed,
            paused = summary.paused,
            "reconciled temporary ranks"
        );

        Ok(summary)
    }

    /// Removes running grants past their expiry that no timer handled.
    ///
    /// Each expired grant is re-read under its grantee lock and revoked
    /// through the authority. The storage bulk pass then drops anything left,
    /// unless a revocation failed: that record must stay stored so the next
    /// sweep retries it. Skipped while the pause gate is closed. Returns the
    /// number of grants removed.
    pub async fn sweep_expired(&self) -> AppResult<u64> {
        if self.is_paused() {
            debug!("skipping expired grant sweep while paused");
            return Ok(0);
        }

        let now_ms = self.now_ms();
        let records = self.state.repository.load_all_grants().await?;
        let mut removed = 0_u64;
        let mut failed = 0_usize;

        for record in records
            .into_iter()
            .filter(|record| record.is_expired_at(now_ms))
        {
            match self.expire_if_due(record.grantee_id()).await {
                Ok(true) => removed += 1,
                Ok(false) => {}
                Err(error) => {
                    failed += 1;
                    warn!(
                        grantee_id = %record.grantee_id(),
                        error = %error,
                        "failed to expire grant during sweep"
                    );
                }
            }
        }

        if failed == 0 {
            removed += self
                .state
                .repository
                .remove_expired_grants(now_ms)
                .await?;
        } else {
            warn!(
                failed = failed,
                "kept expired grants whose revocation failed, retrying on next sweep"
            );
        }

        if removed > 0 {
            info!(
                removed = removed,
                provider = self.provider_name(),
                "removed expired temporary ranks"
            );
        }

        Ok(removed)
    }
}
