use super::*;

impl GrantScheduler {
    /// Grants `rank_name` to a grantee for `duration`.
    ///
    /// An existing grant of the same rank is extended when accumulation is
    /// enabled; any other existing grant is revoked and superseded with no
    /// time carried over. While the pause gate is closed, new grants start
    /// frozen.
    pub async fn assign(
        &self,
        grantee_id: GranteeId,
        rank_name: RankName,
        duration: GrantDuration,
    ) -> AppResult<GrantAssignment> {
        let _guard = self.state.locks.lock(grantee_id).await;
        let added_ms = duration.as_millis();

        let existing = self
            .state
            .repository
            .find_grant(grantee_id)
            .await
            .inspect_err(|error| log_storage_failure("assign", grantee_id, error))?;

        let mut kind = AssignmentKind::Granted;
        let mut superseded: Option<RankName> = None;
        if let Some(mut existing) = existing {
            let same_rank = existing.holds_rank(rank_name.as_str());
            if same_rank && self.settings().accumulate_time {
                return self.accumulate_locked(&mut existing, added_ms).await;
            }

            self.state
                .authority
                .remove_rank(grantee_id, existing.rank_name().as_str())
                .await?;
            kind = AssignmentKind::Replaced;

            if same_rank {
                info!(
                    grantee_id = %grantee_id,
                    rank = %rank_name,
                    "replacing temporary rank, accumulation disabled"
                );
            }
            superseded = Some(existing.rank_name().clone());
        }

        if let Err(error) = self
            .state
            .authority
            .add_rank(grantee_id, rank_name.as_str())
            .await
        {
            self.roll_back_assignment(grantee_id, None, superseded.as_ref())
                .await;
            return Err(error);
        }

        let now_ms = self.now_ms();
        let record = if self.is_paused() {
            GrantRecord::new_paused(grantee_id, rank_name, now_ms, added_ms)
        } else {
            GrantRecord::new(grantee_id, rank_name, now_ms.saturating_add(added_ms))
        };

        if let Err(error) = self.state.repository.save_grant(&record).await {
            log_storage_failure("assign", grantee_id, &error);
            self.roll_back_assignment(
                grantee_id,
                Some(record.rank_name()),
                superseded.as_ref(),
            )
            .await;
            return Err(error);
        }

        self.arm_locked(&record).await?;

        info!(
            grantee_id = %grantee_id,
            rank = %record.rank_name(),
            added_ms = added_ms,
            paused = record.is_paused(),
            "gave {} rank {} for {} (expires {})",
            grantee_id,
            record.rank_name(),
            format_duration(added_ms),
            expiry_label(&record)
        );

        Ok(GrantAssignment {
            kind,
            added_ms,
            total_ms: added_ms,
            paused: record.is_paused(),
        })
    }

    async fn accumulate_locked(
        &self,
        record: &mut GrantRecord,
        added_ms: i64,
    ) -> AppResult<GrantAssignment> {
        let grantee_id = record.grantee_id();
        let total_ms = record.extend(self.now_ms(), added_ms);

        self.state
            .repository
            .save_grant(record)
            .await
            .inspect_err(|error| log_storage_failure("accumulate", grantee_id, error))?;
        if !record.is_paused() {
            self.arm_locked(record).await?;
        }

        info!(
            grantee_id = %grantee_id,
            rank = %record.rank_name(),
            added_ms = added_ms,
            total_ms = total_ms,
            paused = record.is_paused(),
            "added {} to {}'s {} rank, total time remaining {} (expires {})",
            format_duration(added_ms),
            grantee_id,
            record.rank_name(),
            format_duration(total_ms),
            expiry_label(record)
        );

        Ok(GrantAssignment {
            kind: AssignmentKind::Accumulated,
            added_ms,
            total_ms,
            paused: record.is_paused(),
        })
    }

    /// Undoes the membership changes of an assignment that could not be
    /// persisted, so the grantee keeps the ranks it held before.
    ///
    /// The old timer is still armed at this point, so restoring the previous
    /// rank is enough to leave the stored grant consistent.
    async fn roll_back_assignment(
        &self,
        grantee_id: GranteeId,
        granted: Option<&RankName>,
        superseded: Option<&RankName>,
    ) {
        let authority = &self.state.authority;

        if let Some(granted) = granted
            && let Err(error) = authority.remove_rank(grantee_id, granted.as_str()).await
        {
            warn!(
                grantee_id = %grantee_id,
                rank = %granted,
                error = %error,
                "failed to withdraw rank after aborted assignment"
            );
        }

        if let Some(superseded) = superseded
            && let Err(error) = authority.add_rank(grantee_id, superseded.as_str()).await
        {
            warn!(
                grantee_id = %grantee_id,
                rank = %superseded,
                error = %error,
                "failed to restore superseded rank after aborted assignment"
            );
        }
    }
}

fn expiry_label(record: &GrantRecord) -> String {
    if record.is_paused() {
        "when resumed".to_owned()
    } else {
        format_instant(record.expires_at_ms())
    }
}
