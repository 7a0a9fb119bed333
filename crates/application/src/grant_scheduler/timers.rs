use std::sync::Weak;
use std::time::Duration;

use crate::grant_ports::TimerTask;

use super::*;

impl GrantScheduler {
    /// Replaces any timer for the grant with one firing at its expiry.
    ///
    /// Paused grants are only disarmed. Callers hold the grantee lock and
    /// have already persisted `record`.
    pub(super) async fn arm_locked(&self, record: &GrantRecord) -> AppResult<()> {
        let grantee_id = record.grantee_id();
        self.disarm_locked(grantee_id).await;

        if record.is_paused() {
            return Ok(());
        }

        let delay_ms = record
            .expires_at_ms()
            .saturating_sub(self.now_ms())
            .max(MIN_TIMER_DELAY_MS);
        let generation = self.state.next_generation.fetch_add(1, Ordering::Relaxed);
        let task = fire_task(
            Arc::downgrade(&self.state),
            grantee_id,
            record.rank_name().as_str().to_owned(),
            generation,
        );

        let handle = self
            .state
            .timer_host
            .schedule(Duration::from_millis(delay_ms.unsigned_abs()), task)?;

        self.state
            .timers
            .lock()
            .await
            .insert(grantee_id, ArmedTimer { generation, handle });

        debug!(
            grantee_id = %grantee_id,
            delay_ms = delay_ms,
            generation = generation,
            "armed grant expiration timer"
        );

        Ok(())
    }

    /// Cancels the grantee's timer, if one is armed.
    pub(super) async fn disarm_locked(&self, grantee_id: GranteeId) {
        let removed = self.state.timers.lock().await.remove(&grantee_id);
        if let Some(timer) = removed {
            timer.handle.cancel();
            debug!(
                grantee_id = %grantee_id,
                generation = timer.generation,
                "cancelled grant expiration timer"
            );
        }
    }

    async fn on_timer_fired(&self, grantee_id: GranteeId, rank_name: String, generation: u64) {
        let _guard = self.state.locks.lock(grantee_id).await;

        {
            let mut timers = self.state.timers.lock().await;
            match timers.get(&grantee_id) {
                Some(timer) if timer.generation == generation => {
                    timers.remove(&grantee_id);
                }
                _ => {
                    debug!(
                        grantee_id = %grantee_id,
                        generation = generation,
                        "ignoring superseded grant expiration timer"
                    );
                    return;
                }
            }
        }

        let record = match self.state.repository.find_grant(grantee_id).await {
            Ok(Some(record)) => record,
            Ok(None) => return,
            Err(error) => {
                log_storage_failure("expire", grantee_id, &error);
                return;
            }
        };

        if record.is_paused() || !record.holds_rank(rank_name.as_str()) {
            return;
        }

        if !record.is_expired_at(self.now_ms()) {
            if let Err(error) = self.arm_locked(&record).await {
                warn!(
                    grantee_id = %grantee_id,
                    error = %error,
                    "failed to re-arm early grant expiration timer"
                );
            }
            return;
        }

        if let Err(error) = self.expire_locked(&record).await {
            warn!(
                grantee_id = %grantee_id,
                rank = %record.rank_name(),
                error = %error,
                "grant expiration failed, the next sweep will retry"
            );
        }
    }
}

/// Builds the task run when a timer elapses.
///
/// The task holds only a weak reference, so a dropped scheduler never fires.
fn fire_task(
    state: Weak<SchedulerState>,
    grantee_id: GranteeId,
    rank_name: String,
    generation: u64,
) -> TimerTask {
    Box::pin(async move {
        let Some(state) = state.upgrade() else {
            return;
        };

        GrantScheduler { state }
            .on_timer_fired(grantee_id, rank_name, generation)
            .await;
    })
}
