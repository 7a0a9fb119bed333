//! Expiration scheduler for temporary ranks.
//!
//! The scheduler keeps one cancelable timer per grantee in step with the
//! durable grant record. All mutations of one grantee's record and timer run
//! under that grantee's lock; different grantees proceed in parallel. State
//! is always persisted before a timer is armed, so a crash between the two is
//! repaired by [`GrantScheduler::reconcile`].

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use chrono::DateTime;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use temprank_core::{AppError, AppResult, GranteeId};
use temprank_domain::{GrantDuration, GrantRecord, RankName, format_duration};

use crate::grant_ports::{Clock, GrantAuthority, GrantRepository, TimerHandle, TimerHost};

mod assignment;
mod locks;
mod maintenance;
mod pause;
mod revocation;
mod timers;

use locks::IdentityLocks;

/// Shortest delay a timer is armed with, one scheduler tick.
pub const MIN_TIMER_DELAY_MS: i64 = 50;

/// Policy knobs resolved before the scheduler starts.
#[derive(Debug, Clone)]
pub struct SchedulerSettings {
    /// Whether a repeated grant of the same rank extends the remaining time.
    pub accumulate_time: bool,
    /// Rank restored when a grant is revoked or expires.
    pub default_group: RankName,
}

/// How an assignment changed the grantee's state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignmentKind {
    /// The grantee had no grant.
    Granted,
    /// A grant of another rank, or of the same rank with accumulation
    /// disabled, was superseded.
    Replaced,
    /// Time was added to an existing grant of the same rank.
    Accumulated,
}

/// Outcome of [`GrantScheduler::assign`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GrantAssignment {
    /// Kind of change applied.
    pub kind: AssignmentKind,
    /// Milliseconds added by this request.
    pub added_ms: i64,
    /// Milliseconds remaining on the grant after this request.
    pub total_ms: i64,
    /// Whether the resulting grant is frozen.
    pub paused: bool,
}

impl GrantAssignment {
    /// Returns whether time was added to an existing grant.
    #[must_use]
    pub fn was_accumulated(&self) -> bool {
        self.kind == AssignmentKind::Accumulated
    }
}

/// Counts from a startup reconciliation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileSummary {
    /// Grants that had already expired and were revoked.
    pub expired: usize,
    /// Running grants whose timers were armed.
    pub armed: usize,
    /// Paused grants left without a timer.
    pub paused: usize,
}

struct ArmedTimer {
    generation: u64,
    handle: Box<dyn TimerHandle>,
}

struct SchedulerState {
    repository: Arc<dyn GrantRepository>,
    authority: Arc<dyn GrantAuthority>,
    clock: Arc<dyn Clock>,
    timer_host: Arc<dyn TimerHost>,
    settings: SchedulerSettings,
    locks: IdentityLocks,
    timers: Mutex<HashMap<GranteeId, ArmedTimer>>,
    next_generation: AtomicU64,
    gate_closed: AtomicBool,
}

/// Grants, extends, pauses and expires temporary ranks.
#[derive(Clone)]
pub struct GrantScheduler {
    state: Arc<SchedulerState>,
}

impl GrantScheduler {
    /// Creates a scheduler over an initialized repository.
    ///
    /// Call [`GrantScheduler::reconcile`] before serving assignments.
    #[must_use]
    pub fn new(
        repository: Arc<dyn GrantRepository>,
        authority: Arc<dyn GrantAuthority>,
        clock: Arc<dyn Clock>,
        timer_host: Arc<dyn TimerHost>,
        settings: SchedulerSettings,
    ) -> Self {
        Self {
            state: Arc::new(SchedulerState {
                repository,
                authority,
                clock,
                timer_host,
                settings,
                locks: IdentityLocks::new(),
                timers: Mutex::new(HashMap::new()),
                next_generation: AtomicU64::new(1),
                gate_closed: AtomicBool::new(false),
            }),
        }
    }

    /// Returns whether the pause gate is closed.
    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.state.gate_closed.load(Ordering::SeqCst)
    }

    /// Returns the name of the storage backend in use.
    #[must_use]
    pub fn provider_name(&self) -> &'static str {
        self.state.repository.provider_name()
    }

    /// Returns the grant held by a grantee, if any.
    pub async fn find_grant(&self, grantee_id: GranteeId) -> AppResult<Option<GrantRecord>> {
        self.state.repository.find_grant(grantee_id).await
    }

    /// Returns every stored grant.
    pub async fn list_grants(&self) -> AppResult<Vec<GrantRecord>> {
        self.state.repository.load_all_grants().await
    }

    /// Returns whether a grantee holds a grant.
    pub async fn has_grant(&self, grantee_id: GranteeId) -> AppResult<bool> {
        self.state.repository.has_grant(grantee_id).await
    }

    /// Returns the milliseconds left on a grantee's grant, if any.
    pub async fn remaining_time(&self, grantee_id: GranteeId) -> AppResult<Option<i64>> {
        let now_ms = self.now_ms();
        Ok(self
            .state
            .repository
            .find_grant(grantee_id)
            .await?
            .map(|record| record.remaining_at(now_ms)))
    }

    /// Cancels every armed timer and closes the storage backend.
    pub async fn shutdown(&self) -> AppResult<()> {
        let armed: Vec<ArmedTimer> = {
            let mut timers = self.state.timers.lock().await;
            timers.drain().map(|(_, timer)| timer).collect()
        };

        for timer in &armed {
            timer.handle.cancel();
        }

        info!(cancelled_timers = armed.len(), "grant scheduler stopped");
        self.state.repository.close().await
    }

    fn now_ms(&self) -> i64 {
        self.state.clock.now_millis()
    }

    fn settings(&self) -> &SchedulerSettings {
        &self.state.settings
    }
}

fn format_instant(epoch_ms: i64) -> String {
    DateTime::from_timestamp_millis(epoch_ms)
        .map(|instant| instant.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| epoch_ms.to_string())
}

fn log_storage_failure(operation: &str, grantee_id: GranteeId, error: &AppError) {
    warn!(
        grantee_id = %grantee_id,
        operation = operation,
        error = %error,
        "grant operation abandoned after storage failure"
    );
}
