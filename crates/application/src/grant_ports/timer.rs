use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use temprank_core::AppResult;

/// Work run once when a timer elapses.
pub type TimerTask = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Scheduling primitive used to arm grant expirations.
pub trait TimerHost: Send + Sync {
    /// Runs `task` after `delay` on a host worker, never inline in the caller.
    fn schedule(&self, delay: Duration, task: TimerTask) -> AppResult<Box<dyn TimerHandle>>;
}

/// Handle to a scheduled timer.
pub trait TimerHandle: Send + Sync {
    /// Prevents the task from starting if it has not started yet.
    ///
    /// A task that already began keeps running to completion.
    fn cancel(&self);
}
