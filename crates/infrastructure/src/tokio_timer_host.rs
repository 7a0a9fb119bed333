use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::Notify;

use temprank_application::{TimerHandle, TimerHost, TimerTask};
use temprank_core::{AppError, AppResult};

/// Timer host backed by the ambient tokio runtime.
#[derive(Clone)]
pub struct TokioTimerHost {
    runtime: Handle,
}

impl TokioTimerHost {
    /// Binds to the runtime driving the current task.
    pub fn current() -> AppResult<Self> {
        Handle::try_current()
            .map(Self::with_handle)
            .map_err(|error| AppError::Internal(format!("no tokio runtime available: {error}")))
    }

    /// Binds to an explicit runtime handle.
    #[must_use]
    pub fn with_handle(runtime: Handle) -> Self {
        Self { runtime }
    }
}

impl TimerHost for TokioTimerHost {
    fn schedule(&self, delay: Duration, task: TimerTask) -> AppResult<Box<dyn TimerHandle>> {
        let cancelled = Arc::new(Notify::new());
        let signal = Arc::clone(&cancelled);

        self.runtime.spawn(async move {
            tokio::select! {
                biased;
                () = signal.notified() => {}
                () = tokio::time::sleep(delay) => task.await,
            }
        });

        Ok(Box::new(TokioTimerHandle { cancelled }))
    }
}

struct TokioTimerHandle {
    cancelled: Arc<Notify>,
}

impl TimerHandle for TokioTimerHandle {
    fn cancel(&self) {
        // notify_one keeps a permit, so a cancel issued before the first poll still lands.
        self.cancelled.notify_one();
    }
}
