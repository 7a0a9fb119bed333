//! Application services and ports.

#![forbid(unsafe_code)]

mod grant_ports;
mod grant_scheduler;

pub use grant_ports::{Clock, GrantAuthority, GrantRepository, TimerHandle, TimerHost, TimerTask};
pub use grant_scheduler::{
    AssignmentKind, GrantAssignment, GrantScheduler, MIN_TIMER_DELAY_MS, ReconcileSummary,
    SchedulerSettings,
};
