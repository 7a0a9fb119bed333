//! Infrastructure adapters for application ports.

#![forbid(unsafe_code)]

mod console_grant_authority;
mod grant_store;
mod json_file_grant_repository;
mod sqlite_grant_repository;
mod system_clock;
mod tokio_timer_host;

pub use console_grant_authority::ConsoleGrantAuthority;
pub use grant_store::{GrantStore, GrantStoreConfig};
pub use json_file_grant_repository::JsonFileGrantRepository;
pub use sqlite_grant_repository::SqliteGrantRepository;
pub use system_clock::SystemClock;
pub use tokio_timer_host::TokioTimerHost;
