//! Temporary rank expiration worker runtime.

#![forbid(unsafe_code)]

use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use temprank_application::{GrantRepository, GrantScheduler, SchedulerSettings};
use temprank_core::{AppError, AppResult};
use temprank_domain::RankName;
use temprank_infrastructure::{
    ConsoleGrantAuthority, GrantStore, GrantStoreConfig, SystemClock, TokioTimerHost,
};

use tokio::time::{Instant, Interval, MissedTickBehavior};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone)]
struct WorkerConfig {
    store: GrantStoreConfig,
    settings: SchedulerSettings,
    cleanup_interval_minutes: u64,
    cleanup_on_startup: bool,
    pause_file: Option<PathBuf>,
    gate_poll_interval_ms: u64,
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = WorkerConfig::load()?;
    let store = Arc::new(GrantStore::from_config(config.store.clone()));
    store.initialize().await?;

    let scheduler = GrantScheduler::new(
        store,
        Arc::new(ConsoleGrantAuthority::new()),
        Arc::new(SystemClock),
        Arc::new(TokioTimerHost::current()?),
        config.settings.clone(),
    );

    info!(
        storage = scheduler.provider_name(),
        accumulate_time = config.settings.accumulate_time,
        default_group = %config.settings.default_group,
        cleanup_interval_minutes = config.cleanup_interval_minutes,
        "temprank-worker started"
    );

    if config.cleanup_on_startup {
        run_sweep(&scheduler, "startup").await;
    }

    let summary = scheduler.reconcile().await?;
    info!(
        expired = summary.expired,
        armed = summary.armed,
        paused = summary.paused,
        "reconciled stored grants"
    );

    let pause_requested = match config.pause_file.as_deref() {
        Some(pause_file) => pause_file_present(pause_file).await,
        None => false,
    };
    restore_pause_gate(&scheduler, pause_requested, summary.paused).await?;

    let mut sweep_timer = (config.cleanup_interval_minutes > 0)
        .then(|| delayed_interval(Duration::from_secs(config.cleanup_interval_minutes * 60)));
    let mut gate_timer = config
        .pause_file
        .as_ref()
        .map(|_| delayed_interval(Duration::from_millis(config.gate_poll_interval_ms)));

    loop {
        tokio::select! {
            () = next_tick(&mut gate_timer) => {
                if let Some(pause_file) = config.pause_file.as_deref() {
                    sync_pause_gate(&scheduler, pause_file).await;
                }
            }
            () = next_tick(&mut sweep_timer) => {
                run_sweep(&scheduler, "periodic").await;
            }
            signal = tokio::signal::ctrl_c() => {
                if let Err(error) = signal {
                    warn!(error = %error, "failed to listen for shutdown signal");
                }
                break;
            }
        }
    }

    info!("shutting down temprank-worker");
    scheduler.shutdown().await
}

/// Brings stored grants in line with the pause gate after a restart.
///
/// The gate starts open, so grants left frozen by an earlier run are resumed
/// unless the pause file still asks for a pause.
async fn restore_pause_gate(
    scheduler: &GrantScheduler,
    pause_requested: bool,
    stored_paused: usize,
) -> AppResult<()> {
    if pause_requested {
        let frozen = scheduler.pause_all().await?;
        info!(frozen, "pause requested at startup");
    } else if stored_paused > 0 {
        let resumed = scheduler.resume_all().await?;
        info!(resumed, "resumed grants left paused by a previous run");
    }

    Ok(())
}

async fn run_sweep(scheduler: &GrantScheduler, trigger: &'static str) {
    match scheduler.sweep_expired().await {
        Ok(removed) => info!(trigger, removed, "expired grant sweep finished"),
        Err(error) => error!(trigger, error = %error, "expired grant sweep failed"),
    }
}

async fn sync_pause_gate(scheduler: &GrantScheduler, pause_file: &Path) {
    let should_pause = pause_file_present(pause_file).await;
    if should_pause == scheduler.is_paused() {
        return;
    }

    let outcome = if should_pause {
        scheduler.pause_all().await.map(|count| ("paused", count))
    } else {
        scheduler.resume_all().await.map(|count| ("resumed", count))
    };

    match outcome {
        Ok((action, count)) => info!(action, count, "pause gate toggled"),
        Err(error) => error!(error = %error, "failed to toggle pause gate"),
    }
}

async fn pause_file_present(pause_file: &Path) -> bool {
    match tokio::fs::try_exists(pause_file).await {
        Ok(present) => present,
        Err(error) => {
            warn!(file = %pause_file.display(), error = %error, "failed to inspect pause file");
            false
        }
    }
}

fn delayed_interval(period: Duration) -> Interval {
    let mut interval = tokio::time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}

async fn next_tick(timer: &mut Option<Interval>) {
    match timer {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

impl WorkerConfig {
    fn load() -> AppResult<Self> {
        let data_dir =
            PathBuf::from(optional_env("TEMPRANK_DATA_DIR").unwrap_or_else(|| ".".to_owned()));
        let storage = optional_env("TEMPRANK_STORAGE").unwrap_or_else(|| "sqlite".to_owned());
        let store = match storage.to_ascii_lowercase().as_str() {
            "sqlite" => GrantStoreConfig::Sqlite {
                database_path: data_dir.join(
                    optional_env("TEMPRANK_SQLITE_FILE")
                        .unwrap_or_else(|| "tempranks.db".to_owned()),
                ),
            },
            "json" => GrantStoreConfig::JsonFile {
                data_path: data_dir.join(
                    optional_env("TEMPRANK_JSON_FILE").unwrap_or_else(|| "data.json".to_owned()),
                ),
            },
            other => {
                return Err(AppError::Validation(format!(
                    "TEMPRANK_STORAGE must be 'sqlite' or 'json', got '{other}'"
                )));
            }
        };

        let accumulate_time = parse_env_bool("TEMPRANK_ACCUMULATE_TIME", true)?;
        let default_group = RankName::new(
            optional_env("TEMPRANK_DEFAULT_GROUP").unwrap_or_else(|| "default".to_owned()),
        )?;
        let cleanup_interval_minutes = parse_env_u64("TEMPRANK_CLEANUP_INTERVAL_MINUTES", 60)?;
        let cleanup_on_startup = parse_env_bool("TEMPRANK_CLEANUP_ON_STARTUP", true)?;
        let pause_file = optional_env("TEMPRANK_PAUSE_FILE").map(PathBuf::from);
        let gate_poll_interval_ms = parse_env_u64("TEMPRANK_GATE_POLL_INTERVAL_MS", 1000)?;

        if gate_poll_interval_ms == 0 {
            return Err(AppError::Validation(
                "TEMPRANK_GATE_POLL_INTERVAL_MS must be greater than zero".to_owned(),
            ));
        }

        if cleanup_interval_minutes.checked_mul(60).is_none() {
            return Err(AppError::Validation(
                "TEMPRANK_CLEANUP_INTERVAL_MINUTES is too large".to_owned(),
            ));
        }

        Ok(Self {
            store,
            settings: SchedulerSettings {
                accumulate_time,
                default_group,
            },
            cleanup_interval_minutes,
            cleanup_on_startup,
            pause_file,
            gate_poll_interval_ms,
        })
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}

fn optional_env(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
}

fn parse_env_u64(name: &str, default: u64) -> AppResult<u64> {
    match optional_env(name) {
        Some(value) => value.parse::<u64>().map_err(|error| {
            AppError::Validation(format!("invalid {name} value '{value}': {error}"))
        }),
        None => Ok(default),
    }
}

fn parse_env_bool(name: &str, default: bool) -> AppResult<bool> {
    match optional_env(name) {
        Some(value) => parse_bool(value.as_str()).ok_or_else(|| {
            AppError::Validation(format!("invalid {name} value '{value}': expected true or false"))
        }),
        None => Ok(default),
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use temprank_application::{GrantRepository, GrantScheduler, SchedulerSettings};
    use temprank_core::GranteeId;
    use temprank_domain::{GrantDuration, GrantRecord, RankName};
    use temprank_infrastructure::{
        ConsoleGrantAuthority, JsonFileGrantRepository, SystemClock, TokioTimerHost,
    };

    use super::{parse_bool, restore_pause_gate};

    const HOUR_MS: i64 = 3_600_000;

    fn rank(name: &str) -> RankName {
        RankName::new(name).unwrap_or_else(|_| unreachable!())
    }

    async fn scheduler_with(records: &[GrantRecord], dir: &tempfile::TempDir) -> GrantScheduler {
        let repository = Arc::new(JsonFileGrantRepository::new(dir.path().join("data.json")));
        assert!(repository.initialize().await.is_ok());
        for record in records {
            assert!(repository.save_grant(record).await.is_ok());
        }

        GrantScheduler::new(
            repository,
            Arc::new(ConsoleGrantAuthority::new()),
            Arc::new(SystemClock),
            Arc::new(TokioTimerHost::current().unwrap_or_else(|_| unreachable!())),
            SchedulerSettings {
                accumulate_time: true,
                default_group: rank("default"),
            },
        )
    }

    fn temp_dir() -> tempfile::TempDir {
        match tempfile::tempdir() {
            Ok(dir) => dir,
            Err(error) => panic!("failed to create temp dir for worker tests: {error}"),
        }
    }

    #[tokio::test]
    async fn grants_left_paused_are_resumed_when_no_pause_is_requested() {
        let dir = temp_dir();
        let grantee_id = GranteeId::new();
        let frozen = GrantRecord::from_storage(grantee_id, rank("vip"), 0, true, HOUR_MS);
        let scheduler = scheduler_with(&[frozen], &dir).await;

        let summary = scheduler.reconcile().await.unwrap_or_default();
        assert_eq!(summary.paused, 1);

        let restored = restore_pause_gate(&scheduler, false, summary.paused).await;
        assert!(restored.is_ok());

        let record = scheduler.find_grant(grantee_id).await.unwrap_or_default();
        assert!(record.is_some_and(|record| !record.is_paused()));
        assert!(!scheduler.is_paused());
    }

    #[tokio::test]
    async fn pause_request_at_startup_closes_the_gate() {
        let dir = temp_dir();
        let grantee_id = GranteeId::new();
        let scheduler = scheduler_with(&[], &dir).await;

        let restored = restore_pause_gate(&scheduler, true, 0).await;
        assert!(restored.is_ok());
        assert!(scheduler.is_paused());

        let assigned = scheduler
            .assign(
                grantee_id,
                rank("vip"),
                GrantDuration::from_millis(HOUR_MS).unwrap_or_else(|_| unreachable!()),
            )
            .await;
        assert!(assigned.is_ok_and(|assignment| assignment.paused));
    }

    #[test]
    fn parse_bool_accepts_common_spellings() {
        assert_eq!(parse_bool("TRUE"), Some(true));
        assert_eq!(parse_bool("on"), Some(true));
        assert_eq!(parse_bool("0"), Some(false));
        assert_eq!(parse_bool("No"), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }
}
