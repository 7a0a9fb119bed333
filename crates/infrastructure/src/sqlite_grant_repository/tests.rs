use tempfile::TempDir;

use temprank_application::GrantRepository;
use temprank_core::{AppError, GranteeId};
use temprank_domain::{GrantRecord, RankName};

use super::SqliteGrantRepository;

fn temp_dir() -> TempDir {
    match tempfile::tempdir() {
        Ok(dir) => dir,
        Err(error) => panic!("failed to create temp dir for sqlite tests: {error}"),
    }
}

fn rank(name: &str) -> RankName {
    RankName::new(name).unwrap_or_else(|_| unreachable!())
}

async fn open(dir: &TempDir) -> SqliteGrantRepository {
    let repository = SqliteGrantRepository::new(dir.path().join("tempranks.db"));
    let initialized = repository.initialize().await;
    assert!(initialized.is_ok(), "initialize failed: {initialized:?}");
    repository
}

#[tokio::test]
async fn save_and_find_round_trip_all_fields() {
    let dir = temp_dir();
    let repository = open(&dir).await;
    let record = GrantRecord::from_storage(GranteeId::new(), rank("VIP"), 1_234, true, 5_678);

    let saved = repository.save_grant(&record).await;
    assert!(saved.is_ok());

    let found = repository.find_grant(record.grantee_id()).await;
    assert!(found.is_ok());
    assert_eq!(found.unwrap_or_default(), Some(record));
}

#[tokio::test]
async fn save_replaces_existing_grant_for_the_same_grantee() {
    let dir = temp_dir();
    let repository = open(&dir).await;
    let grantee_id = GranteeId::new();

    let first = repository
        .save_grant(&GrantRecord::new(grantee_id, rank("vip"), 1_000))
        .await;
    assert!(first.is_ok());
    let replacement = GrantRecord::new(grantee_id, rank("mvp"), 2_000);
    let second = repository.save_grant(&replacement).await;
    assert!(second.is_ok());

    let all = repository.load_all_grants().await;
    assert!(all.is_ok());
    assert_eq!(all.unwrap_or_default(), vec![replacement]);
}

#[tokio::test]
async fn remove_is_a_no_op_for_unknown_grantees() {
    let dir = temp_dir();
    let repository = open(&dir).await;
    let grantee_id = GranteeId::new();

    let removed = repository.remove_grant(grantee_id).await;
    assert!(removed.is_ok());

    let saved = repository
        .save_grant(&GrantRecord::new(grantee_id, rank("vip"), 1_000))
        .await;
    assert!(saved.is_ok());
    let removed = repository.remove_grant(grantee_id).await;
    assert!(removed.is_ok());
    assert!(repository.has_grant(grantee_id).await.is_ok_and(|has| !has));
}

#[tokio::test]
async fn grants_survive_reopening_the_database() {
    let dir = temp_dir();
    let record = GrantRecord::from_storage(GranteeId::new(), rank("vip"), 99_000, false, 0);

    let repository = open(&dir).await;
    let saved = repository.save_grant(&record).await;
    assert!(saved.is_ok());
    let closed = repository.close().await;
    assert!(closed.is_ok());

    let reopened = open(&dir).await;
    let all = reopened.load_all_grants().await;
    assert!(all.is_ok());
    assert_eq!(all.unwrap_or_default(), vec![record]);
}

#[tokio::test]
async fn remove_expired_spares_paused_and_future_grants() {
    let dir = temp_dir();
    let repository = open(&dir).await;
    let now_ms = 1_000_000;
    let expired = GrantRecord::new(GranteeId::new(), rank("vip"), now_ms - 1);
    let paused = GrantRecord::from_storage(GranteeId::new(), rank("vip"), now_ms - 1, true, 10);
    let future = GrantRecord::new(GranteeId::new(), rank("vip"), now_ms + 1);

    for record in [&expired, &paused, &future] {
        assert!(repository.save_grant(record).await.is_ok());
    }

    let removed = repository.remove_expired_grants(now_ms).await;
    assert_eq!(removed.ok(), Some(1));
    assert!(
        repository
            .has_grant(expired.grantee_id())
            .await
            .is_ok_and(|has| !has)
    );
    assert!(repository.has_grant(paused.grantee_id()).await.is_ok_and(|has| has));
    assert!(repository.has_grant(future.grantee_id()).await.is_ok_and(|has| has));
}

#[tokio::test]
async fn calls_before_initialize_report_storage_unavailable() {
    let dir = temp_dir();
    let repository = SqliteGrantRepository::new(dir.path().join("tempranks.db"));

    let result = repository.load_all_grants().await;

    assert!(matches!(result, Err(AppError::StorageUnavailable(_))));
}

#[tokio::test]
async fn initialize_fails_when_the_data_directory_cannot_be_created() {
    let dir = temp_dir();
    let blocker = dir.path().join("not-a-directory");
    assert!(std::fs::write(&blocker, b"file").is_ok());
    let repository = SqliteGrantRepository::new(blocker.join("tempranks.db"));

    let result = repository.initialize().await;

    assert!(matches!(result, Err(AppError::StorageUnavailable(_))));
}
