use tempfile::TempDir;

use temprank_application::GrantRepository;
use temprank_core::GranteeId;
use temprank_domain::{GrantRecord, RankName};

use super::JsonFileGrantRepository;

fn temp_dir() -> TempDir {
    match tempfile::tempdir() {
        Ok(dir) => dir,
        Err(error) => panic!("failed to create temp dir for json tests: {error}"),
    }
}

fn rank(name: &str) -> RankName {
    RankName::new(name).unwrap_or_else(|_| unreachable!())
}

async fn open(dir: &TempDir) -> JsonFileGrantRepository {
    let repository = JsonFileGrantRepository::new(dir.path().join("data.json"));
    let initialized = repository.initialize().await;
    assert!(initialized.is_ok(), "initialize failed: {initialized:?}");
    repository
}

#[tokio::test]
async fn initialize_creates_an_empty_document() {
    let dir = temp_dir();
    let repository = open(&dir).await;

    let contents = tokio::fs::read_to_string(repository.data_path()).await;
    assert!(contents.is_ok());
    assert_eq!(contents.unwrap_or_default().trim(), "{}");

    let all = repository.load_all_grants().await;
    assert!(all.is_ok_and(|grants| grants.is_empty()));
}

#[tokio::test]
async fn initialize_creates_missing_parent_directories() {
    let dir = temp_dir();
    let repository = JsonFileGrantRepository::new(dir.path().join("nested/data/data.json"));

    let initialized = repository.initialize().await;
    assert!(initialized.is_ok());
    assert!(repository.data_path().exists());
}

#[tokio::test]
async fn saved_grants_survive_reopen() {
    let dir = temp_dir();
    let record = GrantRecord::from_storage(GranteeId::new(), rank("VIP"), 9_000, true, 3_000);
    {
        let repository = open(&dir).await;
        let saved = repository.save_grant(&record).await;
        assert!(saved.is_ok());
        assert!(repository.close().await.is_ok());
    }

    let reopened = open(&dir).await;
    let found = reopened.find_grant(record.grantee_id()).await;
    assert!(found.is_ok());
    assert_eq!(found.unwrap_or_default(), Some(record));
}

#[tokio::test]
async fn document_uses_uuid_keys_and_camel_case_fields() {
    let dir = temp_dir();
    let repository = open(&dir).await;
    let record = GrantRecord::new(GranteeId::new(), rank("vip"), 42_000);
    assert!(repository.save_grant(&record).await.is_ok());

    let contents = tokio::fs::read_to_string(repository.data_path()).await;
    assert!(contents.is_ok());
    let document: serde_json::Value =
        serde_json::from_str(contents.unwrap_or_default().as_str()).unwrap_or_default();
    let entry = &document[record.grantee_id().to_string()];

    assert_eq!(entry["rankName"], "vip");
    assert_eq!(entry["expirationTimestamp"], 42_000);
    assert_eq!(entry["isPaused"], false);
    assert_eq!(entry["timeLeftMillis"], 0);
}

#[tokio::test]
async fn invalid_keys_are_skipped_and_missing_flags_default() {
    let dir = temp_dir();
    let path = dir.path().join("data.json");
    let valid_id = GranteeId::new();
    let document = format!(
        r#"{{
            "not-a-uuid": {{"rankName": "vip", "expirationTimestamp": 1}},
            "{valid_id}": {{"rankName": "mvp", "expirationTimestamp": 5000}}
        }}"#
    );
    assert!(tokio::fs::write(&path, document).await.is_ok());

    let repository = JsonFileGrantRepository::new(path);
    assert!(repository.initialize().await.is_ok());

    let all = repository.load_all_grants().await.unwrap_or_default();
    assert_eq!(all, vec![GrantRecord::new(valid_id, rank("mvp"), 5_000)]);
}

#[tokio::test]
async fn empty_file_loads_as_empty_store() {
    let dir = temp_dir();
    let path = dir.path().join("data.json");
    assert!(tokio::fs::write(&path, "").await.is_ok());

    let repository = JsonFileGrantRepository::new(path);
    assert!(repository.initialize().await.is_ok());
    assert!(
        repository
            .load_all_grants()
            .await
            .is_ok_and(|grants| grants.is_empty())
    );
}

#[tokio::test]
async fn malformed_document_fails_initialize() {
    let dir = temp_dir();
    let path = dir.path().join("data.json");
    assert!(tokio::fs::write(&path, "[not json").await.is_ok());

    let repository = JsonFileGrantRepository::new(path);
    let initialized = repository.initialize().await;
    assert!(matches!(
        initialized,
        Err(temprank_core::AppError::StorageUnavailable(_))
    ));
}

#[tokio::test]
async fn remove_grant_drops_the_entry_and_ignores_unknown_ids() {
    let dir = temp_dir();
    let repository = open(&dir).await;
    let record = GrantRecord::new(GranteeId::new(), rank("vip"), 1_000);
    assert!(repository.save_grant(&record).await.is_ok());

    assert!(repository.remove_grant(record.grantee_id()).await.is_ok());
    assert!(repository.remove_grant(GranteeId::new()).await.is_ok());
    assert!(
        repository
            .has_grant(record.grantee_id())
            .await
            .is_ok_and(|present| !present)
    );
}

#[tokio::test]
async fn remove_expired_spares_paused_and_future_grants() {
    let dir = temp_dir();
    let repository = open(&dir).await;
    let expired = GrantRecord::new(GranteeId::new(), rank("vip"), 1_000);
    let future = GrantRecord::new(GranteeId::new(), rank("vip"), 10_000);
    let paused = GrantRecord::from_storage(GranteeId::new(), rank("vip"), 1_000, true, 500);
    for record in [&expired, &future, &paused] {
        assert!(repository.save_grant(record).await.is_ok());
    }

    let removed = repository.remove_expired_grants(5_000).await;
    assert!(removed.is_ok_and(|count| count == 1));

    let reopened = open(&dir).await;
    let mut remaining: Vec<GranteeId> = reopened
        .load_all_grants()
        .await
        .unwrap_or_default()
        .iter()
        .map(GrantRecord::grantee_id)
        .collect();
    remaining.sort();
    let mut expected = vec![future.grantee_id(), paused.grantee_id()];
    expected.sort();
    assert_eq!(remaining, expected);
}
