use adducation_core::model::{AppSettingsDraft, Theme};
use storage::repository::{KeyValueStore, Storage, StorageKey};
use storage::settings::AppSettingsRepository;
use storage::sqlite::SqliteRepository;

#[tokio::test]
async fn sqlite_key_value_round_trip() {
    let repo = SqliteRepository::open("sqlite:file:memdb_kv?mode=memory&cache=shared")
        .await
        .expect("open");

    assert_eq!(repo.get(StorageKey::AuthToken).await.unwrap(), None);

    repo.set(StorageKey::AuthToken, "first").await.unwrap();
    repo.set(StorageKey::AuthToken, "second").await.unwrap();
    assert_eq!(
        repo.get(StorageKey::AuthToken).await.unwrap().as_deref(),
        Some("second")
    );

    repo.remove(StorageKey::AuthToken).await.unwrap();
    assert_eq!(repo.get(StorageKey::AuthToken).await.unwrap(), None);
}

#[tokio::test]
async fn reopening_keeps_stored_values() {
    let url = "sqlite:file:memdb_reopen?mode=memory&cache=shared";
    let first = SqliteRepository::open(url).await.expect("first open");
    first.set(StorageKey::Theme, "dark").await.unwrap();

    let second = SqliteRepository::open(url).await.expect("second open");
    assert_eq!(
        second.get(StorageKey::Theme).await.unwrap().as_deref(),
        Some("dark")
    );
    drop(first);
}

#[tokio::test]
async fn sqlite_storage_persists_settings() {
    let storage = Storage::sqlite("sqlite:file:memdb_settings?mode=memory&cache=shared")
        .await
        .expect("storage");

    let settings = AppSettingsDraft {
        api_key: Some("sk-test".into()),
        selected_model: Some("anthropic/claude-3-haiku".into()),
        theme: Theme::Dark,
        show_debug: false,
    }
    .validate()
    .unwrap();

    storage.local.save_settings(&settings).await.unwrap();
    let loaded = storage.local.get_settings().await.unwrap();
    assert_eq!(loaded, Some(settings));
}
