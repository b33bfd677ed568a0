use adducation_core::model::{AppSettings, AppSettingsDraft, Theme};
use async_trait::async_trait;

use crate::repository::{KeyValueStore, StorageError, StorageKey};

/// Typed access to the preference keys of a `KeyValueStore`.
#[async_trait]
pub trait AppSettingsRepository: Send + Sync {
    /// Load settings, or `None` when nothing has been stored yet.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on read failures or invalid stored values.
    async fn get_settings(&self) -> Result<Option<AppSettings>, StorageError>;

    /// Persist every preference key. Unset optional values are removed.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on write failures.
    async fn save_settings(&self, settings: &AppSettings) -> Result<(), StorageError>;
}

#[async_trait]
impl<S> AppSettingsRepository for S
where
    S: KeyValueStore + ?Sized,
{
    async fn get_settings(&self) -> Result<Option<AppSettings>, StorageError> {
        let api_key = self.get(StorageKey::LlmApiKey).await?;
        let selected_model = self.get(StorageKey::SelectedModel).await?;
        let theme = self.get(StorageKey::Theme).await?;
        let show_debug = self.get(StorageKey::ShowDebug).await?;

        if api_key.is_none() && selected_model.is_none() && theme.is_none() && show_debug.is_none()
        {
            return Ok(None);
        }

        AppSettingsDraft {
            api_key,
            selected_model,
            theme: theme.as_deref().and_then(Theme::parse).unwrap_or_default(),
            show_debug: show_debug.as_deref().is_some_and(|raw| raw.trim() == "true"),
        }
        .validate()
        .map(Some)
        .map_err(|err| StorageError::Serialization(err.to_string()))
    }

    async fn save_settings(&self, settings: &AppSettings) -> Result<(), StorageError> {
        put_optional(self, StorageKey::LlmApiKey, settings.api_key()).await?;
        put_optional(self, StorageKey::SelectedModel, settings.selected_model()).await?;
        self.set(StorageKey::Theme, settings.theme().as_str()).await?;
        self.set(
            StorageKey::ShowDebug,
            if settings.show_debug() { "true" } else { "false" },
        )
        .await?;
        Ok(())
    }
}

async fn put_optional<S>(store: &S, key: StorageKey, value: Option<&str>) -> Result<(), StorageError>
where
    S: KeyValueStore + ?Sized,
{
    match value {
        Some(value) => store.set(key, value).await,
        None => store.remove(key).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::InMemoryRepository;

    #[tokio::test]
    async fn empty_store_has_no_settings() {
        let repo = InMemoryRepository::new();
        assert!(repo.get_settings().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn settings_round_trip_and_clear_optional_keys() {
        let repo = InMemoryRepository::new();
        let settings = AppSettingsDraft {
            api_key: Some("sk-or-1".into()),
            selected_model: Some("meta/llama-3:free".into()),
            theme: Theme::Dark,
            show_debug: true,
        }
        .validate()
        .unwrap();
        repo.save_settings(&settings).await.unwrap();
        assert_eq!(repo.get_settings().await.unwrap(), Some(settings.clone()));

        let mut draft = settings.to_draft();
        draft.api_key = None;
        repo.save_settings(&draft.validate().unwrap()).await.unwrap();
        assert_eq!(repo.get(StorageKey::LlmApiKey).await.unwrap(), None);
    }

    #[tokio::test]
    async fn unknown_theme_falls_back_to_light() {
        let repo = InMemoryRepository::new();
        repo.set(StorageKey::Theme, "sepia").await.unwrap();
        let settings = repo.get_settings().await.unwrap().unwrap();
        assert_eq!(settings.theme(), Theme::Light);
        assert!(!settings.show_debug());
    }
}
