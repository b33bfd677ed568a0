use std::sync::Arc;

use adducation_core::model::{AppSettings, AppSettingsDraft, Theme};
use storage::repository::KeyValueStore;
use storage::settings::AppSettingsRepository;

use crate::error::AppSettingsServiceError;

/// Preferences stored on the device: LLM key, model choice, theme, debug panel.
#[derive(Clone)]
pub struct AppSettingsService {
    store: Arc<dyn KeyValueStore>,
}

impl AppSettingsService {
    #[must_use]
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Load persisted settings (or defaults if missing).
    ///
    /// # Errors
    ///
    /// Returns `AppSettingsServiceError` on storage failures.
    pub async fn load(&self) -> Result<AppSettings, AppSettingsServiceError> {
        let settings = self.store.get_settings().await?;
        Ok(settings.unwrap_or_default())
    }

    /// Validate and persist new settings.
    ///
    /// # Errors
    ///
    /// Returns `AppSettingsServiceError` if validation fails or persistence fails.
    pub async fn save(
        &self,
        draft: AppSettingsDraft,
    ) -> Result<AppSettings, AppSettingsServiceError> {
        let settings = draft.validate()?;
        self.store.save_settings(&settings).await?;
        Ok(settings)
    }

    /// # Errors
    ///
    /// Returns `AppSettingsServiceError` on storage failures.
    pub async fn set_theme(&self, theme: Theme) -> Result<AppSettings, AppSettingsServiceError> {
        self.edit(|draft| draft.theme = theme).await
    }

    /// Switch between light and dark.
    ///
    /// # Errors
    ///
    /// Returns `AppSettingsServiceError` on storage failures.
    pub async fn toggle_theme(&self) -> Result<AppSettings, AppSettingsServiceError> {
        self.edit(|draft| draft.theme = draft.theme.toggled()).await
    }

    /// # Errors
    ///
    /// Returns `AppSettingsServiceError` on storage failures.
    pub async fn set_show_debug(&self, show: bool) -> Result<AppSettings, AppSettingsServiceError> {
        self.edit(|draft| draft.show_debug = show).await
    }

    /// # Errors
    ///
    /// Returns `AppSettingsServiceError` on storage failures.
    pub async fn toggle_debug(&self) -> Result<AppSettings, AppSettingsServiceError> {
        self.edit(|draft| draft.show_debug = !draft.show_debug).await
    }

    /// Store the LLM provider key. An empty key clears it.
    ///
    /// # Errors
    ///
    /// Returns `AppSettingsServiceError` on storage failures.
    pub async fn set_api_key(&self, api_key: &str) -> Result<AppSettings, AppSettingsServiceError> {
        let api_key = api_key.to_string();
        self.edit(move |draft| draft.api_key = Some(api_key)).await
    }

    /// # Errors
    ///
    /// Returns `AppSettingsServiceError::Settings` for a malformed model id and
    /// `AppSettingsServiceError::Storage` on storage failures.
    pub async fn set_selected_model(
        &self,
        model_id: &str,
    ) -> Result<AppSettings, AppSettingsServiceError> {
        let model_id = model_id.to_string();
        self.edit(move |draft| draft.selected_model = Some(model_id))
            .await
    }

    async fn edit<F>(&self, change: F) -> Result<AppSettings, AppSettingsServiceError>
    where
        F: FnOnce(&mut AppSettingsDraft) + Send,
    {
        let mut draft = self.load().await?.to_draft();
        change(&mut draft);
        self.save(draft).await
    }
}
