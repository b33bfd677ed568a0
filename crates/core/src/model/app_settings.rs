use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
        }
    }

    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "light" => Some(Theme::Light),
            "dark" => Some(Theme::Dark),
            _ => None,
        }
    }

    #[must_use]
    pub fn toggled(self) -> Self {
        match self {
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Light,
        }
    }
}

/// User-level preferences kept in local storage.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct AppSettings {
    api_key: Option<String>,
    selected_model: Option<String>,
    theme: Theme,
    show_debug: bool,
}

#[derive(Clone, Debug, Default)]
pub struct AppSettingsDraft {
    pub api_key: Option<String>,
    pub selected_model: Option<String>,
    pub theme: Theme,
    pub show_debug: bool,
}

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppSettingsError {
    #[error("model id must look like provider/model")]
    InvalidModelId,
}

impl AppSettingsDraft {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and normalize the draft into persisted settings.
    ///
    /// # Errors
    ///
    /// Returns `AppSettingsError` if a model id is present but malformed.
    pub fn validate(self) -> Result<AppSettings, AppSettingsError> {
        let api_key = normalize_optional(self.api_key);
        let selected_model = normalize_optional(self.selected_model);

        if let Some(model) = selected_model.as_ref() {
            if model.contains(char::is_whitespace) {
                return Err(AppSettingsError::InvalidModelId);
            }
        }

        Ok(AppSettings {
            api_key,
            selected_model,
            theme: self.theme,
            show_debug: self.show_debug,
        })
    }
}

impl AppSettings {
    #[must_use]
    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref()
    }

    #[must_use]
    pub fn selected_model(&self) -> Option<&str> {
        self.selected_model.as_deref()
    }

    #[must_use]
    pub fn theme(&self) -> Theme {
        self.theme
    }

    #[must_use]
    pub fn show_debug(&self) -> bool {
        self.show_debug
    }

    /// Start an edit from the current values.
    #[must_use]
    pub fn to_draft(&self) -> AppSettingsDraft {
        AppSettingsDraft {
            api_key: self.api_key.clone(),
            selected_model: self.selected_model.clone(),
            theme: self.theme,
            show_debug: self.show_debug,
        }
    }
}

fn normalize_optional(value: Option<String>) -> Option<String> {
    value
        .map(|val| val.trim().to_string())
        .filter(|val| !val.is_empty())
}
