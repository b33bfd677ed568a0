use std::env;

pub const DEFAULT_LLM_BASE_URL: &str = "https://openrouter.ai/api/v1";
pub const DEFAULT_MODEL: &str = "anthropic/claude-3-sonnet-20240229";
pub const DEFAULT_REFERER: &str = "https://adducation.com";
pub const APP_TITLE: &str = "Adducation Learning Platform";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LlmConfig {
    pub base_url: String,
    /// Key used when none has been stored on the device.
    pub default_api_key: Option<String>,
    pub default_model: String,
    pub referer: String,
    pub title: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_LLM_BASE_URL.to_string(),
            default_api_key: None,
            default_model: DEFAULT_MODEL.to_string(),
            referer: DEFAULT_REFERER.to_string(),
            title: APP_TITLE.to_string(),
        }
    }
}

impl LlmConfig {
    /// Build from the environment, preferring a key baked in at compile time.
    #[must_use]
    pub fn from_env() -> Self {
        let base_url =
            env::var("OPENROUTER_BASE_URL").unwrap_or_else(|_| DEFAULT_LLM_BASE_URL.into());
        let default_api_key = option_env!("OPENROUTER_API_KEY")
            .map(str::to_string)
            .or_else(|| env::var("OPENROUTER_API_KEY").ok())
            .filter(|key| !key.trim().is_empty());
        let referer =
            env::var("ADDUCATION_APP_REFERER").unwrap_or_else(|_| DEFAULT_REFERER.into());

        Self {
            base_url,
            default_api_key,
            referer,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    #[must_use]
    pub fn with_default_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.default_api_key = Some(api_key.into());
        self
    }

    pub(crate) fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }
}
