use std::env;
use std::time::Duration;

pub const DEFAULT_BACKEND_URL: &str = "http://localhost:8000";

/// Where the backend lives and which route shapes to try against it.
///
/// Paths may contain a `{user_id}` placeholder. Candidate lists are tried in
/// order until one answers with something other than 404.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BackendConfig {
    pub base_url: String,
    pub login_paths: Vec<String>,
    pub register_path: String,
    pub profile_path: String,
    pub progress_paths: Vec<String>,
    pub health_timeout: Duration,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BACKEND_URL.to_string(),
            login_paths: vec![
                "/api/auth/login".into(),
                "/auth/login".into(),
                "/login".into(),
            ],
            register_path: "/api/auth/register".into(),
            profile_path: "/api/users/{user_id}".into(),
            progress_paths: vec![
                "/api/users/{user_id}/progress".into(),
                "/users/{user_id}/progress".into(),
                "/user/{user_id}/progress".into(),
            ],
            health_timeout: Duration::from_secs(5),
        }
    }
}

impl BackendConfig {
    /// Defaults with the base URL taken from `ADDUCATION_API_BASE_URL` when set.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(base_url) = env::var("ADDUCATION_API_BASE_URL") {
            if !base_url.trim().is_empty() {
                config.base_url = base_url.trim().to_string();
            }
        }
        config
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Absolute URL for a path, with `{user_id}` substituted when given.
    #[must_use]
    pub fn url_for(&self, path: &str, user_id: Option<&str>) -> String {
        let path = match user_id {
            Some(id) => path.replace("{user_id}", id),
            None => path.to_string(),
        };
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }
}
