use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use adducation_core::model::{ProfileUpdate, RegistrationDraft, User, UserId, UserProgress};
use storage::repository::{KeyValueStore, StorageKey};

use crate::backend::config::BackendConfig;
use crate::backend::payload::progress_sync_payload;
use crate::backend::probe::EndpointProbe;
use crate::error::ApiError;
use crate::gamification::ProgressRemote;
use crate::http::{HttpRequest, HttpResponse, HttpTransport, StatusCode};

/// Token and user returned by a successful login or registration.
///
/// Either part may be missing when the backend signals success without it.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthSession {
    pub token: Option<String>,
    pub user: Option<User>,
}

/// Outcome of pushing progress to the backend.
///
/// Failures are reported as `Partial` instead of an error so the caller's
/// gamification flow keeps going.
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressSync {
    Saved(Value),
    Partial { message: String },
}

impl ProgressSync {
    fn partial(message: impl Into<String>) -> Self {
        Self::Partial {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn is_saved(&self) -> bool {
        matches!(self, ProgressSync::Saved(_))
    }
}

/// Result of walking a candidate list.
enum ProbeOutcome {
    /// A candidate answered with something other than 404.
    Answered { url: String, response: HttpResponse },
    /// Every reachable candidate answered 404; holds the last such response.
    AllNotFound(HttpResponse),
    /// No candidate produced a response at all.
    Unreachable,
}

/// Client for the app backend: auth, profile and progress persistence.
pub struct BackendClient {
    config: BackendConfig,
    transport: Arc<dyn HttpTransport>,
    store: Arc<dyn KeyValueStore>,
    login_probe: EndpointProbe,
    progress_probe: EndpointProbe,
    available: AtomicBool,
}

impl BackendClient {
    #[must_use]
    pub fn new(
        config: BackendConfig,
        transport: Arc<dyn HttpTransport>,
        store: Arc<dyn KeyValueStore>,
    ) -> Self {
        let login_probe = EndpointProbe::new(config.login_paths.clone());
        let progress_probe = EndpointProbe::new(config.progress_paths.clone());
        Self {
            config,
            transport,
            store,
            login_probe,
            progress_probe,
            available: AtomicBool::new(true),
        }
    }

    #[must_use]
    pub fn config(&self) -> &BackendConfig {
        &self.config
    }

    /// Probe the backend root with a bounded timeout and cache the result.
    pub async fn check_connection(&self) -> bool {
        let request = HttpRequest::get(self.config.base_url.clone()).timeout(self.config.health_timeout);
        let available = match self.transport.send(request).await {
            Ok(response) => response.is_success(),
            Err(err) => {
                warn!(base_url = %self.config.base_url, error = %err, "backend connection check failed");
                false
            }
        };
        self.available.store(available, Ordering::Relaxed);
        info!(base_url = %self.config.base_url, available, "backend availability checked");
        available
    }

    #[must_use]
    pub fn is_available(&self) -> bool {
        self.available.load(Ordering::Relaxed)
    }

    fn ensure_available(&self) -> Result<(), ApiError> {
        if self.is_available() {
            Ok(())
        } else {
            Err(ApiError::BackendUnavailable {
                base_url: self.config.base_url.clone(),
            })
        }
    }

    /// Sign in, trying each login route until one exists.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Rejected` with the server message for bad
    /// credentials, and connectivity or decoding errors otherwise.
    pub async fn login(&self, email: &str, password: &str) -> Result<AuthSession, ApiError> {
        self.ensure_available()?;
        debug!(email, "login attempt");

        let body = json!({ "email": email, "password": password });
        let outcome = self
            .probe(&self.login_probe, None, |url| HttpRequest::post(url).json(body.clone()))
            .await;

        match outcome {
            ProbeOutcome::Answered { response, .. } | ProbeOutcome::AllNotFound(response) => {
                self.accept_auth(&response, "Invalid credentials").await
            }
            ProbeOutcome::Unreachable => Err(ApiError::NoEndpoint),
        }
    }

    /// Create an account and sign in with it.
    ///
    /// # Errors
    ///
    /// Same as [`BackendClient::login`].
    pub async fn register(&self, draft: &RegistrationDraft) -> Result<AuthSession, ApiError> {
        self.ensure_available()?;
        let url = self.config.url_for(&self.config.register_path, None);
        let body = serde_json::to_value(draft)
            .map_err(|err| ApiError::InvalidResponse(err.to_string()))?;

        let response = self.transport.send(HttpRequest::post(url).json(body)).await?;
        self.accept_auth(&response, "Registration failed").await
    }

    /// Write profile fields and refresh the cached user.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::MissingToken` when not signed in, and
    /// `ApiError::Rejected` when the backend refuses the update.
    pub async fn update_profile(
        &self,
        user_id: &UserId,
        update: &ProfileUpdate,
    ) -> Result<User, ApiError> {
        let token = self.token().await?.ok_or(ApiError::MissingToken)?;
        self.ensure_available()?;

        let url = self
            .config
            .url_for(&self.config.profile_path, Some(user_id.as_str()));
        let body = serde_json::to_value(update)
            .map_err(|err| ApiError::InvalidResponse(err.to_string()))?;
        let response = self
            .transport
            .send(HttpRequest::put(url).bearer(token).json(body))
            .await?;

        if !response.is_success() {
            return Err(rejection(&response, "Failed to update profile"));
        }

        let value = response
            .json()
            .map_err(|err| ApiError::InvalidResponse(err.to_string()))?;
        let user_value = value.get("user").cloned().unwrap_or(value);
        let user: User = serde_json::from_value(user_value)
            .map_err(|err| ApiError::InvalidResponse(err.to_string()))?;

        self.cache_user(&user).await?;
        Ok(user)
    }

    /// Fetch stored progress. `Ok(None)` means the backend has none.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` when not signed in, when no route answers, or when
    /// the answer is an error or cannot be decoded.
    pub async fn get_user_progress(
        &self,
        user_id: &UserId,
    ) -> Result<Option<UserProgress>, ApiError> {
        let token = self.token().await?.ok_or(ApiError::MissingToken)?;
        self.ensure_available()?;

        let outcome = self
            .probe(&self.progress_probe, Some(user_id), |url| {
                HttpRequest::get(url).bearer(token.clone())
            })
            .await;

        let response = match outcome {
            ProbeOutcome::Answered { response, .. } => response,
            ProbeOutcome::AllNotFound(_) => return Ok(None),
            ProbeOutcome::Unreachable => return Err(ApiError::NoEndpoint),
        };
        if !response.is_success() {
            return Err(rejection(&response, "Failed to get user progress"));
        }
        if response.body.trim().is_empty() {
            return Ok(None);
        }

        let value = response
            .json()
            .map_err(|err| ApiError::InvalidResponse(err.to_string()))?;
        let record = unwrap_progress_envelope(&value);
        if record.is_null() {
            return Ok(None);
        }
        Ok(Some(UserProgress::from_json_value(record)?.owned_by(user_id)))
    }

    /// Push progress, tolerating unknown route and field-naming conventions.
    ///
    /// A 400 on PUT is retried once as POST against the same URL.
    pub async fn update_user_progress(
        &self,
        user_id: &UserId,
        progress: &UserProgress,
    ) -> ProgressSync {
        let token = match self.token().await {
            Ok(Some(token)) => token,
            Ok(None) => return ProgressSync::partial("Not signed in; progress kept locally"),
            Err(err) => return ProgressSync::partial(err.to_string()),
        };
        if !self.is_available() {
            return ProgressSync::partial("Backend unavailable; progress kept locally");
        }

        let payload = progress_sync_payload(user_id, progress);
        let outcome = self
            .probe(&self.progress_probe, Some(user_id), |url| {
                HttpRequest::put(url).bearer(token.clone()).json(payload.clone())
            })
            .await;

        let mut response = match outcome {
            ProbeOutcome::Answered { url, response } if response.status == StatusCode::BAD_REQUEST => {
                debug!(url = %url, "progress PUT rejected, retrying as POST");
                let retry = HttpRequest::post(url).bearer(token).json(payload);
                match self.transport.send(retry).await {
                    Ok(response) => response,
                    Err(err) => {
                        warn!(error = %err, "progress POST retry failed");
                        return ProgressSync::partial("Progress update failed but continuing");
                    }
                }
            }
            ProbeOutcome::Answered { response, .. } | ProbeOutcome::AllNotFound(response) => response,
            ProbeOutcome::Unreachable => {
                warn!("no progress endpoint reachable");
                return ProgressSync::partial("Progress update failed but continuing");
            }
        };

        if !response.is_success() {
            warn!(status = %response.status, body = %response.body, "progress update failed but continuing");
            return ProgressSync::partial("Progress update failed but continuing");
        }

        let body = std::mem::take(&mut response.body);
        match serde_json::from_str(&body) {
            Ok(saved) => ProgressSync::Saved(saved),
            Err(err) => {
                debug!(error = %err, "progress saved; response body is not JSON");
                ProgressSync::Saved(Value::Null)
            }
        }
    }

    /// Drop the cached session. No network call is made.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Storage` if local storage cannot be written.
    pub async fn logout(&self) -> Result<(), ApiError> {
        self.store.remove(StorageKey::AuthToken).await?;
        self.store.remove(StorageKey::CurrentUser).await?;
        Ok(())
    }

    /// Cached bearer token.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Storage` on local storage failures.
    pub async fn token(&self) -> Result<Option<String>, ApiError> {
        Ok(self
            .store
            .get(StorageKey::AuthToken)
            .await?
            .filter(|token| !token.trim().is_empty()))
    }

    /// Cached user record. An unreadable cache entry counts as absent.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Storage` on local storage failures.
    pub async fn current_user(&self) -> Result<Option<User>, ApiError> {
        let Some(raw) = self.store.get(StorageKey::CurrentUser).await? else {
            return Ok(None);
        };
        match serde_json::from_str(&raw) {
            Ok(user) => Ok(Some(user)),
            Err(err) => {
                warn!(error = %err, "ignoring unreadable cached user");
                Ok(None)
            }
        }
    }

    async fn probe<F>(
        &self,
        probe: &EndpointProbe,
        user_id: Option<&UserId>,
        build: F,
    ) -> ProbeOutcome
    where
        F: Fn(String) -> HttpRequest + Send + Sync,
    {
        let mut last_not_found = None;
        for idx in probe.order() {
            let url = self
                .config
                .url_for(probe.template(idx), user_id.map(UserId::as_str));
            debug!(url = %url, "trying endpoint");

            match self.transport.send(build(url.clone())).await {
                Ok(response) if response.is_not_found() => {
                    probe.forget(idx);
                    last_not_found = Some(response);
                }
                Ok(response) => {
                    debug!(url = %url, status = %response.status, "endpoint answered");
                    let template = probe.template(idx);
                    if probe.resolved_template() != Some(template) {
                        info!(route = template, "endpoint route resolved");
                    }
                    probe.remember(idx);
                    return ProbeOutcome::Answered { url, response };
                }
                Err(err) => {
                    warn!(url = %url, error = %err, "endpoint request failed");
                }
            }
        }

        match last_not_found {
            Some(response) => ProbeOutcome::AllNotFound(response),
            None => ProbeOutcome::Unreachable,
        }
    }

    async fn accept_auth(
        &self,
        response: &HttpResponse,
        default_message: &str,
    ) -> Result<AuthSession, ApiError> {
        let body = match response.json() {
            Ok(body) => body,
            Err(err) if response.is_success() => {
                return Err(ApiError::InvalidResponse(err.to_string()));
            }
            Err(_) => Value::Null,
        };

        let flagged = body.get("success").and_then(Value::as_bool) == Some(true);
        let token = ["accessToken", "token"]
            .iter()
            .find_map(|key| body.get(*key).and_then(Value::as_str))
            .filter(|token| !token.is_empty())
            .map(str::to_string);

        if !response.is_success() || !(flagged || token.is_some()) {
            return Err(rejection_from_body(response.status, &body, default_message));
        }

        let user = match body.get("user") {
            Some(value) if !value.is_null() => match serde_json::from_value::<User>(value.clone()) {
                Ok(user) => Some(user),
                Err(err) => {
                    warn!(error = %err, "auth response carried an unreadable user");
                    None
                }
            },
            _ => None,
        };

        if let Some(token) = &token {
            self.store.set(StorageKey::AuthToken, token).await?;
        }
        if let Some(user) = &user {
            self.cache_user(user).await?;
        }
        info!(has_token = token.is_some(), has_user = user.is_some(), "signed in");

        Ok(AuthSession { token, user })
    }

    async fn cache_user(&self, user: &User) -> Result<(), ApiError> {
        let raw =
            serde_json::to_string(user).map_err(|err| ApiError::InvalidResponse(err.to_string()))?;
        self.store.set(StorageKey::CurrentUser, &raw).await?;
        Ok(())
    }
}

#[async_trait]
impl ProgressRemote for BackendClient {
    async fn fetch_progress(&self, user_id: &UserId) -> Result<Option<UserProgress>, ApiError> {
        self.get_user_progress(user_id).await
    }

    async fn push_progress(&self, user_id: &UserId, progress: &UserProgress) -> ProgressSync {
        self.update_user_progress(user_id, progress).await
    }
}

fn rejection(response: &HttpResponse, default_message: &str) -> ApiError {
    let body = response.json().unwrap_or(Value::Null);
    rejection_from_body(response.status, &body, default_message)
}

fn rejection_from_body(status: StatusCode, body: &Value, default_message: &str) -> ApiError {
    let message = body
        .get("message")
        .and_then(Value::as_str)
        .filter(|message| !message.trim().is_empty())
        .unwrap_or(default_message)
        .to_string();
    ApiError::Rejected { status, message }
}

/// Progress may arrive bare or wrapped in `data` / `progress`. A null
/// envelope means the backend holds no record.
fn unwrap_progress_envelope(value: &Value) -> &Value {
    let envelopes = ["data", "progress"].map(|key| value.get(key));
    if let Some(record) = envelopes.into_iter().flatten().find(|inner| inner.is_object()) {
        return record;
    }
    if let Some(empty) = envelopes.into_iter().flatten().find(|inner| inner.is_null()) {
        return empty;
    }
    value
}
