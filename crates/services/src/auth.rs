use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{info, warn};

use adducation_core::model::{ProfileUpdate, RegistrationDraft, User};

use crate::backend::{AuthSession, BackendClient};
use crate::error::ApiError;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuthState {
    pub user: Option<User>,
    pub token: Option<String>,
}

/// Session state for the signed-in user.
///
/// Operations report plain success; the reason for the last failure is
/// kept in [`AuthService::last_error`] for display.
pub struct AuthService {
    backend: Arc<BackendClient>,
    state: Mutex<AuthState>,
    last_error: Mutex<Option<String>>,
}

impl AuthService {
    #[must_use]
    pub fn new(backend: Arc<BackendClient>) -> Self {
        Self {
            backend,
            state: Mutex::new(AuthState::default()),
            last_error: Mutex::new(None),
        }
    }

    pub async fn login(&self, email: &str, password: &str) -> bool {
        let result = self.backend.login(email, password).await;
        self.accept(result, "login")
    }

    pub async fn register(&self, draft: &RegistrationDraft) -> bool {
        let result = self.backend.register(draft).await;
        self.accept(result, "registration")
    }

    /// Restore the session cached on this device. Both a token and a user
    /// are needed; otherwise the in-memory session is cleared.
    pub async fn check_auth(&self) -> bool {
        let token = self.backend.token().await;
        let user = self.backend.current_user().await;
        let restored = match (token, user) {
            (Ok(Some(token)), Ok(Some(user))) => AuthState {
                user: Some(user),
                token: Some(token),
            },
            (Err(err), _) | (_, Err(err)) => {
                warn!(error = %err, "could not read cached session");
                AuthState::default()
            }
            _ => AuthState::default(),
        };
        let authenticated = restored.token.is_some();
        *self.state() = restored;
        authenticated
    }

    /// Clear the session locally and in memory.
    pub async fn logout(&self) -> bool {
        *self.state() = AuthState::default();
        match self.backend.logout().await {
            Ok(()) => true,
            Err(err) => {
                self.fail("logout", &err);
                false
            }
        }
    }

    /// Update profile fields of the signed-in user.
    pub async fn update_profile(&self, update: &ProfileUpdate) -> bool {
        let user_id = self.state().user.as_ref().map(|user| user.id.clone());
        let Some(user_id) = user_id else {
            return false;
        };
        match self.backend.update_profile(&user_id, update).await {
            Ok(user) => {
                self.state().user = Some(user);
                self.clear_error();
                true
            }
            Err(err) => {
                self.fail("profile update", &err);
                false
            }
        }
    }

    #[must_use]
    pub fn current_user(&self) -> Option<User> {
        self.state().user.clone()
    }

    #[must_use]
    pub fn token(&self) -> Option<String> {
        self.state().token.clone()
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.state().token.is_some()
    }

    #[must_use]
    pub fn last_error(&self) -> Option<String> {
        self.last_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn accept(&self, result: Result<AuthSession, ApiError>, action: &str) -> bool {
        match result {
            Ok(session) => {
                info!(action, has_user = session.user.is_some(), "session started");
                *self.state() = AuthState {
                    user: session.user,
                    token: session.token,
                };
                self.clear_error();
                true
            }
            Err(err) => {
                self.fail(action, &err);
                false
            }
        }
    }

    fn fail(&self, action: &str, err: &ApiError) {
        warn!(action, error = %err, "auth operation failed");
        *self
            .last_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(err.to_string());
    }

    fn clear_error(&self) {
        *self
            .last_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = None;
    }

    fn state(&self) -> MutexGuard<'_, AuthState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
