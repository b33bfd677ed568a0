use std::sync::Arc;

use tracing::{info, warn};

use storage::repository::Storage;

use crate::Clock;
use crate::app_settings_service::AppSettingsService;
use crate::auth::AuthService;
use crate::backend::{BackendClient, BackendConfig};
use crate::error::AppServicesError;
use crate::gamification::{GamificationService, ProgressRemote};
use crate::http::{HttpTransport, ReqwestTransport};
use crate::llm::{LlmConfig, LlmGateway};

/// Assembles app-facing services over one local store and one transport.
#[derive(Clone)]
pub struct AppServices {
    backend: Arc<BackendClient>,
    auth: Arc<AuthService>,
    gamification: Arc<GamificationService>,
    llm: Arc<LlmGateway>,
    app_settings: Arc<AppSettingsService>,
}

impl AppServices {
    /// Wire services over `storage`, probe the backend and restore any
    /// session and progress cached on this device.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if a stale progress cache cannot be cleared.
    pub async fn new(
        storage: Storage,
        backend_config: BackendConfig,
        llm_config: LlmConfig,
        clock: Clock,
        transport: Arc<dyn HttpTransport>,
    ) -> Result<Self, AppServicesError> {
        let backend = Arc::new(BackendClient::new(
            backend_config,
            Arc::clone(&transport),
            Arc::clone(&storage.local),
        ));
        let app_settings = Arc::new(AppSettingsService::new(Arc::clone(&storage.local)));
        let llm = Arc::new(LlmGateway::new(
            llm_config,
            transport,
            AppSettingsService::clone(&app_settings),
        ));
        let auth = Arc::new(AuthService::new(Arc::clone(&backend)));
        let remote: Arc<dyn ProgressRemote> = backend.clone();
        let gamification = Arc::new(GamificationService::new(
            clock,
            Arc::clone(&storage.local),
            remote,
        ));

        let available = backend.check_connection().await;
        if !available {
            warn!(
                base_url = %backend.config().base_url,
                "backend unreachable; working from local data"
            );
        }

        let signed_in = auth.check_auth().await;
        if let Err(err) = gamification.restore_cached().await {
            warn!(error = %err, "could not restore cached progress");
        }
        // Only keep cached progress that belongs to the cached user.
        if let (Some(user), Some(progress)) = (auth.current_user(), gamification.snapshot()) {
            if user.id != progress.user_id {
                gamification.clear().await?;
            }
        }
        info!(available, signed_in, "app services ready");

        Ok(Self {
            backend,
            auth,
            gamification,
            llm,
            app_settings,
        })
    }

    /// Build services backed by `SQLite` storage and the `reqwest` transport.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if storage initialization fails.
    pub async fn new_sqlite(
        db_url: &str,
        backend_config: BackendConfig,
        llm_config: LlmConfig,
        clock: Clock,
    ) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(db_url).await?;
        let transport: Arc<dyn HttpTransport> = Arc::new(ReqwestTransport::new());
        Self::new(storage, backend_config, llm_config, clock, transport).await
    }

    /// Sign out and drop the signed-in user's progress from memory and from
    /// this device. Returns whether the cached session was cleared.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if the progress cache cannot be removed.
    pub async fn logout(&self) -> Result<bool, AppServicesError> {
        let signed_out = self.auth.logout().await;
        self.gamification.clear().await?;
        info!(signed_out, "signed out");
        Ok(signed_out)
    }

    #[must_use]
    pub fn backend(&self) -> Arc<BackendClient> {
        Arc::clone(&self.backend)
    }

    #[must_use]
    pub fn auth(&self) -> Arc<AuthService> {
        Arc::clone(&self.auth)
    }

    #[must_use]
    pub fn gamification(&self) -> Arc<GamificationService> {
        Arc::clone(&self.gamification)
    }

    #[must_use]
    pub fn llm(&self) -> Arc<LlmGateway> {
        Arc::clone(&self.llm)
    }

    #[must_use]
    pub fn app_settings(&self) -> Arc<AppSettingsService> {
        Arc::clone(&self.app_settings)
    }
}
