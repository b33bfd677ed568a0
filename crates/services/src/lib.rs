#![forbid(unsafe_code)]

pub mod app_services;
pub mod app_settings_service;
pub mod auth;
pub mod backend;
pub mod error;
pub mod gamification;
pub mod http;
pub mod llm;

pub use adducation_core::Clock;

pub use app_services::AppServices;
pub use app_settings_service::AppSettingsService;
pub use auth::{AuthService, AuthState};
pub use backend::{AuthSession, BackendClient, BackendConfig, ProgressSync};
pub use error::{
    ApiError, AppServicesError, AppSettingsServiceError, LlmError, TransportError,
};
pub use gamification::{
    Dashboard, GamificationError, GamificationService, ProgressRemote, ProgressUpdate,
};
pub use http::{HttpRequest, HttpResponse, HttpTransport, ReqwestTransport, ScriptedTransport};
pub use llm::{LlmConfig, LlmGateway, ModelInfo, ParseStage, ParsedQuiz};
