pub mod achievement;
mod app_settings;
mod ids;
mod interview;
mod learning;
mod progress;
mod quiz;
mod user;

pub use achievement::{Achievement, AchievementCatalog};
pub use app_settings::{AppSettings, AppSettingsDraft, AppSettingsError, Theme};
pub use ids::UserId;
pub use interview::{EvaluationRequest, InterviewEvaluation, InterviewQuestionRequest};
pub use learning::{LearningRecommendations, LearningRequest};
pub use progress::{
    FIELD_SPELLINGS, LevelProgress, ProgressError, StreakChange, UserProgress, XP_PER_LEVEL,
    level_for_xp,
};
pub use quiz::{Difficulty, QuizAttempt, QuizQuestion, QuizRequest};
pub use user::{ProfileUpdate, RegistrationDraft, User, UserCategory};
