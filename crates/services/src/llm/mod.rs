//! Chat-completion gateway for quiz, interview and learning content.

mod config;
mod gateway;
pub mod parser;

pub use config::{APP_TITLE, DEFAULT_LLM_BASE_URL, DEFAULT_MODEL, DEFAULT_REFERER, LlmConfig};
pub use gateway::{LlmGateway, ModelInfo};
pub use parser::{ParseStage, ParsedQuiz, parse_quiz_questions};
