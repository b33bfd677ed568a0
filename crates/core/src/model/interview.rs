use serde::{Deserialize, Deserializer, Serialize};

use crate::model::quiz::Difficulty;

/// Score assumed when the model's evaluation cannot be parsed.
pub const FALLBACK_SCORE: u8 = 7;

/// Minimum XP granted for an evaluated interview answer.
pub const MIN_INTERVIEW_XP: u32 = 25;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterviewQuestionRequest {
    pub job_role: String,
    pub difficulty: Difficulty,
    pub skills: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvaluationRequest {
    pub question: String,
    pub response: String,
    pub job_role: String,
    /// Model to grade with; `None` uses the currently selected model.
    pub model_id: Option<String>,
}

/// Structured feedback on a mock-interview answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterviewEvaluation {
    #[serde(deserialize_with = "score_1_to_10")]
    pub score: u8,
    #[serde(default)]
    pub strengths: Vec<String>,
    #[serde(default)]
    pub improvements: Vec<String>,
    #[serde(default, alias = "overallFeedback", alias = "feedback")]
    pub overall_feedback: String,
}

impl InterviewEvaluation {
    /// Neutral evaluation carrying the raw model output as feedback.
    #[must_use]
    pub fn fallback(raw: &str) -> Self {
        Self {
            score: FALLBACK_SCORE,
            strengths: vec!["Response provided".to_string()],
            improvements: vec!["Could be more detailed".to_string()],
            overall_feedback: raw.trim().to_string(),
        }
    }

    /// XP for this evaluation: ten per score point, never below 25.
    #[must_use]
    pub fn xp_reward(&self) -> u32 {
        (u32::from(self.score) * 10).max(MIN_INTERVIEW_XP)
    }
}

/// Accepts integers, floats or numeric strings and clamps into 1..=10.
fn score_1_to_10<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u8, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(f64),
        Text(String),
    }

    let value = match Raw::deserialize(deserializer)? {
        Raw::Number(n) => n,
        Raw::Text(s) => s
            .trim()
            .split('/')
            .next()
            .unwrap_or_default()
            .trim()
            .parse::<f64>()
            .map_err(serde::de::Error::custom)?,
    };
    if !value.is_finite() {
        return Err(serde::de::Error::custom("score is not a number"));
    }
    // Clamped into 1..=10 first, so the cast cannot truncate.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let score = value.round().clamp(1.0, 10.0) as u8;
    Ok(score)
}
