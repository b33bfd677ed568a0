use serde::{Deserialize, Serialize};

const GENERIC_RECOMMENDATIONS: [&str; 5] = [
    "Focus on building practical projects",
    "Join relevant online communities",
    "Practice coding challenges daily",
    "Read industry blogs and documentation",
    "Attend virtual meetups and webinars",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LearningRequest {
    pub topic: String,
    pub user_level: String,
    pub skills: Vec<String>,
    pub goal: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LearningRecommendations {
    pub recommendations: Vec<String>,
}

impl LearningRecommendations {
    /// Generic advice used when the model output cannot be read.
    #[must_use]
    pub fn fallback() -> Self {
        Self {
            recommendations: GENERIC_RECOMMENDATIONS
                .iter()
                .map(|s| (*s).to_string())
                .collect(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.recommendations.is_empty()
    }
}
