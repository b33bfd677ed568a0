use serde::Serialize;

use crate::model::progress::UserProgress;

pub const FIRST_LOGIN: &str = "first_login";
pub const FIRST_LESSON: &str = "first_lesson";
pub const FIRST_INTERVIEW: &str = "first_interview";
pub const STREAK_7: &str = "streak_7";
pub const LEVEL_5: &str = "level_5";

/// Level at which `level_5` unlocks.
pub const LEVEL_MILESTONE: u32 = 5;
/// Streak length at which `streak_7` unlocks.
pub const STREAK_MILESTONE: u32 = 7;

/// Static catalog entry. Whether it is unlocked lives on `UserProgress`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Achievement {
    pub id: &'static str,
    pub title: &'static str,
    pub description: &'static str,
    pub icon: &'static str,
    pub xp_reward: u32,
}

const DEFAULT_ACHIEVEMENTS: [Achievement; 5] = [
    Achievement {
        id: FIRST_LOGIN,
        title: "Welcome Aboard!",
        description: "Complete your first login",
        icon: "👋",
        xp_reward: 10,
    },
    Achievement {
        id: FIRST_LESSON,
        title: "Learning Begins",
        description: "Complete your first lesson",
        icon: "📚",
        xp_reward: 25,
    },
    Achievement {
        id: FIRST_INTERVIEW,
        title: "Interview Ready",
        description: "Complete your first mock interview",
        icon: "🎤",
        xp_reward: 50,
    },
    Achievement {
        id: STREAK_7,
        title: "Week Warrior",
        description: "Maintain a 7-day learning streak",
        icon: "⚡",
        xp_reward: 75,
    },
    Achievement {
        id: LEVEL_5,
        title: "Rising Star",
        description: "Reach level 5",
        icon: "⭐",
        xp_reward: 100,
    },
];

/// Immutable set of achievements known to the app.
#[derive(Debug, Clone)]
pub struct AchievementCatalog {
    entries: Vec<Achievement>,
}

impl AchievementCatalog {
    #[must_use]
    pub fn new(entries: Vec<Achievement>) -> Self {
        Self { entries }
    }

    #[must_use]
    pub fn find(&self, id: &str) -> Option<&Achievement> {
        self.entries.iter().find(|entry| entry.id == id)
    }

    #[must_use]
    pub fn all(&self) -> &[Achievement] {
        &self.entries
    }

    /// Catalog entries unlocked on `progress`, in unlock order.
    #[must_use]
    pub fn unlocked_in(&self, progress: &UserProgress) -> Vec<Achievement> {
        progress
            .achievements
            .iter()
            .filter_map(|id| self.find(id).copied())
            .collect()
    }
}

impl Default for AchievementCatalog {
    fn default() -> Self {
        Self::new(DEFAULT_ACHIEVEMENTS.to_vec())
    }
}
