use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::model::achievement::{Achievement, LEVEL_MILESTONE, STREAK_MILESTONE};
use crate::model::ids::UserId;
use crate::time::whole_days_between;

/// XP needed to advance one level.
pub const XP_PER_LEVEL: u32 = 100;

/// Canonical camelCase field names paired with the snake_case spelling some
/// backends use instead.
pub const FIELD_SPELLINGS: [(&str, &str); 11] = [
    ("userId", "user_id"),
    ("currentLevel", "current_level"),
    ("totalXp", "total_xp"),
    ("currentStreak", "current_streak"),
    ("longestStreak", "longest_streak"),
    ("lastActivityDate", "last_activity_date"),
    ("skillLevels", "skill_levels"),
    ("completedCourses", "completed_courses"),
    ("achievements", "achievements"),
    ("interviewsPracticed", "interviews_practiced"),
    ("averageInterviewScore", "average_interview_score"),
];

/// Short legacy names accepted when neither spelling above is present.
const LEGACY_SPELLINGS: [(&str, &str); 3] = [
    ("totalXp", "xp"),
    ("currentLevel", "level"),
    ("currentStreak", "streak"),
];

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ProgressError {
    #[error("progress record is not a JSON object")]
    NotAnObject,

    #[error("invalid progress record: {0}")]
    Invalid(String),
}

/// Level for a given XP total: `floor(total_xp / 100) + 1`.
#[must_use]
pub fn level_for_xp(total_xp: u32) -> u32 {
    total_xp / XP_PER_LEVEL + 1
}

/// Per-user gamification record.
///
/// `current_level` is derived from `total_xp`; every mutating method here
/// recomputes it, and `normalized` repairs records loaded from elsewhere.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserProgress {
    pub id: String,
    pub user_id: UserId,
    pub current_level: u32,
    pub total_xp: u32,
    pub current_streak: u32,
    pub longest_streak: u32,
    pub last_activity_date: DateTime<Utc>,
    pub skill_levels: BTreeMap<String, f64>,
    pub completed_courses: Vec<String>,
    pub achievements: Vec<String>,
    pub interviews_practiced: u32,
    pub average_interview_score: f64,
}

impl Default for UserProgress {
    fn default() -> Self {
        Self {
            id: String::new(),
            user_id: UserId::default(),
            current_level: 1,
            total_xp: 0,
            current_streak: 0,
            longest_streak: 0,
            last_activity_date: DateTime::<Utc>::default(),
            skill_levels: BTreeMap::new(),
            completed_courses: Vec::new(),
            achievements: Vec::new(),
            interviews_practiced: 0,
            average_interview_score: 0.0,
        }
    }
}

/// How a streak update changed the streak counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreakChange {
    /// Activity already recorded within the last day.
    Unchanged,
    /// Exactly one day since the last activity.
    Extended,
    /// More than one day since the last activity; streak restarts at 1.
    Reset,
}

/// Position within the current level, for progress bars.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelProgress {
    pub level: u32,
    pub xp_into_level: u32,
    pub xp_per_level: u32,
}

impl LevelProgress {
    #[must_use]
    pub fn xp_to_next_level(&self) -> u32 {
        self.xp_per_level - self.xp_into_level
    }
}

impl UserProgress {
    /// Zero-valued record for a user with no stored progress.
    #[must_use]
    pub fn new_default(user_id: UserId, now: DateTime<Utc>) -> Self {
        Self {
            id: format!("progress_{user_id}"),
            user_id,
            last_activity_date: now,
            ..Self::default()
        }
    }

    /// Decode a progress record that may use camelCase, snake_case or short
    /// legacy field names, or a mix of them.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError` if the value is not an object or a field has
    /// the wrong type.
    pub fn from_json_value(value: &Value) -> Result<Self, ProgressError> {
        let source = value.as_object().ok_or(ProgressError::NotAnObject)?;
        let mut canonical: Map<String, Value> = source
            .iter()
            .filter(|(_, v)| !v.is_null())
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        for (camel, alternate) in FIELD_SPELLINGS.iter().chain(LEGACY_SPELLINGS.iter()) {
            if canonical.contains_key(*camel) {
                continue;
            }
            if let Some(found) = canonical.get(*alternate).cloned() {
                canonical.insert((*camel).to_string(), found);
            }
        }

        let progress: Self = serde_json::from_value(Value::Object(canonical))
            .map_err(|err| ProgressError::Invalid(err.to_string()))?;
        Ok(progress.normalized())
    }

    /// Attach the record to `user_id`. Backends do not always echo the owner
    /// back, and an empty record id is filled the same way as a fresh one.
    #[must_use]
    pub fn owned_by(mut self, user_id: &UserId) -> Self {
        if self.id.trim().is_empty() {
            self.id = format!("progress_{user_id}");
        }
        self.user_id = user_id.clone();
        self
    }

    /// Repair derived fields: level from XP, longest streak high-water mark,
    /// duplicate achievement ids.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        self.current_level = level_for_xp(self.total_xp);
        self.longest_streak = self.longest_streak.max(self.current_streak);
        let mut seen = Vec::with_capacity(self.achievements.len());
        self.achievements.retain(|id| {
            if seen.contains(id) {
                false
            } else {
                seen.push(id.clone());
                true
            }
        });
        self
    }

    /// Add XP, recompute the level and stamp the activity time.
    ///
    /// Returns true when the level went up.
    pub fn award_xp(&mut self, amount: u32, at: DateTime<Utc>) -> bool {
        let previous_level = self.current_level;
        self.total_xp = self.total_xp.saturating_add(amount);
        self.current_level = level_for_xp(self.total_xp);
        self.last_activity_date = at;
        self.current_level > previous_level
    }

    /// Count `at` as an activity day and update the streak counters.
    pub fn apply_activity_day(&mut self, at: DateTime<Utc>) -> StreakChange {
        let change = match whole_days_between(self.last_activity_date, at) {
            0 => StreakChange::Unchanged,
            1 => {
                self.current_streak = self.current_streak.saturating_add(1);
                StreakChange::Extended
            }
            _ => {
                self.current_streak = 1;
                StreakChange::Reset
            }
        };
        self.longest_streak = self.longest_streak.max(self.current_streak);
        self.last_activity_date = at;
        change
    }

    /// Unlock an achievement and grant its reward.
    ///
    /// Returns false when it was already unlocked. The level is recomputed so
    /// the level invariant holds after reward XP as well.
    pub fn unlock(&mut self, achievement: &Achievement) -> bool {
        if self.has_achievement(achievement.id) {
            return false;
        }
        self.achievements.push(achievement.id.to_string());
        self.total_xp = self.total_xp.saturating_add(achievement.xp_reward);
        self.current_level = level_for_xp(self.total_xp);
        true
    }

    /// Fold a mock-interview score into the running average.
    pub fn record_interview(&mut self, score: u8) {
        let previous = f64::from(self.interviews_practiced);
        self.interviews_practiced = self.interviews_practiced.saturating_add(1);
        let count = f64::from(self.interviews_practiced);
        self.average_interview_score =
            (self.average_interview_score * previous + f64::from(score)) / count;
    }

    /// Mark a course or lesson as completed. Returns false if already listed.
    pub fn complete_course(&mut self, course_id: &str) -> bool {
        if self.completed_courses.iter().any(|id| id == course_id) {
            return false;
        }
        self.completed_courses.push(course_id.to_string());
        true
    }

    #[must_use]
    pub fn has_achievement(&self, id: &str) -> bool {
        self.achievements.iter().any(|unlocked| unlocked == id)
    }

    #[must_use]
    pub fn reached_level_milestone(&self) -> bool {
        self.current_level >= LEVEL_MILESTONE
    }

    #[must_use]
    pub fn reached_streak_milestone(&self) -> bool {
        self.current_streak >= STREAK_MILESTONE
    }

    #[must_use]
    pub fn level_progress(&self) -> LevelProgress {
        LevelProgress {
            level: self.current_level,
            xp_into_level: self.total_xp % XP_PER_LEVEL,
            xp_per_level: XP_PER_LEVEL,
        }
    }

    #[must_use]
    pub fn days_since_activity(&self, now: DateTime<Utc>) -> i64 {
        whole_days_between(self.last_activity_date, now)
    }

    /// True once a full day has passed without activity.
    #[must_use]
    pub fn streak_at_risk(&self, now: DateTime<Utc>) -> bool {
        self.days_since_activity(now) > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::achievement::{AchievementCatalog, LEVEL_5};
    use crate::time::fixed_now;
    use chrono::Duration;
    use serde_json::json;

    fn progress() -> UserProgress {
        UserProgress::new_default(UserId::new("u1"), fixed_now())
    }

    #[test]
    fn level_is_floor_of_hundreds_plus_one() {
        assert_eq!(level_for_xp(0), 1);
        assert_eq!(level_for_xp(99), 1);
        assert_eq!(level_for_xp(100), 2);
        assert_eq!(level_for_xp(250), 3);
    }

    #[test]
    fn award_xp_crosses_level_boundary() {
        let mut p = progress();
        p.award_xp(90, fixed_now());
        assert_eq!(p.current_level, 1);

        let later = fixed_now() + Duration::hours(2);
        let leveled = p.award_xp(25, later);
        assert!(leveled);
        assert_eq!(p.total_xp, 115);
        assert_eq!(p.current_level, 2);
        assert_eq!(p.last_activity_date, later);
    }

    #[test]
    fn streak_rules_follow_day_delta() {
        let start = fixed_now();

        let mut p = progress();
        p.current_streak = 4;
        p.longest_streak = 4;
        assert_eq!(
            p.apply_activity_day(start + Duration::hours(5)),
            StreakChange::Unchanged
        );
        assert_eq!(p.current_streak, 4);

        let mut p = progress();
        p.current_streak = 4;
        p.longest_streak = 4;
        assert_eq!(
            p.apply_activity_day(start + Duration::days(1)),
            StreakChange::Extended
        );
        assert_eq!(p.current_streak, 5);
        assert_eq!(p.longest_streak, 5);

        let mut p = progress();
        p.current_streak = 4;
        p.longest_streak = 6;
        assert_eq!(
            p.apply_activity_day(start + Duration::days(3)),
            StreakChange::Reset
        );
        assert_eq!(p.current_streak, 1);
        assert_eq!(p.longest_streak, 6);
    }

    #[test]
    fn unlock_is_idempotent_and_keeps_level_in_sync() {
        let catalog = AchievementCatalog::default();
        let level_5 = catalog.find(LEVEL_5).unwrap();
        let mut p = progress();
        p.award_xp(50, fixed_now());

        assert!(p.unlock(level_5));
        assert!(!p.unlock(level_5));
        assert_eq!(p.total_xp, 150);
        assert_eq!(p.current_level, 2);
        assert_eq!(p.achievements.iter().filter(|id| *id == LEVEL_5).count(), 1);
    }

    #[test]
    fn interview_average_is_running_mean() {
        let mut p = progress();
        p.record_interview(6);
        p.record_interview(8);
        assert_eq!(p.interviews_practiced, 2);
        assert!((p.average_interview_score - 7.0).abs() < f64::EPSILON);
    }

    #[test]
    fn level_progress_and_risk() {
        let mut p = progress();
        p.award_xp(230, fixed_now());
        let level = p.level_progress();
        assert_eq!(level.level, 3);
        assert_eq!(level.xp_into_level, 30);
        assert_eq!(level.xp_to_next_level(), 70);

        assert!(!p.streak_at_risk(fixed_now() + Duration::hours(12)));
        assert!(p.streak_at_risk(fixed_now() + Duration::days(1)));
    }

    #[test]
    fn decodes_mixed_spellings_and_repairs_level() {
        let value = json!({
            "id": "progress_9",
            "user_id": 9,
            "userId": "9",
            "total_xp": 250,
            "level": 1,
            "current_streak": 3,
            "longestStreak": 2,
            "lastActivityDate": "2024-05-01T10:00:00Z",
            "achievements": ["first_login", "first_login"],
            "skill_levels": {"rust": 3},
            "averageInterviewScore": null
        });

        let p = UserProgress::from_json_value(&value).unwrap();
        assert_eq!(p.user_id.as_str(), "9");
        assert_eq!(p.total_xp, 250);
        assert_eq!(p.current_level, 3);
        assert_eq!(p.current_streak, 3);
        assert_eq!(p.longest_streak, 3);
        assert_eq!(p.achievements, vec!["first_login".to_string()]);
        assert_eq!(p.skill_levels.get("rust").copied(), Some(3.0));
    }

    #[test]
    fn owner_is_stamped_on_anonymous_records() {
        let anonymous = UserProgress::from_json_value(&json!({"xp": 250, "level": 3})).unwrap();
        assert!(anonymous.user_id.is_empty());

        let owned = anonymous.owned_by(&UserId::new("u7"));
        assert_eq!(owned.user_id.as_str(), "u7");
        assert_eq!(owned.id, "progress_u7");
        assert_eq!(owned.total_xp, 250);

        let keeps_id = progress().owned_by(&UserId::new("u8"));
        assert_eq!(keeps_id.id, "progress_u1");
        assert_eq!(keeps_id.user_id.as_str(), "u8");
    }

    #[test]
    fn rejects_non_object_records() {
        assert_eq!(
            UserProgress::from_json_value(&json!([1, 2])),
            Err(ProgressError::NotAnObject)
        );
    }
}
