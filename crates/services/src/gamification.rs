//! XP, levels, streaks and achievements for the signed-in user.
//!
//! Every mutation updates the in-memory record, writes it to local storage
//! and then pushes it to the backend. The push is best effort: a failure is
//! logged and the local record stays authoritative, last write wins.

use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use adducation_core::Clock;
use adducation_core::model::achievement::{FIRST_INTERVIEW, FIRST_LESSON, LEVEL_5, STREAK_7};
use adducation_core::model::{
    Achievement, AchievementCatalog, InterviewEvaluation, LevelProgress, StreakChange, UserId,
    UserProgress,
};
use storage::repository::{KeyValueStore, StorageError, StorageKey};

use crate::backend::ProgressSync;
use crate::error::ApiError;

/// Remote home of the progress record.
#[async_trait]
pub trait ProgressRemote: Send + Sync {
    /// Stored progress, or `None` when the backend has none for this user.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` when the backend cannot be asked or answers badly.
    async fn fetch_progress(&self, user_id: &UserId) -> Result<Option<UserProgress>, ApiError>;

    /// Overwrite the stored record. Never fails; see [`ProgressSync`].
    async fn push_progress(&self, user_id: &UserId, progress: &UserProgress) -> ProgressSync;
}

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum GamificationError {
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Result of a mutation that changed the record.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressUpdate {
    pub progress: UserProgress,
    pub leveled_up: bool,
    /// Achievements unlocked by this call, including milestone side effects.
    pub unlocked: Vec<&'static str>,
    pub sync: ProgressSync,
}

/// Read model for a progress overview.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Dashboard {
    pub total_xp: u32,
    pub level: LevelProgress,
    pub current_streak: u32,
    pub longest_streak: u32,
    pub streak_at_risk: bool,
    pub interviews_practiced: u32,
    pub average_interview_score: f64,
    pub completed_courses: usize,
    pub achievements: Vec<Achievement>,
}

pub struct GamificationService {
    clock: Clock,
    catalog: AchievementCatalog,
    store: Arc<dyn KeyValueStore>,
    remote: Arc<dyn ProgressRemote>,
    state: Mutex<Option<UserProgress>>,
}

impl GamificationService {
    #[must_use]
    pub fn new(
        clock: Clock,
        store: Arc<dyn KeyValueStore>,
        remote: Arc<dyn ProgressRemote>,
    ) -> Self {
        Self::with_catalog(clock, AchievementCatalog::default(), store, remote)
    }

    #[must_use]
    pub fn with_catalog(
        clock: Clock,
        catalog: AchievementCatalog,
        store: Arc<dyn KeyValueStore>,
        remote: Arc<dyn ProgressRemote>,
    ) -> Self {
        Self {
            clock,
            catalog,
            store,
            remote,
            state: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn catalog(&self) -> &AchievementCatalog {
        &self.catalog
    }

    /// Current record, if one is loaded.
    #[must_use]
    pub fn snapshot(&self) -> Option<UserProgress> {
        self.lock().clone()
    }

    /// Rehydrate the record cached on this device. An unreadable cache is
    /// ignored.
    ///
    /// # Errors
    ///
    /// Returns `GamificationError::Storage` if local storage cannot be read.
    pub async fn restore_cached(&self) -> Result<Option<UserProgress>, GamificationError> {
        let Some(raw) = self.store.get(StorageKey::GamificationProgress).await? else {
            return Ok(None);
        };
        let decoded = serde_json::from_str::<serde_json::Value>(&raw)
            .map_err(|err| err.to_string())
            .and_then(|value| UserProgress::from_json_value(&value).map_err(|err| err.to_string()));
        match decoded {
            Ok(progress) => {
                *self.lock() = Some(progress.clone());
                debug!(user_id = %progress.user_id, "restored cached progress");
                Ok(Some(progress))
            }
            Err(err) => {
                warn!(error = %err, "ignoring unreadable cached progress");
                Ok(None)
            }
        }
    }

    /// Fetch the user's record from the backend, creating a fresh one when
    /// the backend has none. A failed fetch leaves no record loaded and
    /// drops the local cache, so nothing is applied to a previous user's
    /// record.
    ///
    /// # Errors
    ///
    /// Returns `GamificationError` when the backend fetch or the local write fails.
    pub async fn load_user_progress(
        &self,
        user_id: &UserId,
    ) -> Result<UserProgress, GamificationError> {
        let fetched = match self.remote.fetch_progress(user_id).await {
            Ok(fetched) => fetched,
            Err(err) => {
                warn!(user_id = %user_id, error = %err, "failed to load user progress");
                self.clear().await?;
                return Err(err.into());
            }
        };

        let progress = match fetched {
            Some(progress) => progress.owned_by(user_id),
            None => {
                let fresh = UserProgress::new_default(user_id.clone(), self.clock.now());
                info!(user_id = %user_id, "no stored progress; creating initial record");
                if let ProgressSync::Partial { message } =
                    self.remote.push_progress(user_id, &fresh).await
                {
                    warn!(user_id = %user_id, %message, "failed to create initial progress remotely");
                }
                fresh
            }
        };

        *self.lock() = Some(progress.clone());
        self.persist_local(&progress).await?;
        Ok(progress)
    }

    /// Add XP for `reason`. Reaching the level milestone unlocks its
    /// achievement in the same step.
    ///
    /// # Errors
    ///
    /// Returns `GamificationError::Storage` if the local write fails.
    pub async fn add_xp(
        &self,
        amount: u32,
        reason: &str,
    ) -> Result<Option<ProgressUpdate>, GamificationError> {
        let now = self.clock.now();
        let change = self.mutate(|progress, catalog| {
            let leveled_up = progress.award_xp(amount, now);
            Some((leveled_up, unlock_milestones(progress, catalog)))
        });
        if change.is_some() {
            debug!(amount, reason, "xp awarded");
        }
        self.finish(change).await
    }

    /// Count today as an activity day.
    ///
    /// # Errors
    ///
    /// Returns `GamificationError::Storage` if the local write fails.
    pub async fn update_streak(&self) -> Result<Option<ProgressUpdate>, GamificationError> {
        let now = self.clock.now();
        let change = self.mutate(|progress, catalog| {
            let level = progress.current_level;
            let streak = progress.apply_activity_day(now);
            if streak != StreakChange::Unchanged {
                debug!(?streak, current = progress.current_streak, "streak updated");
            }
            let unlocked = unlock_milestones(progress, catalog);
            Some((progress.current_level > level, unlocked))
        });
        self.finish(change).await
    }

    /// Unlock `id` and grant its reward. Unknown or already unlocked ids are
    /// a no-op and return `None`.
    ///
    /// # Errors
    ///
    /// Returns `GamificationError::Storage` if the local write fails.
    pub async fn unlock_achievement(
        &self,
        id: &str,
    ) -> Result<Option<ProgressUpdate>, GamificationError> {
        let change = self.mutate(|progress, catalog| {
            let achievement = catalog.find(id)?;
            let level = progress.current_level;
            if !progress.unlock(achievement) {
                return None;
            }
            let mut unlocked = vec![achievement.id];
            unlocked.extend(unlock_milestones(progress, catalog));
            Some((progress.current_level > level, unlocked))
        });
        self.finish(change).await
    }

    /// Record a scored mock interview: running average, XP and the first
    /// interview achievement.
    ///
    /// # Errors
    ///
    /// Returns `GamificationError::Storage` if the local write fails.
    pub async fn record_interview(
        &self,
        evaluation: &InterviewEvaluation,
    ) -> Result<Option<ProgressUpdate>, GamificationError> {
        let now = self.clock.now();
        let change = self.mutate(|progress, catalog| {
            progress.record_interview(evaluation.score);
            let leveled_up = progress.award_xp(evaluation.xp_reward(), now);
            let mut unlocked = unlock_by_id(progress, catalog, FIRST_INTERVIEW);
            unlocked.extend(unlock_milestones(progress, catalog));
            Some((leveled_up, unlocked))
        });
        self.finish(change).await
    }

    /// Mark a lesson complete and grant its XP. Completing the same lesson
    /// again is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `GamificationError::Storage` if the local write fails.
    pub async fn complete_lesson(
        &self,
        course_id: &str,
        xp: u32,
    ) -> Result<Option<ProgressUpdate>, GamificationError> {
        let now = self.clock.now();
        let change = self.mutate(|progress, catalog| {
            if !progress.complete_course(course_id) {
                return None;
            }
            let leveled_up = progress.award_xp(xp, now);
            let mut unlocked = unlock_by_id(progress, catalog, FIRST_LESSON);
            unlocked.extend(unlock_milestones(progress, catalog));
            Some((leveled_up, unlocked))
        });
        self.finish(change).await
    }

    #[must_use]
    pub fn dashboard(&self) -> Option<Dashboard> {
        let guard = self.lock();
        let progress = guard.as_ref()?;
        Some(dashboard_for(progress, &self.catalog, self.clock.now()))
    }

    /// Drop the loaded record and its local cache.
    ///
    /// # Errors
    ///
    /// Returns `GamificationError::Storage` if local storage cannot be written.
    pub async fn clear(&self) -> Result<(), GamificationError> {
        *self.lock() = None;
        self.store.remove(StorageKey::GamificationProgress).await?;
        Ok(())
    }

    /// Apply `change` to the loaded record under the lock. Returns the new
    /// record when the closure reported a change.
    fn mutate<F>(&self, change: F) -> Option<(UserProgress, bool, Vec<&'static str>)>
    where
        F: FnOnce(&mut UserProgress, &AchievementCatalog) -> Option<(bool, Vec<&'static str>)>,
    {
        let mut guard = self.lock();
        let progress = guard.as_mut()?;
        let mut draft = progress.clone();
        let (leveled_up, unlocked) = change(&mut draft, &self.catalog)?;
        *progress = draft.clone();
        Some((draft, leveled_up, unlocked))
    }

    async fn finish(
        &self,
        change: Option<(UserProgress, bool, Vec<&'static str>)>,
    ) -> Result<Option<ProgressUpdate>, GamificationError> {
        let Some((progress, leveled_up, unlocked)) = change else {
            return Ok(None);
        };
        for id in &unlocked {
            info!(achievement = *id, user_id = %progress.user_id, "achievement unlocked");
        }
        if leveled_up {
            info!(level = progress.current_level, user_id = %progress.user_id, "level up");
        }

        self.persist_local(&progress).await?;
        let sync = self.remote.push_progress(&progress.user_id, &progress).await;
        if let ProgressSync::Partial { message } = &sync {
            warn!(user_id = %progress.user_id, %message, "failed to sync progress with backend");
        }

        Ok(Some(ProgressUpdate {
            progress,
            leveled_up,
            unlocked,
            sync,
        }))
    }

    async fn persist_local(&self, progress: &UserProgress) -> Result<(), GamificationError> {
        let raw = serde_json::to_string(progress)
            .map_err(|err| StorageError::Serialization(err.to_string()))?;
        self.store.set(StorageKey::GamificationProgress, &raw).await?;
        Ok(())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<UserProgress>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn unlock_by_id(
    progress: &mut UserProgress,
    catalog: &AchievementCatalog,
    id: &str,
) -> Vec<&'static str> {
    match catalog.find(id) {
        Some(achievement) if progress.unlock(achievement) => vec![achievement.id],
        _ => Vec::new(),
    }
}

/// Unlock threshold achievements the record now qualifies for. Reward XP
/// from one can cross the next threshold, so this runs until nothing changes.
fn unlock_milestones(progress: &mut UserProgress, catalog: &AchievementCatalog) -> Vec<&'static str> {
    let mut unlocked = Vec::new();
    loop {
        let before = unlocked.len();
        if progress.reached_streak_milestone() {
            unlocked.extend(unlock_by_id(progress, catalog, STREAK_7));
        }
        if progress.reached_level_milestone() {
            unlocked.extend(unlock_by_id(progress, catalog, LEVEL_5));
        }
        if unlocked.len() == before {
            return unlocked;
        }
    }
}

fn dashboard_for(
    progress: &UserProgress,
    catalog: &AchievementCatalog,
    now: DateTime<Utc>,
) -> Dashboard {
    Dashboard {
        total_xp: progress.total_xp,
        level: progress.level_progress(),
        current_streak: progress.current_streak,
        longest_streak: progress.longest_streak,
        streak_at_risk: progress.current_streak > 0 && progress.streak_at_risk(now),
        interviews_practiced: progress.interviews_practiced,
        average_interview_score: progress.average_interview_score,
        completed_courses: progress.completed_courses.len(),
        achievements: catalog.unlocked_in(progress),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use adducation_core::time::fixed_now;

    #[test]
    fn milestone_rewards_cascade() {
        let catalog = AchievementCatalog::default();
        let mut progress = UserProgress::new_default(UserId::new("u1"), fixed_now());
        progress.award_xp(330, fixed_now());
        progress.current_streak = 7;

        // streak_7 (+75) lifts 330 to 405, which reaches level 5 (+100).
        assert_eq!(unlock_milestones(&mut progress, &catalog), vec![STREAK_7, LEVEL_5]);
        assert_eq!(progress.total_xp, 505);
        assert_eq!(progress.current_level, 6);
        assert!(unlock_milestones(&mut progress, &catalog).is_empty());
    }

    #[test]
    fn streak_reward_alone_stays_below_level_milestone() {
        let catalog = AchievementCatalog::default();
        let mut progress = UserProgress::new_default(UserId::new("u1"), fixed_now());
        progress.award_xp(300, fixed_now());
        progress.current_streak = 7;

        assert_eq!(unlock_milestones(&mut progress, &catalog), vec![STREAK_7]);
        assert_eq!(progress.total_xp, 375);
        assert_eq!(progress.current_level, 4);
    }

    #[test]
    fn dashboard_flags_only_live_streaks() {
        let catalog = AchievementCatalog::default();
        let mut progress = UserProgress::new_default(UserId::new("u1"), fixed_now());
        let later = fixed_now() + chrono::Duration::days(2);
        assert!(!dashboard_for(&progress, &catalog, later).streak_at_risk);

        progress.current_streak = 3;
        assert!(dashboard_for(&progress, &catalog, later).streak_at_risk);
        assert!(!dashboard_for(&progress, &catalog, fixed_now()).streak_at_risk);
    }
}
