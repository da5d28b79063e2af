mod activity;
mod error;

use std::sync::Arc;

use ayurwell_core::{
    daily_schedule, diet_plan, questionnaire, ActivityItem, AdminStats, AnswerSet,
    ClassificationResult, DailySchedule, DietPlan, FollowUp, FollowUpDraft, HistoryView,
    PrakritiClassifier, PrakritiRecord, ProfileUpdate, Question, ResolvedSession, Role,
    UserIdentity, UserProfile,
};
use ayurwell_observability::AppMetrics;
use ayurwell_storage::{
    FollowUpRepository, ProfileRepository, ResultRepository, RoleRepository, SessionRepository,
    StoredSession,
};
use chrono::{DateTime, Duration, Utc};
use tracing::{info, instrument, warn};
use uuid::Uuid;

pub use error::{ServiceError, ServiceResult};

pub const RECENT_WINDOW_DAYS: i64 = 7;
pub const ACTIVITY_PER_SOURCE: usize = 5;
pub const ACTIVITY_LIMIT: usize = 10;
pub const HISTORY_FOLLOW_UPS: usize = 5;

const MAX_FOLLOW_UP_TEXT: usize = 2_000;
const MAX_NAME: usize = 120;
const MAX_GENDER: usize = 40;
const MAX_HEALTH_HISTORY: usize = 4_000;
const MAX_EMAIL: usize = 254;

/// Everything the service needs from persistence.
pub trait WellnessStore:
    ProfileRepository + RoleRepository + ResultRepository + FollowUpRepository + SessionRepository
{
}

impl<T> WellnessStore for T where
    T: ProfileRepository
        + RoleRepository
        + ResultRepository
        + FollowUpRepository
        + SessionRepository
{
}

#[derive(Clone)]
pub struct WellnessService<S>
where
    S: WellnessStore,
{
    store: Arc<S>,
    classifier: PrakritiClassifier,
    metrics: Arc<AppMetrics>,
}

impl<S> WellnessService<S>
where
    S: WellnessStore,
{
    pub fn new(store: Arc<S>, classifier: PrakritiClassifier, metrics: Arc<AppMetrics>) -> Self {
        Self {
            store,
            classifier,
            metrics,
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn classifier(&self) -> PrakritiClassifier {
        self.classifier
    }

    pub fn questions(&self) -> Vec<Question> {
        questionnaire()
    }

    /// Scores answers without persisting anything.
    pub fn classify(&self, answers: &AnswerSet) -> ServiceResult<ClassificationResult> {
        self.classifier.classify_set(answers).map_err(|err| {
            self.metrics.inc_invalid_submission();
            ServiceError::from(err)
        })
    }

    #[instrument(skip(self, answers), fields(answer_count = answers.len()))]
    pub async fn submit_questionnaire(
        &self,
        user_id: &str,
        answers: &AnswerSet,
    ) -> ServiceResult<PrakritiRecord> {
        let result = match self.classifier.classify_set(answers) {
            Ok(result) => result,
            Err(err) => {
                self.metrics.inc_invalid_submission();
                warn!(code = err.code(), "questionnaire rejected");
                return Err(err.into());
            }
        };

        let record = PrakritiRecord {
            result_id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            prakriti_type: result.prakriti_type,
            score: result.score,
            created_at: Utc::now(),
        };
        self.store.append_result(&record).await?;
        self.metrics.inc_submission();

        info!(
            result_id = %record.result_id,
            prakriti = record.prakriti_type.label(),
            vata = record.score.vata,
            pitta = record.score.pitta,
            kapha = record.score.kapha,
            "prakriti recorded"
        );
        Ok(record)
    }

    pub async fn latest_result(&self, user_id: &str) -> ServiceResult<Option<PrakritiRecord>> {
        Ok(self.store.latest_result(user_id).await?)
    }

    pub async fn result_history(&self, user_id: &str) -> ServiceResult<Vec<PrakritiRecord>> {
        Ok(self.store.results_for_user(user_id).await?)
    }

    /// `None` until the user has at least one recorded result.
    pub async fn diet_chart(&self, user_id: &str) -> ServiceResult<Option<DietPlan>> {
        let latest = self.store.latest_result(user_id).await?;
        Ok(latest.map(|record| diet_plan(record.prakriti_type)))
    }

    pub async fn daily_schedule(&self, user_id: &str) -> ServiceResult<Option<DailySchedule>> {
        let latest = self.store.latest_result(user_id).await?;
        Ok(latest.map(|record| daily_schedule(record.prakriti_type)))
    }

    #[instrument(skip(self, draft))]
    pub async fn add_follow_up(
        &self,
        user_id: &str,
        draft: FollowUpDraft,
    ) -> ServiceResult<FollowUp> {
        let feedback = draft.feedback.trim().to_string();
        let progress_notes = draft.progress_notes.trim().to_string();
        if feedback.is_empty() && progress_notes.is_empty() {
            return Err(ServiceError::validation(
                "feedback or progress_notes is required",
            ));
        }
        check_length("feedback", &feedback, MAX_FOLLOW_UP_TEXT)?;
        check_length("progress_notes", &progress_notes, MAX_FOLLOW_UP_TEXT)?;

        let item = FollowUp {
            follow_up_id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            reminder_date: draft.reminder_date,
            feedback,
            progress_notes,
            created_at: Utc::now(),
        };
        self.store.insert_follow_up(&item).await?;
        self.metrics.inc_follow_up_created();

        info!(follow_up_id = %item.follow_up_id, reminder = %item.reminder_date, "follow-up added");
        Ok(item)
    }

    pub async fn list_follow_ups(&self, user_id: &str) -> ServiceResult<Vec<FollowUp>> {
        Ok(self.store.follow_ups_for_user(user_id).await?)
    }

    pub async fn delete_follow_up(&self, user_id: &str, follow_up_id: &str) -> ServiceResult<()> {
        if self.store.delete_follow_up(user_id, follow_up_id).await? {
            Ok(())
        } else {
            Err(ServiceError::NotFound("follow-up"))
        }
    }

    /// Stored profile, or an unsaved default named after the email local-part.
    pub async fn load_profile(&self, identity: &UserIdentity) -> ServiceResult<UserProfile> {
        if let Some(profile) = self.store.load_profile(&identity.user_id).await? {
            return Ok(profile);
        }

        let now = Utc::now();
        Ok(UserProfile {
            user_id: identity.user_id.clone(),
            email: identity.email.clone(),
            name: default_name(&identity.email),
            age: None,
            gender: None,
            health_history: None,
            created_at: now,
            updated_at: now,
        })
    }

    /// Replaces the editable fields. A missing or blank name keeps the current one.
    #[instrument(skip(self, identity, update), fields(user_id = %identity.user_id))]
    pub async fn save_profile(
        &self,
        identity: &UserIdentity,
        update: ProfileUpdate,
    ) -> ServiceResult<UserProfile> {
        let mut profile = self.load_profile(identity).await?;

        if let Some(name) = clean_optional(update.name) {
            check_length("name", &name, MAX_NAME)?;
            profile.name = name;
        }
        if let Some(age) = update.age {
            if !(1..=120).contains(&age) {
                return Err(ServiceError::validation("age must be between 1 and 120"));
            }
        }
        let gender = clean_optional(update.gender);
        if let Some(value) = gender.as_deref() {
            check_length("gender", value, MAX_GENDER)?;
        }
        let health_history = clean_optional(update.health_history);
        if let Some(value) = health_history.as_deref() {
            check_length("health_history", value, MAX_HEALTH_HISTORY)?;
        }

        profile.age = update.age;
        profile.gender = gender;
        profile.health_history = health_history;
        profile.updated_at = Utc::now();
        self.store.upsert_profile(&profile).await?;

        info!("profile saved");
        Ok(profile)
    }

    /// Finds or creates the account behind an email and settles its role.
    /// Listed admin emails are promoted; nobody is demoted here.
    #[instrument(skip(self))]
    pub async fn ensure_account(
        &self,
        email: &str,
        grant_admin: bool,
    ) -> ServiceResult<(UserProfile, Role)> {
        let email = normalize_email(email)?;

        let profile = match self.store.find_profile_by_email(&email).await? {
            Some(profile) => profile,
            None => {
                let now = Utc::now();
                let profile = UserProfile {
                    user_id: Uuid::new_v4().to_string(),
                    email: email.clone(),
                    name: default_name(&email),
                    age: None,
                    gender: None,
                    health_history: None,
                    created_at: now,
                    updated_at: now,
                };
                self.store.upsert_profile(&profile).await?;
                info!(user_id = %profile.user_id, "account created");
                profile
            }
        };

        let current = self.store.load_role(&profile.user_id).await?;
        let role = match (current, grant_admin) {
            (_, true) => Role::Admin,
            (Some(role), false) => role,
            (None, false) => Role::User,
        };
        if current != Some(role) {
            self.store.assign_role(&profile.user_id, role).await?;
        }

        Ok((profile, role))
    }

    pub async fn open_session(
        &self,
        token: String,
        user_id: &str,
        ttl: Duration,
    ) -> ServiceResult<StoredSession> {
        let now = Utc::now();
        let expires_at = now
            .checked_add_signed(ttl)
            .ok_or_else(|| ServiceError::validation("session lifetime is out of range"))?;
        let session = StoredSession {
            token,
            user_id: user_id.to_string(),
            created_at: now,
            expires_at,
        };
        self.store.insert_session(&session).await?;
        Ok(session)
    }

    /// Expired or dangling sessions resolve to `None` and are removed.
    pub async fn resolve_session(&self, token: &str) -> ServiceResult<Option<ResolvedSession>> {
        let Some(session) = self.store.load_session(token).await? else {
            return Ok(None);
        };
        if session.expires_at <= Utc::now() {
            self.store.delete_session(token).await?;
            return Ok(None);
        }
        let Some(profile) = self.store.load_profile(&session.user_id).await? else {
            self.store.delete_session(token).await?;
            return Ok(None);
        };
        let role = self.store.load_role(&profile.user_id).await?;

        Ok(Some(ResolvedSession {
            user: Some(UserIdentity {
                user_id: profile.user_id,
                email: profile.email,
            }),
            role: Some(role.unwrap_or(Role::User)),
        }))
    }

    pub async fn close_session(&self, token: &str) -> ServiceResult<()> {
        Ok(self.store.delete_session(token).await?)
    }

    pub async fn purge_expired_sessions(&self) -> ServiceResult<u64> {
        Ok(self.store.purge_expired(Utc::now()).await?)
    }

    pub async fn admin_stats(&self) -> ServiceResult<AdminStats> {
        self.admin_stats_at(Utc::now()).await
    }

    pub async fn admin_stats_at(&self, now: DateTime<Utc>) -> ServiceResult<AdminStats> {
        let since = now - Duration::days(RECENT_WINDOW_DAYS);
        let (total_users, total_prakriti_tests, total_follow_ups, recent_follow_ups) =
            futures::try_join!(
                self.store.count_users(),
                self.store.count_results(),
                self.store.count_follow_ups(),
                self.store.count_follow_ups_since(since),
            )?;

        Ok(AdminStats {
            total_users,
            total_prakriti_tests,
            total_follow_ups,
            recent_follow_ups,
        })
    }

    pub async fn recent_activity(&self) -> ServiceResult<Vec<ActivityItem>> {
        let (results, follow_ups) = futures::try_join!(
            self.store.recent_results(ACTIVITY_PER_SOURCE),
            self.store.recent_follow_ups(ACTIVITY_PER_SOURCE),
        )?;

        let mut user_ids = results
            .iter()
            .map(|record| record.user_id.clone())
            .chain(follow_ups.iter().map(|item| item.user_id.clone()))
            .collect::<Vec<_>>();
        user_ids.sort();
        user_ids.dedup();
        let profiles = self.store.load_profiles(&user_ids).await?;

        Ok(activity::merge_activity(
            results,
            follow_ups,
            &profiles,
            ACTIVITY_LIMIT,
        ))
    }

    pub async fn history(&self, user_id: &str) -> ServiceResult<HistoryView> {
        let (results, recent_follow_ups) = futures::try_join!(
            self.store.results_for_user(user_id),
            self.store.recent_follow_ups_for_user(user_id, HISTORY_FOLLOW_UPS),
        )?;

        Ok(HistoryView {
            results,
            recent_follow_ups,
        })
    }
}

fn default_name(email: &str) -> String {
    email.split('@').next().unwrap_or_default().to_string()
}

fn normalize_email(email: &str) -> ServiceResult<String> {
    let email = email.trim().to_lowercase();
    let valid_shape = email
        .split_once('@')
        .map(|(local, domain)| !local.is_empty() && domain.contains('.'))
        .unwrap_or(false);
    if !valid_shape || email.len() > MAX_EMAIL || email.chars().any(char::is_whitespace) {
        return Err(ServiceError::validation("a valid email is required"));
    }
    Ok(email)
}

fn clean_optional(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn check_length(field: &str, value: &str, max_chars: usize) -> ServiceResult<()> {
    if value.chars().count() > max_chars {
        return Err(ServiceError::validation(format!(
            "{field} must be at most {max_chars} characters"
        )));
    }
    Ok(())
}
