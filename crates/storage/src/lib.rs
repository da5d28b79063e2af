mod memory;
mod sqlite;

use anyhow::Result;
use ayurwell_core::{FollowUp, PrakritiRecord, Role, UserProfile};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredSession {
    pub token: String,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

pub trait ProfileRepository: Send + Sync {
    async fn load_profile(&self, user_id: &str) -> Result<Option<UserProfile>>;
    async fn find_profile_by_email(&self, email: &str) -> Result<Option<UserProfile>>;
    async fn upsert_profile(&self, profile: &UserProfile) -> Result<()>;
    async fn load_profiles(&self, user_ids: &[String]) -> Result<Vec<UserProfile>>;
    async fn count_users(&self) -> Result<u64>;
}

pub trait RoleRepository: Send + Sync {
    async fn load_role(&self, user_id: &str) -> Result<Option<Role>>;
    async fn assign_role(&self, user_id: &str, role: Role) -> Result<()>;
}

/// Classification history. Records are only ever appended.
pub trait ResultRepository: Send + Sync {
    async fn append_result(&self, record: &PrakritiRecord) -> Result<()>;
    async fn latest_result(&self, user_id: &str) -> Result<Option<PrakritiRecord>>;
    /// Newest first.
    async fn results_for_user(&self, user_id: &str) -> Result<Vec<PrakritiRecord>>;
    async fn recent_results(&self, limit: usize) -> Result<Vec<PrakritiRecord>>;
    async fn count_results(&self) -> Result<u64>;
}

pub trait FollowUpRepository: Send + Sync {
    async fn insert_follow_up(&self, item: &FollowUp) -> Result<()>;
    /// Ordered by reminder date, latest first.
    async fn follow_ups_for_user(&self, user_id: &str) -> Result<Vec<FollowUp>>;
    async fn recent_follow_ups_for_user(&self, user_id: &str, limit: usize)
        -> Result<Vec<FollowUp>>;
    /// Returns false when the item does not exist or belongs to someone else.
    async fn delete_follow_up(&self, user_id: &str, follow_up_id: &str) -> Result<bool>;
    async fn recent_follow_ups(&self, limit: usize) -> Result<Vec<FollowUp>>;
    async fn count_follow_ups(&self) -> Result<u64>;
    async fn count_follow_ups_since(&self, since: DateTime<Utc>) -> Result<u64>;
}

pub trait SessionRepository: Send + Sync {
    async fn insert_session(&self, session: &StoredSession) -> Result<()>;
    async fn load_session(&self, token: &str) -> Result<Option<StoredSession>>;
    async fn delete_session(&self, token: &str) -> Result<()>;
    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64>;
}

#[derive(Clone)]
pub enum Store {
    Memory(MemoryStore),
    Sqlite(SqliteStore),
}

impl Store {
    pub fn memory() -> Self {
        Self::Memory(MemoryStore::new())
    }

    pub async fn sqlite(database_url: &str) -> Result<Self> {
        let sqlite = SqliteStore::connect(database_url).await?;
        Ok(Self::Sqlite(sqlite))
    }

    pub fn backend_name(&self) -> &'static str {
        match self {
            Store::Memory(_) => "memory",
            Store::Sqlite(_) => "sqlite",
        }
    }
}

impl ProfileRepository for Store {
    async fn load_profile(&self, user_id: &str) -> Result<Option<UserProfile>> {
        match self {
            Store::Memory(store) => store.load_profile(user_id).await,
            Store::Sqlite(store) => store.load_profile(user_id).await,
        }
    }

    async fn find_profile_by_email(&self, email: &str) -> Result<Option<UserProfile>> {
        match self {
            Store::Memory(store) => store.find_profile_by_email(email).await,
            Store::Sqlite(store) => store.find_profile_by_email(email).await,
        }
    }

    async fn upsert_profile(&self, profile: &UserProfile) -> Result<()> {
        match self {
            Store::Memory(store) => store.upsert_profile(profile).await,
            Store::Sqlite(store) => store.upsert_profile(profile).await,
        }
    }

    async fn load_profiles(&self, user_ids: &[String]) -> Result<Vec<UserProfile>> {
        match self {
            Store::Memory(store) => store.load_profiles(user_ids).await,
            Store::Sqlite(store) => store.load_profiles(user_ids).await,
        }
    }

    async fn count_users(&self) -> Result<u64> {
        match self {
            Store::Memory(store) => store.count_users().await,
            Store::Sqlite(store) => store.count_users().await,
        }
    }
}

impl RoleRepository for Store {
    async fn load_role(&self, user_id: &str) -> Result<Option<Role>> {
        match self {
            Store::Memory(store) => store.load_role(user_id).await,
            Store::Sqlite(store) => store.load_role(user_id).await,
        }
    }

    async fn assign_role(&self, user_id: &str, role: Role) -> Result<()> {
        match self {
            Store::Memory(store) => store.assign_role(user_id, role).await,
            Store::Sqlite(store) => store.assign_role(user_id, role).await,
        }
    }
}

impl ResultRepository for Store {
    async fn append_result(&self, record: &PrakritiRecord) -> Result<()> {
        match self {
            Store::Memory(store) => store.append_result(record).await,
            Store::Sqlite(store) => store.append_result(record).await,
        }
    }

    async fn latest_result(&self, user_id: &str) -> Result<Option<PrakritiRecord>> {
        match self {
            Store::Memory(store) => store.latest_result(user_id).await,
            Store::Sqlite(store) => store.latest_result(user_id).await,
        }
    }

    async fn results_for_user(&self, user_id: &str) -> Result<Vec<PrakritiRecord>> {
        match self {
            Store::Memory(store) => store.results_for_user(user_id).await,
            Store::Sqlite(store) => store.results_for_user(user_id).await,
        }
    }

    async fn recent_results(&self, limit: usize) -> Result<Vec<PrakritiRecord>> {
        match self {
            Store::Memory(store) => store.recent_results(limit).await,
            Store::Sqlite(store) => store.recent_results(limit).await,
        }
    }

    async fn count_results(&self) -> Result<u64> {
        match self {
            Store::Memory(store) => store.count_results().await,
            Store::Sqlite(store) => store.count_results().await,
        }
    }
}

impl FollowUpRepository for Store {
    async fn insert_follow_up(&self, item: &FollowUp) -> Result<()> {
        match self {
            Store::Memory(store) => store.insert_follow_up(item).await,
            Store::Sqlite(store) => store.insert_follow_up(item).await,
        }
    }

    async fn follow_ups_for_user(&self, user_id: &str) -> Result<Vec<FollowUp>> {
        match self {
            Store::Memory(store) => store.follow_ups_for_user(user_id).await,
            Store::Sqlite(store) => store.follow_ups_for_user(user_id).await,
        }
    }

    async fn recent_follow_ups_for_user(
        &self,
        user_id: &str,
        limit: usize,
    ) -> Result<Vec<FollowUp>> {
        match self {
            Store::Memory(store) => store.recent_follow_ups_for_user(user_id, limit).await,
            Store::Sqlite(store) => store.recent_follow_ups_for_user(user_id, limit).await,
        }
    }

    async fn delete_follow_up(&self, user_id: &str, follow_up_id: &str) -> Result<bool> {
        match self {
            Store::Memory(store) => store.delete_follow_up(user_id, follow_up_id).await,
            Store::Sqlite(store) => store.delete_follow_up(user_id, follow_up_id).await,
        }
    }

    async fn recent_follow_ups(&self, limit: usize) -> Result<Vec<FollowUp>> {
        match self {
            Store::Memory(store) => store.recent_follow_ups(limit).await,
            Store::Sqlite(store) => store.recent_follow_ups(limit).await,
        }
    }

    async fn count_follow_ups(&self) -> Result<u64> {
        match self {
            Store::Memory(store) => store.count_follow_ups().await,
            Store::Sqlite(store) => store.count_follow_ups().await,
        }
    }

    async fn count_follow_ups_since(&self, since: DateTime<Utc>) -> Result<u64> {
        match self {
            Store::Memory(store) => store.count_follow_ups_since(since).await,
            Store::Sqlite(store) => store.count_follow_ups_since(since).await,
        }
    }
}

impl SessionRepository for Store {
    async fn insert_session(&self, session: &StoredSession) -> Result<()> {
        match self {
            Store::Memory(store) => store.insert_session(session).await,
            Store::Sqlite(store) => store.insert_session(session).await,
        }
    }

    async fn load_session(&self, token: &str) -> Result<Option<StoredSession>> {
        match self {
            Store::Memory(store) => store.load_session(token).await,
            Store::Sqlite(store) => store.load_session(token).await,
        }
    }

    async fn delete_session(&self, token: &str) -> Result<()> {
        match self {
            Store::Memory(store) => store.delete_session(token).await,
            Store::Sqlite(store) => store.delete_session(token).await,
        }
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64> {
        match self {
            Store::Memory(store) => store.purge_expired(now).await,
            Store::Sqlite(store) => store.purge_expired(now).await,
        }
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use ayurwell_core::{Dosha, FollowUp, PrakritiRecord, ScoreTally, UserProfile};
    use chrono::{DateTime, Duration, NaiveDate, Utc};

    pub fn profile(user_id: &str, email: &str, at: DateTime<Utc>) -> UserProfile {
        UserProfile {
            user_id: user_id.to_string(),
            email: email.to_string(),
            name: email.split('@').next().unwrap_or_default().to_string(),
            age: Some(34),
            gender: None,
            health_history: None,
            created_at: at,
            updated_at: at,
        }
    }

    pub fn result(user_id: &str, dosha: Dosha, at: DateTime<Utc>) -> PrakritiRecord {
        let mut score = ScoreTally::default();
        for _ in 0..5 {
            score.increment(dosha);
        }
        PrakritiRecord {
            result_id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            prakriti_type: dosha,
            score,
            created_at: at,
        }
    }

    pub fn follow_up(user_id: &str, reminder: NaiveDate, at: DateTime<Utc>) -> FollowUp {
        FollowUp {
            follow_up_id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            reminder_date: reminder,
            feedback: "Feeling calmer after switching to warm breakfasts".to_string(),
            progress_notes: "Sleep improved".to_string(),
            created_at: at,
        }
    }

    pub fn days_ago(now: DateTime<Utc>, days: i64) -> DateTime<Utc> {
        now - Duration::days(days)
    }
}
