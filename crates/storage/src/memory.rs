use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use ayurwell_core::{FollowUp, PrakritiRecord, Role, UserProfile};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use crate::{
    FollowUpRepository, ProfileRepository, ResultRepository, RoleRepository, SessionRepository,
    StoredSession,
};

#[derive(Clone, Default)]
pub struct MemoryStore {
    profiles: Arc<RwLock<HashMap<String, UserProfile>>>,
    roles: Arc<RwLock<HashMap<String, Role>>>,
    results: Arc<RwLock<Vec<PrakritiRecord>>>,
    follow_ups: Arc<RwLock<Vec<FollowUp>>>,
    sessions: Arc<RwLock<HashMap<String, StoredSession>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

// Iterating in reverse before a stable sort keeps later inserts first on equal timestamps.
fn newest_first<T: Clone>(items: &[T], created_at: impl Fn(&T) -> DateTime<Utc>) -> Vec<T> {
    let mut sorted = items.iter().rev().cloned().collect::<Vec<_>>();
    sorted.sort_by(|lhs, rhs| created_at(rhs).cmp(&created_at(lhs)));
    sorted
}

impl ProfileRepository for MemoryStore {
    async fn load_profile(&self, user_id: &str) -> Result<Option<UserProfile>> {
        Ok(self.profiles.read().get(user_id).cloned())
    }

    async fn find_profile_by_email(&self, email: &str) -> Result<Option<UserProfile>> {
        let target = email.trim().to_lowercase();
        Ok(self
            .profiles
            .read()
            .values()
            .find(|profile| profile.email == target)
            .cloned())
    }

    async fn upsert_profile(&self, profile: &UserProfile) -> Result<()> {
        self.profiles
            .write()
            .insert(profile.user_id.clone(), profile.clone());
        Ok(())
    }

    async fn load_profiles(&self, user_ids: &[String]) -> Result<Vec<UserProfile>> {
        let profiles = self.profiles.read();
        Ok(user_ids
            .iter()
            .filter_map(|user_id| profiles.get(user_id).cloned())
            .collect())
    }

    async fn count_users(&self) -> Result<u64> {
        Ok(self.profiles.read().len() as u64)
    }
}

impl RoleRepository for MemoryStore {
    async fn load_role(&self, user_id: &str) -> Result<Option<Role>> {
        Ok(self.roles.read().get(user_id).copied())
    }

    async fn assign_role(&self, user_id: &str, role: Role) -> Result<()> {
        self.roles.write().insert(user_id.to_string(), role);
        Ok(())
    }
}

impl ResultRepository for MemoryStore {
    async fn append_result(&self, record: &PrakritiRecord) -> Result<()> {
        self.results.write().push(record.clone());
        Ok(())
    }

    async fn latest_result(&self, user_id: &str) -> Result<Option<PrakritiRecord>> {
        Ok(self.results_for_user(user_id).await?.into_iter().next())
    }

    async fn results_for_user(&self, user_id: &str) -> Result<Vec<PrakritiRecord>> {
        let owned = self
            .results
            .read()
            .iter()
            .filter(|record| record.user_id == user_id)
            .cloned()
            .collect::<Vec<_>>();
        Ok(newest_first(&owned, |record| record.created_at))
    }

    async fn recent_results(&self, limit: usize) -> Result<Vec<PrakritiRecord>> {
        let mut items = newest_first(self.results.read().as_slice(), |record| record.created_at);
        items.truncate(limit);
        Ok(items)
    }

    async fn count_results(&self) -> Result<u64> {
        Ok(self.results.read().len() as u64)
    }
}

impl FollowUpRepository for MemoryStore {
    async fn insert_follow_up(&self, item: &FollowUp) -> Result<()> {
        self.follow_ups.write().push(item.clone());
        Ok(())
    }

    async fn follow_ups_for_user(&self, user_id: &str) -> Result<Vec<FollowUp>> {
        let mut items = self
            .follow_ups
            .read()
            .iter()
            .rev()
            .filter(|item| item.user_id == user_id)
            .cloned()
            .collect::<Vec<_>>();
        items.sort_by(|lhs, rhs| rhs.reminder_date.cmp(&lhs.reminder_date));
        Ok(items)
    }

    async fn recent_follow_ups_for_user(
        &self,
        user_id: &str,
        limit: usize,
    ) -> Result<Vec<FollowUp>> {
        let owned = self
            .follow_ups
            .read()
            .iter()
            .filter(|item| item.user_id == user_id)
            .cloned()
            .collect::<Vec<_>>();
        let mut items = newest_first(&owned, |item| item.created_at);
        items.truncate(limit);
        Ok(items)
    }

    async fn delete_follow_up(&self, user_id: &str, follow_up_id: &str) -> Result<bool> {
        let mut items = self.follow_ups.write();
        let before = items.len();
        items.retain(|item| !(item.follow_up_id == follow_up_id && item.user_id == user_id));
        Ok(items.len() != before)
    }

    async fn recent_follow_ups(&self, limit: usize) -> Result<Vec<FollowUp>> {
        let mut items = newest_first(self.follow_ups.read().as_slice(), |item| item.created_at);
        items.truncate(limit);
        Ok(items)
    }

    async fn count_follow_ups(&self) -> Result<u64> {
        Ok(self.follow_ups.read().len() as u64)
    }

    async fn count_follow_ups_since(&self, since: DateTime<Utc>) -> Result<u64> {
        Ok(self
            .follow_ups
            .read()
            .iter()
            .filter(|item| item.created_at >= since)
            .count() as u64)
    }
}

impl SessionRepository for MemoryStore {
    async fn insert_session(&self, session: &StoredSession) -> Result<()> {
        self.sessions
            .write()
            .insert(session.token.clone(), session.clone());
        Ok(())
    }

    async fn load_session(&self, token: &str) -> Result<Option<StoredSession>> {
        Ok(self.sessions.read().get(token).cloned())
    }

    async fn delete_session(&self, token: &str) -> Result<()> {
        self.sessions.write().remove(token);
        Ok(())
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64> {
        let mut removed = 0_u64;
        self.sessions.write().retain(|_, value| {
            let keep = value.expires_at > now;
            if !keep {
                removed += 1;
            }
            keep
        });

        Ok(removed)
    }
}
