use anyhow::{Context, Result};
use ayurwell_core::{Dosha, FollowUp, PrakritiRecord, Role, ScoreTally, UserProfile};
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use sqlx::sqlite::{SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};

use crate::{
    FollowUpRepository, ProfileRepository, ResultRepository, RoleRepository, SessionRepository,
    StoredSession,
};

#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub async fn connect(database_url: &str) -> Result<Self> {
        let options = if database_url.contains(":memory:") {
            // Every pooled connection would otherwise see its own empty database.
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new()
        };

        let pool = options
            .connect(database_url)
            .await
            .with_context(|| format!("failed connecting to sqlite at {}", database_url))?;

        let store = Self { pool };
        store.ensure_schema().await?;
        Ok(store)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn ensure_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
              user_id TEXT PRIMARY KEY,
              email TEXT NOT NULL UNIQUE,
              name TEXT NOT NULL,
              age INTEGER,
              gender TEXT,
              health_history TEXT,
              created_at TEXT NOT NULL,
              updated_at TEXT NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS user_roles (
              user_id TEXT PRIMARY KEY,
              role TEXT NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS prakriti_results (
              result_id TEXT PRIMARY KEY,
              user_id TEXT NOT NULL,
              prakriti_type TEXT NOT NULL,
              score_json TEXT NOT NULL,
              created_at TEXT NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS follow_ups (
              follow_up_id TEXT PRIMARY KEY,
              user_id TEXT NOT NULL,
              reminder_date TEXT NOT NULL,
              feedback TEXT NOT NULL,
              progress_notes TEXT NOT NULL,
              created_at TEXT NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS sessions (
              token TEXT PRIMARY KEY,
              user_id TEXT NOT NULL,
              created_at TEXT NOT NULL,
              expires_at TEXT NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_prakriti_results_user ON prakriti_results (user_id, created_at)",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_follow_ups_user ON follow_ups (user_id, created_at)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

/// Fixed-width UTC timestamps so text ordering matches time ordering.
fn timestamp(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|parsed| parsed.with_timezone(&Utc))
        .with_context(|| format!("invalid stored timestamp `{value}`"))
}

fn profile_from_row(row: &SqliteRow) -> Result<UserProfile> {
    Ok(UserProfile {
        user_id: row.get("user_id"),
        email: row.get("email"),
        name: row.get("name"),
        age: row
            .get::<Option<i64>, _>("age")
            .and_then(|value| u8::try_from(value).ok()),
        gender: row.get("gender"),
        health_history: row.get("health_history"),
        created_at: parse_timestamp(&row.get::<String, _>("created_at"))?,
        updated_at: parse_timestamp(&row.get::<String, _>("updated_at"))?,
    })
}

fn result_from_row(row: &SqliteRow) -> Result<PrakritiRecord> {
    let label: String = row.get("prakriti_type");
    let score_json: String = row.get("score_json");
    let score: ScoreTally =
        serde_json::from_str(&score_json).context("invalid stored prakriti score")?;

    Ok(PrakritiRecord {
        result_id: row.get("result_id"),
        user_id: row.get("user_id"),
        prakriti_type: Dosha::from_label(&label)
            .with_context(|| format!("unknown stored prakriti type `{label}`"))?,
        score,
        created_at: parse_timestamp(&row.get::<String, _>("created_at"))?,
    })
}

fn follow_up_from_row(row: &SqliteRow) -> Result<FollowUp> {
    let reminder: String = row.get("reminder_date");
    Ok(FollowUp {
        follow_up_id: row.get("follow_up_id"),
        user_id: row.get("user_id"),
        reminder_date: NaiveDate::parse_from_str(&reminder, "%Y-%m-%d")
            .with_context(|| format!("invalid stored reminder date `{reminder}`"))?,
        feedback: row.get("feedback"),
        progress_notes: row.get("progress_notes"),
        created_at: parse_timestamp(&row.get::<String, _>("created_at"))?,
    })
}

fn count_from_row(row: &SqliteRow) -> u64 {
    row.get::<i64, _>("total").max(0) as u64
}

impl ProfileRepository for SqliteStore {
    async fn load_profile(&self, user_id: &str) -> Result<Option<UserProfile>> {
        let row = sqlx::query(
            r#"
            SELECT user_id, email, name, age, gender, health_history, created_at, updated_at
            FROM users
            WHERE user_id = ?1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(profile_from_row).transpose()
    }

    async fn find_profile_by_email(&self, email: &str) -> Result<Option<UserProfile>> {
        let row = sqlx::query(
            r#"
            SELECT user_id, email, name, age, gender, health_history, created_at, updated_at
            FROM users
            WHERE email = ?1
            "#,
        )
        .bind(email.trim().to_lowercase())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(profile_from_row).transpose()
    }

    async fn upsert_profile(&self, profile: &UserProfile) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO users (user_id, email, name, age, gender, health_history, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            ON CONFLICT(user_id) DO UPDATE SET
              email=excluded.email,
              name=excluded.name,
              age=excluded.age,
              gender=excluded.gender,
              health_history=excluded.health_history,
              updated_at=excluded.updated_at
            "#,
        )
        .bind(&profile.user_id)
        .bind(&profile.email)
        .bind(&profile.name)
        .bind(profile.age.map(i64::from))
        .bind(&profile.gender)
        .bind(&profile.health_history)
        .bind(timestamp(profile.created_at))
        .bind(timestamp(profile.updated_at))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn load_profiles(&self, user_ids: &[String]) -> Result<Vec<UserProfile>> {
        if user_ids.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = (1..=user_ids.len())
            .map(|idx| format!("?{idx}"))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "SELECT user_id, email, name, age, gender, health_history, created_at, updated_at \
             FROM users WHERE user_id IN ({placeholders})"
        );

        let mut query = sqlx::query(&sql);
        for user_id in user_ids {
            query = query.bind(user_id);
        }

        let rows = query.fetch_all(&self.pool).await?;
        rows.iter().map(profile_from_row).collect()
    }

    async fn count_users(&self) -> Result<u64> {
        let row = sqlx::query("SELECT COUNT(*) AS total FROM users")
            .fetch_one(&self.pool)
            .await?;
        Ok(count_from_row(&row))
    }
}

impl RoleRepository for SqliteStore {
    async fn load_role(&self, user_id: &str) -> Result<Option<Role>> {
        let row = sqlx::query("SELECT role FROM user_roles WHERE user_id = ?1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.and_then(|value| Role::parse(&value.get::<String, _>("role"))))
    }

    async fn assign_role(&self, user_id: &str, role: Role) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO user_roles (user_id, role)
            VALUES (?1, ?2)
            ON CONFLICT(user_id) DO UPDATE SET role=excluded.role
            "#,
        )
        .bind(user_id)
        .bind(role.as_str())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

impl ResultRepository for SqliteStore {
    async fn append_result(&self, record: &PrakritiRecord) -> Result<()> {
        let score_json = serde_json::to_string(&record.score)?;

        sqlx::query(
            r#"
            INSERT INTO prakriti_results (result_id, user_id, prakriti_type, score_json, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(&record.result_id)
        .bind(&record.user_id)
        .bind(record.prakriti_type.label())
        .bind(score_json)
        .bind(timestamp(record.created_at))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn latest_result(&self, user_id: &str) -> Result<Option<PrakritiRecord>> {
        let row = sqlx::query(
            r#"
            SELECT result_id, user_id, prakriti_type, score_json, created_at
            FROM prakriti_results
            WHERE user_id = ?1
            ORDER BY created_at DESC, rowid DESC
            LIMIT 1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(result_from_row).transpose()
    }

    async fn results_for_user(&self, user_id: &str) -> Result<Vec<PrakritiRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT result_id, user_id, prakriti_type, score_json, created_at
            FROM prakriti_results
            WHERE user_id = ?1
            ORDER BY created_at DESC, rowid DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(result_from_row).collect()
    }

    async fn recent_results(&self, limit: usize) -> Result<Vec<PrakritiRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT result_id, user_id, prakriti_type, score_json, created_at
            FROM prakriti_results
            ORDER BY created_at DESC, rowid DESC
            LIMIT ?1
            "#,
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(result_from_row).collect()
    }

    async fn count_results(&self) -> Result<u64> {
        let row = sqlx::query("SELECT COUNT(*) AS total FROM prakriti_results")
            .fetch_one(&self.pool)
            .await?;
        Ok(count_from_row(&row))
    }
}

impl FollowUpRepository for SqliteStore {
    async fn insert_follow_up(&self, item: &FollowUp) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO follow_ups (follow_up_id, user_id, reminder_date, feedback, progress_notes, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&item.follow_up_id)
        .bind(&item.user_id)
        .bind(item.reminder_date.format("%Y-%m-%d").to_string())
        .bind(&item.feedback)
        .bind(&item.progress_notes)
        .bind(timestamp(item.created_at))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn follow_ups_for_user(&self, user_id: &str) -> Result<Vec<FollowUp>> {
        let rows = sqlx::query(
            r#"
            SELECT follow_up_id, user_id, reminder_date, feedback, progress_notes, created_at
            FROM follow_ups
            WHERE user_id = ?1
            ORDER BY reminder_date DESC, rowid DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(follow_up_from_row).collect()
    }

    async fn recent_follow_ups_for_user(
        &self,
        user_id: &str,
        limit: usize,
    ) -> Result<Vec<FollowUp>> {
        let rows = sqlx::query(
            r#"
            SELECT follow_up_id, user_id, reminder_date, feedback, progress_notes, created_at
            FROM follow_ups
            WHERE user_id = ?1
            ORDER BY created_at DESC, rowid DESC
            LIMIT ?2
            "#,
        )
        .bind(user_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(follow_up_from_row).collect()
    }

    async fn delete_follow_up(&self, user_id: &str, follow_up_id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM follow_ups WHERE follow_up_id = ?1 AND user_id = ?2")
            .bind(follow_up_id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn recent_follow_ups(&self, limit: usize) -> Result<Vec<FollowUp>> {
        let rows = sqlx::query(
            r#"
            SELECT follow_up_id, user_id, reminder_date, feedback, progress_notes, created_at
            FROM follow_ups
            ORDER BY created_at DESC, rowid DESC
            LIMIT ?1
            "#,
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(follow_up_from_row).collect()
    }

    async fn count_follow_ups(&self) -> Result<u64> {
        let row = sqlx::query("SELECT COUNT(*) AS total FROM follow_ups")
            .fetch_one(&self.pool)
            .await?;
        Ok(count_from_row(&row))
    }

    async fn count_follow_ups_since(&self, since: DateTime<Utc>) -> Result<u64> {
        let row = sqlx::query("SELECT COUNT(*) AS total FROM follow_ups WHERE created_at >= ?1")
            .bind(timestamp(since))
            .fetch_one(&self.pool)
            .await?;
        Ok(count_from_row(&row))
    }
}

impl SessionRepository for SqliteStore {
    async fn insert_session(&self, session: &StoredSession) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO sessions (token, user_id, created_at, expires_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(token) DO UPDATE SET
              user_id=excluded.user_id,
              expires_at=excluded.expires_at
            "#,
        )
        .bind(&session.token)
        .bind(&session.user_id)
        .bind(timestamp(session.created_at))
        .bind(timestamp(session.expires_at))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn load_session(&self, token: &str) -> Result<Option<StoredSession>> {
        let row = sqlx::query(
            "SELECT token, user_id, created_at, expires_at FROM sessions WHERE token = ?1",
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        Ok(Some(StoredSession {
            token: row.get("token"),
            user_id: row.get("user_id"),
            created_at: parse_timestamp(&row.get::<String, _>("created_at"))?,
            expires_at: parse_timestamp(&row.get::<String, _>("expires_at"))?,
        }))
    }

    async fn delete_session(&self, token: &str) -> Result<()> {
        sqlx::query("DELETE FROM sessions WHERE token = ?1")
            .bind(token)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query("DELETE FROM sessions WHERE expires_at <= ?1")
            .bind(timestamp(now))
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, Utc};

    use super::*;
    use crate::fixtures::{days_ago, follow_up, profile, result};

    async fn store() -> SqliteStore {
        SqliteStore::connect("sqlite::memory:")
            .await
            .expect("in-memory sqlite should open")
    }

    #[tokio::test]
    async fn results_round_trip_with_score_and_order() {
        let store = store().await;
        let now = Utc::now();
        let older = result("u-1", Dosha::Pitta, days_ago(now, 5));
        let newer = result("u-1", Dosha::Vata, now);
        store.append_result(&older).await.unwrap();
        store.append_result(&newer).await.unwrap();

        let latest = store.latest_result("u-1").await.unwrap().unwrap();
        assert_eq!(latest.result_id, newer.result_id);
        assert_eq!(latest.score, newer.score);

        let history = store.results_for_user("u-1").await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].prakriti_type, Dosha::Pitta);
        assert!(store.latest_result("nobody").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn profiles_and_roles_persist() {
        let store = store().await;
        let now = Utc::now();
        store
            .upsert_profile(&profile("u-1", "meera@example.com", now))
            .await
            .unwrap();
        store
            .upsert_profile(&profile("u-2", "ravi@example.com", now))
            .await
            .unwrap();
        store.assign_role("u-1", Role::Admin).await.unwrap();

        assert_eq!(store.count_users().await.unwrap(), 2);
        assert_eq!(store.load_role("u-1").await.unwrap(), Some(Role::Admin));
        assert_eq!(store.load_role("u-2").await.unwrap(), None);

        let loaded = store
            .load_profiles(&["u-1".to_string(), "u-2".to_string(), "u-3".to_string()])
            .await
            .unwrap();
        assert_eq!(loaded.len(), 2);
        let found = store
            .find_profile_by_email("MEERA@example.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.user_id, "u-1");
        assert_eq!(found.age, Some(34));
    }

    #[tokio::test]
    async fn follow_ups_count_and_delete() {
        let store = store().await;
        let now = Utc::now();
        let reminder = NaiveDate::from_ymd_opt(2026, 4, 2).unwrap();
        let old = follow_up("u-1", reminder, days_ago(now, 9));
        let fresh = follow_up("u-1", reminder, days_ago(now, 1));
        store.insert_follow_up(&old).await.unwrap();
        store.insert_follow_up(&fresh).await.unwrap();

        assert_eq!(store.count_follow_ups().await.unwrap(), 2);
        assert_eq!(
            store
                .count_follow_ups_since(days_ago(now, 7))
                .await
                .unwrap(),
            1
        );

        let recent = store.recent_follow_ups_for_user("u-1", 1).await.unwrap();
        assert_eq!(recent[0].follow_up_id, fresh.follow_up_id);

        assert!(!store
            .delete_follow_up("u-2", &old.follow_up_id)
            .await
            .unwrap());
        assert!(store
            .delete_follow_up("u-1", &old.follow_up_id)
            .await
            .unwrap());
        assert_eq!(store.follow_ups_for_user("u-1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn purge_removes_sessions_expiring_exactly_now() {
        let store = store().await;
        let now = Utc::now();
        for (token, expires_at) in [
            ("due", now),
            ("live", now + chrono::Duration::seconds(1)),
        ] {
            store
                .insert_session(&StoredSession {
                    token: token.to_string(),
                    user_id: "u-1".to_string(),
                    created_at: days_ago(now, 1),
                    expires_at,
                })
                .await
                .unwrap();
        }

        assert_eq!(store.purge_expired(now).await.unwrap(), 1);
        assert!(store.load_session("due").await.unwrap().is_none());
        assert!(store.load_session("live").await.unwrap().is_some());
    }
}
