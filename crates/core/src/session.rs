use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    pub user_id: String,
    pub email: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    User,
}

impl Role {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "admin" => Some(Self::Admin),
            "user" => Some(Self::User),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::User => "user",
        }
    }
}

/// Who is making the current request, as seen by handlers and services.
pub trait SessionContext {
    fn current_user(&self) -> Option<UserIdentity>;
    fn current_role(&self) -> Option<Role>;

    fn is_authenticated(&self) -> bool {
        self.current_user().is_some()
    }

    fn is_admin(&self) -> bool {
        self.current_role() == Some(Role::Admin)
    }
}

/// Session resolved once per request.
#[derive(Debug, Clone, Default)]
pub struct ResolvedSession {
    pub user: Option<UserIdentity>,
    pub role: Option<Role>,
}

impl SessionContext for ResolvedSession {
    fn current_user(&self) -> Option<UserIdentity> {
        self.user.clone()
    }

    fn current_role(&self) -> Option<Role> {
        self.role
    }
}
