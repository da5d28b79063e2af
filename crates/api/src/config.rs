use std::env;
use std::time::Duration;

use ayurwell_assist::AssistConfig;
use ayurwell_core::TieBreak;
use tracing::warn;

pub const DEFAULT_API_KEY: &str = "dev-ayurwell-key";
pub const DEFAULT_ADMIN_EMAILS: &str = "admin@ayurwell.app";
const DEFAULT_SESSION_TTL_SECONDS: u64 = 60 * 60 * 24 * 30;
const MAX_SESSION_TTL_SECONDS: u64 = 60 * 60 * 24 * 365;
const DEFAULT_ALLOWED_ORIGINS: [&str; 6] = [
    "http://localhost:5173",
    "http://127.0.0.1:5173",
    "http://localhost:3000",
    "http://127.0.0.1:3000",
    "https://ayurwell.app",
    "https://www.ayurwell.app",
];

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub api_key: String,
    pub database_url: Option<String>,
    pub allowed_origins: Vec<String>,
    pub session_ttl: Duration,
    pub cookie_name: String,
    pub cookie_domain: String,
    pub cookie_secure: bool,
    pub cookie_same_site: String,
    pub api_rate_limit_window: Duration,
    pub api_rate_limit_max: usize,
    pub auth_rate_limit_window: Duration,
    pub auth_rate_limit_max: usize,
    pub tie_break: TieBreak,
    pub admin_emails: Vec<String>,
    pub assist: AssistConfig,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            api_key: DEFAULT_API_KEY.to_string(),
            database_url: None,
            allowed_origins: DEFAULT_ALLOWED_ORIGINS
                .iter()
                .map(|value| value.to_string())
                .collect(),
            session_ttl: Duration::from_secs(DEFAULT_SESSION_TTL_SECONDS),
            cookie_name: "ayurwell_session".to_string(),
            cookie_domain: "localhost".to_string(),
            cookie_secure: true,
            cookie_same_site: "strict".to_string(),
            api_rate_limit_window: Duration::from_secs(60),
            api_rate_limit_max: 80,
            auth_rate_limit_window: Duration::from_secs(60),
            auth_rate_limit_max: 12,
            tie_break: TieBreak::default(),
            admin_emails: parse_email_list(DEFAULT_ADMIN_EMAILS),
            assist: AssistConfig::default(),
        }
    }
}

impl ApiConfig {
    /// Reads `AYURWELL_*` variables over the defaults. Malformed values fall
    /// back to the default with a warning.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let tie_break = match env_value("AYURWELL_TIE_BREAK") {
            Some(raw) => TieBreak::parse(&raw).unwrap_or_else(|| {
                warn!(value = %raw, "unrecognized AYURWELL_TIE_BREAK, using default");
                defaults.tie_break
            }),
            None => defaults.tie_break,
        };

        Self {
            api_key: env_value("AYURWELL_API_KEY").unwrap_or(defaults.api_key),
            database_url: env_value("AYURWELL_DATABASE_URL"),
            allowed_origins: env_value("AYURWELL_ALLOWED_ORIGINS")
                .map(|value| parse_origin_list(&value))
                .filter(|origins| !origins.is_empty())
                .unwrap_or(defaults.allowed_origins),
            session_ttl: env_parsed::<u64>("AYURWELL_SESSION_TTL_SECONDS")
                .map(session_ttl_from_secs)
                .unwrap_or(defaults.session_ttl),
            cookie_name: env_value("AYURWELL_SESSION_COOKIE_NAME").unwrap_or(defaults.cookie_name),
            cookie_domain: env_value("AYURWELL_SESSION_COOKIE_DOMAIN")
                .unwrap_or(defaults.cookie_domain),
            cookie_secure: defaults.cookie_secure,
            cookie_same_site: sanitize_enum_value(
                env_value("AYURWELL_COOKIE_SAMESITE")
                    .unwrap_or(defaults.cookie_same_site)
                    .as_str(),
                &["strict", "lax", "none"],
                "strict",
            ),
            api_rate_limit_window: env_parsed::<u64>("AYURWELL_API_RATE_LIMIT_WINDOW_SECONDS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.api_rate_limit_window),
            api_rate_limit_max: env_parsed::<usize>("AYURWELL_API_RATE_LIMIT_MAX")
                .unwrap_or(defaults.api_rate_limit_max),
            auth_rate_limit_window: env_parsed::<u64>("AYURWELL_AUTH_RATE_LIMIT_WINDOW_SECONDS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.auth_rate_limit_window),
            auth_rate_limit_max: env_parsed::<usize>("AYURWELL_AUTH_RATE_LIMIT_MAX")
                .unwrap_or(defaults.auth_rate_limit_max),
            tie_break,
            admin_emails: env_value("AYURWELL_ADMIN_EMAILS")
                .map(|value| parse_email_list(&value))
                .unwrap_or(defaults.admin_emails),
            assist: AssistConfig::from_env(),
        }
    }

    pub fn is_admin_email(&self, email: &str) -> bool {
        let target = email.trim().to_lowercase();
        !target.is_empty() && self.admin_emails.iter().any(|value| *value == target)
    }
}

fn env_value(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn env_parsed<T: std::str::FromStr>(key: &str) -> Option<T> {
    let raw = env_value(key)?;
    match raw.parse::<T>() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(key, value = %raw, "ignoring unparsable setting");
            None
        }
    }
}

/// Session lifetimes are capped at one year.
pub(crate) fn session_ttl_from_secs(seconds: u64) -> Duration {
    if seconds > MAX_SESSION_TTL_SECONDS {
        warn!(seconds, max = MAX_SESSION_TTL_SECONDS, "session ttl capped");
    }
    Duration::from_secs(seconds.min(MAX_SESSION_TTL_SECONDS))
}

pub(crate) fn parse_origin_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|origin| origin.trim().trim_end_matches('/').to_string())
        .filter(|origin| !origin.is_empty())
        .collect()
}

pub(crate) fn parse_email_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|email| email.trim().to_lowercase())
        .filter(|email| !email.is_empty())
        .collect()
}

pub(crate) fn sanitize_enum_value(value: &str, allowed: &[&str], default_value: &str) -> String {
    let normalized = value.trim().to_lowercase();
    if allowed.iter().any(|candidate| *candidate == normalized) {
        normalized
    } else {
        default_value.to_string()
    }
}
