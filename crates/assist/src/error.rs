use thiserror::Error;

#[derive(Debug, Error)]
pub enum AssistError {
    #[error("{0}")]
    InvalidRequest(String),
    #[error("{0} is not configured")]
    NotConfigured(&'static str),
    #[error("upstream returned status {status}: {body}")]
    Upstream { status: u16, body: String },
    #[error("upstream request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("upstream returned no result")]
    EmptyResult,
}

impl AssistError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidRequest(_) => "invalid_request",
            Self::NotConfigured(_) => "assist_not_configured",
            Self::Upstream { .. } => "upstream_error",
            Self::Transport(_) => "upstream_unreachable",
            Self::EmptyResult => "empty_result",
        }
    }
}

/// Pulls the provider's own error message out of a JSON error body, if any.
pub(crate) fn upstream_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|value| {
            value
                .pointer("/error/message")
                .and_then(|message| message.as_str())
                .map(|message| message.to_string())
        })
        .unwrap_or_else(|| body.trim().to_string())
}
