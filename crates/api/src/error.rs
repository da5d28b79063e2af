use ayurwell_assist::AssistError;
use ayurwell_wellness::ServiceError;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("sign in first")]
    NotAuthenticated,
    #[error("admin role required")]
    AdminRequired,
    #[error("{message}")]
    Forbidden {
        code: &'static str,
        message: &'static str,
    },
    #[error("{message}")]
    NotFound {
        code: &'static str,
        message: &'static str,
    },
    #[error("{0}")]
    MalformedAnswers(String),
    #[error("{}", .0.body_text())]
    Body(JsonRejection),
    #[error(transparent)]
    Service(#[from] ServiceError),
    #[error(transparent)]
    Assist(#[from] AssistError),
}

impl ApiError {
    fn parts(&self) -> (StatusCode, &'static str) {
        match self {
            Self::NotAuthenticated => (StatusCode::UNAUTHORIZED, "not_authenticated"),
            Self::AdminRequired => (StatusCode::FORBIDDEN, "admin_required"),
            Self::Forbidden { code, .. } => (StatusCode::FORBIDDEN, *code),
            Self::NotFound { code, .. } => (StatusCode::NOT_FOUND, *code),
            Self::MalformedAnswers(_) => (StatusCode::UNPROCESSABLE_ENTITY, "invalid_answer"),
            Self::Body(rejection) => (rejection.status(), "invalid_body"),
            Self::Service(ServiceError::InvalidAnswer(_)) => {
                (StatusCode::UNPROCESSABLE_ENTITY, "invalid_answer")
            }
            Self::Service(ServiceError::Validation(_)) => {
                (StatusCode::BAD_REQUEST, "validation_failed")
            }
            Self::Service(ServiceError::NotFound(_)) => (StatusCode::NOT_FOUND, "not_found"),
            Self::Service(ServiceError::Storage(_)) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error")
            }
            Self::Assist(AssistError::InvalidRequest(_)) => {
                (StatusCode::BAD_REQUEST, "invalid_request")
            }
            Self::Assist(AssistError::NotConfigured(_)) => {
                (StatusCode::SERVICE_UNAVAILABLE, "assist_not_configured")
            }
            Self::Assist(err) => (StatusCode::BAD_GATEWAY, err.code()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.parts();

        let mut body = serde_json::json!({
            "error": code,
            "message": self.to_string(),
        });
        match &self {
            Self::Service(ServiceError::InvalidAnswer(reason)) => {
                body["reason"] = serde_json::json!(reason.code());
            }
            Self::MalformedAnswers(_) => {
                body["reason"] = serde_json::json!("malformed_answers");
            }
            Self::Service(ServiceError::Storage(err)) => {
                error!(error = ?err, "storage failure");
                body["message"] = serde_json::json!("internal error");
            }
            _ => {}
        }

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use ayurwell_core::InvalidAnswer;

    use super::*;

    #[test]
    fn invalid_answer_maps_to_unprocessable() {
        let err = ApiError::from(ServiceError::from(InvalidAnswer::Missing { question: 2 }));
        assert_eq!(err.parts(), (StatusCode::UNPROCESSABLE_ENTITY, "invalid_answer"));
    }

    #[test]
    fn assist_errors_map_to_gateway_statuses() {
        let missing = ApiError::from(AssistError::NotConfigured("speech synthesis"));
        assert_eq!(missing.parts().0, StatusCode::SERVICE_UNAVAILABLE);

        let upstream = ApiError::from(AssistError::Upstream {
            status: 429,
            body: "quota".to_string(),
        });
        assert_eq!(upstream.parts(), (StatusCode::BAD_GATEWAY, "upstream_error"));
    }

    #[test]
    fn malformed_answers_share_the_invalid_answer_code() {
        let err = ApiError::MalformedAnswers("answers: invalid type".to_string());
        assert_eq!(err.parts(), (StatusCode::UNPROCESSABLE_ENTITY, "invalid_answer"));
    }

    #[test]
    fn storage_failures_hide_details() {
        let response =
            ApiError::from(ServiceError::Storage(anyhow::anyhow!("disk full"))).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
