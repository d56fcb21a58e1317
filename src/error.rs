use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde_json::{json, Value};
use thiserror::Error;

// Every failure an endpoint can surface. Upstream bodies travel along as
// `details` so the caller sees what the provider actually said.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0} is not configured")]
    MissingConfig(&'static str),

    #[error("{0}")]
    BadRequest(String),

    #[error("upstream request failed with status {status}")]
    Upstream { status: u16, details: Value },

    #[error("request failed: {0}")]
    Transport(String),

    #[error("request timed out")]
    Timeout,

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ApiError::Timeout
        } else {
            ApiError::Transport(err.to_string())
        }
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::MissingConfig(_)
            | ApiError::Upstream { .. }
            | ApiError::Transport(_)
            | ApiError::Timeout
            | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let mut body = json!({ "error": self.to_string() });
        if let ApiError::Upstream { details, .. } = self {
            body["details"] = details.clone();
        }
        HttpResponse::build(self.status_code()).json(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bad_request_maps_to_400() {
        let err = ApiError::BadRequest("threadId is required".to_string());
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn server_side_failures_map_to_500() {
        let errors = [
            ApiError::MissingConfig("OPENAI_API_KEY"),
            ApiError::Upstream { status: 429, details: Value::Null },
            ApiError::Transport("connection refused".to_string()),
            ApiError::Timeout,
            ApiError::Internal("lock poisoned".to_string()),
        ];
        for err in errors {
            assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        }
    }

    #[test]
    fn upstream_error_carries_details() {
        let err = ApiError::Upstream {
            status: 503,
            details: json!({ "message": "overloaded" }),
        };
        let response = err.error_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
