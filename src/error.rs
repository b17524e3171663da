use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde::Serialize;
use tracing::{error, warn};

use crate::gateway::GatewayError;
use crate::guard::GuardError;
use crate::repo::RepoError;
use crate::storage::MediaStoreError;

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ApiErrorBody {
    pub error: String,
}

#[derive(thiserror::Error, Debug)]
pub enum ApiError {
    #[error("{0}")] BadRequest(String),
    #[error("Unauthorized")] Unauthorized,
    #[error("Invalid email or password")] InvalidCredentials,
    #[error("{0}")] NotFound(String),
    #[error("{0}")] Conflict(String),
    #[error("File too large")] PayloadTooLarge,
    #[error("Only image uploads are allowed")] UnsupportedMediaType,
    #[error("Too many requests")] TooManyRequests,
    #[error("{0}")] ServiceUnavailable(String),
    #[error("{0}")] Internal(String),
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        ApiError::BadRequest(msg.into())
    }
}

impl From<RepoError> for ApiError {
    fn from(e: RepoError) -> Self {
        match e {
            RepoError::NotFound => ApiError::NotFound("Not found".into()),
            RepoError::Conflict => ApiError::Conflict("Already exists".into()),
            RepoError::Internal(msg) => ApiError::Internal(msg),
        }
    }
}

impl From<GuardError> for ApiError {
    fn from(e: GuardError) -> Self {
        match e {
            GuardError::NotFoundOrUnauthorized(_) => ApiError::NotFound(e.to_string()),
            GuardError::Store(msg) => ApiError::Internal(msg),
        }
    }
}

impl From<GatewayError> for ApiError {
    fn from(e: GatewayError) -> Self {
        match e {
            GatewayError::InvalidCredentials => ApiError::InvalidCredentials,
            GatewayError::Unauthorized => ApiError::Unauthorized,
            GatewayError::Rejected(msg) => ApiError::BadRequest(msg),
            GatewayError::Transport(msg) => {
                warn!(error = %msg, "auth service unavailable");
                ApiError::ServiceUnavailable("Authentication service unavailable".into())
            }
            GatewayError::Decode(msg) => ApiError::Internal(msg),
        }
    }
}

impl From<MediaStoreError> for ApiError {
    fn from(e: MediaStoreError) -> Self {
        ApiError::Internal(e.to_string())
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized | ApiError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::UnsupportedMediaType => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            ApiError::TooManyRequests => StatusCode::TOO_MANY_REQUESTS,
            ApiError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        if let ApiError::Internal(cause) = self {
            error!(%cause, "request failed");
        }
        HttpResponse::build(self.status_code()).json(ApiErrorBody { error: self.to_string() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guard::Resource;

    #[test]
    fn guard_failures_collapse_to_not_found() {
        let err: ApiError = GuardError::NotFoundOrUnauthorized(Resource::Photo).into();
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(err.to_string(), "Photo not found or unauthorized");
    }

    #[test]
    fn gateway_credentials_map_to_401() {
        let err: ApiError = GatewayError::InvalidCredentials.into();
        assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(err.to_string(), "Invalid email or password");
    }

    #[test]
    fn store_failures_surface_message() {
        let err: ApiError = RepoError::Internal("connection reset".into()).into();
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.to_string(), "connection reset");
    }
}
