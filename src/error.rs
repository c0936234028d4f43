use actix_web::{HttpResponse, ResponseError};
use serde::Serialize;

use crate::ledger::LedgerError;
use crate::repo::RepoError;
use crate::storage::MediaStoreError;

#[derive(Debug, Serialize)]
pub struct ApiErrorBody {
    pub error: String,
}

#[derive(thiserror::Error, Debug)]
pub enum ApiError {
    #[error("{0}")] InvalidPayload(String),
    #[error("Daily vote limit reached ({0})")] QuotaExceeded(i64),
    /// Quota hit reported by a store that does not know the configured limit.
    #[error("Daily vote limit reached")] QuotaReached,
    #[error("Already voted for this post today")] DuplicateVote,
    #[error("not found")] NotFound,
    #[error("unauthorized")] Unauthorized,
    #[error("conflict")] Conflict,
    #[error("too many requests")] RateLimited,
    #[error("payload too large")] PayloadTooLarge,
    #[error("unsupported media type")] UnsupportedMediaType,
    #[error("internal error")] Internal,
}

impl From<RepoError> for ApiError {
    fn from(e: RepoError) -> Self {
        match e {
            RepoError::NotFound => ApiError::NotFound,
            RepoError::Conflict => ApiError::Conflict,
            RepoError::Invalid(msg) => ApiError::InvalidPayload(msg),
            RepoError::QuotaExceeded => ApiError::QuotaReached,
            RepoError::DuplicateVote => ApiError::DuplicateVote,
            RepoError::Internal(msg) => {
                tracing::error!(error = %msg, "store failure");
                ApiError::Internal
            }
        }
    }
}

impl From<LedgerError> for ApiError {
    fn from(e: LedgerError) -> Self {
        match e {
            LedgerError::InvalidPayload(_) => ApiError::InvalidPayload("Invalid vote payload".into()),
            LedgerError::QuotaExceeded(quota) => ApiError::QuotaExceeded(quota),
            LedgerError::DuplicateVote => ApiError::DuplicateVote,
            LedgerError::StoreUnavailable(msg) => {
                tracing::error!(error = %msg, "vote ledger store failure");
                ApiError::Internal
            }
        }
    }
}

impl From<MediaStoreError> for ApiError {
    fn from(e: MediaStoreError) -> Self {
        match e {
            MediaStoreError::NotFound => ApiError::NotFound,
            MediaStoreError::InvalidKey => ApiError::InvalidPayload("invalid media key".into()),
            MediaStoreError::Duplicate => ApiError::Conflict,
            MediaStoreError::Other(msg) => {
                tracing::error!(error = %msg, "media store failure");
                ApiError::Internal
            }
        }
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> actix_web::http::StatusCode {
        use actix_web::http::StatusCode;
        match self {
            ApiError::InvalidPayload(_) => StatusCode::BAD_REQUEST,
            ApiError::QuotaExceeded(_) | ApiError::QuotaReached | ApiError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ApiError::DuplicateVote | ApiError::Conflict => StatusCode::CONFLICT,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::UnsupportedMediaType => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(ApiErrorBody { error: self.to_string() })
    }
}
