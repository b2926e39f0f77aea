use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use thiserror::Error;

use crate::auth::AuthError;
use crate::models::ApiResponse;
use crate::repos::RepoError;
use crate::uploads::UploadError;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("Internal server error")]
    Internal(String),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    /// Log the cause server-side; the client only sees a generic message.
    pub fn internal(cause: impl std::fmt::Display) -> Self {
        let cause = cause.to_string();
        log::error!("{}", cause);
        ApiError::Internal(cause)
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(ApiResponse::<()>::error(self.to_string()))
    }
}

impl From<RepoError> for ApiError {
    fn from(e: RepoError) -> Self {
        match e {
            RepoError::NotFound(_) => ApiError::NotFound(e.to_string()),
            RepoError::Forbidden(msg) => ApiError::Forbidden(msg),
            RepoError::Validation(msg) => ApiError::BadRequest(msg),
            RepoError::Conflict(msg) => ApiError::Conflict(msg),
            RepoError::Store(_) => ApiError::internal(e),
        }
    }
}

impl From<UploadError> for ApiError {
    fn from(e: UploadError) -> Self {
        match e {
            UploadError::UnsupportedType(_) | UploadError::TooLarge(_) | UploadError::InvalidName => {
                ApiError::BadRequest(e.to_string())
            }
            UploadError::NotFound => ApiError::NotFound(e.to_string()),
            UploadError::Io(_) => ApiError::internal(e),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::Missing | AuthError::Token(_) => ApiError::Unauthorized("Authentication required".to_string()),
            AuthError::Hash(_) => ApiError::internal(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::StoreError;

    #[test]
    fn test_repo_error_mapping() {
        let not_found: ApiError = RepoError::NotFound("Project 4".to_string()).into();
        assert_eq!(not_found.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(not_found.to_string(), "Project 4 not found");

        let forbidden: ApiError = RepoError::Forbidden("no".to_string()).into();
        assert_eq!(forbidden.status_code(), StatusCode::FORBIDDEN);

        let store: ApiError = RepoError::Store(StoreError::Conflict("faq".to_string())).into();
        assert_eq!(store.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        // Storage details never reach the client
        assert_eq!(store.to_string(), "Internal server error");
    }
}
