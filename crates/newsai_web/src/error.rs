use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

use crate::envelope::ErrorBody;

pub const INTERNAL_MESSAGE: &str = "An unexpected error occurred.";

/// Errors surfaced to API clients. The variant decides status and title.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Authentication(String),

    #[error("{0}")]
    UserDoesNotExist(String),

    #[error("{0}")]
    DuplicateInterest(String),

    #[error("{0}")]
    ArticleNotFound(String),

    /// Generic client error.
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Validation(String),

    /// Errors produced by the HTTP layer itself (routing, method, body limits).
    #[error("{message}")]
    Http { status: StatusCode, message: String },

    #[error(transparent)]
    Internal(#[from] newsai_core::Error),
}

impl ApiError {
    pub fn http(status: StatusCode) -> Self {
        Self::Http {
            status,
            message: status.canonical_reason().unwrap_or("Error").to_string(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Authentication(_) | Self::UserDoesNotExist(_) => StatusCode::UNAUTHORIZED,
            Self::DuplicateInterest(_) => StatusCode::CONFLICT,
            Self::ArticleNotFound(_) => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Http { status, .. } => *status,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Self::Authentication(_) => "AuthenticationError",
            Self::UserDoesNotExist(_) => "UserDoesNotExist",
            Self::DuplicateInterest(_) => "DuplicateInterestError",
            Self::ArticleNotFound(_) => "ArticleNotFound",
            Self::BadRequest(_) => "APIError",
            Self::Validation(_) => "Validation Error",
            Self::Http { .. } => "HTTP Error",
            Self::Internal(_) => "Internal Server Error",
        }
    }

    /// Client-facing message; internal details never leave the server.
    pub fn message(&self) -> String {
        match self {
            Self::Internal(_) => INTERNAL_MESSAGE.to_string(),
            other => other.to_string(),
        }
    }

    pub fn body(&self) -> ErrorBody {
        ErrorBody {
            code: self.status().as_u16(),
            title: self.title().to_string(),
            message: self.message(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let Self::Internal(source) = &self {
            tracing::error!(error = %source, "Unhandled error");
        }
        (self.status(), Json(self.body())).into_response()
    }
}

/// The 500 envelope, for failures that never produced an `ApiError`.
pub fn internal_error_response() -> Response {
    let body = ErrorBody {
        code: StatusCode::INTERNAL_SERVER_ERROR.as_u16(),
        title: "Internal Server Error".to_string(),
        message: INTERNAL_MESSAGE.to_string(),
    };
    (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_titles_and_statuses() {
        let cases = [
            (ApiError::Authentication("Not authenticated".into()), 401, "AuthenticationError"),
            (ApiError::UserDoesNotExist("gone".into()), 401, "UserDoesNotExist"),
            (
                ApiError::DuplicateInterest("Interest already added".into()),
                409,
                "DuplicateInterestError",
            ),
            (ApiError::ArticleNotFound("missing".into()), 404, "ArticleNotFound"),
            (ApiError::BadRequest("Interest not found".into()), 400, "APIError"),
            (ApiError::Validation("bad".into()), 422, "Validation Error"),
            (ApiError::http(StatusCode::METHOD_NOT_ALLOWED), 405, "HTTP Error"),
        ];
        for (err, status, title) in cases {
            let body = err.body();
            assert_eq!(body.code, status);
            assert_eq!(body.title, title);
        }
    }

    #[test]
    fn test_internal_message_is_generic() {
        let err = ApiError::from(newsai_core::Error::Database("disk I/O error".into()));
        let body = err.body();
        assert_eq!(body.code, 500);
        assert_eq!(body.message, INTERNAL_MESSAGE);
    }

    #[test]
    fn test_http_error_uses_reason_phrase() {
        assert_eq!(ApiError::http(StatusCode::NOT_FOUND).message(), "Not Found");
    }
}
