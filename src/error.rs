use http::StatusCode;
use thiserror::Error;
use crate::auth::AuthError;

/// every way a request can fail, each mapped to one http status
#[derive(Debug, Error)]
pub enum ApiError {
    /// missing or malformed request fields
    #[error("{0}")]
    Validation(String),

    /// email already registered
    #[error("{0}")]
    Conflict(String),

    /// missing/invalid token, or bad login credentials
    #[error("{0}")]
    Unauthenticated(String),

    #[error("{0}")]
    NotFound(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("{0}")]
    Internal(String),
}

impl warp::reject::Reject for ApiError {}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Hash(_) | AuthError::Encode(_) => ApiError::Internal(err.to_string()),
            _ => ApiError::Unauthenticated(err.to_string()),
        }
    }
}

impl ApiError {
    pub fn validation(msg: impl Into<String>) -> Self {
        ApiError::Validation(msg.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) | ApiError::Conflict(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Database(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// message safe to show the caller; server-side failures are not described
    pub fn public_message(&self) -> String {
        match self {
            ApiError::Database(_) | ApiError::Internal(_) => "internal server error".to_string(),
            other => other.to_string(),
        }
    }

    pub fn is_internal(&self) -> bool {
        self.status() == StatusCode::INTERNAL_SERVER_ERROR
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_failures_become_401_but_hashing_failures_do_not() {
        let err = ApiError::from(AuthError::Expired);
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(err.public_message(), "Token has expired");

        let io_err = std::io::Error::new(std::io::ErrorKind::Other, "no entropy");
        let err = ApiError::from(AuthError::Hash(io_err));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.public_message(), "internal server error");
        assert!(err.is_internal());
    }

    #[test]
    fn conflict_and_validation_share_400() {
        assert_eq!(ApiError::Conflict("User already exists".into()).status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::validation("email is required").status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::validation("email is required").public_message(), "email is required");
    }
}
