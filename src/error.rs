use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// AppError
///
/// The error taxonomy surfaced by the user routes. Guards and handlers return it directly;
/// `IntoResponse` turns every variant into a status code plus a JSON body of the form
/// `{"status": "fail" | "error", "message": "..."}`.
#[derive(Debug, Error)]
pub enum AppError {
    /// 401: missing, invalid, expired or revoked credential.
    #[error("{0}")]
    Unauthenticated(String),

    /// 403: authenticated, but the role is not allowed on this route.
    #[error("{0}")]
    Forbidden(String),

    /// 404: the targeted user does not exist.
    #[error("{0}")]
    NotFound(String),

    /// 400: failed validation, bad login credentials or a duplicate unique field.
    #[error("{0}")]
    InvalidInput(String),

    /// 500: anything unexpected. The cause is logged, never sent to the client.
    #[error("internal server error: {0}")]
    ServerError(String),
}

impl AppError {
    pub fn unauthenticated(message: impl Into<String>) -> Self {
        Self::Unauthenticated(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    pub fn server(cause: impl std::fmt::Display) -> Self {
        Self::ServerError(cause.to_string())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Self::ServerError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let (kind, message) = match &self {
            Self::ServerError(cause) => {
                tracing::error!(%cause, "request failed with a server error");
                ("error", "Something went wrong".to_string())
            }
            other => ("fail", other.to_string()),
        };

        (status, Json(json!({ "status": kind, "message": message }))).into_response()
    }
}

/// RepositoryError
///
/// Failures reported by the persistence layer, independent of the HTTP surface.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// A unique column (pseudo or email) already holds the submitted value.
    #[error("{0} is already taken")]
    Conflict(&'static str),

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

impl From<RepositoryError> for AppError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::Conflict(field) => {
                AppError::InvalidInput(format!("{field} is already taken"))
            }
            RepositoryError::Database(e) => AppError::server(e),
        }
    }
}
