//! HTTP error mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use mediagate_sessions::SessionError;
use serde::Serialize;

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

/// Every client-visible failure. The `Display` text is the `error` field
/// of the JSON body, except for `Internal`, which is logged and answered
/// with an empty 500.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("register a key first")]
    SessionNotFound,
    #[error("your key has expired")]
    SessionExpired,
    #[error("authenticate first")]
    NotAuthenticated,
    #[error("cipher suite mismatch")]
    SuiteMismatch,
    #[error("{0}")]
    BadRequest(&'static str),
    #[error("invalid client certificate")]
    InvalidCertificate,
    #[error("client authentication failed")]
    ClientAuthFailed,
    #[error("invalid media id hmac")]
    InvalidMediaIdHmac,
    #[error("invalid media chunk hmac")]
    InvalidChunkHmac,
    #[error("invalid chunk id")]
    InvalidChunkId,
    #[error("media file not found")]
    MediaNotFound,
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn internal(e: impl std::fmt::Display) -> Self {
        Self::Internal(e.to_string())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::SessionNotFound
            | Self::SessionExpired
            | Self::NotAuthenticated
            | Self::ClientAuthFailed => StatusCode::UNAUTHORIZED,
            Self::SuiteMismatch
            | Self::BadRequest(_)
            | Self::InvalidCertificate
            | Self::InvalidMediaIdHmac
            | Self::InvalidChunkHmac
            | Self::InvalidChunkId => StatusCode::BAD_REQUEST,
            Self::MediaNotFound => StatusCode::NOT_FOUND,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<SessionError> for ApiError {
    fn from(e: SessionError) -> Self {
        match e {
            SessionError::NotFound => Self::SessionNotFound,
            SessionError::Expired => Self::SessionExpired,
            SessionError::SuiteMismatch => Self::SuiteMismatch,
            SessionError::NotAuthenticated => Self::NotAuthenticated,
            SessionError::Ratchet => Self::internal(e),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if let Self::Internal(detail) = &self {
            tracing::error!(error = %detail, "request failed");
            return status.into_response();
        }
        tracing::debug!(status = status.as_u16(), error = %self, "request rejected");
        (status, Json(ErrorBody { error: self.to_string() })).into_response()
    }
}
