use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;

use crate::common::types::now_ms;

/// Every way a party request can be refused.
///
/// Validation variants go back to the caller only. `InternalInconsistency` is the one
/// structural failure: the session that raised it is closed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PartyError {
    #[error("party not found")]
    NotFound,
    #[error("party is full")]
    PartyFull,
    #[error("user already joined this party")]
    AlreadyJoined,
    #[error("user is not a member of this party")]
    NotMember,
    #[error("only the host may do that")]
    Forbidden,
    #[error("command references an outdated playback state")]
    StaleCommand,
    #[error("position must be a finite, non-negative number of seconds")]
    InvalidPosition,
    #[error("unsupported reaction emoji")]
    InvalidEmoji,
    #[error("message exceeds {0} characters")]
    TooLong(usize),
    #[error("message is empty")]
    Empty,
    #[error("invalid settings: {0}")]
    InvalidSettings(String),
    #[error("malformed content reference: {0}")]
    InvalidContentRef(String),
    #[error("unknown content: {0}")]
    UnknownContent(String),
    #[error("internal inconsistency: {0}")]
    InternalInconsistency(String),
    #[error("no unused party code available")]
    CodesExhausted,
}

impl PartyError {
    /// Stable wire identifier.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound => "notFound",
            Self::PartyFull => "partyFull",
            Self::AlreadyJoined => "alreadyJoined",
            Self::NotMember => "notMember",
            Self::Forbidden => "forbidden",
            Self::StaleCommand => "staleCommand",
            Self::InvalidPosition => "invalidPosition",
            Self::InvalidEmoji => "invalidEmoji",
            Self::TooLong(_) => "tooLong",
            Self::Empty => "empty",
            Self::InvalidSettings(_) => "invalidSettings",
            Self::InvalidContentRef(_) => "invalidContentRef",
            Self::UnknownContent(_) => "unknownContent",
            Self::InternalInconsistency(_) => "internalInconsistency",
            Self::CodesExhausted => "codesExhausted",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::NotFound | Self::NotMember | Self::UnknownContent(_) => StatusCode::NOT_FOUND,
            Self::PartyFull | Self::AlreadyJoined | Self::StaleCommand => StatusCode::CONFLICT,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::InternalInconsistency(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::CodesExhausted => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::BAD_REQUEST,
        }
    }
}

/// JSON error body returned by every REST route and by a refused WebSocket upgrade.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiError {
    /// Unix timestamp in milliseconds.
    pub timestamp: u64,
    /// HTTP status code.
    pub status: u16,
    /// HTTP status reason phrase (e.g. "Bad Request").
    pub error: String,
    /// Machine readable reason, the `PartyError::code` when there is one.
    pub code: String,
    pub message: String,
    /// The request path that caused the error.
    pub path: String,
}

impl ApiError {
    pub fn new(
        status: StatusCode,
        code: impl Into<String>,
        message: impl Into<String>,
        path: impl Into<String>,
    ) -> Self {
        Self {
            timestamp: now_ms(),
            status: status.as_u16(),
            error: status.canonical_reason().unwrap_or("Unknown").to_owned(),
            code: code.into(),
            message: message.into(),
            path: path.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>, path: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "badRequest", message, path)
    }

    pub fn unauthorized(path: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "unauthorized", "Unauthorized", path)
    }

    pub fn from_party(err: &PartyError, path: impl Into<String>) -> Self {
        Self::new(err.status(), err.code(), err.to_string(), path)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self)).into_response()
    }
}
