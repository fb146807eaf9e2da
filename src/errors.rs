use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::{NaiveDate, NaiveTime};

use crate::models::BookingStatus;

/// Why a gift card cannot be used for the requested operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum GiftCardError {
    #[error("gift card already redeemed")]
    AlreadyRedeemed,

    #[error("gift card not activated yet")]
    NotActivated,

    #[error("gift card is being used by someone else")]
    InUse,

    #[error("gift card is expired")]
    Expired,
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("invalid range: end date {end} is before start date {start}")]
    InvalidRange { start: NaiveDate, end: NaiveDate },

    #[error("player count {players} not allowed for game '{game}' ({min}-{max})")]
    InvalidPlayerCount {
        game: String,
        players: u32,
        min: u32,
        max: u32,
    },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("insufficient capacity for {date} {time}: {reason}")]
    InsufficientCapacity {
        date: NaiveDate,
        time: NaiveTime,
        reason: String,
    },

    #[error(transparent)]
    GiftCard(#[from] GiftCardError),

    #[error("illegal booking status transition: {from} -> {to}")]
    IllegalStateTransition {
        from: BookingStatus,
        to: BookingStatus,
    },

    #[error("configuration error: no pricing tier matches {players} players")]
    NoMatchingTier { players: u32 },

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("booking {0} was modified concurrently")]
    VersionConflict(String),

    #[error("timed out waiting for lock on {0}")]
    LockTimeout(String),

    #[error("payment provider error: {0}")]
    Payment(String),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("unauthorized")]
    Unauthorized,

    #[error("forbidden")]
    Forbidden,
}

impl AppError {
    /// Stable machine-readable error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Validation(_)
            | AppError::InvalidRange { .. }
            | AppError::InvalidPlayerCount { .. } => "validation_error",
            AppError::NotFound(_) => "not_found",
            AppError::InsufficientCapacity { .. } => "insufficient_capacity",
            AppError::GiftCard(GiftCardError::AlreadyRedeemed) => "gift_card_already_redeemed",
            AppError::GiftCard(GiftCardError::NotActivated) => "gift_card_not_activated",
            AppError::GiftCard(GiftCardError::InUse) => "gift_card_in_use",
            AppError::GiftCard(GiftCardError::Expired) => "gift_card_expired",
            AppError::IllegalStateTransition { .. } => "illegal_state_transition",
            AppError::NoMatchingTier { .. } | AppError::Configuration(_) => "configuration_error",
            AppError::VersionConflict(_) => "version_conflict",
            AppError::LockTimeout(_) => "lock_timeout",
            AppError::Payment(_) => "payment_error",
            AppError::Database(_) | AppError::Internal(_) => "internal_error",
            AppError::Unauthorized => "unauthorized",
            AppError::Forbidden => "forbidden",
        }
    }

    /// Lock or database contention that may succeed when retried.
    pub fn is_contention(&self) -> bool {
        match self {
            AppError::LockTimeout(_) => true,
            AppError::Database(rusqlite::Error::SqliteFailure(e, _)) => matches!(
                e.code,
                rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked
            ),
            _ => false,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Validation(_)
            | AppError::InvalidRange { .. }
            | AppError::InvalidPlayerCount { .. } => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::InsufficientCapacity { .. } => StatusCode::CONFLICT,
            AppError::GiftCard(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::IllegalStateTransition { .. } => StatusCode::CONFLICT,
            AppError::VersionConflict(_) => StatusCode::CONFLICT,
            AppError::LockTimeout(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Payment(_) => StatusCode::BAD_GATEWAY,
            AppError::NoMatchingTier { .. }
            | AppError::Configuration(_)
            | AppError::Database(_)
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Forbidden => StatusCode::FORBIDDEN,
        };

        if status.is_server_error() {
            tracing::error!(error = %self, kind = self.kind(), "request failed");
        }

        let body = serde_json::json!({ "error": self.to_string(), "kind": self.kind() });
        (status, axum::Json(body)).into_response()
    }
}
