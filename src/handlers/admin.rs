use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::Deserialize;

use super::require_admin;
use crate::errors::AppError;
use crate::models::{Booking, BookingStatus};
use crate::services::booking;
use crate::state::AppState;

const DEFAULT_LIMIT: i64 = 100;

#[derive(Deserialize)]
pub struct BookingsQuery {
    pub status: Option<BookingStatus>,
    pub limit: Option<i64>,
}

// GET /api/admin/bookings?status=pending&limit=50
pub async fn list_bookings(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<BookingsQuery>,
) -> Result<Json<Vec<Booking>>, AppError> {
    require_admin(&headers, &state.config.admin_token)?;
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, 1000);
    Ok(Json(booking::list_bookings(&state, query.status, limit)?))
}

#[derive(Deserialize)]
pub struct StatusUpdate {
    pub status: BookingStatus,
}

// POST /api/admin/bookings/:id/status
pub async fn update_status(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(update): Json<StatusUpdate>,
) -> Result<Json<Booking>, AppError> {
    require_admin(&headers, &state.config.admin_token)?;
    Ok(Json(booking::update_status(&state, &id, update.status).await?))
}
