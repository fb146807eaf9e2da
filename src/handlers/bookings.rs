use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;

use super::resolve_actor;
use crate::errors::AppError;
use crate::models::{Actor, Booking, BookingResult, CreateBookingRequest};
use crate::services::booking;
use crate::state::AppState;

fn authorize(actor: &Actor, booking: &Booking) -> Result<(), AppError> {
    if actor.may_manage(booking) {
        return Ok(());
    }
    if actor.user_id.is_none() {
        Err(AppError::Unauthorized)
    } else {
        Err(AppError::Forbidden)
    }
}

// POST /api/bookings
pub async fn create_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<CreateBookingRequest>,
) -> Result<(StatusCode, Json<BookingResult>), AppError> {
    let actor = resolve_actor(&headers, &state.config.admin_token);
    let result = booking::create_booking(&state, request, actor.user_id.as_deref()).await?;
    Ok((StatusCode::CREATED, Json(result)))
}

// GET /api/bookings
pub async fn list_my_bookings(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<Booking>>, AppError> {
    let actor = resolve_actor(&headers, &state.config.admin_token);
    let user_id = actor.user_id.ok_or(AppError::Unauthorized)?;
    Ok(Json(booking::list_bookings_for_user(&state, &user_id)?))
}

// GET /api/bookings/:id
pub async fn get_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Booking>, AppError> {
    let actor = resolve_actor(&headers, &state.config.admin_token);
    let found = booking::get_booking(&state, &id)?;
    authorize(&actor, &found)?;
    Ok(Json(found))
}

// POST /api/bookings/:id/cancel
pub async fn cancel_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Booking>, AppError> {
    let actor = resolve_actor(&headers, &state.config.admin_token);
    let found = booking::get_booking(&state, &id)?;
    authorize(&actor, &found)?;
    Ok(Json(booking::cancel_booking(&state, &id, &actor).await?))
}
