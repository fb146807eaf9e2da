pub mod admin;
pub mod availability;
pub mod bookings;
pub mod gift_cards;
pub mod health;
pub mod pricing;
pub mod webhook;

use std::sync::Arc;

use axum::http::HeaderMap;
use axum::routing::{get, post};
use axum::Router;

use crate::errors::AppError;
use crate::models::Actor;
use crate::state::AppState;

/// Upstream auth proxies put the authenticated user id here.
pub const USER_ID_HEADER: &str = "x-user-id";

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}

fn is_admin(headers: &HeaderMap, admin_token: &str) -> bool {
    !admin_token.is_empty() && bearer_token(headers) == Some(admin_token)
}

/// Caller identity: admin bearer token first, then the user id header, else an
/// anonymous guest.
pub fn resolve_actor(headers: &HeaderMap, admin_token: &str) -> Actor {
    if is_admin(headers, admin_token) {
        return Actor::admin();
    }
    headers
        .get(USER_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(Actor::user)
        .unwrap_or_default()
}

pub fn require_admin(headers: &HeaderMap, admin_token: &str) -> Result<(), AppError> {
    if is_admin(headers, admin_token) {
        Ok(())
    } else {
        Err(AppError::Unauthorized)
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route("/api/availability", get(availability::get_availability))
        .route("/api/pricing/preview", get(pricing::preview))
        .route("/api/gift-cards/:code", get(gift_cards::get_gift_card))
        .route(
            "/api/bookings",
            get(bookings::list_my_bookings).post(bookings::create_booking),
        )
        .route("/api/bookings/:id", get(bookings::get_booking))
        .route("/api/bookings/:id/cancel", post(bookings::cancel_booking))
        .route("/webhook/payment", post(webhook::payment_webhook))
        .route("/api/admin/bookings", get(admin::list_bookings))
        .route("/api/admin/bookings/:id/status", post(admin::update_status))
        .with_state(state)
}
