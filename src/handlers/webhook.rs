use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use serde_json::{json, Value};

use crate::errors::AppError;
use crate::services::booking;
use crate::services::payment::{self, PaymentEvent, PaymentEventKind};
use crate::state::AppState;

pub const SIGNATURE_HEADER: &str = "x-payment-signature";

// POST /webhook/payment
pub async fn payment_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, AppError> {
    // Skip verification if the secret is empty (dev mode)
    let secret = &state.config.payment_webhook_secret;
    if !secret.is_empty() {
        let signature = headers
            .get(SIGNATURE_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");

        if signature.is_empty() {
            tracing::warn!("missing X-Payment-Signature header");
            return Err(AppError::Unauthorized);
        }
        if !payment::verify_signature(secret, &body, signature) {
            tracing::warn!("invalid payment webhook signature");
            return Err(AppError::Unauthorized);
        }
    }

    let event: PaymentEvent = serde_json::from_slice(&body)
        .map_err(|e| AppError::Validation(format!("invalid payment event: {e}")))?;

    tracing::info!(reference = %event.reference, event = ?event.event, "payment webhook");

    let booking = match event.event {
        PaymentEventKind::Completed => booking::confirm_payment(&state, &event.reference).await?,
        PaymentEventKind::Expired => booking::fail_payment(&state, &event.reference).await?,
    };

    Ok(Json(json!({
        "booking_id": booking.id,
        "status": booking.status,
    })))
}
