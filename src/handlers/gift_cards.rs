use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::errors::AppError;
use crate::services::gift_card;
use crate::state::AppState;

#[derive(Serialize)]
pub struct GiftCardBalance {
    pub code: String,
    pub amount: Decimal,
}

// GET /api/gift-cards/:code
pub async fn get_gift_card(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
) -> Result<Json<GiftCardBalance>, AppError> {
    let conn = state.conn()?;
    let amount = gift_card::peek(&conn, &code)?;
    Ok(Json(GiftCardBalance { code, amount }))
}
