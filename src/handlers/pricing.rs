use std::sync::Arc;

use axum::extract::{Query, State};
use axum::Json;
use chrono::NaiveDate;
use serde::Deserialize;

use crate::errors::AppError;
use crate::models::PricePreview;
use crate::services::pricing;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct PreviewQuery {
    pub game_id: String,
    pub date: NaiveDate,
    pub players: u32,
}

// GET /api/pricing/preview?game_id=...&date=YYYY-MM-DD&players=N
pub async fn preview(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PreviewQuery>,
) -> Result<Json<PricePreview>, AppError> {
    let conn = state.conn()?;
    let preview = pricing::preview(&conn, &query.game_id, query.date, query.players)?;
    Ok(Json(preview))
}
