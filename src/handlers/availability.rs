use std::sync::Arc;

use axum::extract::{Query, State};
use axum::Json;
use chrono::NaiveDate;
use serde::Deserialize;

use crate::errors::AppError;
use crate::models::DaySchedule;
use crate::services::availability;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct AvailabilityQuery {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub game_id: Option<String>,
}

// GET /api/availability?start=YYYY-MM-DD&end=YYYY-MM-DD&game_id=...
pub async fn get_availability(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AvailabilityQuery>,
) -> Result<Json<Vec<DaySchedule>>, AppError> {
    let now = state.clock.now();
    let conn = state.conn()?;
    let days = availability::compute_availability(
        &conn,
        query.start,
        query.end,
        query.game_id.as_deref().filter(|g| !g.is_empty()),
        now,
        state.config.hold_window(),
    )?;
    Ok(Json(days))
}
