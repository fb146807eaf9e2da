use chrono::NaiveDate;
use rusqlite::Connection;
use rust_decimal::Decimal;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::Promotion;

/// Picks the promotion with the largest discount among `candidates` that apply to
/// `game_id` on `date`.
///
/// When several promotions share the largest discount, which one is returned is
/// unspecified. Callers must not depend on the name of a tied winner.
pub fn pick_best(candidates: Vec<Promotion>, game_id: Option<&str>, date: NaiveDate) -> Option<Promotion> {
    candidates
        .into_iter()
        .filter(|p| p.applies_to(game_id, date))
        .max_by(|a, b| a.discount.cmp(&b.discount))
}

pub fn best_promotion(
    conn: &Connection,
    game_id: Option<&str>,
    date: NaiveDate,
) -> Result<Option<Promotion>, AppError> {
    let candidates = queries::get_applicable_promotions(conn, game_id, &date)?;
    Ok(pick_best(candidates, game_id, date))
}

/// Discount fraction for `game_id` on `date`, zero when nothing applies.
pub fn resolve_discount_fraction(
    conn: &Connection,
    game_id: Option<&str>,
    date: NaiveDate,
) -> Result<Decimal, AppError> {
    Ok(best_promotion(conn, game_id, date)?
        .map(|p| p.discount)
        .unwrap_or(Decimal::ZERO))
}
