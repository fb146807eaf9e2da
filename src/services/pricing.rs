use chrono::NaiveDate;
use rusqlite::Connection;
use rust_decimal::prelude::*;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::{Game, LinePrice, PricePreview, TierTable};
use crate::services::promotion;

/// Monetary values carry two decimal places, rounded half-up.
const DECIMAL_PLACES: u32 = 2;

pub fn round2(amount: Decimal) -> Decimal {
    let mut rounded = amount.round_dp_with_strategy(DECIMAL_PLACES, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(DECIMAL_PLACES);
    rounded
}

/// `round2(amount * (1 - fraction))`. Fractions at or below zero leave the amount
/// unchanged; fractions above one are treated as one.
pub fn apply_discount(amount: Decimal, fraction: Decimal) -> Decimal {
    if fraction <= Decimal::ZERO {
        return round2(amount);
    }
    let fraction = fraction.min(Decimal::ONE);
    round2(amount * (Decimal::ONE - fraction))
}

fn base_price(tiers: &TierTable, game: &Game, players: u32) -> Result<Decimal, AppError> {
    if !game.allows_players(players) {
        return Err(AppError::InvalidPlayerCount {
            game: game.id.clone(),
            players,
            min: game.min_players,
            max: game.max_players,
        });
    }
    let per_player = tiers.price_per_player(players)?;
    Ok(round2(per_player * Decimal::from(players)))
}

pub fn price_line(
    conn: &Connection,
    tiers: &TierTable,
    game: &Game,
    players: u32,
    date: NaiveDate,
) -> Result<LinePrice, AppError> {
    let base = base_price(tiers, game, players)?;
    let discount_fraction = promotion::resolve_discount_fraction(conn, Some(&game.id), date)?;
    Ok(LinePrice {
        base,
        final_price: apply_discount(base, discount_fraction),
        discount_fraction,
    })
}

/// Prices every `(game, players)` line for `date`. Returns the per-line prices in
/// input order and their summed total.
pub fn price_booking(
    conn: &Connection,
    tiers: &TierTable,
    lines: &[(&Game, u32)],
    date: NaiveDate,
) -> Result<(Vec<LinePrice>, Decimal), AppError> {
    let prices = lines
        .iter()
        .map(|(game, players)| price_line(conn, tiers, game, *players, date))
        .collect::<Result<Vec<_>, _>>()?;
    let total = prices.iter().map(|p| p.final_price).sum();
    Ok((prices, total))
}

/// Read-only price quote for one game on one date.
pub fn preview(
    conn: &Connection,
    game_id: &str,
    date: NaiveDate,
    players: u32,
) -> Result<PricePreview, AppError> {
    let game = queries::get_game(conn, game_id)?
        .ok_or_else(|| AppError::NotFound(format!("game {game_id}")))?;
    let tiers = queries::get_tier_table(conn)?;

    let base_price = base_price(&tiers, &game, players)?;
    let best = promotion::best_promotion(conn, Some(&game.id), date)?;
    let discount_fraction = best.as_ref().map(|p| p.discount).unwrap_or(Decimal::ZERO);
    let final_price = apply_discount(base_price, discount_fraction);

    Ok(PricePreview {
        base_price,
        final_price,
        discount_amount: base_price - final_price,
        discount_fraction,
        promotion_name: best.map(|p| p.name),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::models::{PricingTier, Promotion};
    use std::str::FromStr;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn game() -> Game {
        Game {
            id: "g1".to_string(),
            name: "Escape the Lab".to_string(),
            description: None,
            duration_minutes: 60,
            min_players: 2,
            max_players: 5,
            active: true,
        }
    }

    fn setup_db() -> Connection {
        let conn = db::init_db(":memory:").unwrap();
        for (min_players, max_players, price) in [(2, 2, 1000), (3, 3, 950), (4, 5, 900)] {
            queries::insert_pricing_tier(
                &conn,
                &PricingTier {
                    min_players,
                    max_players,
                    price_per_player: Decimal::from(price),
                },
            )
            .unwrap();
        }
        queries::insert_game(&conn, &game()).unwrap();
        conn
    }

    fn half_off(conn: &Connection) {
        queries::insert_promotion(
            conn,
            &Promotion {
                id: "half".to_string(),
                name: "Half price".to_string(),
                description: None,
                discount: dec("0.5"),
                valid_from: d("2030-01-01"),
                valid_to: d("2030-01-31"),
                game_id: None,
                active: true,
            },
        )
        .unwrap();
    }

    #[test]
    fn test_round2_is_half_up() {
        assert_eq!(round2(dec("1.005")), dec("1.01"));
        assert_eq!(round2(dec("1.004")), dec("1.00"));
        assert_eq!(round2(dec("2.675")), dec("2.68"));
    }

    #[test]
    fn test_apply_discount_bounds() {
        assert_eq!(apply_discount(dec("100"), Decimal::ZERO), dec("100"));
        assert_eq!(apply_discount(dec("100"), dec("-0.2")), dec("100"));
        assert_eq!(apply_discount(dec("100"), dec("1.5")), Decimal::ZERO);
        assert_eq!(apply_discount(dec("99.99"), dec("0.333")), dec("66.69"));
    }

    #[test]
    fn test_four_players_without_promotion() {
        let conn = setup_db();
        let preview = preview(&conn, "g1", d("2030-01-10"), 4).unwrap();
        assert_eq!(preview.base_price, dec("3600.00"));
        assert_eq!(preview.final_price, dec("3600.00"));
        assert_eq!(preview.discount_amount, Decimal::ZERO);
        assert!(preview.promotion_name.is_none());
    }

    #[test]
    fn test_four_players_with_half_off() {
        let conn = setup_db();
        half_off(&conn);
        let preview = preview(&conn, "g1", d("2030-01-10"), 4).unwrap();
        assert_eq!(preview.base_price, dec("3600.00"));
        assert_eq!(preview.final_price, dec("1800.00"));
        assert_eq!(preview.discount_amount, dec("1800.00"));
        assert_eq!(preview.discount_fraction, dec("0.5"));
        assert_eq!(preview.promotion_name.as_deref(), Some("Half price"));
    }

    #[test]
    fn test_player_count_outside_game_bounds() {
        let conn = setup_db();
        let tiers = queries::get_tier_table(&conn).unwrap();
        let err = price_line(&conn, &tiers, &game(), 6, d("2030-01-10")).unwrap_err();
        assert!(matches!(err, AppError::InvalidPlayerCount { players: 6, .. }));
    }

    #[test]
    fn test_tier_gap_is_configuration_error() {
        let conn = setup_db();
        let tiers = TierTable::new(vec![PricingTier {
            min_players: 2,
            max_players: 3,
            price_per_player: Decimal::from(1000),
        }]);
        let err = price_line(&conn, &tiers, &game(), 4, d("2030-01-10")).unwrap_err();
        assert!(matches!(err, AppError::NoMatchingTier { players: 4 }));
        assert_eq!(err.kind(), "configuration_error");
    }

    #[test]
    fn test_price_booking_is_idempotent() {
        let conn = setup_db();
        half_off(&conn);
        let tiers = queries::get_tier_table(&conn).unwrap();
        let g = game();
        let lines = [(&g, 2), (&g, 3)];

        let first = price_booking(&conn, &tiers, &lines, d("2030-01-10")).unwrap();
        let second = price_booking(&conn, &tiers, &lines, d("2030-01-10")).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.1, dec("2425.00"));
    }

    #[test]
    fn test_unknown_game_preview() {
        let conn = setup_db();
        let err = preview(&conn, "nope", d("2030-01-10"), 4).unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
