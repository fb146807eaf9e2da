use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use rusqlite::types::Type;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use rust_decimal::Decimal;

use crate::models::{
    Booking, BookingLine, BookingStatus, CustomerContact, Game, GiftCard, GiftCardStatus,
    PaymentMethod, PricingTier, Promotion, SlotConfig, TierTable, User,
};

pub const DATE_FORMAT: &str = "%Y-%m-%d";
pub const TIME_FORMAT: &str = "%H:%M";
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub fn fmt_date(date: &NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

pub fn fmt_time(time: &NaiveTime) -> String {
    time.format(TIME_FORMAT).to_string()
}

pub fn fmt_timestamp(ts: &NaiveDateTime) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

// ── Column decoding ──

fn conversion_failure<E>(idx: usize, err: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}

fn date_col(row: &Row, idx: usize) -> rusqlite::Result<NaiveDate> {
    let s: String = row.get(idx)?;
    NaiveDate::parse_from_str(&s, DATE_FORMAT).map_err(|e| conversion_failure(idx, e))
}

fn time_col(row: &Row, idx: usize) -> rusqlite::Result<NaiveTime> {
    let s: String = row.get(idx)?;
    NaiveTime::parse_from_str(&s, TIME_FORMAT).map_err(|e| conversion_failure(idx, e))
}

fn timestamp_col(row: &Row, idx: usize) -> rusqlite::Result<NaiveDateTime> {
    let s: String = row.get(idx)?;
    NaiveDateTime::parse_from_str(&s, TIMESTAMP_FORMAT).map_err(|e| conversion_failure(idx, e))
}

fn opt_timestamp_col(row: &Row, idx: usize) -> rusqlite::Result<Option<NaiveDateTime>> {
    let s: Option<String> = row.get(idx)?;
    s.map(|s| {
        NaiveDateTime::parse_from_str(&s, TIMESTAMP_FORMAT).map_err(|e| conversion_failure(idx, e))
    })
    .transpose()
}

fn decimal_col(row: &Row, idx: usize) -> rusqlite::Result<Decimal> {
    let s: String = row.get(idx)?;
    Decimal::from_str(&s).map_err(|e| conversion_failure(idx, e))
}

fn enum_col<T>(row: &Row, idx: usize, parse: fn(&str) -> Option<T>) -> rusqlite::Result<T> {
    let s: String = row.get(idx)?;
    parse(&s).ok_or(rusqlite::Error::InvalidColumnType(idx, s, Type::Text))
}

fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

pub fn count_rows(conn: &Connection, table: &str) -> anyhow::Result<i64> {
    let count = conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
        row.get(0)
    })?;
    Ok(count)
}

// ── Users ──

pub fn insert_user(conn: &Connection, user: &User) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO users (id, email, first_name, last_name, phone, is_admin)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            user.id,
            user.email,
            user.first_name,
            user.last_name,
            user.phone,
            user.is_admin,
        ],
    )?;
    Ok(())
}

pub fn get_user(conn: &Connection, id: &str) -> rusqlite::Result<Option<User>> {
    conn.query_row(
        "SELECT id, email, first_name, last_name, phone, is_admin FROM users WHERE id = ?1",
        params![id],
        |row| {
            Ok(User {
                id: row.get(0)?,
                email: row.get(1)?,
                first_name: row.get(2)?,
                last_name: row.get(3)?,
                phone: row.get(4)?,
                is_admin: row.get(5)?,
            })
        },
    )
    .optional()
}

// ── Games ──

const GAME_COLUMNS: &str =
    "id, name, description, duration_minutes, min_players, max_players, active";

fn parse_game_row(row: &Row) -> rusqlite::Result<Game> {
    Ok(Game {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        duration_minutes: row.get(3)?,
        min_players: row.get(4)?,
        max_players: row.get(5)?,
        active: row.get(6)?,
    })
}

pub fn insert_game(conn: &Connection, game: &Game) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO games (id, name, description, duration_minutes, min_players, max_players, active)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            game.id,
            game.name,
            game.description,
            game.duration_minutes,
            game.min_players,
            game.max_players,
            game.active,
        ],
    )?;
    Ok(())
}

pub fn get_game(conn: &Connection, id: &str) -> rusqlite::Result<Option<Game>> {
    conn.query_row(
        &format!("SELECT {GAME_COLUMNS} FROM games WHERE id = ?1"),
        params![id],
        parse_game_row,
    )
    .optional()
}

/// Fetches every game whose id is in `ids` with a single query.
pub fn get_games_by_ids(conn: &Connection, ids: &[&str]) -> rusqlite::Result<Vec<Game>> {
    if ids.is_empty() {
        return Ok(vec![]);
    }
    let sql = format!(
        "SELECT {GAME_COLUMNS} FROM games WHERE id IN ({})",
        placeholders(ids.len())
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_from_iter(ids.iter()), parse_game_row)?;
    rows.collect()
}

// ── Slot configuration ──

pub fn insert_slot_config(conn: &Connection, config: &SlotConfig) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO slot_config (opening_time, closing_time, slot_duration_minutes, max_concurrent_rooms)
         VALUES (?1, ?2, ?3, ?4)",
        params![
            fmt_time(&config.opening_time),
            fmt_time(&config.closing_time),
            config.slot_duration_minutes,
            config.max_concurrent_rooms,
        ],
    )?;
    Ok(())
}

/// Latest slot configuration; newer rows supersede older ones.
pub fn get_slot_config(conn: &Connection) -> rusqlite::Result<Option<SlotConfig>> {
    conn.query_row(
        "SELECT opening_time, closing_time, slot_duration_minutes, max_concurrent_rooms
         FROM slot_config ORDER BY id DESC LIMIT 1",
        [],
        |row| {
            Ok(SlotConfig {
                opening_time: time_col(row, 0)?,
                closing_time: time_col(row, 1)?,
                slot_duration_minutes: row.get(2)?,
                max_concurrent_rooms: row.get(3)?,
            })
        },
    )
    .optional()
}

// ── Pricing tiers ──

pub fn insert_pricing_tier(conn: &Connection, tier: &PricingTier) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO pricing_tiers (min_players, max_players, price_per_player) VALUES (?1, ?2, ?3)",
        params![
            tier.min_players,
            tier.max_players,
            tier.price_per_player.to_string(),
        ],
    )?;
    Ok(())
}

pub fn get_tier_table(conn: &Connection) -> rusqlite::Result<TierTable> {
    let mut stmt = conn.prepare(
        "SELECT min_players, max_players, price_per_player FROM pricing_tiers ORDER BY min_players ASC, id ASC",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok(PricingTier {
            min_players: row.get(0)?,
            max_players: row.get(1)?,
            price_per_player: decimal_col(row, 2)?,
        })
    })?;
    Ok(TierTable::new(rows.collect::<rusqlite::Result<Vec<_>>>()?))
}

// ── Promotions ──

pub fn insert_promotion(conn: &Connection, promotion: &Promotion) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO promotions (id, name, description, discount, valid_from, valid_to, game_id, active)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            promotion.id,
            promotion.name,
            promotion.description,
            promotion.discount.to_string(),
            fmt_date(&promotion.valid_from),
            fmt_date(&promotion.valid_to),
            promotion.game_id,
            promotion.active,
        ],
    )?;
    Ok(())
}

/// Active promotions valid on `date` that are global or scoped to `game_id`.
pub fn get_applicable_promotions(
    conn: &Connection,
    game_id: Option<&str>,
    date: &NaiveDate,
) -> rusqlite::Result<Vec<Promotion>> {
    let mut stmt = conn.prepare(
        "SELECT id, name, description, discount, valid_from, valid_to, game_id, active
         FROM promotions
         WHERE active = 1 AND valid_from <= ?1 AND valid_to >= ?1
           AND (game_id IS NULL OR game_id = ?2)",
    )?;
    let rows = stmt.query_map(params![fmt_date(date), game_id], |row| {
        Ok(Promotion {
            id: row.get(0)?,
            name: row.get(1)?,
            description: row.get(2)?,
            discount: decimal_col(row, 3)?,
            valid_from: date_col(row, 4)?,
            valid_to: date_col(row, 5)?,
            game_id: row.get(6)?,
            active: row.get(7)?,
        })
    })?;
    rows.collect()
}

// ── Gift cards ──

pub fn insert_gift_card(conn: &Connection, card: &GiftCard) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO gift_cards (code, amount, status, used_at, redeemed_booking_id)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            card.code,
            card.amount.to_string(),
            card.status.as_str(),
            card.used_at.as_ref().map(fmt_timestamp),
            card.redeemed_booking_id,
        ],
    )?;
    Ok(())
}

pub fn get_gift_card(conn: &Connection, code: &str) -> rusqlite::Result<Option<GiftCard>> {
    conn.query_row(
        "SELECT code, amount, status, used_at, redeemed_booking_id FROM gift_cards WHERE code = ?1",
        params![code],
        |row| {
            Ok(GiftCard {
                code: row.get(0)?,
                amount: decimal_col(row, 1)?,
                status: enum_col(row, 2, GiftCardStatus::parse)?,
                used_at: opt_timestamp_col(row, 3)?,
                redeemed_booking_id: row.get(4)?,
            })
        },
    )
    .optional()
}

/// Compare-and-set on a gift card's status. Returns false when the card was not
/// in `expected` at write time.
pub fn transition_gift_card(
    conn: &Connection,
    code: &str,
    expected: GiftCardStatus,
    next: GiftCardStatus,
) -> rusqlite::Result<bool> {
    let count = conn.execute(
        "UPDATE gift_cards SET status = ?1 WHERE code = ?2 AND status = ?3",
        params![next.as_str(), code, expected.as_str()],
    )?;
    Ok(count > 0)
}

pub fn redeem_gift_card(
    conn: &Connection,
    code: &str,
    booking_id: &str,
    used_at: &NaiveDateTime,
) -> rusqlite::Result<bool> {
    let count = conn.execute(
        "UPDATE gift_cards SET status = 'redeemed', used_at = ?1, redeemed_booking_id = ?2
         WHERE code = ?3 AND status IN ('held', 'active')",
        params![fmt_timestamp(used_at), booking_id, code],
    )?;
    Ok(count > 0)
}

// ── Bookings ──

const BOOKING_COLUMNS: &str = "id, user_id, booking_date, booking_time, status, payment_method, \
     customer_first_name, customer_last_name, customer_email, customer_phone, total_price, \
     gift_card_code, payment_reference, version, created_at, updated_at";

fn parse_booking_row(row: &Row) -> rusqlite::Result<Booking> {
    Ok(Booking {
        id: row.get(0)?,
        user_id: row.get(1)?,
        date: date_col(row, 2)?,
        time: time_col(row, 3)?,
        status: enum_col(row, 4, BookingStatus::parse)?,
        payment_method: enum_col(row, 5, PaymentMethod::parse)?,
        customer: CustomerContact {
            first_name: row.get(6)?,
            last_name: row.get(7)?,
            email: row.get(8)?,
            phone: row.get(9)?,
        },
        total_price: decimal_col(row, 10)?,
        gift_card_code: row.get(11)?,
        payment_reference: row.get(12)?,
        version: row.get(13)?,
        created_at: timestamp_col(row, 14)?,
        updated_at: timestamp_col(row, 15)?,
        lines: vec![],
    })
}

/// Inserts the booking and all of its lines. Callers run this inside a
/// transaction so parent and children commit together.
pub fn insert_booking(conn: &Connection, booking: &Booking) -> rusqlite::Result<()> {
    conn.execute(
        &format!(
            "INSERT INTO bookings ({BOOKING_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)"
        ),
        params![
            booking.id,
            booking.user_id,
            fmt_date(&booking.date),
            fmt_time(&booking.time),
            booking.status.as_str(),
            booking.payment_method.as_str(),
            booking.customer.first_name,
            booking.customer.last_name,
            booking.customer.email,
            booking.customer.phone,
            booking.total_price.to_string(),
            booking.gift_card_code,
            booking.payment_reference,
            booking.version,
            fmt_timestamp(&booking.created_at),
            fmt_timestamp(&booking.updated_at),
        ],
    )?;

    let mut stmt = conn.prepare(
        "INSERT INTO booking_lines (id, booking_id, game_id, room_number, player_count, price)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
    )?;
    for line in &booking.lines {
        stmt.execute(params![
            line.id,
            booking.id,
            line.game_id,
            line.room_number,
            line.player_count,
            line.price.to_string(),
        ])?;
    }
    Ok(())
}

fn get_lines(conn: &Connection, booking_id: &str) -> rusqlite::Result<Vec<BookingLine>> {
    let mut stmt = conn.prepare(
        "SELECT id, game_id, room_number, player_count, price
         FROM booking_lines WHERE booking_id = ?1 ORDER BY room_number ASC",
    )?;
    let rows = stmt.query_map(params![booking_id], |row| {
        Ok(BookingLine {
            id: row.get(0)?,
            game_id: row.get(1)?,
            room_number: row.get(2)?,
            player_count: row.get(3)?,
            price: decimal_col(row, 4)?,
        })
    })?;
    rows.collect()
}

fn with_lines(conn: &Connection, mut booking: Booking) -> rusqlite::Result<Booking> {
    booking.lines = get_lines(conn, &booking.id)?;
    Ok(booking)
}

pub fn get_booking_by_id(conn: &Connection, id: &str) -> rusqlite::Result<Option<Booking>> {
    let booking = conn
        .query_row(
            &format!("SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = ?1"),
            params![id],
            parse_booking_row,
        )
        .optional()?;
    booking.map(|b| with_lines(conn, b)).transpose()
}

pub fn get_booking_by_payment_reference(
    conn: &Connection,
    reference: &str,
) -> rusqlite::Result<Option<Booking>> {
    let booking = conn
        .query_row(
            &format!("SELECT {BOOKING_COLUMNS} FROM bookings WHERE payment_reference = ?1"),
            params![reference],
            parse_booking_row,
        )
        .optional()?;
    booking.map(|b| with_lines(conn, b)).transpose()
}

pub fn list_bookings(
    conn: &Connection,
    status: Option<BookingStatus>,
    limit: i64,
) -> rusqlite::Result<Vec<Booking>> {
    let bookings = match status {
        Some(status) => {
            let mut stmt = conn.prepare(&format!(
                "SELECT {BOOKING_COLUMNS} FROM bookings WHERE status = ?1
                 ORDER BY booking_date DESC, booking_time DESC LIMIT ?2"
            ))?;
            let rows = stmt.query_map(params![status.as_str(), limit], parse_booking_row)?;
            rows.collect::<rusqlite::Result<Vec<_>>>()?
        }
        None => {
            let mut stmt = conn.prepare(&format!(
                "SELECT {BOOKING_COLUMNS} FROM bookings
                 ORDER BY booking_date DESC, booking_time DESC LIMIT ?1"
            ))?;
            let rows = stmt.query_map(params![limit], parse_booking_row)?;
            rows.collect::<rusqlite::Result<Vec<_>>>()?
        }
    };
    bookings.into_iter().map(|b| with_lines(conn, b)).collect()
}

pub fn list_bookings_for_user(conn: &Connection, user_id: &str) -> rusqlite::Result<Vec<Booking>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {BOOKING_COLUMNS} FROM bookings WHERE user_id = ?1
         ORDER BY booking_date DESC, booking_time DESC"
    ))?;
    let rows = stmt.query_map(params![user_id], parse_booking_row)?;
    let bookings = rows.collect::<rusqlite::Result<Vec<_>>>()?;
    bookings.into_iter().map(|b| with_lines(conn, b)).collect()
}

/// Status update guarded by the optimistic version counter. Returns false when
/// the stored version no longer matches `expected_version`.
pub fn update_booking_status(
    conn: &Connection,
    id: &str,
    status: BookingStatus,
    expected_version: i64,
    now: &NaiveDateTime,
) -> rusqlite::Result<bool> {
    let count = conn.execute(
        "UPDATE bookings SET status = ?1, version = version + 1, updated_at = ?2
         WHERE id = ?3 AND version = ?4",
        params![status.as_str(), fmt_timestamp(now), id, expected_version],
    )?;
    Ok(count > 0)
}

pub fn set_payment_reference(
    conn: &Connection,
    id: &str,
    reference: &str,
    expected_version: i64,
    now: &NaiveDateTime,
) -> rusqlite::Result<bool> {
    let count = conn.execute(
        "UPDATE bookings SET payment_reference = ?1, version = version + 1, updated_at = ?2
         WHERE id = ?3 AND version = ?4",
        params![reference, fmt_timestamp(now), id, expected_version],
    )?;
    Ok(count > 0)
}

// ── Occupancy ──

/// One occupied room of a non-cancelled booking, flattened for occupancy counting.
#[derive(Debug, Clone)]
pub struct RoomOccupancyRow {
    pub booking_id: String,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub status: BookingStatus,
    pub created_at: NaiveDateTime,
    pub room_number: u32,
}

fn parse_occupancy_row(row: &Row) -> rusqlite::Result<RoomOccupancyRow> {
    Ok(RoomOccupancyRow {
        date: date_col(row, 0)?,
        time: time_col(row, 1)?,
        status: enum_col(row, 2, BookingStatus::parse)?,
        created_at: timestamp_col(row, 3)?,
        room_number: row.get(4)?,
        booking_id: row.get(5)?,
    })
}

pub fn get_room_occupancy_in_range(
    conn: &Connection,
    start: &NaiveDate,
    end: &NaiveDate,
) -> rusqlite::Result<Vec<RoomOccupancyRow>> {
    let mut stmt = conn.prepare(
        "SELECT b.booking_date, b.booking_time, b.status, b.created_at, l.room_number, b.id
         FROM bookings b JOIN booking_lines l ON l.booking_id = b.id
         WHERE b.booking_date >= ?1 AND b.booking_date <= ?2 AND b.status != 'cancelled'",
    )?;
    let rows = stmt.query_map(params![fmt_date(start), fmt_date(end)], parse_occupancy_row)?;
    rows.collect()
}

pub fn get_room_occupancy_for_slot(
    conn: &Connection,
    date: &NaiveDate,
    time: &NaiveTime,
) -> rusqlite::Result<Vec<RoomOccupancyRow>> {
    let mut stmt = conn.prepare(
        "SELECT b.booking_date, b.booking_time, b.status, b.created_at, l.room_number, b.id
         FROM bookings b JOIN booking_lines l ON l.booking_id = b.id
         WHERE b.booking_date = ?1 AND b.booking_time = ?2 AND b.status != 'cancelled'",
    )?;
    let rows = stmt.query_map(params![fmt_date(date), fmt_time(time)], parse_occupancy_row)?;
    rows.collect()
}
