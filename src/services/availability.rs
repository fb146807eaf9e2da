use std::collections::{BTreeSet, HashMap};

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use rusqlite::Connection;

use crate::db::queries::{self, RoomOccupancyRow};
use crate::errors::AppError;
use crate::models::{Booking, BookingStatus, DaySchedule, SlotAvailability, SlotConfig, SlotStatus};

/// Longest `start..=end` span, in days, one availability query may cover.
pub const MAX_RANGE_DAYS: i64 = 366;

pub fn load_slot_config(conn: &Connection) -> Result<SlotConfig, AppError> {
    let config = queries::get_slot_config(conn)?
        .ok_or_else(|| AppError::Configuration("slot configuration not found".to_string()))?;
    config.validate()?;
    Ok(config)
}

/// Whether a booking still occupies its rooms at `now`.
///
/// Confirmed bookings always do. Pending bookings only do while their creation is
/// within the hold window; older unpaid holds are ignored without being mutated.
pub fn occupies_rooms(
    status: BookingStatus,
    created_at: NaiveDateTime,
    now: NaiveDateTime,
    hold_window: Duration,
) -> bool {
    match status {
        BookingStatus::Confirmed => true,
        BookingStatus::Pending => created_at >= now - hold_window,
        BookingStatus::Cancelled => false,
    }
}

fn occupied_by_slot(
    rows: Vec<RoomOccupancyRow>,
    now: NaiveDateTime,
    hold_window: Duration,
) -> HashMap<(NaiveDate, NaiveTime), BTreeSet<u32>> {
    let mut occupied: HashMap<(NaiveDate, NaiveTime), BTreeSet<u32>> = HashMap::new();
    for row in rows {
        if !occupies_rooms(row.status, row.created_at, now, hold_window) {
            continue;
        }
        occupied
            .entry((row.date, row.time))
            .or_default()
            .insert(row.room_number);
    }
    occupied
}

/// Room numbers currently taken in one slot.
pub fn occupied_rooms(
    conn: &Connection,
    date: NaiveDate,
    time: NaiveTime,
    now: NaiveDateTime,
    hold_window: Duration,
) -> Result<BTreeSet<u32>, AppError> {
    let rows = queries::get_room_occupancy_for_slot(conn, &date, &time)?;
    Ok(occupied_by_slot(rows, now, hold_window)
        .remove(&(date, time))
        .unwrap_or_default())
}

/// Room numbers taken in `booking`'s slot by every other booking. A pending
/// booking past its hold window may have lost its rooms to later bookings; this is
/// what it would collide with if confirmed now.
pub fn rooms_taken_by_others(
    conn: &Connection,
    booking: &Booking,
    now: NaiveDateTime,
    hold_window: Duration,
) -> Result<BTreeSet<u32>, AppError> {
    let rows = queries::get_room_occupancy_for_slot(conn, &booking.date, &booking.time)?
        .into_iter()
        .filter(|row| row.booking_id != booking.id)
        .collect();
    Ok(occupied_by_slot(rows, now, hold_window)
        .remove(&(booking.date, booking.time))
        .unwrap_or_default())
}

/// Per-day, per-slot room availability for `start..=end`.
///
/// Read-only and lock-free: occupancy is preloaded in one query and may race with
/// concurrent bookings. The booking path re-checks capacity under a slot lock.
pub fn compute_availability(
    conn: &Connection,
    start: NaiveDate,
    end: NaiveDate,
    game_id: Option<&str>,
    now: NaiveDateTime,
    hold_window: Duration,
) -> Result<Vec<DaySchedule>, AppError> {
    if end < start {
        return Err(AppError::InvalidRange { start, end });
    }
    if (end - start).num_days() >= MAX_RANGE_DAYS {
        return Err(AppError::Validation(format!(
            "availability range is limited to {MAX_RANGE_DAYS} days"
        )));
    }

    if let Some(game_id) = game_id {
        match queries::get_game(conn, game_id)? {
            Some(game) if game.active => {}
            _ => return Err(AppError::NotFound(format!("game {game_id}"))),
        }
    }

    let config = load_slot_config(conn)?;
    let max_rooms = config.max_concurrent_rooms;
    let times = config.slot_times();

    let rows = queries::get_room_occupancy_in_range(conn, &start, &end)?;
    let occupied = occupied_by_slot(rows, now, hold_window);

    let days = start
        .iter_days()
        .take_while(|day| *day <= end)
        .map(|date| DaySchedule {
            date,
            day_name: date.format("%a").to_string(),
            slots: times
                .iter()
                .map(|time| {
                    let taken = occupied
                        .get(&(date, *time))
                        .map(|rooms| rooms.len() as u32)
                        .unwrap_or(0);
                    build_slot(date, *time, now, max_rooms, taken)
                })
                .collect(),
        })
        .collect();

    Ok(days)
}

fn build_slot(
    date: NaiveDate,
    time: NaiveTime,
    now: NaiveDateTime,
    max_rooms: u32,
    taken: u32,
) -> SlotAvailability {
    let label = time.format("%H:%M").to_string();

    if date.and_time(time) < now {
        return SlotAvailability {
            time: label,
            status: SlotStatus::Unavailable,
            available_rooms: 0,
            max_rooms,
        };
    }

    let available_rooms = max_rooms.saturating_sub(taken);
    SlotAvailability {
        time: label,
        status: if available_rooms > 0 {
            SlotStatus::Available
        } else {
            SlotStatus::Booked
        },
        available_rooms,
        max_rooms,
    }
}
