//! Booking orchestration.
//!
//! Creation runs in two phases. The reservation phase takes the slot lock (and the
//! gift-card lock when a code is given) and then does every check and write inside
//! one immediate transaction; the commit is the only point where capacity or a
//! card hold becomes visible. The post-commit phase talks to the payment and
//! notification collaborators and runs on a spawned task so it completes even if
//! the caller goes away.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDateTime;
use rusqlite::Connection;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::db::{self, queries};
use crate::errors::AppError;
use crate::models::{
    Actor, Booking, BookingLine, BookingResult, BookingStatus, CreateBookingRequest, CustomerContact,
    Game, GiftCardStatus, PaymentMethod,
};
use crate::services::locks::LockHandle;
use crate::services::notification::NotificationKind;
use crate::services::{availability, gift_card, pricing};
use crate::state::AppState;

const RETRY_BACKOFF_MS: u64 = 25;

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Shape checks that need no stored data. Runs before any lock or write.
pub fn validate_request(request: &CreateBookingRequest, user_id: Option<&str>) -> Result<(), AppError> {
    if request.lines.is_empty() {
        return Err(AppError::Validation("a booking needs at least one line".to_string()));
    }

    let mut rooms = HashSet::new();
    for line in &request.lines {
        if line.game_id.trim().is_empty() {
            return Err(AppError::Validation("game_id is required".to_string()));
        }
        if line.player_count == 0 {
            return Err(AppError::Validation("player_count must be at least 1".to_string()));
        }
        if let Some(room) = line.room_number {
            if room == 0 {
                return Err(AppError::Validation("room_number starts at 1".to_string()));
            }
            if !rooms.insert(room) {
                return Err(AppError::Validation(format!("room {room} requested twice")));
            }
        }
    }

    if user_id.is_none() {
        if non_empty(&request.customer_first_name).is_none() || non_empty(&request.customer_last_name).is_none() {
            return Err(AppError::Validation(
                "guest bookings need a first and last name".to_string(),
            ));
        }
        if non_empty(&request.customer_email).is_none() && non_empty(&request.customer_phone).is_none() {
            return Err(AppError::Validation(
                "guest bookings need an email or phone number".to_string(),
            ));
        }
    }

    Ok(())
}

pub async fn create_booking(
    state: &Arc<AppState>,
    mut request: CreateBookingRequest,
    user_id: Option<&str>,
) -> Result<BookingResult, AppError> {
    request.discount_code = non_empty(&request.discount_code).map(str::to_string);
    validate_request(&request, user_id)?;

    let mut attempt = 0;
    let booking = loop {
        match try_reserve(state, &request, user_id).await {
            Ok(booking) => break booking,
            Err(e) if e.is_contention() && attempt < state.config.lock_retries => {
                attempt += 1;
                tracing::warn!(
                    date = %request.date,
                    time = %request.time,
                    attempt,
                    error = %e,
                    "booking contention, retrying"
                );
                tokio::time::sleep(Duration::from_millis(RETRY_BACKOFF_MS * u64::from(attempt))).await;
            }
            Err(e) if e.is_contention() => {
                tracing::warn!(date = %request.date, time = %request.time, error = %e, "booking contention, giving up");
                return Err(AppError::InsufficientCapacity {
                    date: request.date,
                    time: request.time,
                    reason: "slot is busy, please try again".to_string(),
                });
            }
            Err(e) => return Err(e),
        }
    };

    tracing::info!(
        booking_id = %booking.id,
        date = %booking.date,
        time = %booking.time,
        rooms = booking.lines.len(),
        total = %booking.total_price,
        status = %booking.status,
        "booking created"
    );

    let state = state.clone();
    tokio::spawn(async move { finish_booking(&state, booking).await })
        .await
        .map_err(|e| AppError::Internal(format!("post-commit task failed: {e}")))?
}

async fn try_reserve(
    state: &AppState,
    request: &CreateBookingRequest,
    user_id: Option<&str>,
) -> Result<Booking, AppError> {
    let _slot = state.locks.lock_slot(request.date, request.time).await?;
    let _card: Option<LockHandle> = match request.discount_code.as_deref() {
        Some(code) => Some(state.locks.lock_gift_card(code).await?),
        None => None,
    };

    let now = state.clock.now();
    let hold_window = state.config.hold_window();
    let mut conn = state.conn()?;
    db::unit_of_work(&mut conn, |tx| reserve(tx, request, user_id, now, hold_window))
}

/// Every check and write of a booking creation. Must run inside a transaction
/// while the slot lock is held.
fn reserve(
    conn: &Connection,
    request: &CreateBookingRequest,
    user_id: Option<&str>,
    now: NaiveDateTime,
    hold_window: chrono::Duration,
) -> Result<Booking, AppError> {
    let (date, time) = (request.date, request.time);

    let config = availability::load_slot_config(conn)?;
    if !config.is_slot_start(time) {
        return Err(AppError::Validation(format!(
            "{} is not a slot start time",
            time.format("%H:%M")
        )));
    }
    if date.and_time(time) < now {
        return Err(AppError::Validation("slot has already started".to_string()));
    }
    let max_rooms = config.max_concurrent_rooms;
    if let Some(room) = request
        .lines
        .iter()
        .filter_map(|l| l.room_number)
        .find(|room| *room > max_rooms)
    {
        return Err(AppError::Validation(format!(
            "room {room} does not exist (1-{max_rooms})"
        )));
    }

    let games = resolve_games(conn, request)?;
    let tiers = queries::get_tier_table(conn)?;
    let priced: Vec<(&Game, u32)> = request
        .lines
        .iter()
        .map(|l| (&games[l.game_id.trim()], l.player_count))
        .collect();
    let (prices, subtotal) = pricing::price_booking(conn, &tiers, &priced, date)?;

    let total = match request.discount_code.as_deref() {
        Some(code) => (subtotal - gift_card::peek(conn, code)?).max(Decimal::ZERO),
        None => subtotal,
    };

    let rooms = assign_rooms(conn, request, max_rooms, now, hold_window)?;
    let customer = resolve_contact(conn, request, user_id)?;

    if let Some(code) = request.discount_code.as_deref() {
        gift_card::hold(conn, code)?;
    }

    let confirmed_now = request.payment_method == PaymentMethod::Online && total.is_zero();
    let booking_id = Uuid::new_v4().to_string();
    let booking = Booking {
        id: booking_id.clone(),
        user_id: user_id.map(str::to_string),
        date,
        time,
        status: if confirmed_now {
            BookingStatus::Confirmed
        } else {
            BookingStatus::Pending
        },
        payment_method: request.payment_method,
        customer,
        total_price: total,
        gift_card_code: request.discount_code.clone(),
        payment_reference: None,
        lines: request
            .lines
            .iter()
            .zip(prices)
            .zip(rooms)
            .map(|((line, price), room_number)| BookingLine {
                id: Uuid::new_v4().to_string(),
                game_id: line.game_id.trim().to_string(),
                room_number,
                player_count: line.player_count,
                price: price.final_price,
            })
            .collect(),
        version: 0,
        created_at: now,
        updated_at: now,
    };
    queries::insert_booking(conn, &booking)?;

    if confirmed_now {
        if let Some(code) = booking.gift_card_code.as_deref() {
            gift_card::redeem(conn, code, &booking_id, now)?;
        }
    }

    Ok(booking)
}

/// Looks up every referenced game in one query. Any unknown or inactive id fails
/// the whole request.
fn resolve_games(conn: &Connection, request: &CreateBookingRequest) -> Result<HashMap<String, Game>, AppError> {
    let ids: BTreeSet<&str> = request.lines.iter().map(|l| l.game_id.trim()).collect();
    let ids: Vec<&str> = ids.into_iter().collect();

    let games: HashMap<String, Game> = queries::get_games_by_ids(conn, &ids)?
        .into_iter()
        .filter(|g| g.active)
        .map(|g| (g.id.clone(), g))
        .collect();

    let missing: Vec<&str> = ids.into_iter().filter(|id| !games.contains_key(*id)).collect();
    if !missing.is_empty() {
        return Err(AppError::NotFound(format!("game {}", missing.join(", "))));
    }
    Ok(games)
}

/// Room number per request line. Explicit rooms must be free; the rest get the
/// lowest free numbers in order.
fn assign_rooms(
    conn: &Connection,
    request: &CreateBookingRequest,
    max_rooms: u32,
    now: NaiveDateTime,
    hold_window: chrono::Duration,
) -> Result<Vec<u32>, AppError> {
    let insufficient = |reason: String| AppError::InsufficientCapacity {
        date: request.date,
        time: request.time,
        reason,
    };

    let occupied = availability::occupied_rooms(conn, request.date, request.time, now, hold_window)?;
    let free = max_rooms.saturating_sub(occupied.len() as u32) as usize;
    if request.lines.len() > free {
        return Err(insufficient(format!(
            "{} rooms requested, {free} available",
            request.lines.len()
        )));
    }

    let explicit: BTreeSet<u32> = request.lines.iter().filter_map(|l| l.room_number).collect();
    if let Some(room) = explicit.intersection(&occupied).next() {
        return Err(insufficient(format!("room {room} is already booked")));
    }

    let mut unassigned = (1..=max_rooms).filter(|room| !occupied.contains(room) && !explicit.contains(room));
    request
        .lines
        .iter()
        .map(|line| {
            line.room_number
                .or_else(|| unassigned.next())
                .ok_or_else(|| insufficient("no free room left".to_string()))
        })
        .collect()
}

fn resolve_contact(
    conn: &Connection,
    request: &CreateBookingRequest,
    user_id: Option<&str>,
) -> Result<CustomerContact, AppError> {
    let given = |field: &Option<String>| non_empty(field).map(str::to_string);

    let Some(user_id) = user_id else {
        return Ok(CustomerContact {
            first_name: given(&request.customer_first_name).unwrap_or_default(),
            last_name: given(&request.customer_last_name).unwrap_or_default(),
            email: given(&request.customer_email),
            phone: given(&request.customer_phone),
        });
    };

    let user = queries::get_user(conn, user_id)?
        .ok_or_else(|| AppError::NotFound(format!("user {user_id}")))?;
    Ok(CustomerContact {
        first_name: given(&request.customer_first_name).unwrap_or(user.first_name),
        last_name: given(&request.customer_last_name).unwrap_or(user.last_name),
        email: given(&request.customer_email).or(Some(user.email)),
        phone: given(&request.customer_phone).or(user.phone),
    })
}

async fn finish_booking(state: &AppState, mut booking: Booking) -> Result<BookingResult, AppError> {
    let mut payment_url = None;

    if booking.payment_method == PaymentMethod::Online && booking.status == BookingStatus::Pending {
        let session = match state.payments.create_checkout(&booking).await {
            Ok(session) => session,
            Err(e) => {
                tracing::error!(booking_id = %booking.id, error = %e, "checkout creation failed, cancelling booking");
                if let Err(cancel_err) = transition(state, &booking.id, BookingStatus::Cancelled).await {
                    tracing::error!(booking_id = %booking.id, error = %cancel_err, "failed to cancel booking after checkout failure");
                }
                return Err(AppError::Payment(e.to_string()));
            }
        };

        let now = state.clock.now();
        booking = {
            let conn = state.conn()?;
            attach_reference(&conn, booking, &session.reference, now)?
        };
        if booking.payment_reference.as_deref() == Some(session.reference.as_str()) {
            payment_url = Some(session.url);
        } else {
            tracing::warn!(
                booking_id = %booking.id,
                status = %booking.status,
                reference = %session.reference,
                "booking changed during checkout, abandoning checkout session"
            );
            return Ok(BookingResult { booking, payment_url });
        }
    }

    notify(state, NotificationKind::Confirmation, &booking).await;
    Ok(BookingResult { booking, payment_url })
}

/// Stores the checkout reference on a freshly created booking and returns the
/// booking as stored. When something else changed the booking first, the
/// reference is attached only if the booking is still pending.
fn attach_reference(
    conn: &Connection,
    mut booking: Booking,
    reference: &str,
    now: NaiveDateTime,
) -> Result<Booking, AppError> {
    if !queries::set_payment_reference(conn, &booking.id, reference, booking.version, &now)? {
        let id = booking.id.clone();
        booking = queries::get_booking_by_id(conn, &id)?.ok_or_else(|| AppError::NotFound(format!("booking {id}")))?;
        if booking.status != BookingStatus::Pending
            || !queries::set_payment_reference(conn, &id, reference, booking.version, &now)?
        {
            return Ok(booking);
        }
    }
    booking.payment_reference = Some(reference.to_string());
    booking.version += 1;
    booking.updated_at = now;
    Ok(booking)
}

/// Applies one edge of the booking state machine under the booking's slot and
/// gift-card locks. Returns the stored booking and whether anything changed.
async fn transition(state: &AppState, id: &str, next: BookingStatus) -> Result<(Booking, bool), AppError> {
    let current = load(state, id)?;

    let _slot = state.locks.lock_slot(current.date, current.time).await?;
    let _card: Option<LockHandle> = match current.gift_card_code.as_deref() {
        Some(code) => Some(state.locks.lock_gift_card(code).await?),
        None => None,
    };

    let now = state.clock.now();
    let hold_window = state.config.hold_window();
    let mut conn = state.conn()?;
    db::unit_of_work(&mut conn, |tx| transition_in_tx(tx, id, next, now, hold_window))
}

fn transition_in_tx(
    conn: &Connection,
    id: &str,
    next: BookingStatus,
    now: NaiveDateTime,
    hold_window: chrono::Duration,
) -> Result<(Booking, bool), AppError> {
    let mut booking =
        queries::get_booking_by_id(conn, id)?.ok_or_else(|| AppError::NotFound(format!("booking {id}")))?;

    if !booking.status.can_transition_to(next) {
        return Err(AppError::IllegalStateTransition {
            from: booking.status,
            to: next,
        });
    }
    if booking.status == next {
        return Ok((booking, false));
    }

    // A pending booking past its hold window no longer reserves its rooms.
    if booking.status == BookingStatus::Pending && next == BookingStatus::Confirmed {
        let taken = availability::rooms_taken_by_others(conn, &booking, now, hold_window)?;
        if let Some(room) = booking.room_numbers().find(|room| taken.contains(room)) {
            return Err(AppError::InsufficientCapacity {
                date: booking.date,
                time: booking.time,
                reason: format!("room {room} was booked after this hold expired"),
            });
        }
    }

    if let Some(code) = booking.gift_card_code.as_deref() {
        let held = queries::get_gift_card(conn, code)?.map(|c| c.status) == Some(GiftCardStatus::Held);
        match next {
            BookingStatus::Cancelled if held => gift_card::release(conn, code)?,
            BookingStatus::Confirmed if held => gift_card::redeem(conn, code, &booking.id, now)?,
            _ if !held => tracing::debug!(booking_id = %booking.id, code, "gift card not held, leaving it alone"),
            _ => {}
        }
    }

    if !queries::update_booking_status(conn, id, next, booking.version, &now)? {
        return Err(AppError::VersionConflict(id.to_string()));
    }

    tracing::info!(booking_id = id, from = %booking.status, to = %next, "booking status changed");
    booking.status = next;
    booking.version += 1;
    booking.updated_at = now;
    Ok((booking, true))
}

async fn notify(state: &AppState, kind: NotificationKind, booking: &Booking) {
    let timeout = Duration::from_millis(state.config.notification_timeout_ms);
    match tokio::time::timeout(timeout, state.notifier.notify(kind, booking)).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            tracing::warn!(booking_id = %booking.id, kind = kind.as_str(), error = %e, "notification failed");
        }
        Err(_) => {
            tracing::warn!(booking_id = %booking.id, kind = kind.as_str(), "notification timed out");
        }
    }
}

fn load(state: &AppState, id: &str) -> Result<Booking, AppError> {
    let conn = state.conn()?;
    queries::get_booking_by_id(&conn, id)?.ok_or_else(|| AppError::NotFound(format!("booking {id}")))
}

/// Cancels a booking, releasing its gift card if still held. Cancelling an already
/// cancelled booking returns it unchanged. The caller has checked
/// `actor.may_manage(..)`.
pub async fn cancel_booking(state: &AppState, id: &str, actor: &Actor) -> Result<Booking, AppError> {
    let (booking, changed) = transition(state, id, BookingStatus::Cancelled).await?;
    if changed {
        tracing::info!(booking_id = id, by_admin = actor.is_admin, user_id = ?actor.user_id, "booking cancelled");
        notify(state, NotificationKind::Cancellation, &booking).await;
    }
    Ok(booking)
}

fn load_by_reference(state: &AppState, reference: &str) -> Result<Booking, AppError> {
    let conn = state.conn()?;
    queries::get_booking_by_payment_reference(&conn, reference)?
        .ok_or_else(|| AppError::NotFound(format!("payment reference {reference}")))
}

/// Successful payment: PENDING -> CONFIRMED and the held card is redeemed.
/// Repeated deliveries for a confirmed booking are ignored. A payment for a hold
/// whose room was taken after it expired cancels the booking instead.
pub async fn confirm_payment(state: &AppState, reference: &str) -> Result<Booking, AppError> {
    let booking = load_by_reference(state, reference)?;
    if booking.status == BookingStatus::Confirmed {
        return Ok(booking);
    }

    let (booking, changed) = match transition(state, &booking.id, BookingStatus::Confirmed).await {
        Ok(outcome) => outcome,
        Err(AppError::InsufficientCapacity { reason, .. }) => {
            tracing::error!(
                booking_id = %booking.id,
                reference = %reference,
                total = %booking.total_price,
                reason = %reason,
                "payment received for a booking that lost its room, cancelling; refund required"
            );
            let (booking, changed) = transition(state, &booking.id, BookingStatus::Cancelled).await?;
            if changed {
                notify(state, NotificationKind::Cancellation, &booking).await;
            }
            return Ok(booking);
        }
        Err(e) => return Err(e),
    };
    if changed {
        notify(state, NotificationKind::PaymentConfirmed, &booking).await;
    }
    Ok(booking)
}

/// Failed or abandoned payment: a PENDING booking is cancelled and its card
/// released. Bookings that were already confirmed are left as they are.
pub async fn fail_payment(state: &AppState, reference: &str) -> Result<Booking, AppError> {
    let booking = load_by_reference(state, reference)?;
    if booking.status != BookingStatus::Pending {
        tracing::info!(booking_id = %booking.id, status = %booking.status, "ignoring payment failure");
        return Ok(booking);
    }

    let (booking, changed) = transition(state, &booking.id, BookingStatus::Cancelled).await?;
    if changed {
        notify(state, NotificationKind::Cancellation, &booking).await;
    }
    Ok(booking)
}

pub async fn update_status(state: &AppState, id: &str, next: BookingStatus) -> Result<Booking, AppError> {
    let (booking, changed) = transition(state, id, next).await?;
    if changed {
        let kind = match next {
            BookingStatus::Cancelled => NotificationKind::Cancellation,
            _ => NotificationKind::PaymentConfirmed,
        };
        notify(state, kind, &booking).await;
    }
    Ok(booking)
}

pub fn get_booking(state: &AppState, id: &str) -> Result<Booking, AppError> {
    load(state, id)
}

pub fn list_bookings(state: &AppState, status: Option<BookingStatus>, limit: i64) -> Result<Vec<Booking>, AppError> {
    let conn = state.conn()?;
    Ok(queries::list_bookings(&conn, status, limit)?)
}

pub fn list_bookings_for_user(state: &AppState, user_id: &str) -> Result<Vec<Booking>, AppError> {
    let conn = state.conn()?;
    Ok(queries::list_bookings_for_user(&conn, user_id)?)
}
