//! Gift-card ledger.
//!
//! Every operation first checks the card's current status in a fixed order
//! (redeemed, not activated, in use, expired) so the reported failure is stable
//! no matter which operation hit it. Mutations are compare-and-set updates on the
//! status column: when two callers race, exactly one write matches.

use chrono::NaiveDateTime;
use rusqlite::Connection;
use rust_decimal::Decimal;

use crate::db::queries;
use crate::errors::{AppError, GiftCardError};
use crate::models::{GiftCard, GiftCardStatus};

/// Which status checks an operation enforces. `HELD` is a failure for peek and
/// hold only.
#[derive(Clone, Copy)]
enum Check {
    Full,
    IgnoreHeld,
}

fn check(card: &GiftCard, mode: Check) -> Result<(), GiftCardError> {
    match card.status {
        GiftCardStatus::Redeemed => Err(GiftCardError::AlreadyRedeemed),
        GiftCardStatus::Inactive => Err(GiftCardError::NotActivated),
        GiftCardStatus::Held if matches!(mode, Check::Full) => Err(GiftCardError::InUse),
        GiftCardStatus::Expired => Err(GiftCardError::Expired),
        _ => Ok(()),
    }
}

fn load(conn: &Connection, code: &str) -> Result<GiftCard, AppError> {
    queries::get_gift_card(conn, code)?.ok_or_else(|| AppError::NotFound(format!("gift card {code}")))
}

/// Face value of a usable card. Never mutates.
pub fn peek(conn: &Connection, code: &str) -> Result<Decimal, AppError> {
    let card = load(conn, code)?;
    check(&card, Check::Full)?;
    Ok(card.amount)
}

/// ACTIVE -> HELD. Returns the card's face value.
pub fn hold(conn: &Connection, code: &str) -> Result<Decimal, AppError> {
    let card = load(conn, code)?;
    check(&card, Check::Full)?;

    if queries::transition_gift_card(conn, code, GiftCardStatus::Active, GiftCardStatus::Held)? {
        tracing::debug!(code, "gift card held");
        return Ok(card.amount);
    }

    // Lost the race; report whatever the winner left behind.
    let current = load(conn, code)?;
    check(&current, Check::Full)?;
    Err(GiftCardError::InUse.into())
}

/// HELD (or ACTIVE) -> REDEEMED, recording when and for which booking.
pub fn redeem(conn: &Connection, code: &str, booking_id: &str, now: NaiveDateTime) -> Result<(), AppError> {
    let card = load(conn, code)?;
    check(&card, Check::IgnoreHeld)?;

    if queries::redeem_gift_card(conn, code, booking_id, &now)? {
        tracing::info!(code, booking_id, "gift card redeemed");
        return Ok(());
    }

    let current = load(conn, code)?;
    check(&current, Check::IgnoreHeld)?;
    Err(GiftCardError::AlreadyRedeemed.into())
}

/// HELD -> ACTIVE. Releasing a card that is already ACTIVE changes nothing.
pub fn release(conn: &Connection, code: &str) -> Result<(), AppError> {
    let card = load(conn, code)?;
    check(&card, Check::IgnoreHeld)?;

    if card.status == GiftCardStatus::Held
        && queries::transition_gift_card(conn, code, GiftCardStatus::Held, GiftCardStatus::Active)?
    {
        tracing::debug!(code, "gift card released");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use chrono::NaiveDate;
    use std::sync::{Arc, Barrier, Mutex};

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2030, 1, 1)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap()
    }

    fn card(code: &str, status: GiftCardStatus) -> GiftCard {
        GiftCard {
            code: code.to_string(),
            amount: Decimal::from(500),
            status,
            used_at: None,
            redeemed_booking_id: None,
        }
    }

    fn setup_db(status: GiftCardStatus) -> Connection {
        let conn = db::init_db(":memory:").unwrap();
        queries::insert_gift_card(&conn, &card("GC-1", status)).unwrap();
        conn
    }

    fn status(conn: &Connection) -> GiftCardStatus {
        queries::get_gift_card(conn, "GC-1").unwrap().unwrap().status
    }

    fn gift_err(result: Result<impl std::fmt::Debug, AppError>) -> GiftCardError {
        match result {
            Err(AppError::GiftCard(e)) => e,
            other => panic!("expected gift card error, got {other:?}"),
        }
    }

    #[test]
    fn test_lifecycle() {
        let conn = setup_db(GiftCardStatus::Active);

        assert_eq!(hold(&conn, "GC-1").unwrap(), Decimal::from(500));
        assert_eq!(status(&conn), GiftCardStatus::Held);

        redeem(&conn, "GC-1", "b1", now()).unwrap();
        let stored = queries::get_gift_card(&conn, "GC-1").unwrap().unwrap();
        assert_eq!(stored.status, GiftCardStatus::Redeemed);
        assert_eq!(stored.used_at, Some(now()));
        assert_eq!(stored.redeemed_booking_id.as_deref(), Some("b1"));

        assert_eq!(gift_err(hold(&conn, "GC-1")), GiftCardError::AlreadyRedeemed);
        assert_eq!(gift_err(redeem(&conn, "GC-1", "b2", now())), GiftCardError::AlreadyRedeemed);
    }

    #[test]
    fn test_release_then_hold_again() {
        let conn = setup_db(GiftCardStatus::Active);
        hold(&conn, "GC-1").unwrap();
        assert_eq!(gift_err(hold(&conn, "GC-1")), GiftCardError::InUse);

        release(&conn, "GC-1").unwrap();
        assert_eq!(status(&conn), GiftCardStatus::Active);
        release(&conn, "GC-1").unwrap();
        assert_eq!(status(&conn), GiftCardStatus::Active);

        hold(&conn, "GC-1").unwrap();
        assert_eq!(status(&conn), GiftCardStatus::Held);
    }

    #[test]
    fn test_peek_never_mutates() {
        let conn = setup_db(GiftCardStatus::Active);
        assert_eq!(peek(&conn, "GC-1").unwrap(), Decimal::from(500));
        assert_eq!(status(&conn), GiftCardStatus::Active);

        hold(&conn, "GC-1").unwrap();
        assert_eq!(gift_err(peek(&conn, "GC-1")), GiftCardError::InUse);
        assert_eq!(status(&conn), GiftCardStatus::Held);
    }

    #[test]
    fn test_inactive_and_expired_cards() {
        let conn = setup_db(GiftCardStatus::Inactive);
        assert_eq!(gift_err(peek(&conn, "GC-1")), GiftCardError::NotActivated);
        assert_eq!(gift_err(hold(&conn, "GC-1")), GiftCardError::NotActivated);
        assert_eq!(gift_err(redeem(&conn, "GC-1", "b1", now())), GiftCardError::NotActivated);
        assert_eq!(gift_err(release(&conn, "GC-1")), GiftCardError::NotActivated);

        let conn = setup_db(GiftCardStatus::Expired);
        assert_eq!(gift_err(hold(&conn, "GC-1")), GiftCardError::Expired);
        assert_eq!(gift_err(release(&conn, "GC-1")), GiftCardError::Expired);
    }

    #[test]
    fn test_direct_redeem_from_active() {
        let conn = setup_db(GiftCardStatus::Active);
        redeem(&conn, "GC-1", "b1", now()).unwrap();
        assert_eq!(status(&conn), GiftCardStatus::Redeemed);
    }

    #[test]
    fn test_unknown_code() {
        let conn = setup_db(GiftCardStatus::Active);
        assert!(matches!(peek(&conn, "NOPE"), Err(AppError::NotFound(_))));
        assert!(matches!(hold(&conn, "NOPE"), Err(AppError::NotFound(_))));
    }

    #[test]
    fn test_concurrent_holds_have_one_winner() {
        let path = std::env::temp_dir().join(format!("roombook-gc-{}.db", uuid::Uuid::new_v4()));
        let path = path.to_string_lossy().to_string();
        {
            let conn = db::init_db(&path).unwrap();
            queries::insert_gift_card(&conn, &card("GC-1", GiftCardStatus::Active)).unwrap();
        }

        let threads = 8;
        let barrier = Arc::new(Barrier::new(threads));
        let results = Arc::new(Mutex::new(Vec::new()));

        let handles: Vec<_> = (0..threads)
            .map(|_| {
                let barrier = barrier.clone();
                let results = results.clone();
                let path = path.clone();
                std::thread::spawn(move || {
                    let conn = Connection::open(&path).unwrap();
                    conn.busy_timeout(std::time::Duration::from_secs(5)).unwrap();
                    barrier.wait();
                    let outcome = hold(&conn, "GC-1");
                    results.lock().unwrap().push(outcome.map_err(|e| e.kind()));
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let results = results.lock().unwrap();
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(results
            .iter()
            .filter_map(|r| r.as_ref().err())
            .all(|kind| *kind == "gift_card_in_use"));

        let _ = std::fs::remove_file(&path);
    }
}
