//! Scoped mutual exclusion for booking slots and gift cards.
//!
//! Each key maps to its own async mutex, so requests for different slots never
//! contend. A [`LockHandle`] holds the key's mutex until it is dropped, which
//! happens on every exit path of the orchestration call that took it.

use std::collections::HashMap;
use std::fmt::Display;
use std::hash::Hash;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{NaiveDate, NaiveTime};
use tokio::sync::OwnedMutexGuard;

use crate::errors::AppError;

pub struct KeyedMutex<K> {
    entries: Mutex<HashMap<K, Arc<tokio::sync::Mutex<()>>>>,
}

impl<K> Default for KeyedMutex<K> {
    fn default() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }
}

impl<K> KeyedMutex<K>
where
    K: Eq + Hash + Clone + Display,
{
    fn entry(&self, key: &K) -> Result<Arc<tokio::sync::Mutex<()>>, AppError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| AppError::Internal("lock registry poisoned".to_string()))?;

        // Drop mutexes nobody holds or waits on.
        entries.retain(|k, m| k == key || Arc::strong_count(m) > 1);

        Ok(entries
            .entry(key.clone())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone())
    }

    pub async fn acquire(&self, key: K, timeout: Duration) -> Result<LockHandle, AppError> {
        let mutex = self.entry(&key)?;
        match tokio::time::timeout(timeout, mutex.lock_owned()).await {
            Ok(guard) => Ok(LockHandle {
                _guard: guard,
                key: key.to_string(),
            }),
            Err(_) => {
                tracing::warn!(key = %key, "lock acquisition timed out");
                Err(AppError::LockTimeout(key.to_string()))
            }
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }
}

/// Exclusive hold on one key; released when dropped.
#[derive(Debug)]
pub struct LockHandle {
    _guard: OwnedMutexGuard<()>,
    key: String,
}

impl LockHandle {
    pub fn key(&self) -> &str {
        &self.key
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SlotKey {
    pub date: NaiveDate,
    pub time: NaiveTime,
}

impl Display for SlotKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "slot {} {}", self.date, self.time.format("%H:%M"))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GiftCardKey(pub String);

impl Display for GiftCardKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "gift card {}", self.0)
    }
}

/// Lock scopes used by the booking orchestrator. Slot locks are always taken
/// before gift-card locks.
pub struct LockRegistry {
    slots: KeyedMutex<SlotKey>,
    gift_cards: KeyedMutex<GiftCardKey>,
    timeout: Duration,
}

impl LockRegistry {
    pub fn new(timeout: Duration) -> Self {
        Self {
            slots: KeyedMutex::default(),
            gift_cards: KeyedMutex::default(),
            timeout,
        }
    }

    pub async fn lock_slot(&self, date: NaiveDate, time: NaiveTime) -> Result<LockHandle, AppError> {
        self.slots
            .acquire(SlotKey { date, time }, self.timeout)
            .await
    }

    pub async fn lock_gift_card(&self, code: &str) -> Result<LockHandle, AppError> {
        self.gift_cards
            .acquire(GiftCardKey(code.to_string()), self.timeout)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slot() -> (NaiveDate, NaiveTime) {
        (
            NaiveDate::from_ymd_opt(2030, 1, 1).unwrap(),
            NaiveTime::from_hms_opt(12, 0, 0).unwrap(),
        )
    }

    #[tokio::test]
    async fn test_second_holder_times_out() {
        let registry = LockRegistry::new(Duration::from_millis(50));
        let (date, time) = slot();

        let first = registry.lock_slot(date, time).await.unwrap();
        assert_eq!(first.key(), "slot 2030-01-01 12:00");

        let second = registry.lock_slot(date, time).await;
        assert!(matches!(second, Err(AppError::LockTimeout(_))));

        drop(first);
        assert!(registry.lock_slot(date, time).await.is_ok());
    }

    #[tokio::test]
    async fn test_distinct_keys_do_not_contend() {
        let registry = LockRegistry::new(Duration::from_millis(50));
        let (date, time) = slot();

        let _a = registry.lock_slot(date, time).await.unwrap();
        let later = time + chrono::Duration::hours(1);
        assert!(registry.lock_slot(date, later).await.is_ok());
        assert!(registry.lock_gift_card("GC-1").await.is_ok());
    }

    #[tokio::test]
    async fn test_unused_entries_are_pruned() {
        let keyed: KeyedMutex<GiftCardKey> = KeyedMutex::default();
        for code in ["A", "B", "C"] {
            let handle = keyed
                .acquire(GiftCardKey(code.to_string()), Duration::from_millis(50))
                .await
                .unwrap();
            drop(handle);
        }
        // Only the most recently requested key survives pruning.
        assert_eq!(keyed.len(), 1);
    }
}
