use std::sync::{Arc, Mutex, MutexGuard};

use rusqlite::Connection;

use crate::config::AppConfig;
use crate::errors::AppError;
use crate::services::clock::Clock;
use crate::services::locks::LockRegistry;
use crate::services::notification::Notifier;
use crate::services::payment::PaymentProvider;

pub struct AppState {
    pub db: Arc<Mutex<Connection>>,
    pub config: AppConfig,
    pub clock: Arc<dyn Clock>,
    pub locks: LockRegistry,
    pub payments: Box<dyn PaymentProvider>,
    pub notifier: Box<dyn Notifier>,
}

impl AppState {
    /// Exclusive access to the shared connection. Never hold the guard across an
    /// `.await`.
    pub fn conn(&self) -> Result<MutexGuard<'_, Connection>, AppError> {
        self.db
            .lock()
            .map_err(|_| AppError::Internal("database mutex poisoned".to_string()))
    }
}
