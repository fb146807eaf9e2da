use std::env;
use std::str::FromStr;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub port: u16,
    pub database_url: String,
    pub admin_token: String,
    pub business_name: String,
    pub currency: String,
    /// How long an unpaid PENDING booking keeps occupying its rooms.
    pub hold_window_minutes: i64,
    pub lock_timeout_ms: u64,
    pub lock_retries: u32,
    pub notification_timeout_ms: u64,
    pub payment_api_url: String,
    pub payment_api_key: String,
    pub payment_webhook_secret: String,
    pub payment_success_url: String,
    pub payment_cancel_url: String,
    pub twilio_account_sid: String,
    pub twilio_auth_token: String,
    pub twilio_phone_number: String,
}

fn parsed_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            port: parsed_or("PORT", 3000),
            database_url: env::var("DATABASE_URL").unwrap_or_else(|_| "roombook.db".to_string()),
            admin_token: env::var("ADMIN_TOKEN").unwrap_or_else(|_| "changeme".to_string()),
            business_name: env::var("BUSINESS_NAME").unwrap_or_else(|_| "VR Escape Room".to_string()),
            currency: env::var("CURRENCY").unwrap_or_else(|_| "mkd".to_string()),
            hold_window_minutes: parsed_or("HOLD_WINDOW_MINUTES", 15),
            lock_timeout_ms: parsed_or("LOCK_TIMEOUT_MS", 2000),
            lock_retries: parsed_or("LOCK_RETRIES", 3),
            notification_timeout_ms: parsed_or("NOTIFICATION_TIMEOUT_MS", 5000),
            payment_api_url: env::var("PAYMENT_API_URL").unwrap_or_default(),
            payment_api_key: env::var("PAYMENT_API_KEY").unwrap_or_default(),
            payment_webhook_secret: env::var("PAYMENT_WEBHOOK_SECRET").unwrap_or_default(),
            payment_success_url: env::var("PAYMENT_SUCCESS_URL")
                .unwrap_or_else(|_| "http://localhost:4200/booking/success".to_string()),
            payment_cancel_url: env::var("PAYMENT_CANCEL_URL")
                .unwrap_or_else(|_| "http://localhost:4200/booking/cancel".to_string()),
            twilio_account_sid: env::var("TWILIO_ACCOUNT_SID").unwrap_or_default(),
            twilio_auth_token: env::var("TWILIO_AUTH_TOKEN").unwrap_or_default(),
            twilio_phone_number: env::var("TWILIO_PHONE_NUMBER").unwrap_or_default(),
        }
    }

    pub fn hold_window(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.hold_window_minutes)
    }
}
