use std::sync::{Arc, Mutex};
use std::time::Duration;

use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use roombook::config::AppConfig;
use roombook::db;
use roombook::handlers;
use roombook::services::clock::SystemClock;
use roombook::services::locks::LockRegistry;
use roombook::services::notification::twilio::SmsNotifier;
use roombook::services::notification::{LogNotifier, Notifier};
use roombook::services::payment::hosted::HostedCheckoutProvider;
use roombook::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = AppConfig::from_env();

    let conn = db::init_db(&config.database_url)?;

    let notifier: Box<dyn Notifier> = if config.twilio_account_sid.is_empty() {
        tracing::info!("Twilio not configured, notifications are logged only");
        Box::new(LogNotifier)
    } else {
        Box::new(SmsNotifier::new(
            config.twilio_account_sid.clone(),
            config.twilio_auth_token.clone(),
            config.twilio_phone_number.clone(),
            config.business_name.clone(),
        ))
    };

    if config.payment_api_url.is_empty() {
        tracing::warn!("PAYMENT_API_URL is not set, online checkouts will fail");
    }
    let payments = HostedCheckoutProvider::new(
        config.payment_api_url.clone(),
        config.payment_api_key.clone(),
        config.currency.clone(),
        config.payment_success_url.clone(),
        config.payment_cancel_url.clone(),
    );

    let state = Arc::new(AppState {
        db: Arc::new(Mutex::new(conn)),
        config: config.clone(),
        clock: Arc::new(SystemClock),
        locks: LockRegistry::new(Duration::from_millis(config.lock_timeout_ms)),
        payments: Box::new(payments),
        notifier,
    });

    let app = handlers::router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!(
        hold_window_minutes = config.hold_window_minutes,
        "starting {} on {addr}",
        config.business_name
    );

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
