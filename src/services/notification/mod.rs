pub mod twilio;

use async_trait::async_trait;

use crate::models::Booking;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    Confirmation,
    Cancellation,
    PaymentConfirmed,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::Confirmation => "confirmation",
            NotificationKind::Cancellation => "cancellation",
            NotificationKind::PaymentConfirmed => "payment_confirmed",
        }
    }
}

/// Outbound customer notification. Delivery is best-effort: callers log and
/// drop errors.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, kind: NotificationKind, booking: &Booking) -> anyhow::Result<()>;
}

/// Short customer-facing text for `kind`.
pub fn render(business_name: &str, kind: NotificationKind, booking: &Booking) -> String {
    let when = format!("{} at {}", booking.date.format("%d.%m.%Y"), booking.time.format("%H:%M"));
    match kind {
        NotificationKind::Confirmation => format!(
            "{business_name}: booking received for {when}. Total {}. Ref {}.",
            booking.total_price, booking.id
        ),
        NotificationKind::Cancellation => {
            format!("{business_name}: your booking for {when} was cancelled. Ref {}.", booking.id)
        }
        NotificationKind::PaymentConfirmed => format!(
            "{business_name}: payment received, your booking for {when} is confirmed. Ref {}.",
            booking.id
        ),
    }
}

/// Writes notifications to the log instead of sending them.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, kind: NotificationKind, booking: &Booking) -> anyhow::Result<()> {
        tracing::info!(
            booking_id = %booking.id,
            kind = kind.as_str(),
            email = booking.customer.email.as_deref().unwrap_or(""),
            "notification (log only)"
        );
        Ok(())
    }
}
