use anyhow::Context;
use async_trait::async_trait;

use super::{render, NotificationKind, Notifier};
use crate::models::Booking;

/// Texts the booking's customer phone through the Twilio REST API.
pub struct SmsNotifier {
    account_sid: String,
    auth_token: String,
    from_number: String,
    business_name: String,
    client: reqwest::Client,
}

impl SmsNotifier {
    pub fn new(account_sid: String, auth_token: String, from_number: String, business_name: String) -> Self {
        Self {
            account_sid,
            auth_token,
            from_number,
            business_name,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl Notifier for SmsNotifier {
    async fn notify(&self, kind: NotificationKind, booking: &Booking) -> anyhow::Result<()> {
        let Some(to) = booking.customer.phone.as_deref().filter(|p| !p.is_empty()) else {
            tracing::debug!(booking_id = %booking.id, "no customer phone, skipping SMS");
            return Ok(());
        };

        let url = format!(
            "https://api.twilio.com/2010-04-01/Accounts/{}/Messages.json",
            self.account_sid
        );
        let body = render(&self.business_name, kind, booking);

        self.client
            .post(&url)
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(&[("To", to), ("From", self.from_number.as_str()), ("Body", body.as_str())])
            .send()
            .await
            .context("failed to send Twilio SMS")?
            .error_for_status()
            .context("Twilio API returned error")?;

        tracing::info!(booking_id = %booking.id, kind = kind.as_str(), "sent SMS notification");
        Ok(())
    }
}
