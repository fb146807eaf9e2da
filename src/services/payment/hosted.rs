use anyhow::Context;
use async_trait::async_trait;
use rust_decimal::prelude::*;
use serde_json::json;

use super::{CheckoutSession, PaymentProvider};
use crate::models::Booking;

/// Hosted checkout page provider. Amounts are sent in minor units.
pub struct HostedCheckoutProvider {
    api_url: String,
    api_key: String,
    currency: String,
    success_url: String,
    cancel_url: String,
    client: reqwest::Client,
}

impl HostedCheckoutProvider {
    pub fn new(
        api_url: String,
        api_key: String,
        currency: String,
        success_url: String,
        cancel_url: String,
    ) -> Self {
        Self {
            api_url,
            api_key,
            currency,
            success_url,
            cancel_url,
            client: reqwest::Client::new(),
        }
    }
}

fn minor_units(amount: Decimal) -> anyhow::Result<i64> {
    (amount * Decimal::ONE_HUNDRED)
        .round()
        .to_i64()
        .ok_or_else(|| anyhow::anyhow!("amount {amount} out of range"))
}

#[async_trait]
impl PaymentProvider for HostedCheckoutProvider {
    async fn create_checkout(&self, booking: &Booking) -> anyhow::Result<CheckoutSession> {
        let body = json!({
            "amount": minor_units(booking.total_price)?,
            "currency": self.currency,
            "client_reference_id": booking.id,
            "customer_email": booking.customer.email,
            "success_url": self.success_url,
            "cancel_url": self.cancel_url,
            "description": format!(
                "Booking {} {}",
                booking.date.format("%Y-%m-%d"),
                booking.time.format("%H:%M")
            ),
        });

        let resp = self
            .client
            .post(format!("{}/checkout/sessions", self.api_url.trim_end_matches('/')))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .context("failed to call payment API")?;

        let status = resp.status();
        let data: serde_json::Value = resp
            .json()
            .await
            .context("failed to parse payment API response")?;

        if !status.is_success() {
            anyhow::bail!("payment API error ({}): {}", status, data);
        }

        let reference = data["id"]
            .as_str()
            .ok_or_else(|| anyhow::anyhow!("missing id in checkout response"))?;
        let url = data["url"]
            .as_str()
            .ok_or_else(|| anyhow::anyhow!("missing url in checkout response"))?;

        Ok(CheckoutSession {
            reference: reference.to_string(),
            url: url.to_string(),
        })
    }
}
