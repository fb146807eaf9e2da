pub mod hosted;

use async_trait::async_trait;
use base64::Engine;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha1::Sha1;

use crate::models::Booking;

/// Handle to a checkout started with the payment collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutSession {
    /// Opaque reference the provider echoes back in its webhook.
    pub reference: String,
    pub url: String,
}

#[async_trait]
pub trait PaymentProvider: Send + Sync {
    async fn create_checkout(&self, booking: &Booking) -> anyhow::Result<CheckoutSession>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentEventKind {
    #[serde(rename = "checkout.completed")]
    Completed,
    #[serde(rename = "checkout.expired")]
    Expired,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentEvent {
    pub event: PaymentEventKind,
    pub reference: String,
}

/// base64(HMAC-SHA1(secret, body)).
pub fn sign_payload(secret: &str, body: &[u8]) -> Option<String> {
    let mut mac = Hmac::<Sha1>::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(body);
    Some(base64::engine::general_purpose::STANDARD.encode(mac.finalize().into_bytes()))
}

pub fn verify_signature(secret: &str, body: &[u8], signature: &str) -> bool {
    let Ok(provided) = base64::engine::general_purpose::STANDARD.decode(signature) else {
        return false;
    };
    let Ok(mut mac) = Hmac::<Sha1>::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    mac.verify_slice(&provided).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_round_trip() {
        let body = br#"{"event":"checkout.completed","reference":"cs_1"}"#;
        let signature = sign_payload("secret", body).unwrap();
        assert!(verify_signature("secret", body, &signature));
        assert!(!verify_signature("other", body, &signature));
        assert!(!verify_signature("secret", b"tampered", &signature));
        assert!(!verify_signature("secret", body, "not base64!"));
    }

    #[test]
    fn test_event_wire_names() {
        let event: PaymentEvent =
            serde_json::from_str(r#"{"event":"checkout.expired","reference":"cs_9"}"#).unwrap();
        assert_eq!(event.event, PaymentEventKind::Expired);
        assert_eq!(event.reference, "cs_9");
    }
}
