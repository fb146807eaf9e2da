use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GiftCard {
    pub code: String,
    pub amount: Decimal,
    pub status: GiftCardStatus,
    pub used_at: Option<NaiveDateTime>,
    pub redeemed_booking_id: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum GiftCardStatus {
    Inactive,
    Active,
    Held,
    Redeemed,
    Expired,
}

impl GiftCardStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            GiftCardStatus::Inactive => "inactive",
            GiftCardStatus::Active => "active",
            GiftCardStatus::Held => "held",
            GiftCardStatus::Redeemed => "redeemed",
            GiftCardStatus::Expired => "expired",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "inactive" => Some(GiftCardStatus::Inactive),
            "active" => Some(GiftCardStatus::Active),
            "held" => Some(GiftCardStatus::Held),
            "redeemed" => Some(GiftCardStatus::Redeemed),
            "expired" => Some(GiftCardStatus::Expired),
            _ => None,
        }
    }
}
