use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::errors::AppError;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PricingTier {
    pub min_players: u32,
    pub max_players: u32,
    pub price_per_player: Decimal,
}

/// Ordered pricing tiers; the first tier covering a player count wins.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TierTable {
    pub tiers: Vec<PricingTier>,
}

impl TierTable {
    pub fn new(tiers: Vec<PricingTier>) -> Self {
        Self { tiers }
    }

    pub fn price_per_player(&self, players: u32) -> Result<Decimal, AppError> {
        self.tiers
            .iter()
            .find(|tier| (tier.min_players..=tier.max_players).contains(&players))
            .map(|tier| tier.price_per_player)
            .ok_or(AppError::NoMatchingTier { players })
    }
}

/// Price of one booking line before and after its promotion.
#[derive(Debug, Clone, PartialEq)]
pub struct LinePrice {
    pub base: Decimal,
    pub final_price: Decimal,
    pub discount_fraction: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PricePreview {
    pub base_price: Decimal,
    pub final_price: Decimal,
    pub discount_amount: Decimal,
    pub discount_fraction: Decimal,
    pub promotion_name: Option<String>,
}
