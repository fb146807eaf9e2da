use anyhow::Context;
use chrono::NaiveTime;
use rusqlite::Connection;
use rust_decimal::Decimal;

use super::queries;
use crate::models::{Game, PricingTier, SlotConfig};

pub fn default_slot_config() -> SlotConfig {
    SlotConfig {
        opening_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap_or_default(),
        closing_time: NaiveTime::from_hms_opt(22, 0, 0).unwrap_or_default(),
        slot_duration_minutes: 60,
        max_concurrent_rooms: 2,
    }
}

pub fn default_tiers() -> Vec<PricingTier> {
    [(2, 2, 1000), (3, 3, 950), (4, 5, 900), (6, 6, 850)]
        .into_iter()
        .map(|(min_players, max_players, price)| PricingTier {
            min_players,
            max_players,
            price_per_player: Decimal::from(price),
        })
        .collect()
}

fn default_games() -> Vec<Game> {
    [
        ("escape-the-lab", "Escape the Lab", 2, 6),
        ("haunted-manor", "Haunted Manor", 2, 5),
        ("space-station", "Space Station Omega", 3, 6),
    ]
    .into_iter()
    .map(|(id, name, min_players, max_players)| Game {
        id: id.to_string(),
        name: name.to_string(),
        description: None,
        duration_minutes: 60,
        min_players,
        max_players,
        active: true,
    })
    .collect()
}

/// Seeds defaults into empty tables. Safe to run any number of times; tables that
/// already hold rows are left alone.
pub fn bootstrap(conn: &mut Connection) -> anyhow::Result<()> {
    let tx = conn.transaction().context("failed to begin bootstrap")?;

    if queries::count_rows(&tx, "slot_config")? == 0 {
        queries::insert_slot_config(&tx, &default_slot_config())
            .context("failed to seed slot config")?;
        tracing::info!("seeded default slot configuration");
    }

    if queries::count_rows(&tx, "pricing_tiers")? == 0 {
        for tier in default_tiers() {
            queries::insert_pricing_tier(&tx, &tier).context("failed to seed pricing tier")?;
        }
        tracing::info!("seeded default pricing tiers");
    }

    if queries::count_rows(&tx, "games")? == 0 {
        for game in default_games() {
            queries::insert_game(&tx, &game).context("failed to seed game")?;
        }
        tracing::info!("seeded default games");
    }

    tx.commit().context("failed to commit bootstrap")?;
    Ok(())
}
