use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Game {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub duration_minutes: u32,
    pub min_players: u32,
    pub max_players: u32,
    pub active: bool,
}

impl Game {
    pub fn allows_players(&self, players: u32) -> bool {
        (self.min_players..=self.max_players).contains(&players)
    }
}
