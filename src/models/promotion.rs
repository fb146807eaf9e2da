use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Promotion {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    /// Fraction in [0, 1]; 0.5 is half price.
    pub discount: Decimal,
    pub valid_from: NaiveDate,
    pub valid_to: NaiveDate,
    /// `None` applies to every game.
    pub game_id: Option<String>,
    pub active: bool,
}

impl Promotion {
    pub fn applies_to(&self, game_id: Option<&str>, date: NaiveDate) -> bool {
        self.active
            && self.valid_from <= date
            && date <= self.valid_to
            && match self.game_id.as_deref() {
                None => true,
                Some(scoped) => game_id == Some(scoped),
            }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn promo(game_id: Option<&str>) -> Promotion {
        Promotion {
            id: "p1".to_string(),
            name: "Autumn".to_string(),
            description: None,
            discount: Decimal::new(25, 2),
            valid_from: d("2030-10-01"),
            valid_to: d("2030-10-31"),
            game_id: game_id.map(str::to_string),
            active: true,
        }
    }

    #[test]
    fn test_window_is_inclusive() {
        let p = promo(None);
        assert!(p.applies_to(Some("g1"), d("2030-10-01")));
        assert!(p.applies_to(Some("g1"), d("2030-10-31")));
        assert!(!p.applies_to(Some("g1"), d("2030-11-01")));
        assert!(!p.applies_to(Some("g1"), d("2030-09-30")));
    }

    #[test]
    fn test_game_scope() {
        let p = promo(Some("g1"));
        assert!(p.applies_to(Some("g1"), d("2030-10-10")));
        assert!(!p.applies_to(Some("g2"), d("2030-10-10")));
        assert!(!p.applies_to(None, d("2030-10-10")));
    }

    #[test]
    fn test_inactive_never_applies() {
        let mut p = promo(None);
        p.active = false;
        assert!(!p.applies_to(Some("g1"), d("2030-10-10")));
    }
}
