use serde::{Deserialize, Serialize};

use crate::deck::MAX_DECKS;

fn default_deck_number() -> u32 {
    3
}

fn default_max_splits() -> u32 {
    2
}

fn default_burn_count() -> u32 {
    5
}

fn default_bankroll() -> f64 {
    1000.0
}

fn default_unit_percent() -> f64 {
    0.5
}

fn default_min_bet() -> f64 {
    100.0
}

fn enabled() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableRules {
    #[serde(default = "default_deck_number")]
    pub deck_number: u32,
    #[serde(default = "default_max_splits")]
    pub max_splits: u32,
    #[serde(default)]
    pub dealer_hits_soft17: bool,
    #[serde(default = "enabled")]
    pub dealer_peeks: bool,
    #[serde(default = "enabled")]
    pub das: bool,
    #[serde(default = "enabled")]
    pub allow_double: bool,
    #[serde(default)]
    pub allow_insurance: bool,
    #[serde(default)]
    pub allow_surrender: bool,
    /// Default quantity the host offers when burning unknown cards.
    #[serde(default = "default_burn_count")]
    pub burn_count: u32,
}

impl Default for TableRules {
    fn default() -> Self {
        TableRules {
            deck_number: default_deck_number(),
            max_splits: default_max_splits(),
            dealer_hits_soft17: false,
            dealer_peeks: true,
            das: true,
            allow_double: true,
            allow_insurance: false,
            allow_surrender: false,
            burn_count: default_burn_count(),
        }
    }
}

impl TableRules {
    pub fn decks(&self) -> u32 {
        self.deck_number.clamp(1, MAX_DECKS)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BettingSettings {
    #[serde(default = "default_bankroll")]
    pub bankroll: f64,
    #[serde(default = "default_unit_percent")]
    pub unit_percent: f64,
    #[serde(default = "default_min_bet")]
    pub min_bet: f64,
}

impl Default for BettingSettings {
    fn default() -> Self {
        BettingSettings {
            bankroll: default_bankroll(),
            unit_percent: default_unit_percent(),
            min_bet: default_min_bet(),
        }
    }
}

impl BettingSettings {
    pub fn sanitized(self) -> Self {
        BettingSettings {
            bankroll: non_negative(self.bankroll),
            unit_percent: non_negative(self.unit_percent),
            min_bet: non_negative(self.min_bet),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub rules: TableRules,
    #[serde(default)]
    pub betting: BettingSettings,
}

pub(crate) fn non_negative(value: f64) -> f64 {
    if value.is_finite() {
        value.max(0.0)
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: EngineConfig =
            serde_json::from_str(r#"{"rules":{"deck_number":6,"allow_surrender":true}}"#).unwrap();
        assert_eq!(config.rules.deck_number, 6);
        assert!(config.rules.allow_surrender);
        assert!(config.rules.dealer_peeks);
        assert_eq!(config.rules.burn_count, 5);
        assert_eq!(config.betting, BettingSettings::default());
    }

    #[test]
    fn test_zero_decks_treated_as_one() {
        let rules = TableRules {
            deck_number: 0,
            ..TableRules::default()
        };
        assert_eq!(rules.decks(), 1);
    }

    #[test]
    fn test_huge_deck_count_capped() {
        let rules = TableRules {
            deck_number: 300_000_000,
            ..TableRules::default()
        };
        assert_eq!(rules.decks(), MAX_DECKS);
    }

    #[test]
    fn test_betting_sanitized() {
        let betting = BettingSettings {
            bankroll: -5.0,
            unit_percent: f64::NAN,
            min_bet: 25.0,
        }
        .sanitized();
        assert_eq!(betting.bankroll, 0.0);
        assert_eq!(betting.unit_percent, 0.0);
        assert_eq!(betting.min_bet, 25.0);
    }
}
