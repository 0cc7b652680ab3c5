use serde::{Deserialize, Serialize};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Outcome {
    Win,
    Loss,
    Push,
    /// A natural; paid 3:2 and never doubled.
    Blackjack,
}

impl Outcome {
    pub fn from_code(code: &str) -> Option<Outcome> {
        match code.to_ascii_lowercase().as_str() {
            "win" | "w" => Some(Outcome::Win),
            "loss" | "lose" | "l" => Some(Outcome::Loss),
            "push" | "p" => Some(Outcome::Push),
            "blackjack" | "bj" => Some(Outcome::Blackjack),
            _ => None,
        }
    }

    fn units(self) -> f64 {
        match self {
            Outcome::Win => 1.0,
            Outcome::Loss => -1.0,
            Outcome::Push => 0.0,
            Outcome::Blackjack => 1.5,
        }
    }
}

#[derive(Debug, Copy, Clone, Default, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum RoundState {
    #[default]
    Idle,
    #[serde(rename_all = "camelCase")]
    InProgress {
        locked_bet: Option<f64>,
        doubled: bool,
    },
}

impl RoundState {
    pub fn locked_bet(&self) -> Option<f64> {
        match self {
            RoundState::InProgress { locked_bet, .. } => *locked_bet,
            RoundState::Idle => None,
        }
    }

    pub fn is_doubled(&self) -> bool {
        matches!(self, RoundState::InProgress { doubled: true, .. })
    }

    pub fn is_in_progress(&self) -> bool {
        matches!(self, RoundState::InProgress { .. })
    }
}

/// Net bet units won or lost across the round's hands.
pub fn unit_multiplier(outcomes: &[Outcome], doubled: bool) -> f64 {
    let units: f64 = outcomes.iter().map(|outcome| outcome.units()).sum();
    match outcomes {
        [single] if doubled && *single != Outcome::Blackjack => units * 2.0,
        _ => units,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Settlement {
    pub bet: f64,
    pub units: f64,
    pub profit: f64,
    pub wins: u32,
    pub losses: u32,
    pub pushes: u32,
    pub bankroll: f64,
}

impl Settlement {
    pub fn tally(outcomes: &[Outcome]) -> (u32, u32, u32) {
        outcomes.iter().fold((0, 0, 0), |(w, l, p), outcome| match outcome {
            Outcome::Win | Outcome::Blackjack => (w + 1, l, p),
            Outcome::Loss => (w, l + 1, p),
            Outcome::Push => (w, l, p + 1),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_round_is_idle() {
        let round = RoundState::default();
        assert_eq!(round, RoundState::Idle);
        assert_eq!(round.locked_bet(), None);
        assert!(!round.is_doubled());
    }

    #[test]
    fn test_multiplier_sums_hands() {
        let outcomes = [Outcome::Win, Outcome::Loss, Outcome::Win, Outcome::Push];
        assert_eq!(unit_multiplier(&outcomes, false), 1.0);
        // doubling only applies to a single-hand round
        assert_eq!(unit_multiplier(&outcomes, true), 1.0);
    }

    #[test]
    fn test_doubled_single_hand() {
        assert_eq!(unit_multiplier(&[Outcome::Loss], true), -2.0);
        assert_eq!(unit_multiplier(&[Outcome::Blackjack], true), 1.5);
    }

    #[test]
    fn test_tally_counts_blackjack_as_win() {
        let outcomes = [Outcome::Blackjack, Outcome::Loss, Outcome::Push];
        assert_eq!(Settlement::tally(&outcomes), (1, 1, 1));
    }

    #[test]
    fn test_outcome_codes() {
        assert_eq!(Outcome::from_code("WIN"), Some(Outcome::Win));
        assert_eq!(Outcome::from_code("bj"), Some(Outcome::Blackjack));
        assert_eq!(Outcome::from_code("surrender"), None);
    }

    #[test]
    fn test_round_state_accessors() {
        let state = RoundState::InProgress {
            locked_bet: Some(25.0),
            doubled: true,
        };
        assert_eq!(state.locked_bet(), Some(25.0));
        assert!(state.is_doubled());
        assert_eq!(RoundState::Idle.locked_bet(), None);
    }
}
