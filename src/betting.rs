use serde::Serialize;

use crate::config::BettingSettings;
use crate::counter::{running_count, true_count, CountSnapshot};
use crate::deck::{shoe_size, Rank};

/// True counts below this flatten the bet to the table minimum.
pub const NEGATIVE_COUNT_THRESHOLD: f64 = -0.5;

/// Count-based bet ramp. Implementations must be pure: the same accounted
/// cards and deck count always give the same answer.
pub trait BetRamp {
    /// Units to bet, or `None` where the ramp is undefined for this shoe
    /// (no cards left to divide by).
    fn units(&self, accounted: &[Rank], decks: u32) -> Option<u32>;
}

impl<F> BetRamp for F
where
    F: Fn(&[Rank], u32) -> Option<u32>,
{
    fn units(&self, accounted: &[Rank], decks: u32) -> Option<u32> {
        self(accounted, decks)
    }
}

/// One unit per point of true count, floored at one and capped at `max_units`.
#[derive(Debug, Clone, Copy)]
pub struct TrueCountRamp {
    pub max_units: u32,
}

impl Default for TrueCountRamp {
    fn default() -> Self {
        TrueCountRamp { max_units: 8 }
    }
}

impl BetRamp for TrueCountRamp {
    fn units(&self, accounted: &[Rank], decks: u32) -> Option<u32> {
        let cards_left = shoe_size(decks).checked_sub(accounted.len() as u32)?;
        if cards_left == 0 {
            return None;
        }
        let count = true_count(running_count(accounted), cards_left);
        Some((count.floor() as i64).clamp(1, self.max_units.max(1) as i64) as u32)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum BetNote {
    /// The ramp was scaled down because too few cards remain for the round.
    LowShoe,
    /// Negative count: only the table minimum is offered.
    ForcedMinimum,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BetAdvice {
    pub raw_units: u32,
    pub units: u32,
    pub amount: f64,
    pub note: Option<BetNote>,
}

/// Currency value of `units` given the bankroll settings, never above the bankroll.
pub fn actual_amount(units: u32, settings: &BettingSettings) -> f64 {
    if settings.bankroll <= 0.0 || units == 0 {
        return 0.0;
    }
    let unit_value = settings.bankroll * settings.unit_percent / 100.0;
    (units as f64 * unit_value).min(settings.bankroll)
}

pub fn advise(
    ramp: &dyn BetRamp,
    accounted: &[Rank],
    decks: u32,
    count: &CountSnapshot,
    open_hands: usize,
    settings: &BettingSettings,
) -> BetAdvice {
    let raw_units = ramp.units(accounted, decks).unwrap_or(0);

    if count.true_count < NEGATIVE_COUNT_THRESHOLD {
        let amount = if settings.bankroll <= 0.0 {
            0.0
        } else {
            settings.min_bet.min(settings.bankroll)
        };
        return BetAdvice {
            raw_units,
            units: 0,
            amount,
            note: Some(BetNote::ForcedMinimum),
        };
    }

    let mut units = raw_units;
    let mut note = None;
    if raw_units > 1 && count.physical_left > 0 {
        let needed = (open_hands.max(1) as u32 + 1) * 4;
        if count.physical_left < needed {
            let scale = count.physical_left as f64 / needed as f64;
            let damped = ((1.0 + (raw_units - 1) as f64 * scale).floor() as u32).max(1);
            if damped < raw_units {
                units = damped;
                note = Some(BetNote::LowShoe);
            }
        }
    }

    let mut amount = actual_amount(units, settings);
    if amount > 0.0 && amount < settings.min_bet {
        amount = settings.min_bet.min(settings.bankroll);
    }

    BetAdvice {
        raw_units,
        units,
        amount,
        note,
    }
}

/// Text a host pastes into the table chat to place the bet.
pub fn bet_command(amount: f64) -> String {
    format!("$bj {}", amount.round() as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixed(units: u32) -> impl Fn(&[Rank], u32) -> Option<u32> {
        move |_: &[Rank], _: u32| Some(units)
    }

    fn snapshot(true_count: f64, physical_left: u32) -> CountSnapshot {
        CountSnapshot {
            running_count: 0,
            true_count,
            cards_left: physical_left,
            physical_left,
        }
    }

    fn settings() -> BettingSettings {
        BettingSettings {
            bankroll: 10_000.0,
            unit_percent: 1.0,
            min_bet: 50.0,
        }
    }

    #[test]
    fn test_units_scale_with_bankroll() {
        let advice = advise(&fixed(3), &[], 6, &snapshot(2.0, 200), 1, &settings());
        assert_eq!(advice.units, 3);
        assert_eq!(advice.amount, 300.0);
        assert_eq!(advice.note, None);
    }

    #[test]
    fn test_negative_count_forces_minimum() {
        let advice = advise(&fixed(6), &[], 2, &snapshot(-3.0, 104), 1, &settings());
        assert_eq!(advice.raw_units, 6);
        assert_eq!(advice.amount, 50.0);
        assert_eq!(advice.note, Some(BetNote::ForcedMinimum));
    }

    #[test]
    fn test_negative_count_with_empty_bankroll() {
        let broke = BettingSettings {
            bankroll: 0.0,
            ..settings()
        };
        let advice = advise(&fixed(6), &[], 2, &snapshot(-1.0, 104), 1, &broke);
        assert_eq!(advice.amount, 0.0);
    }

    #[test]
    fn test_low_shoe_dampens_units() {
        // two hands need 12 cards; 6 left halves the ramp above one unit
        let advice = advise(&fixed(5), &[], 1, &snapshot(1.0, 6), 2, &settings());
        assert_eq!(advice.units, 3);
        assert_eq!(advice.note, Some(BetNote::LowShoe));
    }

    #[test]
    fn test_min_bet_floor() {
        let thin = BettingSettings {
            unit_percent: 0.25,
            ..settings()
        };
        let advice = advise(&fixed(1), &[], 1, &snapshot(0.0, 40), 1, &thin);
        assert_eq!(advice.amount, 50.0);
        let small_bank = BettingSettings {
            bankroll: 30.0,
            ..thin
        };
        let advice = advise(&fixed(1), &[], 1, &snapshot(0.0, 40), 1, &small_bank);
        assert_eq!(advice.amount, 30.0);
    }

    #[test]
    fn test_undefined_ramp_is_zero_units() {
        let undefined = |_: &[Rank], _: u32| -> Option<u32> { None };
        let advice = advise(&undefined, &[], 1, &snapshot(0.0, 0), 1, &settings());
        assert_eq!(advice.units, 0);
        assert_eq!(advice.amount, 0.0);
    }

    #[test]
    fn test_true_count_ramp() {
        let ramp = TrueCountRamp::default();
        let low: Vec<Rank> = (0..12).map(|_| Rank::new(4).unwrap()).collect();
        // running +12 over 40 cards left
        assert_eq!(ramp.units(&low, 1), Some(8));
        assert_eq!(ramp.units(&[], 1), Some(1));
        let all: Vec<Rank> = Rank::all()
            .flat_map(|r| std::iter::repeat(r).take(crate::deck::capacity(r, 1) as usize))
            .collect();
        assert_eq!(ramp.units(&all, 1), None);
    }

    #[test]
    fn test_bet_command_rounds() {
        assert_eq!(bet_command(149.6), "$bj 150");
        assert_eq!(bet_command(100.0), "$bj 100");
    }
}
