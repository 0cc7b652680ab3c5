use serde::Serialize;

use crate::deck::{shoe_size, Rank, RankCounts, CARDS_PER_DECK};

/// Hi-Lo tag for a single card.
pub fn hi_lo_weight(rank: Rank) -> i32 {
    match rank.value() {
        2..=6 => 1,
        7..=9 => 0,
        _ => -1,
    }
}

pub fn running_count<'a>(cards: impl IntoIterator<Item = &'a Rank>) -> i32 {
    cards.into_iter().map(|&card| hi_lo_weight(card)).sum()
}

/// Running count normalised per remaining deck; zero once the shoe is exhausted.
pub fn true_count(running: i32, cards_left: u32) -> f64 {
    if cards_left == 0 {
        0.0
    } else {
        running as f64 / (cards_left as f64 / CARDS_PER_DECK as f64)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CountSnapshot {
    pub running_count: i32,
    pub true_count: f64,
    pub cards_left: u32,
    pub physical_left: u32,
}

impl CountSnapshot {
    pub fn compute(accounted: &RankCounts, decks: u32, burned: u32) -> Self {
        let running_count = accounted
            .iter()
            .map(|(rank, count)| hi_lo_weight(rank) * count as i32)
            .sum();
        let cards_left = shoe_size(decks).saturating_sub(accounted.total());
        CountSnapshot {
            running_count,
            true_count: true_count(running_count, cards_left),
            cards_left,
            physical_left: cards_left.saturating_sub(burned),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cards(values: &[u8]) -> Vec<Rank> {
        values.iter().map(|&v| Rank::new(v).unwrap()).collect()
    }

    #[test]
    fn test_hi_lo_weights() {
        let weights: Vec<i32> = Rank::all().map(hi_lo_weight).collect();
        assert_eq!(weights, vec![1, 1, 1, 1, 1, 0, 0, 0, -1, -1]);
    }

    #[test]
    fn test_running_count_matches_tally() {
        let hand = cards(&[2, 3, 10, 11, 7, 6]);
        assert_eq!(running_count(&hand), 1);
        let snapshot = CountSnapshot::compute(&RankCounts::from_cards(&hand), 1, 0);
        assert_eq!(snapshot.running_count, 1);
        assert_eq!(snapshot.cards_left, 46);
    }

    #[test]
    fn test_true_count_per_deck() {
        assert_eq!(true_count(-6, 104), -3.0);
        assert_eq!(true_count(5, 0), 0.0);
    }

    #[test]
    fn test_physical_left_subtracts_burn() {
        let snapshot = CountSnapshot::compute(&RankCounts::default(), 2, 10);
        assert_eq!(snapshot.cards_left, 104);
        assert_eq!(snapshot.physical_left, 94);
        let exhausted = CountSnapshot::compute(&RankCounts::default(), 1, 60);
        assert_eq!(exhausted.physical_left, 0);
    }
}
