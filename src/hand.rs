use crate::deck::Rank;

/// Best blackjack total for `hand`, and whether an Ace still counts as 11.
pub fn hand_value(hand: &[Rank]) -> (u8, bool) {
    let mut total: u32 = 0;
    let mut aces = 0;

    for &card in hand {
        total += card.value() as u32;
        if card == Rank::ACE {
            aces += 1;
        }
    }

    while total > 21 && aces > 0 {
        total -= 10;
        aces -= 1;
    }

    (total.min(u8::MAX as u32) as u8, aces > 0)
}

pub fn is_blackjack(hand: &[Rank]) -> bool {
    hand.len() == 2 && hand_value(hand).0 == 21
}

pub fn is_pair(hand: &[Rank]) -> bool {
    hand.len() == 2 && hand[0] == hand[1]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cards(values: &[u8]) -> Vec<Rank> {
        values.iter().map(|&v| Rank::new(v).unwrap()).collect()
    }

    #[test]
    fn test_ace_king_is_21() {
        let hand = cards(&[11, 10]);
        assert_eq!(hand_value(&hand), (21, true));
        assert!(is_blackjack(&hand));
    }

    #[test]
    fn test_soft_ace_reduces() {
        assert_eq!(hand_value(&cards(&[11, 6, 9])), (16, false));
        assert_eq!(hand_value(&cards(&[11, 11, 9])), (21, true));
    }

    #[test]
    fn test_empty_hand() {
        assert_eq!(hand_value(&[]), (0, false));
        assert!(!is_pair(&[]));
    }

    #[test]
    fn test_pair_detection() {
        assert!(is_pair(&cards(&[8, 8])));
        assert!(!is_pair(&cards(&[8, 9])));
        assert!(!is_pair(&cards(&[8, 8, 8])));
    }
}
