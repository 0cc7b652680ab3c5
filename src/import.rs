//! Recovers hands from text copied out of a table client.
//!
//! Cards appear as `:<rank><suit>:` tokens (`:AH:`, `:10d:`, `:Q:`). Everything
//! before the first "Dealer Hand" belongs to the player; "Hand N" labels, when
//! present, split the player text into one block per hand.

use std::sync::LazyLock;

use regex::Regex;

use crate::deck::Rank;
use crate::error::ImportError;

/// Hand labels beyond this are treated as unlabelled.
pub const MAX_HAND_LABEL: usize = 64;

fn card_token() -> &'static Regex {
    static CARD_TOKEN: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(?i):\s*((?:10|[2-9]|[TJQKA])[HDCS]?)\s*:").unwrap());
    &CARD_TOKEN
}

fn hand_label() -> &'static Regex {
    static HAND_LABEL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\bhand\s*(\d+)").unwrap());
    &HAND_LABEL
}

fn dealer_marker() -> &'static Regex {
    static DEALER_MARKER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)dealer hand").unwrap());
    &DEALER_MARKER
}

fn your_hand() -> &'static Regex {
    static YOUR_HAND: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)your hand").unwrap());
    &YOUR_HAND
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedHands {
    pub player: Vec<Vec<Rank>>,
    pub dealer: Vec<Rank>,
    /// Zero-based index named by the first "Hand N" label, if any.
    pub hand_label: Option<usize>,
}

/// Maps a card code such as "KS", "10h" or "7" to its rank.
pub fn parse_card_code(code: &str) -> Option<Rank> {
    let cleaned: String = code.trim().to_ascii_uppercase().chars().filter(|c| *c != ' ').collect();
    if cleaned.is_empty() {
        return None;
    }
    let rank = match cleaned.strip_suffix(['H', 'D', 'C', 'S']) {
        Some(rank) if !rank.is_empty() => rank,
        _ => cleaned.as_str(),
    };
    Rank::from_code(rank)
}

pub fn extract_cards(block: &str) -> Vec<Rank> {
    card_token()
        .captures_iter(block)
        .filter_map(|caps| parse_card_code(&caps[1]))
        .collect()
}

pub fn parse(text: &str) -> Result<ParsedHands, ImportError> {
    let marker = dealer_marker()
        .find(text)
        .ok_or(ImportError::MissingDealerMarker)?;
    let player_segment = &text[..marker.start()];
    let dealer_segment = &text[marker.start()..];

    let labels: Vec<_> = hand_label().captures_iter(player_segment).collect();
    let mut player = Vec::new();
    if labels.is_empty() {
        let block = match your_hand().find(player_segment) {
            Some(found) => &player_segment[found.start()..],
            None => player_segment,
        };
        player.push(extract_cards(block));
    } else {
        for (i, caps) in labels.iter().enumerate() {
            let start = caps.get(0).map_or(0, |m| m.end());
            let end = labels
                .get(i + 1)
                .and_then(|next| next.get(0))
                .map_or(player_segment.len(), |m| m.start());
            player.push(extract_cards(&player_segment[start..end]));
        }
    }

    player.retain(|hand| !hand.is_empty());
    if player.is_empty() {
        return Err(ImportError::NoPlayerCards);
    }

    let hand_label = labels
        .first()
        .and_then(|caps| caps[1].parse::<usize>().ok())
        .filter(|&n| (1..=MAX_HAND_LABEL).contains(&n))
        .map(|n| n - 1);

    Ok(ParsedHands {
        player,
        dealer: extract_cards(dealer_segment),
        hand_label,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cards(values: &[u8]) -> Vec<Rank> {
        values.iter().map(|&v| Rank::new(v).unwrap()).collect()
    }

    #[test]
    fn test_unlabelled_single_hand() {
        let parsed = parse("Table 4 :AH::KS: waiting... Dealer Hand::10D::7C: (17)").unwrap();
        assert_eq!(parsed.player, vec![cards(&[11, 10])]);
        assert_eq!(parsed.dealer, cards(&[10, 7]));
        assert_eq!(parsed.hand_label, None);
    }

    #[test]
    fn test_missing_dealer_marker() {
        assert_eq!(parse(":AH::KS:"), Err(ImportError::MissingDealerMarker));
    }

    #[test]
    fn test_no_player_cards() {
        assert_eq!(parse("Your Hand: nothing DEALER HAND :5s:"), Err(ImportError::NoPlayerCards));
    }

    #[test]
    fn test_numbered_hands() {
        let text = "Hand 1 :8H::3D: Hand 2 :8S::QC: Hand 3 (empty) dealer hand :6H:";
        let parsed = parse(text).unwrap();
        assert_eq!(parsed.player, vec![cards(&[8, 3]), cards(&[8, 10])]);
        assert_eq!(parsed.dealer, cards(&[6]));
        assert_eq!(parsed.hand_label, Some(0));
    }

    #[test]
    fn test_your_hand_skips_preamble() {
        let text = "Last round :9H::9S: Your Hand :2C::TD: Dealer Hand :AS:";
        let parsed = parse(text).unwrap();
        assert_eq!(parsed.player, vec![cards(&[2, 10])]);
        assert_eq!(parsed.dealer, cards(&[11]));
    }

    #[test]
    fn test_single_labelled_hand() {
        let parsed = parse("hand3: :5h::5d: Dealer Hand :9c:").unwrap();
        assert_eq!(parsed.player, vec![cards(&[5, 5])]);
        assert_eq!(parsed.hand_label, Some(2));
    }

    #[test]
    fn test_parse_card_code() {
        assert_eq!(parse_card_code(" 10h "), Some(Rank::TEN));
        assert_eq!(parse_card_code("a"), Some(Rank::ACE));
        assert_eq!(parse_card_code("JC"), Some(Rank::TEN));
        assert_eq!(parse_card_code("S"), None);
        assert_eq!(parse_card_code("1"), None);
        assert_eq!(parse_card_code(""), None);
    }
}
