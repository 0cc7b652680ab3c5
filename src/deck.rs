use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

pub const CARDS_PER_DECK: u32 = 52;

/// Largest shoe the engine will model.
pub const MAX_DECKS: u32 = 64;

/// A blackjack card value. Ten-valued faces share rank 10, and 11 is the Ace.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Rank(u8);

impl Rank {
    pub const TEN: Rank = Rank(10);
    pub const ACE: Rank = Rank(11);

    pub fn new(value: u8) -> Option<Self> {
        (2..=11).contains(&value).then_some(Rank(value))
    }

    pub fn value(self) -> u8 {
        self.0
    }

    pub fn all() -> impl Iterator<Item = Rank> {
        (2..=11).map(Rank)
    }

    /// Parses a bare rank code: "A", "K", "Q", "J", "T", "10" or a digit.
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "A" => Some(Rank::ACE),
            "K" | "Q" | "J" | "T" => Some(Rank::TEN),
            _ => code.parse::<u8>().ok().and_then(Rank::new),
        }
    }

    pub fn label(self) -> String {
        if self == Rank::ACE {
            "A".to_string()
        } else {
            self.0.to_string()
        }
    }

    fn index(self) -> usize {
        (self.0 - 2) as usize
    }
}

impl TryFrom<u8> for Rank {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Rank::new(value).ok_or_else(|| format!("invalid rank {value}"))
    }
}

impl From<Rank> for u8 {
    fn from(rank: Rank) -> u8 {
        rank.0
    }
}

impl fmt::Display for Rank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

/// Physical copies of `rank` in a shoe of `decks` decks.
pub fn capacity(rank: Rank, decks: u32) -> u32 {
    let per_deck: u32 = if rank == Rank::TEN { 16 } else { 4 };
    per_deck.saturating_mul(decks)
}

pub fn shoe_size(decks: u32) -> u32 {
    decks.saturating_mul(CARDS_PER_DECK)
}

/// Per-rank tally, indexed by rank.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RankCounts([u32; 10]);

impl RankCounts {
    pub fn from_cards<'a>(cards: impl IntoIterator<Item = &'a Rank>) -> Self {
        let mut counts = RankCounts::default();
        for &card in cards {
            counts.add(card, 1);
        }
        counts
    }

    pub fn get(&self, rank: Rank) -> u32 {
        self.0[rank.index()]
    }

    pub fn set(&mut self, rank: Rank, count: u32) {
        self.0[rank.index()] = count;
    }

    pub fn add(&mut self, rank: Rank, count: u32) {
        self.0[rank.index()] += count;
    }

    pub fn total(&self) -> u32 {
        self.0.iter().sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Rank, u32)> + '_ {
        Rank::all().map(move |rank| (rank, self.get(rank)))
    }

    /// Expands the tally into one entry per card, ascending by rank.
    pub fn expand(&self) -> Vec<Rank> {
        self.iter()
            .flat_map(|(rank, count)| std::iter::repeat(rank).take(count as usize))
            .collect()
    }

    pub fn to_map(&self) -> BTreeMap<u8, u32> {
        self.iter().map(|(rank, count)| (rank.value(), count)).collect()
    }
}

/// Cards still physically unaccounted for, sorted ascending.
pub fn remaining_composition(decks: u32, accounted: &RankCounts) -> Vec<Rank> {
    let mut remaining = RankCounts::default();
    for rank in Rank::all() {
        remaining.set(rank, capacity(rank, decks).saturating_sub(accounted.get(rank)));
    }
    remaining.expand()
}
