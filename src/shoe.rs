//! Card accounting for a multi-deck shoe.
//!
//! Every card on the table or declared seen is held against the physical
//! capacity of its rank: for every rank, `seen + in_hands <= capacity`.
//! Unknown burned cards only ever take from what is left after that, so the
//! burn count never exceeds the unaccounted remainder of the shoe.

use serde::{Deserialize, Serialize};

use crate::deck::{capacity, shoe_size, Rank, RankCounts, MAX_DECKS};
use crate::error::{EngineError, Result};
use crate::hand::is_pair;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Seat {
    Player,
    Dealer,
}

/// Result of a manual seen-count adjustment.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SeenChange {
    Changed(u32),
    Unchanged,
    /// The whole increase was absorbed by the rank's capacity.
    NoCardsLeft,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Shoe {
    decks: u32,
    seen: RankCounts,
    player: Vec<Vec<Rank>>,
    dealer: Vec<Rank>,
    active: usize,
    burned: u32,
}

impl Shoe {
    pub fn new(decks: u32) -> Self {
        Shoe {
            decks: decks.clamp(1, MAX_DECKS),
            seen: RankCounts::default(),
            player: vec![Vec::new()],
            dealer: Vec::new(),
            active: 0,
            burned: 0,
        }
    }

    /// Rebuilds a shoe from untrusted parts, repairing anything that breaks
    /// the accounting rules instead of failing.
    pub fn restore(
        decks: u32,
        seen: RankCounts,
        player: Vec<Vec<Rank>>,
        dealer: Vec<Rank>,
        active: usize,
        burned: u32,
    ) -> Self {
        let mut shoe = Shoe::new(decks);
        let player = if player.is_empty() { vec![Vec::new()] } else { player };
        let open = open_counts(&player, &dealer);
        if Rank::all().all(|rank| open.get(rank) <= capacity(rank, shoe.decks)) {
            shoe.active = active.min(player.len() - 1);
            shoe.player = player;
            shoe.dealer = dealer;
        } else {
            log::warn!("discarding restored hands that exceed shoe capacity");
        }
        for rank in Rank::all() {
            shoe.seen.set(rank, seen.get(rank).min(shoe.max_manual_seen(rank)));
        }
        shoe.burned = burned;
        shoe.reconcile_burn();
        shoe
    }

    pub fn decks(&self) -> u32 {
        self.decks
    }

    pub fn seen(&self) -> &RankCounts {
        &self.seen
    }

    pub fn player_hands(&self) -> &[Vec<Rank>] {
        &self.player
    }

    pub fn dealer(&self) -> &[Rank] {
        &self.dealer
    }

    pub fn active_hand_index(&self) -> usize {
        self.active
    }

    pub fn burned(&self) -> u32 {
        self.burned
    }

    pub fn open_counts(&self) -> RankCounts {
        open_counts(&self.player, &self.dealer)
    }

    /// Seen cards plus every card currently on the table.
    pub fn accounted_counts(&self) -> RankCounts {
        let mut counts = self.open_counts();
        for (rank, count) in self.seen.iter() {
            counts.add(rank, count);
        }
        counts
    }

    pub fn accounted_cards(&self) -> Vec<Rank> {
        self.accounted_counts().expand()
    }

    pub fn max_manual_seen(&self, rank: Rank) -> u32 {
        capacity(rank, self.decks).saturating_sub(self.open_counts().get(rank))
    }

    pub fn cards_left(&self) -> u32 {
        shoe_size(self.decks).saturating_sub(self.accounted_counts().total())
    }

    /// Cards neither accounted for nor burned.
    pub fn physical_remaining(&self) -> u32 {
        self.cards_left().saturating_sub(self.burned)
    }

    pub fn is_table_empty(&self) -> bool {
        self.dealer.is_empty() && self.player.iter().all(Vec::is_empty)
    }

    pub fn non_empty_hand_count(&self) -> usize {
        self.player.iter().filter(|hand| !hand.is_empty()).count()
    }

    pub fn mark_seen(&mut self, rank: Rank, delta: i32) -> SeenChange {
        let current = self.seen.get(rank);
        let ceiling = self.max_manual_seen(rank) as i64;
        let next = (current as i64 + delta as i64).clamp(0, ceiling.max(0)) as u32;
        if next == current {
            return if delta > 0 {
                SeenChange::NoCardsLeft
            } else {
                SeenChange::Unchanged
            };
        }
        self.seen.set(rank, next);
        self.reconcile_burn();
        log::debug!("seen {rank}: {current} -> {next}");
        SeenChange::Changed(next)
    }

    pub fn add_card(&mut self, seat: Seat, rank: Rank, hand: Option<usize>) -> Result<()> {
        let used = self.seen.get(rank) + self.open_counts().get(rank);
        if used >= capacity(rank, self.decks) {
            return Err(EngineError::CapacityExceeded { rank });
        }
        self.hand_mut(seat, hand)?.push(rank);
        self.reconcile_burn();
        log::debug!("added {rank} to {seat:?}");
        Ok(())
    }

    /// Removes the last occurrence of `rank`; `false` when there was none.
    pub fn remove_card(&mut self, seat: Seat, rank: Rank, hand: Option<usize>) -> Result<bool> {
        let cards = self.hand_mut(seat, hand)?;
        match cards.iter().rposition(|&card| card == rank) {
            Some(position) => {
                cards.remove(position);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Removes the cards at `positions`; out-of-range positions are ignored.
    pub fn remove_at(&mut self, seat: Seat, positions: &[usize], hand: Option<usize>) -> Result<usize> {
        let cards = self.hand_mut(seat, hand)?;
        let mut positions = positions.to_vec();
        positions.sort_unstable_by(|a, b| b.cmp(a));
        positions.dedup();
        let mut removed = 0;
        for position in positions {
            if position < cards.len() {
                cards.remove(position);
                removed += 1;
            }
        }
        Ok(removed)
    }

    pub fn clear_hand(&mut self, seat: Seat, hand: Option<usize>) -> Result<()> {
        self.hand_mut(seat, hand)?.clear();
        Ok(())
    }

    pub fn clear_all_hands(&mut self, seat: Seat) {
        match seat {
            Seat::Player => self.player.iter_mut().for_each(Vec::clear),
            Seat::Dealer => self.dealer.clear(),
        }
    }

    pub fn burn(&mut self, count: u32) -> Result<()> {
        let available = self.physical_remaining();
        if count > available {
            return Err(EngineError::InsufficientShoe {
                requested: count,
                available,
            });
        }
        self.burned += count;
        log::debug!("burned {count} unknown cards ({} total)", self.burned);
        Ok(())
    }

    /// Splits a pair into a new hand right after `index` and returns the new
    /// hand's index. Anything other than a pair just gets an empty hand
    /// appended at the end.
    pub fn split(&mut self, index: usize) -> Result<usize> {
        let hand = self.player.get_mut(index).ok_or_else(|| no_such_hand(index))?;
        if !is_pair(hand) {
            self.player.push(Vec::new());
            return Ok(self.player.len() - 1);
        }
        let moved = hand.pop().into_iter().collect();
        self.player.insert(index + 1, moved);
        if self.active > index {
            self.active += 1;
        }
        Ok(index + 1)
    }

    pub fn remove_hand(&mut self, index: usize) -> Result<()> {
        if index >= self.player.len() {
            return Err(no_such_hand(index));
        }
        if self.player.len() == 1 {
            return Err(EngineError::InvalidHandOperation(
                "cannot remove the last hand".to_string(),
            ));
        }
        self.player.remove(index);
        if self.active > index {
            self.active -= 1;
        }
        self.active = self.active.min(self.player.len() - 1);
        Ok(())
    }

    pub fn set_active_hand(&mut self, index: usize) -> Result<()> {
        if index >= self.player.len() {
            return Err(no_such_hand(index));
        }
        self.active = index;
        Ok(())
    }

    /// Changes the shoe size; refused if cards already accounted for would not fit.
    pub fn set_decks(&mut self, decks: u32) -> Result<()> {
        let decks = decks.clamp(1, MAX_DECKS);
        let accounted = self.accounted_counts();
        if let Some(rank) = Rank::all().find(|&rank| accounted.get(rank) > capacity(rank, decks)) {
            return Err(EngineError::CapacityExceeded { rank });
        }
        self.decks = decks;
        self.reconcile_burn();
        Ok(())
    }

    /// Swaps in a whole new table layout after checking it against capacity.
    pub fn replace_table(&mut self, player: Vec<Vec<Rank>>, dealer: Vec<Rank>, active: usize) -> Result<()> {
        if player.is_empty() || active >= player.len() {
            return Err(EngineError::InvalidHandOperation(
                "table layout has no active hand".to_string(),
            ));
        }
        let open = open_counts(&player, &dealer);
        for rank in Rank::all() {
            if self.seen.get(rank) + open.get(rank) > capacity(rank, self.decks) {
                return Err(EngineError::CapacityExceeded { rank });
            }
        }
        self.player = player;
        self.dealer = dealer;
        self.active = active;
        self.reconcile_burn();
        Ok(())
    }

    /// Moves every card on the table into the seen pile and resets the table
    /// to a single empty hand. Returns what was moved.
    pub fn collect_table(&mut self) -> RankCounts {
        let moved = self.open_counts();
        for (rank, count) in moved.iter() {
            self.seen.add(rank, count);
        }
        self.player = vec![Vec::new()];
        self.dealer.clear();
        self.active = 0;
        moved
    }

    pub fn clear_seen(&mut self) {
        self.seen = RankCounts::default();
        self.burned = 0;
    }

    pub fn reset(&mut self) {
        *self = Shoe::new(self.decks);
    }

    fn hand_mut(&mut self, seat: Seat, hand: Option<usize>) -> Result<&mut Vec<Rank>> {
        match seat {
            Seat::Dealer => Ok(&mut self.dealer),
            Seat::Player => {
                let index = hand.unwrap_or(self.active);
                self.player.get_mut(index).ok_or_else(|| no_such_hand(index))
            }
        }
    }

    fn reconcile_burn(&mut self) {
        self.burned = self.burned.min(self.cards_left());
    }
}

fn open_counts(player: &[Vec<Rank>], dealer: &[Rank]) -> RankCounts {
    RankCounts::from_cards(player.iter().flatten().chain(dealer))
}

fn no_such_hand(index: usize) -> EngineError {
    EngineError::InvalidHandOperation(format!("hand {} does not exist", index + 1))
}
