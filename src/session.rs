//! The counting session: shoe accounting, the count, bet advice and the
//! round/bankroll bookkeeping behind one handle.
//!
//! Every mutating call either applies completely or returns an error with
//! the session untouched. Successful mutations finish by recomputing the
//! count and bet advice, so readers always see derived values that match
//! the current cards.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::betting::{advise, bet_command, BetAdvice, BetRamp, TrueCountRamp};
use crate::config::{non_negative, BettingSettings, EngineConfig, TableRules};
use crate::counter::CountSnapshot;
use crate::deck::{remaining_composition, Rank, RankCounts};
use crate::error::{EngineError, Result};
use crate::hand::{hand_value, is_blackjack};
use crate::import;
use crate::persist::Snapshot;
use crate::round::{unit_multiplier, Outcome, RoundState, Settlement};
use crate::shoe::{Seat, SeenChange, Shoe};
use crate::stats::SessionStats;
use crate::strategy::{advise_hand, EvOracle, EvQuery, HandAdvice, RuleFlags};

/// Receives the bet command whenever a fresh, unlocked recommendation exists.
pub trait CommandSink {
    fn emit(&self, command: &str);
}

impl<F> CommandSink for F
where
    F: Fn(&str),
{
    fn emit(&self, command: &str) {
        self(command)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HandView {
    pub cards: Vec<Rank>,
    pub total: u8,
    pub soft: bool,
    pub blackjack: bool,
}

impl HandView {
    fn of(cards: &[Rank]) -> Self {
        let (total, soft) = hand_value(cards);
        HandView {
            cards: cards.to_vec(),
            total,
            soft,
            blackjack: is_blackjack(cards),
        }
    }
}

/// Everything a host needs to draw the table.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TableView {
    pub rules: TableRules,
    pub betting: BettingSettings,
    pub seen: BTreeMap<u8, u32>,
    pub player_hands: Vec<HandView>,
    pub dealer: HandView,
    pub active_hand_index: usize,
    pub burned: u32,
    pub count: CountSnapshot,
    pub advice: BetAdvice,
    pub displayed_bet: f64,
    pub round: RoundState,
    pub stats: SessionStats,
}

pub struct Session {
    rules: TableRules,
    betting: BettingSettings,
    shoe: Shoe,
    round: RoundState,
    stats: SessionStats,
    ramp: Box<dyn BetRamp>,
    sink: Option<Box<dyn CommandSink>>,
    count: CountSnapshot,
    advice: BetAdvice,
    last_recommended: f64,
}

impl Session {
    pub fn new(config: EngineConfig) -> Self {
        let rules = TableRules {
            deck_number: config.rules.decks(),
            ..config.rules
        };
        let shoe = Shoe::new(rules.deck_number);
        Session::assemble(rules, config.betting.sanitized(), shoe, RoundState::Idle, SessionStats::default())
    }

    pub fn from_snapshot(snapshot: Snapshot) -> Self {
        let rules = snapshot.rules();
        let betting = snapshot.betting().sanitized();
        let shoe = Shoe::restore(
            rules.decks(),
            snapshot.seen_counts(),
            snapshot.player_hands,
            snapshot.dealer_cards,
            snapshot.active_hand_index,
            snapshot.unseen_burned_count,
        );
        let round = if shoe.is_table_empty() {
            RoundState::Idle
        } else {
            RoundState::InProgress {
                locked_bet: snapshot.round_bet_amount.map(non_negative),
                doubled: snapshot.round_doubled,
            }
        };
        Session::assemble(rules, betting, shoe, round, snapshot.session_stats)
    }

    fn assemble(
        rules: TableRules,
        betting: BettingSettings,
        shoe: Shoe,
        round: RoundState,
        stats: SessionStats,
    ) -> Self {
        let mut session = Session {
            rules,
            betting,
            shoe,
            round,
            stats,
            ramp: Box::new(TrueCountRamp::default()),
            sink: None,
            count: CountSnapshot::compute(&RankCounts::default(), 1, 0),
            advice: BetAdvice {
                raw_units: 0,
                units: 0,
                amount: 0.0,
                note: None,
            },
            last_recommended: 0.0,
        };
        session.refresh();
        session
    }

    pub fn with_ramp(mut self, ramp: impl BetRamp + 'static) -> Self {
        self.set_ramp(ramp);
        self
    }

    pub fn set_ramp(&mut self, ramp: impl BetRamp + 'static) {
        self.ramp = Box::new(ramp);
        self.refresh();
    }

    pub fn set_sink(&mut self, sink: impl CommandSink + 'static) {
        self.sink = Some(Box::new(sink));
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot::capture(
            &self.rules,
            &self.betting,
            &self.shoe,
            &self.stats,
            self.round,
        )
    }

    pub fn rules(&self) -> &TableRules {
        &self.rules
    }

    pub fn betting(&self) -> &BettingSettings {
        &self.betting
    }

    pub fn shoe(&self) -> &Shoe {
        &self.shoe
    }

    pub fn round(&self) -> RoundState {
        self.round
    }

    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    pub fn count(&self) -> CountSnapshot {
        self.count
    }

    pub fn advice(&self) -> BetAdvice {
        self.advice
    }

    pub fn last_recommended_amount(&self) -> f64 {
        self.last_recommended
    }

    /// The locked round bet while one is held, otherwise the live advice.
    pub fn displayed_bet(&self) -> f64 {
        self.round.locked_bet().unwrap_or(self.advice.amount)
    }

    /// Recomputes the count and bet advice from the current cards.
    pub fn refresh(&mut self) {
        let accounted = self.shoe.accounted_counts();
        self.count = CountSnapshot::compute(&accounted, self.shoe.decks(), self.shoe.burned());
        self.advice = advise(
            self.ramp.as_ref(),
            &accounted.expand(),
            self.shoe.decks(),
            &self.count,
            self.shoe.non_empty_hand_count(),
            &self.betting,
        );
        if self.round.locked_bet().is_none() {
            self.last_recommended = self.advice.amount;
            if self.advice.amount > 0.0 {
                if let Some(sink) = &self.sink {
                    sink.emit(&bet_command(self.advice.amount));
                }
            }
        }
    }

    pub fn mark_seen(&mut self, rank: Rank, delta: i32) -> SeenChange {
        let change = self.shoe.mark_seen(rank, delta);
        if let SeenChange::Changed(_) = change {
            self.refresh();
        }
        change
    }

    pub fn add_card(&mut self, seat: Seat, rank: Rank, hand: Option<usize>) -> Result<()> {
        let was_empty = self.shoe.is_table_empty();
        self.shoe.add_card(seat, rank, hand)?;
        self.begin_round_if(was_empty);
        self.refresh();
        Ok(())
    }

    pub fn remove_card(&mut self, seat: Seat, rank: Rank, hand: Option<usize>) -> Result<bool> {
        let removed = self.shoe.remove_card(seat, rank, hand)?;
        if removed {
            self.after_removal();
        }
        Ok(removed)
    }

    pub fn remove_at(&mut self, seat: Seat, positions: &[usize], hand: Option<usize>) -> Result<usize> {
        let removed = self.shoe.remove_at(seat, positions, hand)?;
        if removed > 0 {
            self.after_removal();
        }
        Ok(removed)
    }

    pub fn clear_hand(&mut self, seat: Seat, hand: Option<usize>) -> Result<()> {
        self.shoe.clear_hand(seat, hand)?;
        self.after_removal();
        Ok(())
    }

    pub fn clear_all_hands(&mut self, seat: Seat) {
        self.shoe.clear_all_hands(seat);
        self.after_removal();
    }

    pub fn burn(&mut self, count: u32) -> Result<()> {
        self.shoe.burn(count)?;
        self.refresh();
        Ok(())
    }

    pub fn split(&mut self, hand: usize) -> Result<usize> {
        let index = self.shoe.split(hand)?;
        self.refresh();
        Ok(index)
    }

    pub fn remove_hand(&mut self, hand: usize) -> Result<()> {
        self.shoe.remove_hand(hand)?;
        self.after_removal();
        Ok(())
    }

    pub fn set_active_hand(&mut self, hand: usize) -> Result<()> {
        self.shoe.set_active_hand(hand)
    }

    pub fn set_doubled(&mut self, doubled: bool) -> Result<()> {
        match &mut self.round {
            RoundState::InProgress { doubled: current, .. } => {
                *current = doubled;
                Ok(())
            }
            RoundState::Idle => Err(EngineError::InvalidHandOperation(
                "no round in progress".to_string(),
            )),
        }
    }

    pub fn set_rules(&mut self, rules: TableRules) -> Result<()> {
        let decks = rules.decks();
        self.shoe.set_decks(decks)?;
        self.rules = TableRules {
            deck_number: decks,
            ..rules
        };
        self.refresh();
        Ok(())
    }

    pub fn set_betting(&mut self, betting: BettingSettings) {
        self.betting = betting.sanitized();
        self.refresh();
    }

    /// Settles the round with one outcome per non-empty player hand, in hand
    /// order, then sweeps every card on the table into the seen pile.
    pub fn settle(&mut self, outcomes: &[Outcome]) -> Result<Settlement> {
        if self.shoe.is_table_empty() {
            return Err(EngineError::NothingToRecord);
        }
        let expected = self.shoe.non_empty_hand_count();
        if outcomes.len() != expected {
            return Err(EngineError::InvalidHandOperation(format!(
                "expected {expected} outcomes, got {}",
                outcomes.len()
            )));
        }

        let bet = self.round.locked_bet().unwrap_or(self.last_recommended);
        let units = unit_multiplier(outcomes, self.round.is_doubled());
        let profit = bet * units;
        self.betting.bankroll = non_negative(self.betting.bankroll + profit);

        let (wins, losses, pushes) = Settlement::tally(outcomes);
        self.stats.record(wins, losses, pushes, profit);
        self.shoe.collect_table();
        self.round = RoundState::Idle;
        log::info!(
            "settled round: {wins}W {losses}L {pushes}P, profit {profit:+.2}, bankroll {:.2}",
            self.betting.bankroll
        );
        self.refresh();

        Ok(Settlement {
            bet,
            units,
            profit,
            wins,
            losses,
            pushes,
            bankroll: self.betting.bankroll,
        })
    }

    /// Replaces hands with those recovered from pasted text. Returns the
    /// number of player hands imported.
    pub fn import_text(&mut self, text: &str) -> Result<usize> {
        let parsed = import::parse(text)?;
        let imported = parsed.player.len();
        let mut player = self.shoe.player_hands().to_vec();
        let mut active = self.shoe.active_hand_index();
        let mut hands = parsed.player;

        if hands.len() > 1 {
            player = hands;
            active = 0;
        } else if let Some(hand) = hands.pop() {
            match parsed.hand_label {
                Some(index) => {
                    if player.len() <= index {
                        player.resize(index + 1, Vec::new());
                    }
                    player[index] = hand;
                    active = index;
                }
                // TODO: confirm whether an unlabelled paste over several open hands should overwrite the active one
                None if player.len() > 1 => player[active] = hand,
                None => {
                    player = vec![hand];
                    active = 0;
                }
            }
        }

        let was_empty = self.shoe.is_table_empty();
        self.shoe.replace_table(player, parsed.dealer, active)?;
        self.begin_round_if(was_empty);
        self.refresh();
        log::debug!("imported {imported} hand(s)");
        Ok(imported)
    }

    /// Asks `oracle` for the best play of every non-empty player hand.
    pub fn best_actions(&self, oracle: &dyn EvOracle) -> Result<Vec<HandAdvice>> {
        let dealer_up_card = *self.shoe.dealer().first().ok_or_else(|| {
            EngineError::InvalidHandOperation("dealer up-card required".to_string())
        })?;
        if self.shoe.non_empty_hand_count() == 0 {
            return Err(EngineError::InvalidHandOperation(
                "no player cards to evaluate".to_string(),
            ));
        }
        let remaining_shoe = remaining_composition(self.shoe.decks(), &self.shoe.accounted_counts());
        let rules = RuleFlags::from(&self.rules);
        self.shoe
            .player_hands()
            .iter()
            .enumerate()
            .filter(|(_, hand)| !hand.is_empty())
            .map(|(index, hand)| {
                let query = EvQuery {
                    hand: hand.clone(),
                    dealer_up_card,
                    remaining_shoe: remaining_shoe.clone(),
                    rules,
                    include_insurance: self.rules.allow_insurance,
                };
                advise_hand(oracle, index, &query).map_err(EngineError::Oracle)
            })
            .collect()
    }

    pub fn clear_seen(&mut self) {
        self.shoe.clear_seen();
        self.refresh();
    }

    /// Resets the shoe and the round; rules, bankroll and stats are kept.
    pub fn clear_all(&mut self) {
        self.shoe.reset();
        self.round = RoundState::Idle;
        self.refresh();
    }

    pub fn reset_stats(&mut self) {
        self.stats.reset();
    }

    pub fn view(&self) -> TableView {
        TableView {
            rules: self.rules.clone(),
            betting: self.betting.clone(),
            seen: self.shoe.seen().to_map(),
            player_hands: self
                .shoe
                .player_hands()
                .iter()
                .map(Vec::as_slice)
                .map(HandView::of)
                .collect(),
            dealer: HandView::of(self.shoe.dealer()),
            active_hand_index: self.shoe.active_hand_index(),
            burned: self.shoe.burned(),
            count: self.count,
            advice: self.advice,
            displayed_bet: self.displayed_bet(),
            round: self.round,
            stats: self.stats.clone(),
        }
    }

    fn begin_round_if(&mut self, was_empty: bool) {
        if was_empty && !self.shoe.is_table_empty() {
            self.round = RoundState::InProgress {
                locked_bet: Some(self.last_recommended),
                doubled: false,
            };
            log::info!("round started, bet locked at {:.2}", self.last_recommended);
        }
    }

    fn after_removal(&mut self) {
        if self.shoe.is_table_empty() && self.round.is_in_progress() {
            self.round = RoundState::Idle;
            log::info!("table cleared, round abandoned");
        }
        self.refresh();
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;

    fn rank(value: u8) -> Rank {
        Rank::new(value).unwrap()
    }

    fn session(decks: u32) -> Session {
        let config = EngineConfig {
            rules: TableRules {
                deck_number: decks,
                ..TableRules::default()
            },
            betting: BettingSettings {
                bankroll: 1000.0,
                unit_percent: 10.0,
                min_bet: 10.0,
            },
        };
        Session::new(config).with_ramp(|_: &[Rank], _: u32| -> Option<u32> { Some(2) })
    }

    #[test]
    fn test_first_card_locks_previous_recommendation() {
        let mut s = session(6);
        assert_eq!(s.last_recommended_amount(), 200.0);
        s.set_betting(BettingSettings {
            unit_percent: 5.0,
            ..s.betting().clone()
        });
        s.add_card(Seat::Player, rank(9), None).unwrap();
        assert_eq!(s.round().locked_bet(), Some(100.0));
        s.add_card(Seat::Dealer, rank(5), None).unwrap();
        s.set_betting(BettingSettings {
            unit_percent: 20.0,
            ..s.betting().clone()
        });
        assert_eq!(s.round().locked_bet(), Some(100.0));
        assert_eq!(s.displayed_bet(), 100.0);
        assert_eq!(s.last_recommended_amount(), 100.0);
    }

    #[test]
    fn test_emptying_table_unlocks_round() {
        let mut s = session(1);
        s.add_card(Seat::Player, rank(4), None).unwrap();
        s.add_card(Seat::Dealer, rank(4), None).unwrap();
        s.remove_card(Seat::Player, rank(4), None).unwrap();
        assert!(s.round().is_in_progress());
        s.clear_all_hands(Seat::Dealer);
        assert_eq!(s.round(), RoundState::Idle);
    }

    #[test]
    fn test_settle_doubled_single_hand() {
        let mut s = session(1);
        s.add_card(Seat::Player, rank(6), None).unwrap();
        s.add_card(Seat::Player, rank(5), None).unwrap();
        s.add_card(Seat::Dealer, rank(10), None).unwrap();
        s.set_doubled(true).unwrap();
        let settlement = s.settle(&[Outcome::Win]).unwrap();
        assert_eq!(settlement.bet, 200.0);
        assert_eq!(settlement.profit, 400.0);
        assert_eq!(s.betting().bankroll, 1400.0);
        assert_eq!(s.stats().wins, 1);
        assert_eq!(s.shoe().seen().total(), 3);
        assert_eq!(s.round(), RoundState::Idle);
    }

    #[test]
    fn test_settle_requires_outcome_per_hand() {
        let mut s = session(1);
        s.add_card(Seat::Player, rank(8), None).unwrap();
        s.add_card(Seat::Player, rank(8), None).unwrap();
        s.split(0).unwrap();
        let before = s.snapshot();
        assert!(matches!(
            s.settle(&[Outcome::Win]),
            Err(EngineError::InvalidHandOperation(_))
        ));
        assert_eq!(s.snapshot(), before);
        let settlement = s.settle(&[Outcome::Win, Outcome::Loss]).unwrap();
        assert_eq!(settlement.profit, 0.0);
        assert_eq!(s.stats().history.len(), 1);
    }

    #[test]
    fn test_settle_empty_table() {
        let mut s = session(1);
        assert_eq!(s.settle(&[]), Err(EngineError::NothingToRecord));
    }

    #[test]
    fn test_bankroll_never_negative() {
        let mut s = session(1);
        s.add_card(Seat::Player, rank(10), None).unwrap();
        s.set_betting(BettingSettings {
            bankroll: 50.0,
            ..s.betting().clone()
        });
        s.set_doubled(true).unwrap();
        s.settle(&[Outcome::Loss]).unwrap();
        assert_eq!(s.betting().bankroll, 0.0);
        assert_eq!(s.stats().net_profit, -400.0);
    }

    #[test]
    fn test_set_doubled_requires_round() {
        let mut s = session(1);
        assert!(s.set_doubled(true).is_err());
    }

    #[test]
    fn test_sink_receives_unlocked_command() {
        let sent = Rc::new(RefCell::new(Vec::new()));
        let mut s = session(1);
        let outbox = Rc::clone(&sent);
        s.set_sink(move |command: &str| outbox.borrow_mut().push(command.to_string()));
        s.mark_seen(rank(2), 1);
        s.add_card(Seat::Player, rank(3), None).unwrap();
        assert_eq!(sent.borrow().as_slice(), ["$bj 200"]);
    }

    #[test]
    fn test_import_labelled_hand_grows_table() {
        let mut s = session(2);
        s.import_text("Hand 2 :9H::9D: Dealer Hand :6S:").unwrap();
        assert_eq!(s.shoe().player_hands().len(), 2);
        assert!(s.shoe().player_hands()[0].is_empty());
        assert_eq!(s.shoe().player_hands()[1], vec![rank(9), rank(9)]);
        assert_eq!(s.shoe().active_hand_index(), 1);
        assert_eq!(s.round().locked_bet(), Some(200.0));
    }

    #[test]
    fn test_import_unlabelled_overwrites_active_hand() {
        let mut s = session(2);
        s.add_card(Seat::Player, rank(2), None).unwrap();
        s.split(0).unwrap();
        s.add_card(Seat::Player, rank(3), Some(1)).unwrap();
        s.set_active_hand(1).unwrap();
        s.import_text(":KS::7D: Dealer Hand :AS:").unwrap();
        assert_eq!(s.shoe().player_hands()[0], vec![rank(2)]);
        assert_eq!(s.shoe().player_hands()[1], vec![Rank::TEN, rank(7)]);
        assert_eq!(s.shoe().dealer(), &[Rank::ACE]);
    }

    #[test]
    fn test_best_actions_per_hand() {
        let mut s = session(1);
        s.import_text("Hand 1 :8H::8D: Hand 2 :TS::9C: Dealer Hand :6H:").unwrap();
        let oracle = |query: &EvQuery| -> std::result::Result<Vec<f64>, String> {
            assert_eq!(query.dealer_up_card, rank(6));
            assert_eq!(query.remaining_shoe.len(), 47);
            if query.hand[0] == rank(8) {
                Ok(vec![-0.2, -0.3, -0.4, 0.3, -0.5])
            } else {
                Ok(vec![0.6, -0.8, -1.0, -0.1, -0.5])
            }
        };
        let advice = s.best_actions(&oracle).unwrap();
        assert_eq!(advice.len(), 2);
        assert_eq!(advice[0].action, crate::strategy::Action::Split);
        assert_eq!(advice[1].action, crate::strategy::Action::Stand);
    }

    #[test]
    fn test_best_actions_needs_dealer() {
        let mut s = session(1);
        s.add_card(Seat::Player, rank(8), None).unwrap();
        let oracle = |_: &EvQuery| -> std::result::Result<Vec<f64>, String> { Ok(vec![0.0; 5]) };
        assert!(matches!(
            s.best_actions(&oracle),
            Err(EngineError::InvalidHandOperation(_))
        ));
    }

    #[test]
    fn test_set_rules_rejects_shrinking_below_accounted() {
        let mut s = session(2);
        s.mark_seen(rank(7), 6);
        let smaller = TableRules {
            deck_number: 1,
            ..s.rules().clone()
        };
        assert!(s.set_rules(smaller).is_err());
        assert_eq!(s.rules().deck_number, 2);
    }

    #[test]
    fn test_set_rules_caps_deck_count() {
        let mut s = session(2);
        let huge = TableRules {
            deck_number: 300_000_000,
            ..s.rules().clone()
        };
        s.set_rules(huge).unwrap();
        assert_eq!(s.rules().deck_number, crate::deck::MAX_DECKS);
        assert_eq!(s.shoe().decks(), crate::deck::MAX_DECKS);
    }

    #[test]
    fn test_clear_all_keeps_stats_and_bankroll() {
        let mut s = session(1);
        s.add_card(Seat::Player, rank(10), None).unwrap();
        s.settle(&[Outcome::Win]).unwrap();
        s.mark_seen(rank(5), 2);
        s.burn(3).unwrap();
        s.clear_all();
        assert_eq!(s.shoe().accounted_counts().total(), 0);
        assert_eq!(s.shoe().burned(), 0);
        assert_eq!(s.stats().wins, 1);
        assert_eq!(s.betting().bankroll, 1200.0);
    }
}
