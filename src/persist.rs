//! Saved session state.
//!
//! Loading is forgiving: a file written by an older build, edited by hand or
//! cut short still yields a usable snapshot. Each field is read on its own;
//! anything missing or malformed falls back to its default (numbers to zero),
//! negative counts are clamped and unknown ranks are dropped.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::config::{BettingSettings, TableRules};
use crate::deck::{Rank, RankCounts, MAX_DECKS};
use crate::round::RoundState;
use crate::shoe::Shoe;
use crate::stats::{HistoryEntry, SessionStats, STATS_HISTORY_LIMIT};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    pub deck_number: u32,
    pub max_splits: u32,
    pub dealer_hits_soft17: bool,
    pub dealer_peeks: bool,
    pub das: bool,
    pub allow_double: bool,
    pub allow_insurance: bool,
    pub allow_surrender: bool,
    pub burn_count: u32,
    pub bankroll: f64,
    pub unit_percent: f64,
    pub min_bet: f64,
    pub unseen_burned_count: u32,
    pub cards_seen_counts: BTreeMap<u8, u32>,
    pub player_hands: Vec<Vec<Rank>>,
    pub dealer_cards: Vec<Rank>,
    pub active_hand_index: usize,
    pub session_stats: SessionStats,
    pub round_bet_amount: Option<f64>,
    pub round_doubled: bool,
}

impl Default for Snapshot {
    fn default() -> Self {
        Snapshot::capture(
            &TableRules::default(),
            &BettingSettings::default(),
            &Shoe::new(TableRules::default().decks()),
            &SessionStats::default(),
            RoundState::Idle,
        )
    }
}

impl Snapshot {
    pub fn capture(
        rules: &TableRules,
        betting: &BettingSettings,
        shoe: &Shoe,
        stats: &SessionStats,
        round: RoundState,
    ) -> Self {
        Snapshot {
            deck_number: rules.deck_number,
            max_splits: rules.max_splits,
            dealer_hits_soft17: rules.dealer_hits_soft17,
            dealer_peeks: rules.dealer_peeks,
            das: rules.das,
            allow_double: rules.allow_double,
            allow_insurance: rules.allow_insurance,
            allow_surrender: rules.allow_surrender,
            burn_count: rules.burn_count,
            bankroll: betting.bankroll,
            unit_percent: betting.unit_percent,
            min_bet: betting.min_bet,
            unseen_burned_count: shoe.burned(),
            cards_seen_counts: shoe.seen().to_map(),
            player_hands: shoe.player_hands().to_vec(),
            dealer_cards: shoe.dealer().to_vec(),
            active_hand_index: shoe.active_hand_index(),
            session_stats: stats.clone(),
            round_bet_amount: round.locked_bet(),
            round_doubled: round.is_doubled(),
        }
    }

    pub fn rules(&self) -> TableRules {
        TableRules {
            deck_number: self.deck_number.max(1),
            max_splits: self.max_splits,
            dealer_hits_soft17: self.dealer_hits_soft17,
            dealer_peeks: self.dealer_peeks,
            das: self.das,
            allow_double: self.allow_double,
            allow_insurance: self.allow_insurance,
            allow_surrender: self.allow_surrender,
            burn_count: self.burn_count,
        }
    }

    pub fn betting(&self) -> BettingSettings {
        BettingSettings {
            bankroll: self.bankroll,
            unit_percent: self.unit_percent,
            min_bet: self.min_bet,
        }
    }

    pub fn seen_counts(&self) -> RankCounts {
        let mut counts = RankCounts::default();
        for (&value, &count) in &self.cards_seen_counts {
            if let Some(rank) = Rank::new(value) {
                counts.set(rank, count);
            }
        }
        counts
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|err| {
            log::warn!("failed to serialize snapshot: {err}");
            String::from("{}")
        })
    }

    /// Parses saved state, falling back to defaults field by field.
    pub fn from_json(text: &str) -> Self {
        match serde_json::from_str::<Value>(text) {
            Ok(Value::Object(obj)) => Snapshot::from_object(&obj),
            Ok(_) => {
                log::warn!("saved state is not an object, starting fresh");
                Snapshot::default()
            }
            Err(err) => {
                log::warn!("failed to parse saved state: {err}");
                Snapshot::default()
            }
        }
    }

    fn from_object(obj: &Map<String, Value>) -> Self {
        let rules = TableRules::default();
        let betting = BettingSettings::default();
        let mut player_hands: Vec<Vec<Rank>> = match obj.get("player_hands") {
            Some(Value::Array(hands)) => hands.iter().map(ranks).collect(),
            _ => Vec::new(),
        };
        if player_hands.is_empty() {
            player_hands.push(Vec::new());
        }
        let active_hand_index = count_field(obj, "active_hand_index", 0) as usize;

        Snapshot {
            deck_number: count_field(obj, "deck_number", rules.deck_number).clamp(1, MAX_DECKS),
            max_splits: count_field(obj, "max_splits", rules.max_splits),
            dealer_hits_soft17: flag_field(obj, "dealer_hits_soft17", rules.dealer_hits_soft17),
            dealer_peeks: flag_field(obj, "dealer_peeks", rules.dealer_peeks),
            das: flag_field(obj, "das", rules.das),
            allow_double: flag_field(obj, "allow_double", rules.allow_double),
            allow_insurance: flag_field(obj, "allow_insurance", rules.allow_insurance),
            allow_surrender: flag_field(obj, "allow_surrender", rules.allow_surrender),
            burn_count: count_field(obj, "burn_count", rules.burn_count),
            bankroll: amount_field(obj, "bankroll", betting.bankroll).max(0.0),
            unit_percent: amount_field(obj, "unit_percent", betting.unit_percent).max(0.0),
            min_bet: amount_field(obj, "min_bet", betting.min_bet).max(0.0),
            unseen_burned_count: count_field(obj, "unseen_burned_count", 0),
            cards_seen_counts: seen_field(obj.get("cards_seen_counts")),
            dealer_cards: obj.get("dealer_cards").map(ranks).unwrap_or_default(),
            active_hand_index: active_hand_index.min(player_hands.len() - 1),
            player_hands,
            session_stats: stats_field(obj.get("session_stats")),
            round_bet_amount: match obj.get("round_bet_amount") {
                None | Some(Value::Null) => None,
                Some(value) => Some(number(value).max(0.0)),
            },
            round_doubled: flag_field(obj, "round_doubled", false),
        }
    }
}

/// Reads a snapshot from disk. A missing or unreadable file starts from defaults.
pub fn load_path(path: &Path) -> Snapshot {
    if !path.exists() {
        return Snapshot::default();
    }
    match fs::read_to_string(path) {
        Ok(text) => {
            log::info!("{:<32}{:<32}", "loading session", path.display());
            Snapshot::from_json(&text)
        }
        Err(err) => {
            log::warn!("failed to read {}: {err}", path.display());
            Snapshot::default()
        }
    }
}

/// Writes a snapshot to disk; failures are logged, never raised.
pub fn save_path(snapshot: &Snapshot, path: &Path) -> bool {
    match fs::write(path, snapshot.to_json()) {
        Ok(()) => {
            log::info!("{:<32}{:<32}", "saving session", path.display());
            true
        }
        Err(err) => {
            log::warn!("failed to save {}: {err}", path.display());
            false
        }
    }
}

fn number(value: &Value) -> f64 {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    };
    parsed.filter(|n| n.is_finite()).unwrap_or(0.0)
}

fn count(value: &Value) -> u32 {
    number(value).clamp(0.0, u32::MAX as f64) as u32
}

fn count_field(obj: &Map<String, Value>, key: &str, default: u32) -> u32 {
    obj.get(key).map_or(default, count)
}

fn amount_field(obj: &Map<String, Value>, key: &str, default: f64) -> f64 {
    obj.get(key).map_or(default, number)
}

fn flag_field(obj: &Map<String, Value>, key: &str, default: bool) -> bool {
    match obj.get(key) {
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|n| n != 0.0),
        _ => default,
    }
}

fn rank(value: &Value) -> Option<Rank> {
    let n = number(value);
    if n.fract() != 0.0 {
        return None;
    }
    Rank::new(n.clamp(0.0, u8::MAX as f64) as u8)
}

fn ranks(value: &Value) -> Vec<Rank> {
    match value {
        Value::Array(items) => items.iter().filter_map(rank).collect(),
        _ => Vec::new(),
    }
}

fn seen_field(value: Option<&Value>) -> BTreeMap<u8, u32> {
    let mut seen = BTreeMap::new();
    if let Some(Value::Object(entries)) = value {
        for (key, count_value) in entries {
            let key = key.trim().parse::<u8>().ok().and_then(Rank::new);
            if let Some(rank) = key {
                let total: &mut u32 = seen.entry(rank.value()).or_default();
                *total = total.saturating_add(count(count_value));
            }
        }
    }
    seen
}

fn stats_field(value: Option<&Value>) -> SessionStats {
    let Some(Value::Object(obj)) = value else {
        return SessionStats::default();
    };
    let mut stats = SessionStats {
        wins: count_field(obj, "wins", 0),
        losses: count_field(obj, "losses", 0),
        pushes: count_field(obj, "pushes", 0),
        net_profit: amount_field(obj, "net_profit", 0.0),
        ..SessionStats::default()
    };
    if let Some(Value::Array(entries)) = obj.get("history") {
        let skip = entries.len().saturating_sub(STATS_HISTORY_LIMIT);
        for entry in entries.iter().skip(skip) {
            if let Value::Object(fields) = entry {
                stats.push_history(HistoryEntry {
                    game: count_field(fields, "game", 0),
                    profit: amount_field(fields, "profit", 0.0),
                    win_rate: amount_field(fields, "win_rate", 0.0),
                });
            }
        }
    }
    stats
}
