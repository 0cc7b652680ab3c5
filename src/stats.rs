use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

pub const STATS_HISTORY_LIMIT: usize = 500;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub game: u32,
    pub profit: f64,
    pub win_rate: f64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionStats {
    pub wins: u32,
    pub losses: u32,
    pub pushes: u32,
    pub net_profit: f64,
    pub history: VecDeque<HistoryEntry>,
}

impl SessionStats {
    /// Decided games; pushes are not counted.
    pub fn total_games(&self) -> u32 {
        self.wins.saturating_add(self.losses)
    }

    pub fn win_rate(&self) -> f64 {
        match self.total_games() {
            0 => 0.0,
            total => self.wins as f64 / total as f64,
        }
    }

    /// Folds one settled round in. History only advances when the round
    /// decided at least one hand.
    pub fn record(&mut self, wins: u32, losses: u32, pushes: u32, profit: f64) {
        self.wins = self.wins.saturating_add(wins);
        self.losses = self.losses.saturating_add(losses);
        self.pushes = self.pushes.saturating_add(pushes);
        self.net_profit += profit;
        if wins > 0 || losses > 0 {
            self.push_history(HistoryEntry {
                game: self.total_games(),
                profit: self.net_profit,
                win_rate: self.win_rate(),
            });
        }
    }

    pub fn push_history(&mut self, entry: HistoryEntry) {
        self.history.push_back(entry);
        while self.history.len() > STATS_HISTORY_LIMIT {
            self.history.pop_front();
        }
    }

    pub fn reset(&mut self) {
        *self = SessionStats::default();
    }
}
