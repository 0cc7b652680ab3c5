use std::cell::RefCell;
use std::collections::HashMap;

use serde::Serialize;

use crate::config::TableRules;
use crate::deck::Rank;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "PascalCase")]
pub enum Action {
    Stand,
    Hit,
    Double,
    Split,
    Surrender,
}

impl Action {
    /// Order in which the oracle reports expected values.
    pub const ORDER: [Action; 5] = [
        Action::Stand,
        Action::Hit,
        Action::Double,
        Action::Split,
        Action::Surrender,
    ];
}

/// Rule switches the oracle plays under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleFlags {
    pub can_double: bool,
    pub can_insure: bool,
    pub can_surrender: bool,
    pub max_splits: u32,
    pub dealer_peeks: bool,
    pub das: bool,
    pub dealer_stands_soft_17: bool,
}

impl From<&TableRules> for RuleFlags {
    fn from(rules: &TableRules) -> Self {
        RuleFlags {
            can_double: rules.allow_double,
            can_insure: rules.allow_insurance,
            can_surrender: rules.allow_surrender,
            max_splits: rules.max_splits,
            dealer_peeks: rules.dealer_peeks,
            das: rules.das,
            dealer_stands_soft_17: !rules.dealer_hits_soft17,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EvQuery {
    pub hand: Vec<Rank>,
    pub dealer_up_card: Rank,
    /// Unseen cards, ascending.
    pub remaining_shoe: Vec<Rank>,
    pub rules: RuleFlags,
    pub include_insurance: bool,
}

/// Expected-value oracle: stand, hit, double, split and surrender EVs, plus
/// an optional sixth insurance EV. Must be pure for a given query.
pub trait EvOracle {
    fn action_values(&self, query: &EvQuery) -> Result<Vec<f64>, String>;
}

impl<F> EvOracle for F
where
    F: Fn(&EvQuery) -> Result<Vec<f64>, String>,
{
    fn action_values(&self, query: &EvQuery) -> Result<Vec<f64>, String> {
        self(query)
    }
}

/// Memoizes an oracle by its full query.
pub struct CachedOracle<O> {
    inner: O,
    cache: RefCell<HashMap<EvQuery, Vec<f64>>>,
}

impl<O: EvOracle> CachedOracle<O> {
    pub fn new(inner: O) -> Self {
        CachedOracle {
            inner,
            cache: RefCell::new(HashMap::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.cache.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.borrow().is_empty()
    }
}

impl<O: EvOracle> EvOracle for CachedOracle<O> {
    fn action_values(&self, query: &EvQuery) -> Result<Vec<f64>, String> {
        if let Some(values) = self.cache.borrow().get(query) {
            return Ok(values.clone());
        }
        let values = self.inner.action_values(query)?;
        self.cache.borrow_mut().insert(query.clone(), values.clone());
        Ok(values)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HandAdvice {
    pub hand_index: usize,
    pub action: Action,
    pub ev: f64,
    pub values: Vec<f64>,
    pub insurance_ev: Option<f64>,
}

/// Best action over the five reported EVs; ties keep the earliest action.
pub fn best_action(values: &[f64]) -> Result<(Action, f64), String> {
    if values.len() < Action::ORDER.len() {
        return Err(format!(
            "expected {} action values, got {}",
            Action::ORDER.len(),
            values.len()
        ));
    }
    let mut best = (Action::ORDER[0], values[0]);
    for (&action, &ev) in Action::ORDER.iter().zip(values).skip(1) {
        if ev > best.1 {
            best = (action, ev);
        }
    }
    Ok(best)
}

pub fn advise_hand(oracle: &dyn EvOracle, hand_index: usize, query: &EvQuery) -> Result<HandAdvice, String> {
    let values = oracle.action_values(query)?;
    let (action, ev) = best_action(&values)?;
    Ok(HandAdvice {
        hand_index,
        action,
        ev,
        insurance_ev: values.get(Action::ORDER.len()).copied(),
        values: values[..Action::ORDER.len()].to_vec(),
    })
}
