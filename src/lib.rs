use js_sys::{Array, Function};
use serde::Serialize;
use wasm_bindgen::prelude::*;

pub mod betting;
pub mod config;
pub mod counter;
pub mod deck;
pub mod error;
pub mod hand;
pub mod import;
pub mod logging;
pub mod persist;
pub mod round;
pub mod session;
pub mod shoe;
pub mod stats;
pub mod strategy;

use crate::betting::BetRamp;
use crate::config::{BettingSettings, EngineConfig, TableRules};
use crate::deck::Rank;
use crate::persist::Snapshot;
use crate::round::Outcome;
use crate::session::{CommandSink, Session};
use crate::shoe::{Seat, SeenChange};
use crate::strategy::{EvOracle, EvQuery};

#[wasm_bindgen]
pub fn init_logging(level: Option<String>) {
    logging::init(logging::parse_level(level.as_deref()));
}

/// Bet ramp supplied by the page: `(cards: number[], decks: number) => number`.
struct JsBetRamp(Function);

impl BetRamp for JsBetRamp {
    fn units(&self, accounted: &[Rank], decks: u32) -> Option<u32> {
        let cards: Array = accounted.iter().map(|r| JsValue::from(r.value())).collect();
        let units = self
            .0
            .call2(&JsValue::NULL, &cards, &JsValue::from(decks))
            .ok()?
            .as_f64()?;
        (units.is_finite() && units >= 0.0).then(|| units.floor() as u32)
    }
}

struct JsEvOracle<'a>(&'a Function);

impl EvOracle for JsEvOracle<'_> {
    fn action_values(&self, query: &EvQuery) -> Result<Vec<f64>, String> {
        let arg = query
            .serialize(&serde_wasm_bindgen::Serializer::json_compatible())
            .map_err(|err| format!("Invalid query: {err}"))?;
        let values = self
            .0
            .call1(&JsValue::NULL, &arg)
            .map_err(|err| format!("{err:?}"))?;
        serde_wasm_bindgen::from_value(values).map_err(|err| format!("Invalid action values: {err}"))
    }
}

struct JsCommandSink(Function);

impl CommandSink for JsCommandSink {
    fn emit(&self, command: &str) {
        let _ = self.0.call1(&JsValue::NULL, &JsValue::from_str(command));
    }
}

fn seat(name: &str) -> Result<Seat, JsValue> {
    match name {
        "player" => Ok(Seat::Player),
        "dealer" => Ok(Seat::Dealer),
        _ => Err(JsValue::from_str(&format!("Unknown seat: {name}"))),
    }
}

fn rank(value: u8) -> Result<Rank, JsValue> {
    Rank::new(value).ok_or_else(|| JsValue::from_str(&format!("Invalid rank: {value}")))
}

fn engine_err(err: error::EngineError) -> JsValue {
    JsValue::from_str(&err.to_string())
}

/// Serializes maps as plain objects so hosts can index them by rank.
fn to_js<T: Serialize>(value: &T) -> Result<JsValue, JsValue> {
    value
        .serialize(&serde_wasm_bindgen::Serializer::json_compatible())
        .map_err(|err| JsValue::from_str(&format!("Serialization failed: {err}")))
}

#[wasm_bindgen]
pub struct CountingSession {
    inner: Session,
}

#[wasm_bindgen]
impl CountingSession {
    #[wasm_bindgen(constructor)]
    pub fn new(config: JsValue) -> Result<CountingSession, JsValue> {
        let config: EngineConfig = if config.is_undefined() || config.is_null() {
            EngineConfig::default()
        } else {
            serde_wasm_bindgen::from_value(config)
                .map_err(|err| JsValue::from_str(&format!("Invalid config: {err}")))?
        };
        Ok(CountingSession {
            inner: Session::new(config),
        })
    }

    #[wasm_bindgen(js_name = fromSnapshot)]
    pub fn from_snapshot(json: &str) -> CountingSession {
        CountingSession {
            inner: Session::from_snapshot(Snapshot::from_json(json)),
        }
    }

    pub fn snapshot(&self) -> String {
        self.inner.snapshot().to_json()
    }

    #[wasm_bindgen(js_name = setBetRamp)]
    pub fn set_bet_ramp(&mut self, ramp: Function) {
        self.inner.set_ramp(JsBetRamp(ramp));
    }

    #[wasm_bindgen(js_name = setCommandSink)]
    pub fn set_command_sink(&mut self, sink: Function) {
        self.inner.set_sink(JsCommandSink(sink));
    }

    pub fn view(&self) -> Result<JsValue, JsValue> {
        to_js(&self.inner.view())
    }

    #[wasm_bindgen(js_name = markSeen)]
    pub fn mark_seen(&mut self, value: u8, delta: i32) -> Result<String, JsValue> {
        let change = match self.inner.mark_seen(rank(value)?, delta) {
            SeenChange::Changed(_) => "changed",
            SeenChange::Unchanged => "unchanged",
            SeenChange::NoCardsLeft => "noCardsLeft",
        };
        Ok(change.to_string())
    }

    #[wasm_bindgen(js_name = addCard)]
    pub fn add_card(&mut self, target: &str, value: u8, hand: Option<u32>) -> Result<(), JsValue> {
        self.inner
            .add_card(seat(target)?, rank(value)?, hand.map(|h| h as usize))
            .map_err(engine_err)
    }

    #[wasm_bindgen(js_name = removeCard)]
    pub fn remove_card(&mut self, target: &str, value: u8, hand: Option<u32>) -> Result<bool, JsValue> {
        self.inner
            .remove_card(seat(target)?, rank(value)?, hand.map(|h| h as usize))
            .map_err(engine_err)
    }

    #[wasm_bindgen(js_name = removeAt)]
    pub fn remove_at(&mut self, target: &str, positions: Vec<u32>, hand: Option<u32>) -> Result<u32, JsValue> {
        let positions: Vec<usize> = positions.into_iter().map(|p| p as usize).collect();
        self.inner
            .remove_at(seat(target)?, &positions, hand.map(|h| h as usize))
            .map(|removed| removed as u32)
            .map_err(engine_err)
    }

    #[wasm_bindgen(js_name = clearHand)]
    pub fn clear_hand(&mut self, target: &str, hand: Option<u32>) -> Result<(), JsValue> {
        self.inner
            .clear_hand(seat(target)?, hand.map(|h| h as usize))
            .map_err(engine_err)
    }

    #[wasm_bindgen(js_name = clearAllHands)]
    pub fn clear_all_hands(&mut self, target: &str) -> Result<(), JsValue> {
        self.inner.clear_all_hands(seat(target)?);
        Ok(())
    }

    pub fn burn(&mut self, count: u32) -> Result<(), JsValue> {
        self.inner.burn(count).map_err(engine_err)
    }

    pub fn split(&mut self, hand: u32) -> Result<u32, JsValue> {
        self.inner
            .split(hand as usize)
            .map(|index| index as u32)
            .map_err(engine_err)
    }

    #[wasm_bindgen(js_name = removeHand)]
    pub fn remove_hand(&mut self, hand: u32) -> Result<(), JsValue> {
        self.inner.remove_hand(hand as usize).map_err(engine_err)
    }

    #[wasm_bindgen(js_name = setActiveHand)]
    pub fn set_active_hand(&mut self, hand: u32) -> Result<(), JsValue> {
        self.inner.set_active_hand(hand as usize).map_err(engine_err)
    }

    #[wasm_bindgen(js_name = setDoubled)]
    pub fn set_doubled(&mut self, doubled: bool) -> Result<(), JsValue> {
        self.inner.set_doubled(doubled).map_err(engine_err)
    }

    #[wasm_bindgen(js_name = setRules)]
    pub fn set_rules(&mut self, rules: JsValue) -> Result<(), JsValue> {
        let rules: TableRules = serde_wasm_bindgen::from_value(rules)
            .map_err(|err| JsValue::from_str(&format!("Invalid rules: {err}")))?;
        self.inner.set_rules(rules).map_err(engine_err)
    }

    #[wasm_bindgen(js_name = setBetting)]
    pub fn set_betting(&mut self, betting: JsValue) -> Result<(), JsValue> {
        let betting: BettingSettings = serde_wasm_bindgen::from_value(betting)
            .map_err(|err| JsValue::from_str(&format!("Invalid betting settings: {err}")))?;
        self.inner.set_betting(betting);
        Ok(())
    }

    /// `outcomes` is one of "win", "loss", "push" or "blackjack" per open hand.
    pub fn settle(&mut self, outcomes: Vec<String>) -> Result<JsValue, JsValue> {
        let outcomes = outcomes
            .iter()
            .map(|code| {
                Outcome::from_code(code).ok_or_else(|| JsValue::from_str(&format!("Unknown outcome: {code}")))
            })
            .collect::<Result<Vec<_>, _>>()?;
        let settlement = self.inner.settle(&outcomes).map_err(engine_err)?;
        to_js(&settlement)
    }

    #[wasm_bindgen(js_name = importText)]
    pub fn import_text(&mut self, text: &str) -> Result<u32, JsValue> {
        self.inner
            .import_text(text)
            .map(|hands| hands as u32)
            .map_err(engine_err)
    }

    #[wasm_bindgen(js_name = bestActions)]
    pub fn best_actions(&self, oracle: &Function) -> Result<JsValue, JsValue> {
        let advice = self.inner.best_actions(&JsEvOracle(oracle)).map_err(engine_err)?;
        to_js(&advice)
    }

    #[wasm_bindgen(js_name = clearSeen)]
    pub fn clear_seen(&mut self) {
        self.inner.clear_seen();
    }

    #[wasm_bindgen(js_name = clearAll)]
    pub fn clear_all(&mut self) {
        self.inner.clear_all();
    }

    #[wasm_bindgen(js_name = resetStats)]
    pub fn reset_stats(&mut self) {
        self.inner.reset_stats();
    }
}
