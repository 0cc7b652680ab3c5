use thiserror::Error;

use crate::deck::Rank;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ImportError {
    #[error("missing dealer marker")]
    MissingDealerMarker,
    #[error("no player cards")]
    NoPlayerCards,
}

/// Every failure leaves the engine exactly as it was before the call.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error("no {rank} cards left in the shoe")]
    CapacityExceeded { rank: Rank },
    #[error("cannot burn {requested} cards, only {available} remain")]
    InsufficientShoe { requested: u32, available: u32 },
    #[error("import failed: {0}")]
    ImportFormat(#[from] ImportError),
    #[error("nothing to record")]
    NothingToRecord,
    #[error("invalid hand operation: {0}")]
    InvalidHandOperation(String),
    #[error("strategy oracle failed: {0}")]
    Oracle(String),
}

pub type Result<T> = std::result::Result<T, EngineError>;
