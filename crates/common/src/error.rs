//! Unified error type for the parlay engine.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Malformed prop ({field}): {reason}")]
    MalformedProp { field: &'static str, reason: String },

    #[error("Invalid signal {name}: {reason}")]
    InvalidSignal { name: String, reason: String },

    #[error("Unknown stat type: {0}")]
    UnknownStatType(String),

    #[error("Unsupported parlay size: {0} (expected 2-5)")]
    InvalidParlaySize(usize),

    #[error("Config error: {0}")]
    Config(String),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
