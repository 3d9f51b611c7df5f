//! Aggregation error types

use dpf_core::{EngineError, ParamsError};
use hybrid_encrypt::EncryptError;
use thiserror::Error;

/// Structural problem with a prefix list relative to its parameter chain
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("empty dpf parameters")]
    EmptyParameterChain,

    #[error("dpf parameter size should equal prefixes size {prefixes}, got {params}")]
    LengthMismatch { params: usize, prefixes: usize },

    #[error("prefixes should be empty for the first level expansion, got {0:?}")]
    NonEmptyRootPrefix(Vec<u64>),

    #[error("prefix cannot be empty except for the top level expansion (level {level})")]
    EmptyIntermediatePrefix { level: usize },

    #[error("expanding {bits} bits at level {level} exceeds the maximum vector length")]
    ExpansionTooLarge { level: usize, bits: u32 },

    #[error("prefixes at level {level} must be strictly increasing")]
    UnorderedPrefixes { level: usize },

    #[error("level {level} is outside a chain of {levels} levels")]
    LevelOutOfRange { level: usize, levels: usize },
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid parameter chain: {0}")]
    Parameters(#[from] ParamsError),

    #[error("Invalid expansion: {0}")]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("Encryption error: {0}")]
    Encryption(#[from] EncryptError),

    #[error("Missing expansion threshold for level {level}")]
    MissingThreshold { level: usize },

    #[error("Out of order expansion: requested level {requested}, context is at level {current} of {levels}")]
    OutOfOrderExpansion {
        requested: usize,
        current: usize,
        levels: usize,
    },

    #[error("Helper {helper} failed at level {level} and can no longer expand")]
    HelperFailed { helper: usize, level: usize },

    #[error("Invalid expansion config: {0}")]
    InvalidConfig(String),

    #[error("Malformed report payload: {0}")]
    Payload(#[from] bincode::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
