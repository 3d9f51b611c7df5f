//! DPF error types

use thiserror::Error;

/// Malformed parameter chain
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParamsError {
    #[error("empty dpf parameters")]
    EmptyChain,

    #[error(
        "log_domain_size must be strictly increasing: level {level} has {current}, previous level has {previous}"
    )]
    NonMonotonicDomain {
        level: usize,
        previous: u32,
        current: u32,
    },

    #[error("log_domain_size {log_domain_size} at level {level} exceeds {max}")]
    DomainTooLarge {
        level: usize,
        log_domain_size: u32,
        max: u32,
    },

    #[error("element_bit_size {element_bit_size} at level {level} must be in 1..=64")]
    InvalidElementBitSize { level: usize, element_bit_size: u32 },
}

/// Failure reported by a point-function engine.
///
/// The message is whatever the engine produced; callers surface it verbatim.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct EngineError {
    pub message: String,
}

impl EngineError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<ParamsError> for EngineError {
    fn from(err: ParamsError) -> Self {
        Self::new(err.to_string())
    }
}

impl From<bincode::Error> for EngineError {
    fn from(err: bincode::Error) -> Self {
        Self::new(format!("malformed engine blob: {err}"))
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
