//! DPF parameters: one entry per level of the domain hierarchy
//!
//! A parameter chain is valid when it is non-empty and `log_domain_size`
//! strictly increases from one level to the next. Level `i` partitions the
//! final domain into `2^log_domain_size[i]` prefixes.

use serde::{Deserialize, Serialize};

use crate::error::ParamsError;
use crate::MAX_LOG_DOMAIN_SIZE;

/// Parameters for a single hierarchy level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DpfParameters {
    /// log2 of the number of prefixes at this level
    pub log_domain_size: u32,
    /// Width of each output element in bits
    pub element_bit_size: u32,
}

impl DpfParameters {
    pub fn new(log_domain_size: u32, element_bit_size: u32) -> Self {
        Self {
            log_domain_size,
            element_bit_size,
        }
    }

    /// Mask that reduces a value modulo `2^element_bit_size`
    pub fn element_mask(&self) -> u64 {
        if self.element_bit_size >= 64 {
            u64::MAX
        } else {
            (1u64 << self.element_bit_size) - 1
        }
    }
}

/// Validate a parameter chain.
///
/// # Errors
/// - `EmptyChain` if there are no levels
/// - `NonMonotonicDomain` if `log_domain_size[i] >= log_domain_size[i + 1]`
/// - `DomainTooLarge` / `InvalidElementBitSize` for values the engine cannot represent
pub fn validate_chain(params: &[DpfParameters]) -> Result<(), ParamsError> {
    if params.is_empty() {
        return Err(ParamsError::EmptyChain);
    }

    for (level, p) in params.iter().enumerate() {
        if p.log_domain_size > MAX_LOG_DOMAIN_SIZE {
            return Err(ParamsError::DomainTooLarge {
                level,
                log_domain_size: p.log_domain_size,
                max: MAX_LOG_DOMAIN_SIZE,
            });
        }
        if p.element_bit_size == 0 || p.element_bit_size > 64 {
            return Err(ParamsError::InvalidElementBitSize {
                level,
                element_bit_size: p.element_bit_size,
            });
        }
    }

    for (i, pair) in params.windows(2).enumerate() {
        if pair[0].log_domain_size >= pair[1].log_domain_size {
            return Err(ParamsError::NonMonotonicDomain {
                level: i + 1,
                previous: pair[0].log_domain_size,
                current: pair[1].log_domain_size,
            });
        }
    }

    Ok(())
}

/// Number of bits a level adds over its predecessor.
///
/// Returns `None` for level 0 (no predecessor) and for levels past the end
/// of the chain.
pub fn delta_bits(params: &[DpfParameters], level: usize) -> Option<u32> {
    if level == 0 || level >= params.len() {
        return None;
    }
    params[level]
        .log_domain_size
        .checked_sub(params[level - 1].log_domain_size)
}
