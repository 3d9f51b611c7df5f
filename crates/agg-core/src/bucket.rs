//! Bucket IDs: maps expanded vector positions back to domain indices
//!
//! The values returned by one expansion are ordered by prefix, then by local
//! offset inside the prefix. Bucket IDs are produced in exactly that order so
//! callers can zip the two sequences positionally.

use dpf_core::{delta_bits, DpfParameters, MAX_EXPANSION_LEN};

use crate::error::{Result, ValidationError};

/// Check that prefixes are structurally valid for a hierarchical expansion.
///
/// Accepts exactly: a non-empty chain, one prefix list per level, an empty
/// root list and non-empty lists for every later level.
pub fn check_expansion_consistency(
    params: &[DpfParameters],
    prefixes: &[Vec<u64>],
) -> std::result::Result<(), ValidationError> {
    if params.is_empty() {
        return Err(ValidationError::EmptyParameterChain);
    }

    if params.len() != prefixes.len() {
        return Err(ValidationError::LengthMismatch {
            params: params.len(),
            prefixes: prefixes.len(),
        });
    }

    if !prefixes[0].is_empty() {
        return Err(ValidationError::NonEmptyRootPrefix(prefixes[0].clone()));
    }

    if let Some(level) = prefixes.iter().skip(1).position(Vec::is_empty) {
        return Err(ValidationError::EmptyIntermediatePrefix { level: level + 1 });
    }

    Ok(())
}

/// Bucket IDs for the values of the last level.
///
/// A single-level chain is a direct expansion: the vector index already is
/// the bucket ID, so an empty list is returned instead of materializing it.
pub fn calculate_bucket_ids(params: &[DpfParameters], prefixes: &[Vec<u64>]) -> Result<Vec<u64>> {
    check_expansion_consistency(params, prefixes)?;

    if params.len() == 1 {
        return Ok(Vec::new());
    }

    let last = params.len() - 1;
    expand_prefixes(&prefixes[last], delta(params, last), last)
}

/// Check the prefixes given for a single level.
///
/// Level 0 takes no prefixes; later levels take a non-empty, strictly
/// increasing list.
pub fn check_level_prefixes(level: usize, prefixes: &[u64]) -> std::result::Result<(), ValidationError> {
    if level == 0 {
        if !prefixes.is_empty() {
            return Err(ValidationError::NonEmptyRootPrefix(prefixes.to_vec()));
        }
        return Ok(());
    }
    if prefixes.is_empty() {
        return Err(ValidationError::EmptyIntermediatePrefix { level });
    }
    if prefixes.windows(2).any(|w| w[0] >= w[1]) {
        return Err(ValidationError::UnorderedPrefixes { level });
    }
    Ok(())
}

/// Indices of every value produced when expanding `level` under `prefixes`.
///
/// Level 0 covers its whole domain `0..2^log_domain_size[0]`.
pub fn level_bucket_ids(params: &[DpfParameters], level: usize, prefixes: &[u64]) -> Result<Vec<u64>> {
    if params.is_empty() {
        return Err(ValidationError::EmptyParameterChain.into());
    }
    if level >= params.len() {
        return Err(ValidationError::LevelOutOfRange {
            level,
            levels: params.len(),
        }
        .into());
    }
    if level == 0 {
        return expand_prefixes(&[0], params[0].log_domain_size, 0);
    }
    expand_prefixes(prefixes, delta(params, level), level)
}

fn delta(params: &[DpfParameters], level: usize) -> u32 {
    delta_bits(params, level).unwrap_or(0)
}

fn expand_prefixes(prefixes: &[u64], bits: u32, level: usize) -> Result<Vec<u64>> {
    let expansion_size = 1u64
        .checked_shl(bits)
        .filter(|size| size.saturating_mul(prefixes.len() as u64) <= MAX_EXPANSION_LEN)
        .ok_or(ValidationError::ExpansionTooLarge { level, bits })?;

    let mut ids = Vec::with_capacity(prefixes.len() * expansion_size as usize);
    for &p in prefixes {
        let prefix = p << bits;
        for j in 0..expansion_size {
            ids.push(prefix | j);
        }
    }
    Ok(ids)
}
