//! Point-function engine capability and the in-process incremental DPF
//!
//! `PointFunctionEngine` is the small fixed contract the aggregation layer
//! consumes. Any backend (foreign binding, remote service, the in-process
//! `IncrementalDpf`) can sit behind it as long as it treats keys and contexts
//! as its own opaque blobs.
//!
//! # Incremental DPF
//!
//! `IncrementalDpf` is a tree-based two-party DPF over `n` bits, where `n` is
//! the last level's `log_domain_size`. Each party walks the tree from its root
//! seed; at every depth a shared correction word keeps the two parties' seeds
//! equal off the path to `alpha` and pseudorandom on it. At the depth of each
//! hierarchy level a value correction word makes the parties' additive output
//! shares sum to `betas[level]` on the path and to zero elsewhere.

use rand::Rng;

use crate::error::{EngineError, Result};
use crate::key::{ContextState, CorrectionWord, DpfKey, EvaluationContext, KeyShare, PartialEvaluation};
use crate::params::{validate_chain, DpfParameters};
use crate::prg::{Block, Child, SeedExpander};
use crate::MAX_EXPANSION_LEN;

/// Contract of an opaque two-party point-function engine
pub trait PointFunctionEngine {
    /// Generate the two complementary key shares for `(params, alpha, betas)`.
    ///
    /// `betas` carries one value per hierarchy level.
    fn generate_keys(
        &self,
        params: &[DpfParameters],
        alpha: u64,
        betas: &[u64],
    ) -> Result<(KeyShare, KeyShare)>;

    /// Create the evaluation context for one key share
    fn create_context(&self, params: &[DpfParameters], key: &KeyShare) -> Result<EvaluationContext>;

    /// Expand the next hierarchy level under `prefixes`.
    ///
    /// `prefixes` must be empty for level 0 and a non-empty subset of the
    /// previous level's expanded indices afterwards. On success the context
    /// advances by one level; on failure it is left untouched.
    fn expand_level(&self, context: &mut EvaluationContext, prefixes: &[u64]) -> Result<Vec<u64>>;
}

/// In-process incremental DPF backed by fixed-key AES
pub struct IncrementalDpf {
    expander: SeedExpander,
}

impl IncrementalDpf {
    pub fn new() -> Self {
        Self {
            expander: SeedExpander::new(),
        }
    }

    /// Step one depth down from `(seed, control)` using correction word `cw`
    fn step(&self, seed: Block, control: bool, cw: &CorrectionWord) -> [Child; 2] {
        let [mut left, mut right] = self.expander.expand(seed);
        if control {
            left.seed ^= cw.seed;
            left.control ^= cw.control_left;
            right.seed ^= cw.seed;
            right.control ^= cw.control_right;
        }
        [left, right]
    }

    /// This party's additive share of the output at one node
    fn output_share(&self, seed: Block, control: bool, correction: u64, party: u8, mask: u64) -> u64 {
        let mut value = self.expander.convert(seed);
        if control {
            value = value.wrapping_add(correction);
        }
        let value = if party == 0 { value } else { value.wrapping_neg() };
        value & mask
    }

    /// Value correction for one level from both parties' on-path nodes
    fn value_correction(&self, seeds: [Block; 2], controls: [bool; 2], beta: u64, mask: u64) -> u64 {
        let correction = beta
            .wrapping_sub(self.expander.convert(seeds[0]))
            .wrapping_add(self.expander.convert(seeds[1]));
        let correction = if controls[1] {
            correction.wrapping_neg()
        } else {
            correction
        };
        correction & mask
    }
}

/// Reject decoded contexts whose key does not fit their own parameters
fn check_state(state: &ContextState) -> Result<()> {
    validate_chain(&state.parameters)?;
    let params = &state.parameters;
    let depth = params[params.len() - 1].log_domain_size as usize;
    let key = &state.key;
    if key.party > 1
        || key.correction_words.len() != depth
        || key.value_corrections.len() != params.len()
        || state.hierarchy_level > params.len()
    {
        return Err(EngineError::new(
            "evaluation context does not match its parameters",
        ));
    }
    Ok(())
}

impl Default for IncrementalDpf {
    fn default() -> Self {
        Self::new()
    }
}

impl PointFunctionEngine for IncrementalDpf {
    fn generate_keys(
        &self,
        params: &[DpfParameters],
        alpha: u64,
        betas: &[u64],
    ) -> Result<(KeyShare, KeyShare)> {
        validate_chain(params)?;

        if betas.len() != params.len() {
            return Err(EngineError::new(format!(
                "expected {} betas (one per level), got {}",
                params.len(),
                betas.len()
            )));
        }

        let depth = params[params.len() - 1].log_domain_size;
        if depth < 64 && alpha >> depth != 0 {
            return Err(EngineError::new(format!(
                "alpha {alpha} is outside the domain of size 2^{depth}"
            )));
        }

        for (level, (p, &beta)) in params.iter().zip(betas).enumerate() {
            if beta & !p.element_mask() != 0 {
                return Err(EngineError::new(format!(
                    "beta {beta} at level {level} does not fit in {} bits",
                    p.element_bit_size
                )));
            }
        }

        let mut rng = rand::thread_rng();
        let roots: [Block; 2] = [rng.gen(), rng.gen()];
        let mut seeds = roots;
        let mut controls = [false, true];

        let mut correction_words = Vec::with_capacity(depth as usize);
        let mut value_corrections = Vec::with_capacity(params.len());
        let mut level = 0;

        for d in 0..=depth {
            if d > 0 {
                let bit = ((alpha >> (depth - d)) & 1) as usize;
                let keep = bit;
                let lose = 1 - bit;

                let expanded = [
                    self.expander.expand(seeds[0]),
                    self.expander.expand(seeds[1]),
                ];
                let cw = CorrectionWord {
                    seed: expanded[0][lose].seed ^ expanded[1][lose].seed,
                    control_left: expanded[0][0].control ^ expanded[1][0].control ^ (bit == 0),
                    control_right: expanded[0][1].control ^ expanded[1][1].control ^ (bit == 1),
                };
                let keep_control = if keep == 0 {
                    cw.control_left
                } else {
                    cw.control_right
                };

                for party in 0..2 {
                    let child = expanded[party][keep];
                    let apply = controls[party];
                    seeds[party] = child.seed ^ if apply { cw.seed } else { 0 };
                    controls[party] = child.control ^ (apply && keep_control);
                }
                correction_words.push(cw);
            }

            if level < params.len() && params[level].log_domain_size == d {
                let mask = params[level].element_mask();
                value_corrections.push(self.value_correction(seeds, controls, betas[level], mask));
                level += 1;
            }
        }

        let key0 = DpfKey {
            party: 0,
            seed: roots[0],
            correction_words: correction_words.clone(),
            value_corrections: value_corrections.clone(),
        };
        let key1 = DpfKey {
            party: 1,
            seed: roots[1],
            correction_words,
            value_corrections,
        };

        tracing::debug!(levels = params.len(), depth, "Generated DPF key pair");

        Ok((key0.encode()?, key1.encode()?))
    }

    fn create_context(&self, params: &[DpfParameters], key: &KeyShare) -> Result<EvaluationContext> {
        validate_chain(params)?;
        let key = DpfKey::decode(key)?;

        let depth = params[params.len() - 1].log_domain_size as usize;
        if key.party > 1
            || key.correction_words.len() != depth
            || key.value_corrections.len() != params.len()
        {
            return Err(EngineError::new(
                "dpf key does not match the given parameters",
            ));
        }

        ContextState {
            parameters: params.to_vec(),
            key,
            hierarchy_level: 0,
            partial_evaluations: Vec::new(),
        }
        .encode()
    }

    fn expand_level(&self, context: &mut EvaluationContext, prefixes: &[u64]) -> Result<Vec<u64>> {
        let mut state = ContextState::decode(context)?;
        check_state(&state)?;
        let level = state.hierarchy_level;
        let params = &state.parameters;

        if level >= params.len() {
            return Err(EngineError::new(format!(
                "evaluation context is exhausted after {} levels",
                params.len()
            )));
        }

        let (start_depth, roots) = if level == 0 {
            if !prefixes.is_empty() {
                return Err(EngineError::new(
                    "prefixes must be empty for the first level expansion",
                ));
            }
            let root = PartialEvaluation {
                prefix: 0,
                seed: state.key.seed,
                control: state.key.party == 1,
            };
            (0, vec![root])
        } else {
            if prefixes.is_empty() {
                return Err(EngineError::new(format!(
                    "prefixes must be non-empty for level {level}"
                )));
            }
            if let Some(w) = prefixes.windows(2).find(|w| w[0] >= w[1]) {
                return Err(EngineError::new(format!(
                    "prefixes must be strictly increasing, got {} then {}",
                    w[0], w[1]
                )));
            }
            let mut roots = Vec::with_capacity(prefixes.len());
            for &prefix in prefixes {
                let found = state
                    .partial_evaluations
                    .binary_search_by_key(&prefix, |p| p.prefix)
                    .map_err(|_| {
                        EngineError::new(format!(
                            "prefix {prefix} is not present in the evaluation context"
                        ))
                    })?;
                roots.push(state.partial_evaluations[found]);
            }
            (params[level - 1].log_domain_size, roots)
        };

        let end_depth = params[level].log_domain_size;
        let delta = end_depth - start_depth;
        let total = 1u64
            .checked_shl(delta)
            .and_then(|size| size.checked_mul(roots.len() as u64))
            .filter(|&len| len <= MAX_EXPANSION_LEN)
            .ok_or_else(|| {
                EngineError::new(format!(
                    "vector length for level {level} should not exceed {MAX_EXPANSION_LEN}"
                ))
            })?;

        // Breadth-first per root keeps children in local-offset order.
        let mut expanded = Vec::with_capacity(total as usize);
        let mut frontier = Vec::with_capacity(total as usize);
        let mut next = Vec::new();
        for root in roots {
            next.clear();
            next.push(root);
            for d in start_depth..end_depth {
                let cw = state.key.correction_words[d as usize];
                let current = std::mem::take(&mut next);
                next.reserve(current.len() * 2);
                for node in current {
                    let children = self.step(node.seed, node.control, &cw);
                    for (bit, child) in children.into_iter().enumerate() {
                        next.push(PartialEvaluation {
                            prefix: (node.prefix << 1) | bit as u64,
                            seed: child.seed,
                            control: child.control,
                        });
                    }
                }
            }
            frontier.append(&mut next);
        }

        let mask = params[level].element_mask();
        let correction = state.key.value_corrections[level];
        for node in &frontier {
            expanded.push(self.output_share(node.seed, node.control, correction, state.key.party, mask));
        }

        // Strictly increasing prefixes keep the frontier sorted for the next
        // level's binary search.
        state.partial_evaluations = frontier;
        state.hierarchy_level += 1;
        *context = state.encode()?;

        tracing::debug!(
            level,
            prefixes = prefixes.len(),
            values = expanded.len(),
            "Expanded DPF level"
        );

        Ok(expanded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain(logs: &[u32]) -> Vec<DpfParameters> {
        logs.iter().map(|&l| DpfParameters::new(l, 64)).collect()
    }

    fn reconstruct(a: &[u64], b: &[u64], mask: u64) -> Vec<u64> {
        a.iter()
            .zip(b)
            .map(|(x, y)| x.wrapping_add(*y) & mask)
            .collect()
    }

    #[test]
    fn test_keygen_eval_two_levels() {
        // alpha 8 in a 2^4 domain
        let dpf = IncrementalDpf::new();
        let params = chain(&[2, 4]);
        let (k1, k2) = dpf.generate_keys(&params, 8, &[1, 1]).unwrap();

        let mut ctx1 = dpf.create_context(&params, &k1).unwrap();
        let mut ctx2 = dpf.create_context(&params, &k2).unwrap();

        let v1 = dpf.expand_level(&mut ctx1, &[]).unwrap();
        let v2 = dpf.expand_level(&mut ctx2, &[]).unwrap();
        assert_eq!(v1.len(), 4);
        assert_eq!(reconstruct(&v1, &v2, u64::MAX), vec![0, 0, 1, 0]);

        let w1 = dpf.expand_level(&mut ctx1, &[2]).unwrap();
        let w2 = dpf.expand_level(&mut ctx2, &[2]).unwrap();
        assert_eq!(w1.len(), 4);
        assert_eq!(reconstruct(&w1, &w2, u64::MAX), vec![1, 0, 0, 0]);
    }

    #[test]
    fn test_off_path_prefix_is_zero() {
        let dpf = IncrementalDpf::new();
        let params = chain(&[1, 3, 6]);
        let alpha = 0b101_110;
        let (k1, k2) = dpf.generate_keys(&params, alpha, &[7, 11, 13]).unwrap();

        let mut ctx1 = dpf.create_context(&params, &k1).unwrap();
        let mut ctx2 = dpf.create_context(&params, &k2).unwrap();

        let l0 = reconstruct(
            &dpf.expand_level(&mut ctx1, &[]).unwrap(),
            &dpf.expand_level(&mut ctx2, &[]).unwrap(),
            u64::MAX,
        );
        assert_eq!(l0, vec![0, 7]);

        let l1 = reconstruct(
            &dpf.expand_level(&mut ctx1, &[0, 1]).unwrap(),
            &dpf.expand_level(&mut ctx2, &[0, 1]).unwrap(),
            u64::MAX,
        );
        let mut want = vec![0u64; 8];
        want[0b101] = 11;
        assert_eq!(l1, want);

        let l2 = reconstruct(
            &dpf.expand_level(&mut ctx1, &[0b011, 0b101]).unwrap(),
            &dpf.expand_level(&mut ctx2, &[0b011, 0b101]).unwrap(),
            u64::MAX,
        );
        let mut want = vec![0u64; 16];
        want[8 + 0b110] = 13;
        assert_eq!(l2, want);
    }

    #[test]
    fn test_small_element_width() {
        let dpf = IncrementalDpf::new();
        let params = vec![DpfParameters::new(3, 8)];
        let (k1, k2) = dpf.generate_keys(&params, 5, &[200]).unwrap();

        let mut ctx1 = dpf.create_context(&params, &k1).unwrap();
        let mut ctx2 = dpf.create_context(&params, &k2).unwrap();
        let v1 = dpf.expand_level(&mut ctx1, &[]).unwrap();
        let v2 = dpf.expand_level(&mut ctx2, &[]).unwrap();

        assert!(v1.iter().chain(&v2).all(|&v| v <= 0xff));
        let mut want = vec![0u64; 8];
        want[5] = 200;
        assert_eq!(reconstruct(&v1, &v2, 0xff), want);
    }

    #[test]
    fn test_zero_depth_root_level() {
        let dpf = IncrementalDpf::new();
        let params = chain(&[0, 2]);
        let (k1, k2) = dpf.generate_keys(&params, 3, &[4, 9]).unwrap();

        let mut ctx1 = dpf.create_context(&params, &k1).unwrap();
        let mut ctx2 = dpf.create_context(&params, &k2).unwrap();
        let root = reconstruct(
            &dpf.expand_level(&mut ctx1, &[]).unwrap(),
            &dpf.expand_level(&mut ctx2, &[]).unwrap(),
            u64::MAX,
        );
        assert_eq!(root, vec![4]);

        let leaves = reconstruct(
            &dpf.expand_level(&mut ctx1, &[0]).unwrap(),
            &dpf.expand_level(&mut ctx2, &[0]).unwrap(),
            u64::MAX,
        );
        assert_eq!(leaves, vec![0, 0, 0, 9]);
    }

    #[test]
    fn test_generate_keys_errors() {
        let dpf = IncrementalDpf::new();

        let err = dpf.generate_keys(&[], 0, &[]).unwrap_err();
        assert_eq!(err.message, "empty dpf parameters");

        let err = dpf.generate_keys(&chain(&[2, 4]), 1, &[1]).unwrap_err();
        assert!(err.message.contains("expected 2 betas"));

        let err = dpf.generate_keys(&chain(&[2, 4]), 16, &[1, 1]).unwrap_err();
        assert!(err.message.contains("outside the domain"));

        let err = dpf
            .generate_keys(&[DpfParameters::new(2, 4)], 0, &[16])
            .unwrap_err();
        assert!(err.message.contains("does not fit"));
    }

    #[test]
    fn test_context_rejects_mismatched_key() {
        let dpf = IncrementalDpf::new();
        let (k1, _) = dpf.generate_keys(&chain(&[2, 4]), 3, &[1, 1]).unwrap();
        let err = dpf.create_context(&chain(&[2, 5]), &k1).unwrap_err();
        assert_eq!(err.message, "dpf key does not match the given parameters");
    }

    #[test]
    fn test_expand_level_call_contract() {
        let dpf = IncrementalDpf::new();
        let params = chain(&[2, 4]);
        let (k1, _) = dpf.generate_keys(&params, 3, &[1, 1]).unwrap();
        let mut ctx = dpf.create_context(&params, &k1).unwrap();

        // Root level takes no prefixes.
        assert!(dpf.expand_level(&mut ctx, &[1]).is_err());
        dpf.expand_level(&mut ctx, &[]).unwrap();

        // Later levels need known, non-empty prefixes.
        assert!(dpf.expand_level(&mut ctx, &[]).is_err());
        let err = dpf.expand_level(&mut ctx, &[4]).unwrap_err();
        assert!(err.message.contains("not present"));

        dpf.expand_level(&mut ctx, &[0, 3]).unwrap();
        let err = dpf.expand_level(&mut ctx, &[0]).unwrap_err();
        assert!(err.message.contains("exhausted"));
    }

    #[test]
    fn test_prefixes_must_strictly_increase() {
        let dpf = IncrementalDpf::new();
        let params = chain(&[2, 5]);
        let (k1, _) = dpf.generate_keys(&params, 9, &[1, 1]).unwrap();
        let mut ctx = dpf.create_context(&params, &k1).unwrap();
        dpf.expand_level(&mut ctx, &[]).unwrap();

        for prefixes in [&[2, 2][..], &[3, 1][..]] {
            let err = dpf.expand_level(&mut ctx, prefixes).unwrap_err();
            assert!(err.message.contains("strictly increasing"));
        }

        // Rejected calls leave the context usable.
        assert_eq!(dpf.expand_level(&mut ctx, &[1, 3]).unwrap().len(), 16);
    }

    #[test]
    fn test_inconsistent_context_rejected() {
        let dpf = IncrementalDpf::new();
        let params = chain(&[2, 4]);
        let (k1, _) = dpf.generate_keys(&params, 3, &[1, 1]).unwrap();
        let ctx = dpf.create_context(&params, &k1).unwrap();

        let mut short = ContextState::decode(&ctx).unwrap();
        short.key.correction_words.truncate(1);
        let mut bad = EvaluationContext::from_bytes(short.encode().unwrap().as_bytes().to_vec());
        let err = dpf.expand_level(&mut bad, &[]).unwrap_err();
        assert!(err.message.contains("does not match"));

        let mut ahead = ContextState::decode(&ctx).unwrap();
        ahead.hierarchy_level = 7;
        let mut bad = ahead.encode().unwrap();
        assert!(dpf.expand_level(&mut bad, &[]).is_err());

        let mut no_params = ContextState::decode(&ctx).unwrap();
        no_params.parameters.clear();
        let mut bad = no_params.encode().unwrap();
        assert!(dpf.expand_level(&mut bad, &[]).is_err());
    }

    #[test]
    fn test_expansion_length_limit() {
        let dpf = IncrementalDpf::new();
        let params = chain(&[40]);
        let (k1, _) = dpf.generate_keys(&params, 0, &[1]).unwrap();
        let mut ctx = dpf.create_context(&params, &k1).unwrap();
        let err = dpf.expand_level(&mut ctx, &[]).unwrap_err();
        assert!(err.message.contains("should not exceed"));
    }
}
