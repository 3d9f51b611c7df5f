//! Hierarchical expansion driver
//!
//! Walks one key share through every level of its parameter chain. After each
//! non-terminal level the survival policy picks which of the expanded indices
//! become the prefixes of the next level.

use dpf_core::{DpfParameters, KeyShare, PointFunctionEngine};
use tracing::{debug, info, warn};

use crate::bucket::{calculate_bucket_ids, check_expansion_consistency, level_bucket_ids};
use crate::context::ExpansionContext;
use crate::error::{Error, Result};
use crate::histogram::{get_next_nonempty_prefixes, prefix_values};

/// Chooses the prefixes that survive a level
pub trait SurvivalPolicy {
    /// `indices` and `values` are aligned: `values[i]` belongs to `indices[i]`
    fn next_prefixes(&self, level: usize, indices: &[u64], values: &[u64]) -> Result<Vec<u64>>;
}

/// Keep indices whose value is strictly greater than the level's threshold
#[derive(Debug, Clone)]
pub struct ThresholdPolicy {
    thresholds: Vec<u64>,
}

impl ThresholdPolicy {
    pub fn new(thresholds: Vec<u64>) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &[u64] {
        &self.thresholds
    }

    /// Threshold for a non-terminal level
    pub fn threshold(&self, level: usize) -> Result<u64> {
        self.thresholds
            .get(level)
            .copied()
            .ok_or(Error::MissingThreshold { level })
    }
}

impl SurvivalPolicy for ThresholdPolicy {
    fn next_prefixes(&self, level: usize, indices: &[u64], values: &[u64]) -> Result<Vec<u64>> {
        let threshold = self.threshold(level)?;
        Ok(get_next_nonempty_prefixes(
            &prefix_values(indices, values),
            threshold,
        ))
    }
}

/// Result of a full hierarchical expansion
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExpansionOutput {
    /// Values of the last expanded level
    pub expanded: Vec<u64>,
    /// Domain index of each value in `expanded`; empty for a single-level chain
    pub bucket_ids: Vec<u64>,
    /// Prefixes used at each expanded level, starting with `[]` for level 0
    pub prefixes: Vec<Vec<u64>>,
}

impl ExpansionOutput {
    /// `(bucket, value)` pairs of the final level.
    ///
    /// For a single-level chain the vector index is the bucket.
    pub fn buckets(&self) -> Vec<(u64, u64)> {
        if self.bucket_ids.is_empty() {
            return (0u64..).zip(self.expanded.iter().copied()).collect();
        }
        self.bucket_ids
            .iter()
            .copied()
            .zip(self.expanded.iter().copied())
            .collect()
    }
}

/// Drives a single key share through all levels
pub struct HierarchicalExpander<'e, E: PointFunctionEngine + ?Sized, P: SurvivalPolicy> {
    context: ExpansionContext<'e, E>,
    policy: P,
}

impl<'e, E: PointFunctionEngine + ?Sized, P: SurvivalPolicy> HierarchicalExpander<'e, E, P> {
    pub fn new(engine: &'e E, params: &[DpfParameters], key: &KeyShare, policy: P) -> Result<Self> {
        Ok(Self {
            context: ExpansionContext::create(engine, params, key)?,
            policy,
        })
    }

    /// Expand every level, stopping early if no prefix survives
    pub fn run(mut self) -> Result<ExpansionOutput> {
        let params = self.context.params().to_vec();
        let last = params.len() - 1;

        let mut prefixes: Vec<u64> = Vec::new();
        let mut used = Vec::with_capacity(params.len());

        for level in 0..params.len() {
            let values = self.context.advance_level(level, &prefixes)?;
            used.push(std::mem::take(&mut prefixes));
            debug!(
                level,
                prefixes = used[level].len(),
                values = values.len(),
                "Expanded level"
            );

            if level == last {
                let bucket_ids = calculate_bucket_ids(&params, &used)?;
                info!(levels = params.len(), buckets = values.len(), "Expansion complete");
                return Ok(ExpansionOutput {
                    expanded: values,
                    bucket_ids,
                    prefixes: used,
                });
            }

            let indices = level_bucket_ids(&params, level, &used[level])?;
            prefixes = self.policy.next_prefixes(level, &indices, &values)?;

            if prefixes.is_empty() {
                info!(level, "No prefixes survived, stopping expansion");
                return Ok(ExpansionOutput {
                    expanded: Vec::new(),
                    bucket_ids: Vec::new(),
                    prefixes: used,
                });
            }
        }

        Ok(ExpansionOutput::default())
    }
}

/// Expand `key` through all levels, pruning with per-level thresholds.
///
/// `thresholds[i]` applies to the output of level `i`; the last level needs
/// none.
pub fn run_hierarchical_expansion<E: PointFunctionEngine + ?Sized>(
    engine: &E,
    params: &[DpfParameters],
    key: &KeyShare,
    thresholds: &[u64],
) -> Result<ExpansionOutput> {
    let needed = params.len().saturating_sub(1);
    if thresholds.len() < needed {
        return Err(Error::MissingThreshold {
            level: thresholds.len(),
        });
    }
    if thresholds.len() > needed {
        warn!(
            given = thresholds.len(),
            used = needed,
            "Ignoring extra expansion thresholds"
        );
    }

    let policy = ThresholdPolicy::new(thresholds[..needed].to_vec());
    HierarchicalExpander::new(engine, params, key, policy)?.run()
}

/// Expand `key` with prefixes chosen by the caller for every level.
///
/// Returns the values of the last level together with their bucket IDs.
pub fn expand_with_prefixes<E: PointFunctionEngine + ?Sized>(
    engine: &E,
    params: &[DpfParameters],
    key: &KeyShare,
    prefixes: &[Vec<u64>],
) -> Result<ExpansionOutput> {
    check_expansion_consistency(params, prefixes)?;

    let mut context = ExpansionContext::create(engine, params, key)?;
    let mut expanded = Vec::new();
    for (level, level_prefixes) in prefixes.iter().enumerate() {
        expanded = context.advance_level(level, level_prefixes)?;
    }

    Ok(ExpansionOutput {
        expanded,
        bucket_ids: calculate_bucket_ids(params, prefixes)?,
        prefixes: prefixes.to_vec(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use dpf_core::IncrementalDpf;

    fn chain(logs: &[u32], bits: u32) -> Vec<DpfParameters> {
        logs.iter().map(|&l| DpfParameters::new(l, bits)).collect()
    }

    fn combine(a: &ExpansionOutput, b: &ExpansionOutput, mask: u64) -> Vec<(u64, u64)> {
        a.buckets()
            .into_iter()
            .zip(b.buckets())
            .map(|((id, x), (_, y))| (id, x.wrapping_add(y) & mask))
            .collect()
    }

    #[test]
    fn test_single_share_follows_threshold() {
        let engine = IncrementalDpf::new();
        let params = chain(&[2, 4], 64);
        let (key0, _) = engine.generate_keys(&params, 9, &[5, 5]).unwrap();

        // A single share is pseudorandom, so with threshold 0 nearly every
        // prefix survives. Only check the shape of the result.
        let out = run_hierarchical_expansion(&engine, &params, &key0, &[0]).unwrap();
        assert_eq!(out.prefixes[0], Vec::<u64>::new());
        assert_eq!(out.expanded.len(), out.bucket_ids.len());
        assert_eq!(out.expanded.len(), out.prefixes[1].len() * 4);
    }

    #[test]
    fn test_both_shares_reconstruct_alpha() {
        let engine = IncrementalDpf::new();
        let params = chain(&[1, 3, 5], 64);
        let alpha = 0b10110;
        let (key0, key1) = engine.generate_keys(&params, alpha, &[1, 2, 3]).unwrap();

        let prefixes = vec![vec![], vec![1], vec![0b101]];
        let a = expand_with_prefixes(&engine, &params, &key0, &prefixes).unwrap();
        let b = expand_with_prefixes(&engine, &params, &key1, &prefixes).unwrap();

        assert_eq!(a.bucket_ids, vec![20, 21, 22, 23]);
        for (id, value) in combine(&a, &b, u64::MAX) {
            assert_eq!(value, if id == alpha { 3 } else { 0 });
        }
    }

    #[test]
    fn test_direct_expansion() {
        let engine = IncrementalDpf::new();
        let params = chain(&[3], 16);
        let (key0, key1) = engine.generate_keys(&params, 6, &[7]).unwrap();

        let a = run_hierarchical_expansion(&engine, &params, &key0, &[]).unwrap();
        let b = run_hierarchical_expansion(&engine, &params, &key1, &[]).unwrap();

        assert!(a.bucket_ids.is_empty());
        assert_eq!(a.expanded.len(), 8);
        for (id, value) in combine(&a, &b, 0xffff) {
            assert_eq!(value, if id == 6 { 7 } else { 0 });
        }
    }

    #[test]
    fn test_missing_threshold() {
        let engine = IncrementalDpf::new();
        let params = chain(&[1, 2, 3], 64);
        let (key0, _) = engine.generate_keys(&params, 1, &[1, 1, 1]).unwrap();

        assert!(matches!(
            run_hierarchical_expansion(&engine, &params, &key0, &[0]),
            Err(Error::MissingThreshold { level: 1 })
        ));
    }

    #[test]
    fn test_extra_thresholds_ignored() {
        let engine = IncrementalDpf::new();
        let params = chain(&[3], 64);
        let (key0, _) = engine.generate_keys(&params, 1, &[1]).unwrap();

        let out = run_hierarchical_expansion(&engine, &params, &key0, &[1, 2, 3]).unwrap();
        assert_eq!(out.expanded.len(), 8);
    }

    struct NothingSurvives;

    impl SurvivalPolicy for NothingSurvives {
        fn next_prefixes(&self, _: usize, _: &[u64], _: &[u64]) -> Result<Vec<u64>> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn test_empty_survivors_is_terminal() {
        let engine = IncrementalDpf::new();
        let params = chain(&[2, 4], 64);
        let (key0, _) = engine.generate_keys(&params, 3, &[1, 1]).unwrap();

        let out = HierarchicalExpander::new(&engine, &params, &key0, NothingSurvives)
            .unwrap()
            .run()
            .unwrap();
        assert!(out.expanded.is_empty());
        assert!(out.bucket_ids.is_empty());
        assert_eq!(out.prefixes, vec![Vec::<u64>::new()]);
    }

    #[test]
    fn test_expand_with_prefixes_validates() {
        let engine = IncrementalDpf::new();
        let params = chain(&[2, 4], 64);
        let (key0, _) = engine.generate_keys(&params, 3, &[1, 1]).unwrap();

        assert!(matches!(
            expand_with_prefixes(&engine, &params, &key0, &[vec![], vec![]]),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn test_expand_with_unordered_prefixes() {
        let engine = IncrementalDpf::new();
        let params = chain(&[2, 5], 64);
        let (key0, _) = engine.generate_keys(&params, 9, &[1, 1]).unwrap();

        for bad in [vec![2, 2], vec![3, 1]] {
            assert!(matches!(
                expand_with_prefixes(&engine, &params, &key0, &[vec![], bad]),
                Err(Error::Engine(_))
            ));
        }

        let out = expand_with_prefixes(&engine, &params, &key0, &[vec![], vec![1, 3]]).unwrap();
        assert_eq!(out.bucket_ids, (8..16).chain(24..32).collect::<Vec<u64>>());
    }

    #[test]
    fn test_threshold_policy_strict() {
        let policy = ThresholdPolicy::new(vec![3]);
        let next = policy.next_prefixes(0, &[1, 2, 3], &[2, 3, 4]).unwrap();
        assert_eq!(next, vec![3]);
        assert!(matches!(
            policy.next_prefixes(1, &[1], &[9]),
            Err(Error::MissingThreshold { level: 1 })
        ));
    }
}
