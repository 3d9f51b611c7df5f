//! Histogram records and prefix survival
//!
//! A prefix survives to the next level when its aggregate is strictly greater
//! than the level's threshold. The same comparison is used by the single-key
//! driver and by the two-helper query.

use serde::{Deserialize, Serialize};

/// A record that can decide whether its prefix survives
pub trait Aggregate {
    /// Domain index (prefix) of this record
    fn index(&self) -> u64;

    /// Value compared against the threshold
    fn survival_value(&self) -> u64;
}

/// One expanded position of a single key: `(index, value)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrefixValue {
    pub index: u64,
    pub value: u64,
}

impl Aggregate for PrefixValue {
    fn index(&self) -> u64 {
        self.index
    }

    fn survival_value(&self) -> u64 {
        self.value
    }
}

/// Reconstructed histogram bucket after combining both helpers' shares
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompleteHistogram {
    pub index: u64,
    pub sum: u64,
    pub count: u64,
}

impl Aggregate for CompleteHistogram {
    fn index(&self) -> u64 {
        self.index
    }

    /// Survival is decided on the number of contributions, not their sum
    fn survival_value(&self) -> u64 {
        self.count
    }
}

/// One helper's share of a level: values aligned with `bucket_ids`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartialHistogram {
    pub bucket_ids: Vec<u64>,
    pub sums: Vec<u64>,
    pub counts: Vec<u64>,
}

impl PartialHistogram {
    pub fn len(&self) -> usize {
        self.bucket_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bucket_ids.is_empty()
    }
}

/// Indices whose survival value is strictly greater than `threshold`,
/// ascending and without duplicates.
pub fn get_next_nonempty_prefixes<A: Aggregate>(records: &[A], threshold: u64) -> Vec<u64> {
    let mut prefixes: Vec<u64> = records
        .iter()
        .filter(|r| r.survival_value() > threshold)
        .map(Aggregate::index)
        .collect();
    prefixes.sort_unstable();
    prefixes.dedup();
    prefixes
}

/// Zip indices with values into records
pub fn prefix_values(indices: &[u64], values: &[u64]) -> Vec<PrefixValue> {
    indices
        .iter()
        .zip(values)
        .map(|(&index, &value)| PrefixValue { index, value })
        .collect()
}

/// Sum two helpers' shares position by position, modulo `mask + 1`.
///
/// Returns `None` if the two partial histograms do not cover the same
/// buckets in the same order.
pub fn merge_partial_histograms(
    a: &PartialHistogram,
    b: &PartialHistogram,
    mask: u64,
) -> Option<Vec<CompleteHistogram>> {
    if a.bucket_ids != b.bucket_ids || a.sums.len() != a.len() || b.sums.len() != b.len() {
        return None;
    }
    if a.counts.len() != a.len() || b.counts.len() != b.len() {
        return None;
    }

    let merged = (0..a.len())
        .map(|i| CompleteHistogram {
            index: a.bucket_ids[i],
            sum: a.sums[i].wrapping_add(b.sums[i]) & mask,
            count: a.counts[i].wrapping_add(b.counts[i]) & mask,
        })
        .collect();
    Some(merged)
}
