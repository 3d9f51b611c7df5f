//! Aggregation helper
//!
//! A helper holds its share of every report. For each level it expands all
//! report contexts under the same prefixes and sums the shares bucket by
//! bucket. One helper's partial histogram reveals nothing on its own; adding
//! both helpers' partial histograms yields the true sums and counts.

use dpf_core::{DpfParameters, PointFunctionEngine};
use hybrid_encrypt::{HybridCipher, StandardPrivateKey};
use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::bucket::{check_level_prefixes, level_bucket_ids};
use crate::context::ExpansionContext;
use crate::error::{Error, Result};
use crate::histogram::PartialHistogram;
use crate::report::{open_report, EncryptedReport};

/// Evaluation state for one report's sum and count shares
struct ReportContexts<'e, E: PointFunctionEngine + ?Sized> {
    sum: ExpansionContext<'e, E>,
    count: ExpansionContext<'e, E>,
}

/// One helper's view of all reports.
///
/// A failed fan-out can leave some report contexts a level ahead of others,
/// so after any engine error the helper refuses further expansion.
pub struct Helper<'e, E: PointFunctionEngine + Sync + ?Sized> {
    id: usize,
    params: Vec<DpfParameters>,
    reports: Vec<ReportContexts<'e, E>>,
    current_level: usize,
    failed: bool,
}

impl<'e, E: PointFunctionEngine + Sync + ?Sized> Helper<'e, E> {
    /// Decrypt this helper's payload of every report and create its contexts
    pub fn from_encrypted_reports<C: HybridCipher + ?Sized>(
        id: usize,
        engine: &'e E,
        cipher: &C,
        params: &[DpfParameters],
        private_key: Option<&StandardPrivateKey>,
        reports: &[EncryptedReport],
        context_info: &[u8],
    ) -> Result<Self> {
        let mut contexts = Vec::with_capacity(reports.len());
        for report in reports {
            let ciphertext = report
                .for_helper(id)
                .ok_or_else(|| Error::InvalidConfig(format!("no helper with id {id}")))?;
            let payload = open_report(cipher, ciphertext, context_info, private_key)?;
            contexts.push(ReportContexts {
                sum: ExpansionContext::create(engine, params, &payload.sum_key)?,
                count: ExpansionContext::create(engine, params, &payload.count_key)?,
            });
        }

        info!(helper = id, reports = contexts.len(), "Helper loaded reports");
        Ok(Self {
            id,
            params: params.to_vec(),
            reports: contexts,
            current_level: 0,
            failed: false,
        })
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn num_reports(&self) -> usize {
        self.reports.len()
    }

    pub fn params(&self) -> &[DpfParameters] {
        &self.params
    }

    pub fn current_level(&self) -> usize {
        self.current_level
    }

    /// Whether an earlier expansion failed part way through
    pub fn is_failed(&self) -> bool {
        self.failed
    }

    /// Expand the next level of every report under `prefixes` and aggregate
    pub fn expand_level(&mut self, prefixes: &[u64]) -> Result<PartialHistogram> {
        let level = self.current_level;
        if self.failed {
            return Err(Error::HelperFailed {
                helper: self.id,
                level,
            });
        }
        if level >= self.params.len() {
            return Err(Error::OutOfOrderExpansion {
                requested: level,
                current: level,
                levels: self.params.len(),
            });
        }

        check_level_prefixes(level, prefixes)?;
        let bucket_ids = level_bucket_ids(&self.params, level, prefixes)?;
        let mask = self.params[level].element_mask();

        let shares = self
            .reports
            .par_iter_mut()
            .map(|r| -> Result<(Vec<u64>, Vec<u64>)> {
                let sums = r.sum.advance_level(level, prefixes)?;
                let counts = r.count.advance_level(level, prefixes)?;
                Ok((sums, counts))
            })
            .collect::<Result<Vec<_>>>();
        let shares = match shares {
            Ok(shares) => shares,
            Err(e) => {
                self.failed = true;
                warn!(helper = self.id, level, error = %e, "Level expansion failed");
                return Err(e);
            }
        };

        let mut sums = vec![0u64; bucket_ids.len()];
        let mut counts = vec![0u64; bucket_ids.len()];
        for (report_sums, report_counts) in &shares {
            accumulate(&mut sums, report_sums, mask);
            accumulate(&mut counts, report_counts, mask);
        }

        self.current_level += 1;
        debug!(
            helper = self.id,
            level,
            buckets = bucket_ids.len(),
            "Aggregated level"
        );

        Ok(PartialHistogram {
            bucket_ids,
            sums,
            counts,
        })
    }
}

fn accumulate(total: &mut [u64], shares: &[u64], mask: u64) {
    for (t, s) in total.iter_mut().zip(shares) {
        *t = t.wrapping_add(*s) & mask;
    }
}
