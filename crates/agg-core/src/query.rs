//! Two-helper hierarchical histogram query

use dpf_core::PointFunctionEngine;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::helper::Helper;
use crate::histogram::{get_next_nonempty_prefixes, merge_partial_histograms, CompleteHistogram};

/// Run the query level by level and return the histogram of the last level.
///
/// Both helpers expand with the same prefixes. After each non-terminal level
/// their partial histograms are combined and buckets whose count is above
/// `thresholds[level]` become the next prefixes. If nothing survives the
/// result is empty.
pub fn run_hierarchical_query<E: PointFunctionEngine + Sync + ?Sized>(
    thresholds: &[u64],
    helper_a: &mut Helper<'_, E>,
    helper_b: &mut Helper<'_, E>,
) -> Result<Vec<CompleteHistogram>> {
    if helper_a.params() != helper_b.params() {
        return Err(Error::InvalidConfig(
            "helpers disagree on the parameter chain".to_string(),
        ));
    }

    let params = helper_a.params().to_vec();
    let levels = params.len();
    let needed = levels.saturating_sub(1);
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

    let mut prefixes = Vec::new();
    for (level, level_params) in params.iter().enumerate() {
        let a = helper_a.expand_level(&prefixes)?;
        let b = helper_b.expand_level(&prefixes)?;
        let histogram = merge_partial_histograms(&a, &b, level_params.element_mask())
            .ok_or_else(|| {
                Error::InvalidConfig(format!("partial histograms differ at level {level}"))
            })?;

        if level + 1 == levels {
            info!(levels, buckets = histogram.len(), "Query complete");
            return Ok(histogram);
        }

        prefixes = get_next_nonempty_prefixes(&histogram, thresholds[level]);
        debug!(
            level,
            buckets = histogram.len(),
            survivors = prefixes.len(),
            "Pruned level"
        );
        if prefixes.is_empty() {
            info!(level, "No buckets above threshold, stopping query");
            return Ok(Vec::new());
        }
    }

    Ok(Vec::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::generate_report;
    use dpf_core::{DpfParameters, IncrementalDpf};
    use hybrid_encrypt::{HybridCipher, StandardEncrypt};

    #[test]
    fn test_query_prunes_light_prefixes() {
        let engine = IncrementalDpf::new();
        let cipher = StandardEncrypt::new();
        let (sk_a, pk_a) = cipher.generate_key_pair().unwrap();
        let (sk_b, pk_b) = cipher.generate_key_pair().unwrap();
        let keys = [pk_a, pk_b];
        let params = vec![DpfParameters::new(1, 32), DpfParameters::new(3, 32)];

        // Buckets 5 and 6 share prefix 1 (three reports); bucket 1 is alone
        // under prefix 0.
        let data = [(5, 2), (5, 3), (6, 4), (1, 100)];
        let reports: Vec<_> = data
            .iter()
            .map(|&(bucket, value)| {
                generate_report(&engine, &cipher, &params, bucket, value, &keys, b"q").unwrap()
            })
            .collect();

        let mut a =
            Helper::from_encrypted_reports(0, &engine, &cipher, &params, Some(&sk_a), &reports, b"q")
                .unwrap();
        let mut b =
            Helper::from_encrypted_reports(1, &engine, &cipher, &params, Some(&sk_b), &reports, b"q")
                .unwrap();

        let result = run_hierarchical_query(&[1], &mut a, &mut b).unwrap();
        let ids: Vec<u64> = result.iter().map(|h| h.index).collect();
        assert_eq!(ids, vec![4, 5, 6, 7]);
        assert_eq!(result[1], CompleteHistogram { index: 5, sum: 5, count: 2 });
        assert_eq!(result[2], CompleteHistogram { index: 6, sum: 4, count: 1 });
        assert_eq!(result[0].count, 0);
        assert_eq!(result[3].count, 0);
    }

    #[test]
    fn test_query_nothing_survives() {
        let engine = IncrementalDpf::new();
        let cipher = StandardEncrypt::new();
        let (sk_a, pk_a) = cipher.generate_key_pair().unwrap();
        let (sk_b, pk_b) = cipher.generate_key_pair().unwrap();
        let params = vec![DpfParameters::new(1, 32), DpfParameters::new(3, 32)];
        let report =
            generate_report(&engine, &cipher, &params, 2, 1, &[pk_a, pk_b], b"").unwrap();
        let reports = [report];

        let mut a =
            Helper::from_encrypted_reports(0, &engine, &cipher, &params, Some(&sk_a), &reports, b"")
                .unwrap();
        let mut b =
            Helper::from_encrypted_reports(1, &engine, &cipher, &params, Some(&sk_b), &reports, b"")
                .unwrap();

        assert!(run_hierarchical_query(&[5], &mut a, &mut b).unwrap().is_empty());
    }

    #[test]
    fn test_query_missing_threshold() {
        let engine = IncrementalDpf::new();
        let cipher = StandardEncrypt::new();
        let params = vec![DpfParameters::new(1, 32), DpfParameters::new(3, 32)];
        let mut a =
            Helper::from_encrypted_reports(0, &engine, &cipher, &params, None, &[], b"").unwrap();
        let mut b =
            Helper::from_encrypted_reports(1, &engine, &cipher, &params, None, &[], b"").unwrap();

        assert!(matches!(
            run_hierarchical_query(&[], &mut a, &mut b),
            Err(Error::MissingThreshold { level: 0 })
        ));
    }
}
