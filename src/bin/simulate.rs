//! Histogram simulation
//!
//! Generates random client reports, splits them between two helpers and runs
//! the hierarchical query end to end.
//!
//! Usage:
//!   cargo run --bin dpf-simulate -- --reports 1000 --config expansion.json

use std::collections::BTreeMap;
use std::path::PathBuf;

use agg_core::{generate_report, run_hierarchical_query, ExpansionConfig, Helper};
use anyhow::{bail, Context, Result};
use clap::Parser;
use dpf_core::IncrementalDpf;
use hybrid_encrypt::{HybridCipher, StandardEncrypt};
use rand::Rng;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "dpf-simulate")]
#[command(about = "Simulate a two-helper private histogram query")]
struct Args {
    /// Expansion config (JSON). Defaults to --prefix-lengths/--thresholds
    #[arg(long)]
    config: Option<PathBuf>,

    /// Prefix bit length per level
    #[arg(long, value_delimiter = ',', default_value = "4,8,12")]
    prefix_lengths: Vec<i32>,

    /// Survival threshold after each non-terminal level
    #[arg(long, value_delimiter = ',', default_value = "10,5")]
    thresholds: Vec<u64>,

    /// Number of client reports
    #[arg(long, default_value_t = 500)]
    reports: usize,

    /// Number of distinct buckets the reports are drawn from
    #[arg(long, default_value_t = 8)]
    hot_buckets: usize,

    /// Largest value a single report contributes
    #[arg(long, default_value_t = 100)]
    max_value: u64,

    /// Output element width in bits
    #[arg(long, default_value_t = 32)]
    element_bits: u32,

    /// Write the effective config to this path
    #[arg(long)]
    save_config: Option<PathBuf>,
}

const CONTEXT_INFO: &[u8] = b"dpf-simulate";

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => ExpansionConfig::read_from_file(path)
            .with_context(|| format!("reading {}", path.display()))?,
        None => ExpansionConfig::new(args.prefix_lengths.clone(), args.thresholds.clone()),
    };
    let params = config.parameter_chain(args.element_bits)?;
    if let Some(path) = &args.save_config {
        config.write_to_file(path)?;
        tracing::info!(path = %path.display(), "Saved expansion config");
    }

    let domain_bits = params[params.len() - 1].log_domain_size;
    if args.hot_buckets == 0 {
        bail!("--hot-buckets must be at least 1");
    }

    let engine = IncrementalDpf::new();
    let cipher = StandardEncrypt::new();
    let (sk_a, pk_a) = cipher.generate_key_pair()?;
    let (sk_b, pk_b) = cipher.generate_key_pair()?;
    let helper_keys = [pk_a, pk_b];

    let mut rng = rand::thread_rng();
    let hot: Vec<u64> = (0..args.hot_buckets)
        .map(|_| random_bucket(&mut rng, domain_bits))
        .collect();

    tracing::info!(
        reports = args.reports,
        levels = params.len(),
        domain_bits,
        "Generating reports"
    );

    let mut expected: BTreeMap<u64, (u64, u64)> = BTreeMap::new();
    let mut reports = Vec::with_capacity(args.reports);
    for _ in 0..args.reports {
        let bucket = hot[rng.gen_range(0..hot.len())];
        let value = rng.gen_range(0..=args.max_value);
        reports.push(generate_report(
            &engine,
            &cipher,
            &params,
            bucket,
            value,
            &helper_keys,
            CONTEXT_INFO,
        )?);
        let entry = expected.entry(bucket).or_default();
        entry.0 += value;
        entry.1 += 1;
    }

    let mut helper_a = Helper::from_encrypted_reports(
        0,
        &engine,
        &cipher,
        &params,
        Some(&sk_a),
        &reports,
        CONTEXT_INFO,
    )?;
    let mut helper_b = Helper::from_encrypted_reports(
        1,
        &engine,
        &cipher,
        &params,
        Some(&sk_b),
        &reports,
        CONTEXT_INFO,
    )?;

    let histogram = run_hierarchical_query(
        &config.expansion_threshold_per_prefix,
        &mut helper_a,
        &mut helper_b,
    )?;

    let mut mismatches = 0;
    for bucket in histogram.iter().filter(|h| h.count > 0) {
        let (sum, count) = expected.get(&bucket.index).copied().unwrap_or_default();
        let ok = sum == bucket.sum && count == bucket.count;
        if !ok {
            mismatches += 1;
        }
        println!(
            "bucket {:>8}  sum {:>8}  count {:>6}{}",
            bucket.index,
            bucket.sum,
            bucket.count,
            if ok { "" } else { "  MISMATCH" }
        );
    }

    tracing::info!(
        buckets = histogram.len(),
        nonzero = histogram.iter().filter(|h| h.count > 0).count(),
        mismatches,
        "Query finished"
    );

    if mismatches > 0 {
        bail!("{mismatches} buckets did not match the plaintext histogram");
    }
    Ok(())
}

fn random_bucket(rng: &mut impl Rng, domain_bits: u32) -> u64 {
    if domain_bits >= 64 {
        rng.gen()
    } else {
        rng.gen_range(0..(1u64 << domain_bits))
    }
}
