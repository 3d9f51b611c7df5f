//! Aggregation core - hierarchical DPF expansion for private histograms
//!
//! This crate provides:
//! - Level-ordered evaluation contexts over any `PointFunctionEngine`
//! - Threshold-pruned hierarchical expansion of a single key share
//! - Bucket ID computation for expanded vectors
//! - Encrypted client reports and two-helper histogram queries
//! - The persisted expansion configuration

pub mod bucket;
pub mod config;
pub mod context;
pub mod driver;
pub mod error;
pub mod helper;
pub mod histogram;
pub mod query;
pub mod report;

pub use bucket::{
    calculate_bucket_ids, check_expansion_consistency, check_level_prefixes, level_bucket_ids,
};
pub use config::ExpansionConfig;
pub use context::ExpansionContext;
pub use driver::{
    expand_with_prefixes, run_hierarchical_expansion, ExpansionOutput, HierarchicalExpander,
    SurvivalPolicy, ThresholdPolicy,
};
pub use error::{Error, Result, ValidationError};
pub use helper::Helper;
pub use histogram::{
    get_next_nonempty_prefixes, merge_partial_histograms, Aggregate, CompleteHistogram,
    PartialHistogram, PrefixValue,
};
pub use query::run_hierarchical_query;
pub use report::{generate_report, open_report, EncryptedReport, ReportPayload, NUM_HELPERS};
