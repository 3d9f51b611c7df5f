//! DPF Core - Incremental distributed point function primitives
//!
//! This crate provides:
//! - DPF parameter chains and their validation
//! - Fixed-key AES seed expansion
//! - The `PointFunctionEngine` capability and an in-process incremental DPF
//!
//! Keys and evaluation contexts leave this crate as opaque byte blobs. Callers
//! pass them back unmodified; only the engine that produced them decodes them.

pub mod engine;
pub mod error;
pub mod key;
pub mod params;
pub mod prg;

pub use engine::{IncrementalDpf, PointFunctionEngine};
pub use error::{EngineError, ParamsError};
pub use key::{EvaluationContext, KeyShare};
pub use params::{delta_bits, validate_chain, DpfParameters};

/// Largest supported `log_domain_size` (indices are `u64`)
pub const MAX_LOG_DOMAIN_SIZE: u32 = 64;

/// Largest vector a single `expand_level` call may return
pub const MAX_EXPANSION_LEN: u64 = 1 << 30;
