//! Key shares and evaluation contexts
//!
//! `KeyShare` and `EvaluationContext` are the opaque blobs exchanged with
//! callers. The structs they encode are private to the engine.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::params::DpfParameters;
use crate::prg::Block;

/// Serialized key share (one of two complementary shares)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyShare(pub Vec<u8>);

impl KeyShare {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }
}

impl From<Vec<u8>> for KeyShare {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

/// Serialized evaluation state, mutated in place by each expansion.
///
/// Not `Clone`: a context has exactly one owner.
#[derive(Debug, PartialEq, Eq)]
pub struct EvaluationContext(pub(crate) Vec<u8>);

impl EvaluationContext {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Rebuild a context from bytes previously taken from `as_bytes`
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

/// Seed and control-bit correction applied when stepping one tree depth
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct CorrectionWord {
    pub seed: Block,
    pub control_left: bool,
    pub control_right: bool,
}

/// Decoded key share
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct DpfKey {
    pub party: u8,
    pub seed: Block,
    /// One entry per tree depth (`log_domain_size` of the last level)
    pub correction_words: Vec<CorrectionWord>,
    /// One entry per hierarchy level
    pub value_corrections: Vec<u64>,
}

/// Seed and control bit of a node that can be expanded further
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct PartialEvaluation {
    pub prefix: u64,
    pub seed: Block,
    pub control: bool,
}

/// Decoded evaluation context
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct ContextState {
    pub parameters: Vec<DpfParameters>,
    pub key: DpfKey,
    /// Next level to expand
    pub hierarchy_level: usize,
    /// Nodes produced by the previous expansion, sorted by prefix
    pub partial_evaluations: Vec<PartialEvaluation>,
}

impl DpfKey {
    pub fn encode(&self) -> Result<KeyShare> {
        Ok(KeyShare(bincode::serialize(self)?))
    }

    pub fn decode(share: &KeyShare) -> Result<Self> {
        Ok(bincode::deserialize(&share.0)?)
    }
}

impl ContextState {
    pub fn encode(&self) -> Result<EvaluationContext> {
        Ok(EvaluationContext(bincode::serialize(self)?))
    }

    pub fn decode(context: &EvaluationContext) -> Result<Self> {
        Ok(bincode::deserialize(&context.0)?)
    }
}
