//! Evaluation context manager
//!
//! Wraps one engine `EvaluationContext` and enforces the level order: each
//! hierarchy level is expanded exactly once, starting at level 0.

use dpf_core::{validate_chain, DpfParameters, EvaluationContext, KeyShare, PointFunctionEngine};

use crate::error::{Error, Result};

/// Exclusive owner of one key share's evaluation state
pub struct ExpansionContext<'e, E: PointFunctionEngine + ?Sized> {
    engine: &'e E,
    params: Vec<DpfParameters>,
    context: EvaluationContext,
    current_level: usize,
}

impl<'e, E: PointFunctionEngine + ?Sized> ExpansionContext<'e, E> {
    pub fn create(engine: &'e E, params: &[DpfParameters], key: &KeyShare) -> Result<Self> {
        validate_chain(params)?;
        let context = engine.create_context(params, key)?;

        Ok(Self {
            engine,
            params: params.to_vec(),
            context,
            current_level: 0,
        })
    }

    /// Expand the next level under `prefixes`
    pub fn advance(&mut self, prefixes: &[u64]) -> Result<Vec<u64>> {
        if self.is_exhausted() {
            return Err(self.out_of_order(self.current_level));
        }

        let values = self.engine.expand_level(&mut self.context, prefixes)?;
        self.current_level += 1;
        Ok(values)
    }

    /// Expand `level`, which must be the next unexpanded level
    pub fn advance_level(&mut self, level: usize, prefixes: &[u64]) -> Result<Vec<u64>> {
        if level != self.current_level {
            return Err(self.out_of_order(level));
        }
        self.advance(prefixes)
    }

    pub fn is_exhausted(&self) -> bool {
        self.current_level >= self.params.len()
    }

    /// Number of levels already expanded
    pub fn current_level(&self) -> usize {
        self.current_level
    }

    pub fn params(&self) -> &[DpfParameters] {
        &self.params
    }

    fn out_of_order(&self, requested: usize) -> Error {
        Error::OutOfOrderExpansion {
            requested,
            current: self.current_level,
            levels: self.params.len(),
        }
    }
}
