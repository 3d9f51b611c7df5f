//! Expansion configuration
//!
//! Persisted as JSON:
//!
//! ```json
//! {"PrefixLengths": [8, 16, 20], "ExpansionThresholdPerPrefix": [10, 5]}
//! ```

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use dpf_core::{DpfParameters, MAX_LOG_DOMAIN_SIZE};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{Error, Result};

/// Prefix bit lengths per level and the survival threshold after each
/// non-terminal level
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpansionConfig {
    #[serde(rename = "PrefixLengths")]
    pub prefix_lengths: Vec<i32>,
    #[serde(rename = "ExpansionThresholdPerPrefix")]
    pub expansion_threshold_per_prefix: Vec<u64>,
}

impl ExpansionConfig {
    pub fn new(prefix_lengths: Vec<i32>, expansion_threshold_per_prefix: Vec<u64>) -> Self {
        Self {
            prefix_lengths,
            expansion_threshold_per_prefix,
        }
    }

    pub fn read_from_file(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let config: Self = serde_json::from_reader(BufReader::new(file))?;
        info!(
            path = %path.display(),
            levels = config.prefix_lengths.len(),
            "Loaded expansion config"
        );
        Ok(config)
    }

    pub fn write_to_file(&self, path: &Path) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer(&mut writer, self)?;
        writer.flush()?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.prefix_lengths.is_empty() {
            return Err(Error::InvalidConfig("no prefix lengths".to_string()));
        }

        for &len in &self.prefix_lengths {
            if len < 0 || len as u32 > MAX_LOG_DOMAIN_SIZE {
                return Err(Error::InvalidConfig(format!(
                    "prefix length {len} outside 0..={MAX_LOG_DOMAIN_SIZE}"
                )));
            }
        }

        if let Some(w) = self.prefix_lengths.windows(2).find(|w| w[1] <= w[0]) {
            return Err(Error::InvalidConfig(format!(
                "prefix lengths must be strictly increasing, got {} then {}",
                w[0], w[1]
            )));
        }

        let expected = self.prefix_lengths.len() - 1;
        if self.expansion_threshold_per_prefix.len() != expected {
            return Err(Error::InvalidConfig(format!(
                "expected {expected} thresholds for {} levels, got {}",
                self.prefix_lengths.len(),
                self.expansion_threshold_per_prefix.len()
            )));
        }

        Ok(())
    }

    /// DPF parameter chain with one level per prefix length
    pub fn parameter_chain(&self, element_bit_size: u32) -> Result<Vec<DpfParameters>> {
        self.validate()?;
        Ok(self
            .prefix_lengths
            .iter()
            .map(|&len| DpfParameters::new(len as u32, element_bit_size))
            .collect())
    }
}
