//! Client reports
//!
//! A report contributes one value to one bucket. The client generates two DPF
//! key pairs over the bucket: one carrying the value at every level (sum) and
//! one carrying 1 (count). Each helper receives one share of each pair,
//! encrypted to its public key.

use dpf_core::{DpfParameters, KeyShare, PointFunctionEngine};
use hybrid_encrypt::{HybridCipher, StandardCiphertext, StandardPrivateKey, StandardPublicKey};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Number of non-colluding helpers a report is split between
pub const NUM_HELPERS: usize = 2;

/// Plaintext one helper receives
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportPayload {
    pub sum_key: KeyShare,
    pub count_key: KeyShare,
}

impl ReportPayload {
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(bincode::deserialize(bytes)?)
    }
}

/// One report as uploaded: a ciphertext per helper
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedReport {
    pub payloads: [StandardCiphertext; NUM_HELPERS],
}

impl EncryptedReport {
    pub fn for_helper(&self, helper: usize) -> Option<&StandardCiphertext> {
        self.payloads.get(helper)
    }
}

/// Build the encrypted report for `value` in `bucket`.
///
/// `context_info` is bound to every ciphertext; helpers must decrypt with the
/// same bytes.
pub fn generate_report<E, C>(
    engine: &E,
    cipher: &C,
    params: &[DpfParameters],
    bucket: u64,
    value: u64,
    helper_keys: &[StandardPublicKey; NUM_HELPERS],
    context_info: &[u8],
) -> Result<EncryptedReport>
where
    E: PointFunctionEngine + ?Sized,
    C: HybridCipher + ?Sized,
{
    let sum_betas = vec![value; params.len()];
    let count_betas = vec![1; params.len()];
    let (sum0, sum1) = engine.generate_keys(params, bucket, &sum_betas)?;
    let (count0, count1) = engine.generate_keys(params, bucket, &count_betas)?;

    let shares = [
        ReportPayload {
            sum_key: sum0,
            count_key: count0,
        },
        ReportPayload {
            sum_key: sum1,
            count_key: count1,
        },
    ];

    let a = cipher.encrypt(&shares[0].to_bytes()?, context_info, &helper_keys[0])?;
    let b = cipher.encrypt(&shares[1].to_bytes()?, context_info, &helper_keys[1])?;

    Ok(EncryptedReport { payloads: [a, b] })
}

/// Decrypt a helper's payload
pub fn open_report<C: HybridCipher + ?Sized>(
    cipher: &C,
    ciphertext: &StandardCiphertext,
    context_info: &[u8],
    private_key: Option<&StandardPrivateKey>,
) -> Result<ReportPayload> {
    let bytes = cipher.decrypt(ciphertext, context_info, private_key)?;
    ReportPayload::from_bytes(&bytes)
}
