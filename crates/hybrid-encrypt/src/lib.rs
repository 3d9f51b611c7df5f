//! hybrid-encrypt: public-key transport for DPF key shares
//!
//! The aggregation core never inspects encrypted payloads. It only needs a
//! way to seal a key share for one helper and for that helper to open it,
//! which is what `HybridCipher` captures.

mod error;
mod keys;
mod standard;

pub use error::{EncryptError, Result};
pub use keys::{StandardCiphertext, StandardPrivateKey, StandardPublicKey};
pub use standard::StandardEncrypt;

/// Capability interface for hybrid public-key encryption
pub trait HybridCipher {
    /// Generate a fresh key pair
    fn generate_key_pair(&self) -> Result<(StandardPrivateKey, StandardPublicKey)>;

    /// Encrypt `message` to `public_key`, binding `context` to the ciphertext
    fn encrypt(
        &self,
        message: &[u8],
        context: &[u8],
        public_key: &StandardPublicKey,
    ) -> Result<StandardCiphertext>;

    /// Decrypt with the matching private key and the same `context`.
    ///
    /// Fails with `EmptyPrivateKey` when no key is supplied.
    fn decrypt(
        &self,
        ciphertext: &StandardCiphertext,
        context: &[u8],
        private_key: Option<&StandardPrivateKey>,
    ) -> Result<Vec<u8>>;
}
