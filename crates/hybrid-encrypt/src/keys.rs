//! Key and ciphertext containers (serialized byte representation)

use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// X25519 private key bytes; wiped on drop
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct StandardPrivateKey(pub Vec<u8>);

impl std::fmt::Debug for StandardPrivateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("StandardPrivateKey(..)")
    }
}

/// X25519 public key bytes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StandardPublicKey(pub Vec<u8>);

/// Encapsulated key, nonce and AEAD ciphertext in one buffer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StandardCiphertext {
    pub data: Vec<u8>,
}
