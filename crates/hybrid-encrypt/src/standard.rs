//! Standard hybrid encryption: X25519 + HKDF-SHA256 + ChaCha20-Poly1305
//!
//! Every ciphertext carries a fresh ephemeral public key. The shared secret
//! is expanded with HKDF, using both public keys and the caller's context as
//! info, and the context is also authenticated as AEAD associated data.
//!
//! Ciphertext layout: `ephemeral_public(32) || nonce(12) || aead_ciphertext`

use chacha20poly1305::aead::{Aead, KeyInit, Payload};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce};
use curve25519_dalek::montgomery::MontgomeryPoint;
use hkdf::Hkdf;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::error::{EncryptError, Result};
use crate::keys::{StandardCiphertext, StandardPrivateKey, StandardPublicKey};
use crate::HybridCipher;

/// Domain separator for key derivation
const KDF_DOMAIN: &[u8] = b"DPF_KEY_SHARE_TRANSPORT_v1";

const KEY_SIZE: usize = 32;
const NONCE_SIZE: usize = 12;
const AUTH_TAG_SIZE: usize = 16;

/// Default `HybridCipher` implementation
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardEncrypt;

impl StandardEncrypt {
    pub fn new() -> Self {
        Self
    }

    fn derive_key(
        shared_secret: &MontgomeryPoint,
        ephemeral_public: &[u8; KEY_SIZE],
        recipient_public: &[u8; KEY_SIZE],
        context: &[u8],
    ) -> Result<Zeroizing<[u8; KEY_SIZE]>> {
        if shared_secret.as_bytes().iter().all(|&b| b == 0) {
            return Err(EncryptError::InvalidKey(
                "key agreement produced an all-zero secret".to_string(),
            ));
        }

        let mut info = Vec::with_capacity(2 * KEY_SIZE + context.len());
        info.extend_from_slice(ephemeral_public);
        info.extend_from_slice(recipient_public);
        info.extend_from_slice(context);

        let hkdf = Hkdf::<Sha256>::new(Some(KDF_DOMAIN), shared_secret.as_bytes());
        let mut output = Zeroizing::new([0u8; KEY_SIZE]);
        hkdf.expand(&info, &mut output[..])
            .map_err(|_| EncryptError::Encryption("HKDF expansion failed".to_string()))?;
        Ok(output)
    }
}

fn key_bytes(bytes: &[u8], what: &str) -> Result<[u8; KEY_SIZE]> {
    bytes.try_into().map_err(|_| {
        EncryptError::InvalidKey(format!(
            "{what} must be {KEY_SIZE} bytes, got {}",
            bytes.len()
        ))
    })
}

impl HybridCipher for StandardEncrypt {
    fn generate_key_pair(&self) -> Result<(StandardPrivateKey, StandardPublicKey)> {
        let mut secret = Zeroizing::new([0u8; KEY_SIZE]);
        OsRng.fill_bytes(&mut secret[..]);
        let public = MontgomeryPoint::mul_base_clamped(*secret);

        Ok((
            StandardPrivateKey(secret.to_vec()),
            StandardPublicKey(public.as_bytes().to_vec()),
        ))
    }

    fn encrypt(
        &self,
        message: &[u8],
        context: &[u8],
        public_key: &StandardPublicKey,
    ) -> Result<StandardCiphertext> {
        let recipient_public = key_bytes(&public_key.0, "public key")?;

        let mut ephemeral_secret = Zeroizing::new([0u8; KEY_SIZE]);
        OsRng.fill_bytes(&mut ephemeral_secret[..]);
        let ephemeral_public = MontgomeryPoint::mul_base_clamped(*ephemeral_secret);
        let shared_secret = MontgomeryPoint(recipient_public).mul_clamped(*ephemeral_secret);

        let symmetric_key = Self::derive_key(
            &shared_secret,
            ephemeral_public.as_bytes(),
            &recipient_public,
            context,
        )?;

        let mut nonce = [0u8; NONCE_SIZE];
        OsRng.fill_bytes(&mut nonce);

        let cipher = ChaCha20Poly1305::new(Key::from_slice(&symmetric_key[..]));
        let ciphertext = cipher
            .encrypt(
                Nonce::from_slice(&nonce),
                Payload {
                    msg: message,
                    aad: context,
                },
            )
            .map_err(|e| EncryptError::Encryption(e.to_string()))?;

        let mut data = Vec::with_capacity(KEY_SIZE + NONCE_SIZE + ciphertext.len());
        data.extend_from_slice(ephemeral_public.as_bytes());
        data.extend_from_slice(&nonce);
        data.extend_from_slice(&ciphertext);

        Ok(StandardCiphertext { data })
    }

    fn decrypt(
        &self,
        ciphertext: &StandardCiphertext,
        context: &[u8],
        private_key: Option<&StandardPrivateKey>,
    ) -> Result<Vec<u8>> {
        let private_key = private_key.ok_or(EncryptError::EmptyPrivateKey)?;
        let secret = Zeroizing::new(key_bytes(&private_key.0, "private key")?);

        let data = &ciphertext.data;
        if data.len() < KEY_SIZE + NONCE_SIZE + AUTH_TAG_SIZE {
            return Err(EncryptError::Decryption(format!(
                "ciphertext too short: {} bytes",
                data.len()
            )));
        }

        let ephemeral_public = key_bytes(&data[..KEY_SIZE], "encapsulated key")?;
        let nonce = &data[KEY_SIZE..KEY_SIZE + NONCE_SIZE];
        let body = &data[KEY_SIZE + NONCE_SIZE..];

        let our_public = MontgomeryPoint::mul_base_clamped(*secret);
        let shared_secret = MontgomeryPoint(ephemeral_public).mul_clamped(*secret);
        let symmetric_key = Self::derive_key(
            &shared_secret,
            &ephemeral_public,
            our_public.as_bytes(),
            context,
        )?;

        let cipher = ChaCha20Poly1305::new(Key::from_slice(&symmetric_key[..]));
        cipher
            .decrypt(
                Nonce::from_slice(nonce),
                Payload {
                    msg: body,
                    aad: context,
                },
            )
            .map_err(|e| EncryptError::Decryption(e.to_string()))
    }
}
