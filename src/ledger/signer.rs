//! Signing identity
//!
//! Secrets are base58 strings of either the 64-byte keypair encoding
//! (secret followed by public key) or a bare 32-byte secret.

use ed25519_dalek::{Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;
use std::fmt;

use crate::error::KeyError;
use crate::types::Address;

#[derive(Clone)]
pub struct Keypair {
    signing: SigningKey,
}

impl Keypair {
    /// Fresh random keypair, used for new mints
    pub fn generate() -> Self {
        Self {
            signing: SigningKey::generate(&mut OsRng),
        }
    }

    pub fn from_base58(secret: &str) -> Result<Self, KeyError> {
        let bytes = bs58::decode(secret.trim())
            .into_vec()
            .map_err(|e| KeyError::Encoding(e.to_string()))?;
        let signing = match bytes.len() {
            64 => {
                let mut full = [0u8; 64];
                full.copy_from_slice(&bytes);
                SigningKey::from_keypair_bytes(&full).map_err(|_| KeyError::Mismatch)?
            }
            32 => {
                let mut secret = [0u8; 32];
                secret.copy_from_slice(&bytes);
                SigningKey::from_bytes(&secret)
            }
            n => return Err(KeyError::Length(n)),
        };
        Ok(Self { signing })
    }

    pub fn from_seed(seed: [u8; 32]) -> Self {
        Self {
            signing: SigningKey::from_bytes(&seed),
        }
    }

    pub fn to_base58(&self) -> String {
        bs58::encode(self.signing.to_keypair_bytes()).into_string()
    }

    pub fn address(&self) -> Address {
        Address::from_bytes(self.signing.verifying_key().to_bytes())
    }

    /// Base58 ed25519 signature over `message`
    pub fn sign(&self, message: &[u8]) -> String {
        bs58::encode(self.signing.sign(message).to_bytes()).into_string()
    }
}

impl fmt::Debug for Keypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Keypair({})", self.address())
    }
}

/// Check a base58 signature produced by `Keypair::sign`
pub fn verify_signature(address: &Address, message: &[u8], signature: &str) -> bool {
    let Ok(key) = VerifyingKey::from_bytes(&address.to_bytes()) else {
        return false;
    };
    let Ok(raw) = bs58::decode(signature).into_vec() else {
        return false;
    };
    let Ok(raw) = <[u8; 64]>::try_from(raw.as_slice()) else {
        return false;
    };
    let signature = ed25519_dalek::Signature::from_bytes(&raw);
    key.verify(message, &signature).is_ok()
}
