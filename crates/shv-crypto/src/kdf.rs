//! Key derivation: password → fragment key
//!
//! Deterministic and unsalted: upload and download run in separate processes
//! and share nothing but the password.

use secrecy::{ExposeSecret, SecretString};
use sha2::{Digest, Sha256};
use zeroize::Zeroize;

use crate::KEY_SIZE;

const KEY_DOMAIN: &[u8] = b"shardvault-fragment-key-v1";

/// A 256-bit fragment key derived from a password.
///
/// Zeroized on drop; never persisted or logged.
#[derive(Clone)]
pub struct DerivedKey {
    bytes: [u8; KEY_SIZE],
}

impl DerivedKey {
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }
}

impl Drop for DerivedKey {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl std::fmt::Debug for DerivedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DerivedKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// Derive the fragment key: `SHA-256(domain || 0x00 || password)`.
///
/// Total over every string, including the empty one.
pub fn derive_key(password: &SecretString) -> DerivedKey {
    let mut hasher = Sha256::new();
    hasher.update(KEY_DOMAIN);
    hasher.update([0u8]);
    hasher.update(password.expose_secret().as_bytes());

    let mut bytes = [0u8; KEY_SIZE];
    bytes.copy_from_slice(&hasher.finalize());
    DerivedKey::from_bytes(bytes)
}
