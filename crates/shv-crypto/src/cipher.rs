//! Per-fragment XChaCha20-Poly1305 encryption/decryption
//!
//! Encrypted fragment format (binary):
//! ```text
//! [24 bytes: random nonce][N bytes: ciphertext][16 bytes: Poly1305 tag]
//! AAD = fragment_index (8 bytes, big-endian) || file_id (16 bytes)
//! ```
//!
//! A fresh nonce is drawn for every call, including fragments of the same
//! file. The AAD binds each fragment to its position and file, so swapped,
//! reordered, or tampered fragments fail to decrypt instead of yielding
//! garbage plaintext.

use chacha20poly1305::{
    aead::{Aead, KeyInit, Payload},
    XChaCha20Poly1305, XNonce,
};
use rand::RngCore;

use crate::error::CryptoError;
use crate::kdf::DerivedKey;
use crate::{FRAGMENT_OVERHEAD, NONCE_SIZE};

/// Encrypt one fragment.
///
/// Returns `[24-byte nonce][ciphertext][16-byte tag]`.
pub fn encrypt_fragment(
    key: &DerivedKey,
    index: u64,
    file_id: &[u8; 16],
    plaintext: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    let cipher = XChaCha20Poly1305::new(key.as_bytes().into());

    let mut nonce_bytes = [0u8; NONCE_SIZE];
    rand::thread_rng().fill_bytes(&mut nonce_bytes);
    let nonce = XNonce::from_slice(&nonce_bytes);

    let aad = build_aad(index, file_id);

    let ciphertext = cipher
        .encrypt(
            nonce,
            Payload {
                msg: plaintext,
                aad: &aad,
            },
        )
        .map_err(|_| CryptoError::Encryption)?;

    let mut result = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
    result.extend_from_slice(&nonce_bytes);
    result.extend_from_slice(&ciphertext);
    Ok(result)
}

/// Decrypt one fragment produced by [`encrypt_fragment`].
///
/// `index` and `file_id` must match the values used at encryption.
pub fn decrypt_fragment(
    key: &DerivedKey,
    index: u64,
    file_id: &[u8; 16],
    encrypted: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    if encrypted.len() < FRAGMENT_OVERHEAD {
        return Err(CryptoError::Truncated {
            len: encrypted.len(),
            min: FRAGMENT_OVERHEAD,
        });
    }

    let (nonce_bytes, ciphertext) = encrypted.split_at(NONCE_SIZE);
    let nonce = XNonce::from_slice(nonce_bytes);
    let cipher = XChaCha20Poly1305::new(key.as_bytes().into());

    let aad = build_aad(index, file_id);

    cipher
        .decrypt(
            nonce,
            Payload {
                msg: ciphertext,
                aad: &aad,
            },
        )
        .map_err(|_| CryptoError::Authentication)
}

/// Build AAD: index (8 bytes BE) || file_id (16 bytes)
fn build_aad(index: u64, file_id: &[u8; 16]) -> [u8; 24] {
    let mut aad = [0u8; 24];
    aad[..8].copy_from_slice(&index.to_be_bytes());
    aad[8..].copy_from_slice(file_id);
    aad
}
