//! shv-crypto: per-fragment encryption keyed by a password
//!
//! Two independent one-way functions run over the same password:
//! ```text
//! password ──SHA-256 (domain-separated)──▶ DerivedKey (32 bytes, deterministic)
//!          │                                 └── Fragment AEAD: XChaCha20-Poly1305
//!          │                                     (nonce = random 192-bit, AAD = index || file_id)
//!          └──Argon2id (random salt)──────▶ verification hash (PHC string, persisted)
//! ```
//! The derived key is never stored; the verification hash never yields the key.

pub mod cipher;
pub mod error;
pub mod kdf;
pub mod verifier;

pub use cipher::{decrypt_fragment, encrypt_fragment};
pub use error::CryptoError;
pub use kdf::{derive_key, DerivedKey};
pub use verifier::{hash_password, verify_password, VerifierParams};

/// Size of a derived key in bytes (256-bit)
pub const KEY_SIZE: usize = 32;

/// Size of an XChaCha20-Poly1305 nonce (192-bit)
pub const NONCE_SIZE: usize = 24;

/// Size of a Poly1305 authentication tag
pub const TAG_SIZE: usize = 16;

/// Bytes added to every fragment by encryption
pub const FRAGMENT_OVERHEAD: usize = NONCE_SIZE + TAG_SIZE;
