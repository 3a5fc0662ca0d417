use thiserror::Error;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("fragment too short: {len} bytes (minimum {min})")]
    Truncated { len: usize, min: usize },

    #[error("fragment authentication failed: wrong key, corrupted data, or wrong index/file")]
    Authentication,

    #[error("fragment encryption failed")]
    Encryption,

    #[error("malformed verification hash: {0}")]
    MalformedHash(String),

    #[error("password hashing failed: {0}")]
    Hashing(String),

    #[error("invalid Argon2id params: {0}")]
    InvalidParams(String),
}
