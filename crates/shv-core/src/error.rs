use thiserror::Error;

use crate::types::FileId;

pub type VaultResult<T> = Result<T, VaultError>;

/// Caller-facing message shared by `NotFound` and `InvalidSecret`.
pub const ACCESS_DENIED_MESSAGE: &str = "file not found or password incorrect";

#[derive(Debug, Error)]
pub enum VaultError {
    #[error("missing input: {0}")]
    MissingInput(String),

    #[error("file not found: {0}")]
    NotFound(FileId),

    #[error("password verification failed")]
    InvalidSecret,

    #[error("fragment {index} unavailable: {reason}")]
    FragmentUnavailable { index: u64, reason: String },

    #[error("fragment {index} decryption failed: {reason}")]
    DecryptionFailed { index: u64, reason: String },

    #[error("record persistence failed: {0}")]
    PersistenceFailed(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl VaultError {
    /// True for the failures that must look identical to a caller.
    pub fn is_access_denied(&self) -> bool {
        matches!(self, VaultError::NotFound(_) | VaultError::InvalidSecret)
    }

    /// Message safe to show to the requesting party.
    ///
    /// Unknown ids and wrong passwords collapse into one message so the
    /// response does not reveal whether a file exists.
    pub fn public_message(&self) -> String {
        if self.is_access_denied() {
            ACCESS_DENIED_MESSAGE.to_string()
        } else {
            self.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_and_invalid_secret_share_public_message() {
        let missing = VaultError::NotFound(FileId::new());
        let wrong = VaultError::InvalidSecret;

        assert_eq!(missing.public_message(), wrong.public_message());
        assert_ne!(missing.to_string(), wrong.to_string(), "log form stays distinct");
    }

    #[test]
    fn other_errors_keep_their_message() {
        let err = VaultError::FragmentUnavailable {
            index: 2,
            reason: "timeout".into(),
        };
        assert!(!err.is_access_denied());
        assert_eq!(err.public_message(), "fragment 2 unavailable: timeout");
    }
}
