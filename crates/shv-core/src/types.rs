use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Opaque identity of a stored file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileId(Uuid);

impl FileId {
    /// Fresh random id (UUID v4)
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Raw 16 bytes, used to bind fragments to their file
    pub fn as_bytes(&self) -> &[u8; 16] {
        self.0.as_bytes()
    }
}

impl Default for FileId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for FileId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim()).map(Self)
    }
}

/// Opaque reference returned by the object store for one stored blob
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Locator(String);

impl Locator {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One uploaded fragment: its position in the file and where it lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FragmentRef {
    /// Zero-based position; concatenation order on reassembly
    pub index: u64,
    pub locator: Locator,
    /// BLAKE3 of the stored ciphertext (hex)
    pub digest: String,
    /// Stored ciphertext size in bytes (nonce + payload + tag)
    pub size: u64,
}

/// Persisted record of a fragmented, encrypted file.
///
/// Only created once every fragment is durably stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredFile {
    pub id: FileId,
    /// Original file name, returned on download
    pub name: String,
    /// Fragments used for reconstruction, one per chunk
    pub retrieve_fragments: Vec<FragmentRef>,
    /// Fragments used for deletion
    pub fragments: Vec<FragmentRef>,
    /// Argon2id PHC string of the password
    pub verification_hash: String,
    pub owner: String,
    /// Plaintext size in bytes
    pub size: u64,
    pub chunk_size: u64,
    /// Unix timestamp (seconds)
    pub created_at: u64,
}

impl StoredFile {
    pub fn summary(&self) -> FileSummary {
        FileSummary {
            id: self.id,
            name: self.name.clone(),
            size: self.size,
            fragments: self.retrieve_fragments.len(),
            created_at: self.created_at,
        }
    }
}

/// Listing view of a stored file (no secrets, no locators)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSummary {
    pub id: FileId,
    pub name: String,
    pub size: u64,
    pub fragments: usize,
    pub created_at: u64,
}
