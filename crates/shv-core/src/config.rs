use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{VaultError, VaultResult};

/// Top-level configuration (loaded from shardvault.toml)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ShvConfig {
    pub storage: StorageConfig,
    pub vault: VaultConfig,
    pub verifier: VerifierConfig,
    pub log: LogConfig,
}

impl ShvConfig {
    /// Read and validate a TOML config file.
    ///
    /// A missing file yields the defaults.
    pub fn load(path: &Path) -> VaultResult<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "config file not found, using defaults");
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: ShvConfig = toml::from_str(&content)
            .map_err(|e| VaultError::Config(format!("parsing {}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> VaultResult<()> {
        if self.vault.chunk_size == 0 {
            return Err(VaultError::Config("vault.chunk_size must be at least 1".into()));
        }
        if self.vault.max_in_flight == 0 {
            return Err(VaultError::Config(
                "vault.max_in_flight must be at least 1".into(),
            ));
        }
        if self.vault.fragment_prefix.trim_matches('/').is_empty() {
            return Err(VaultError::Config("vault.fragment_prefix must not be empty".into()));
        }
        Ok(())
    }
}

/// Object store backend selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    S3,
    Fs,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// S3-compatible endpoint
    pub endpoint: String,
    /// S3 region (default: us-east-1)
    pub region: String,
    pub bucket: String,
    /// Root directory for the fs backend
    pub root: PathBuf,
    /// Enforce HTTPS for S3 connections (error on HTTP endpoints)
    pub enforce_tls: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VaultConfig {
    /// Bytes per fragment (plaintext)
    pub chunk_size: usize,
    /// Fragments encrypted/transferred concurrently per file
    pub max_in_flight: usize,
    /// Object key prefix for fragments
    pub fragment_prefix: String,
    /// JSON record store path
    pub record_db: PathBuf,
}

/// Argon2id cost parameters for the password verification hash
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VerifierConfig {
    /// Memory cost in KiB (default: 19456 = 19 MiB)
    pub mem_cost_kib: u32,
    /// Iterations (default: 2)
    pub time_cost: u32,
    /// Lanes (default: 1)
    pub parallelism: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Log level (default: info)
    pub level: String,
    /// Log format: "json" or "text"
    pub format: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::S3,
            endpoint: "http://localhost:8333".into(),
            region: "us-east-1".into(),
            bucket: "shardvault".into(),
            root: PathBuf::from("/var/lib/shardvault/objects"),
            enforce_tls: false,
        }
    }
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1024 * 1024,
            max_in_flight: 8,
            fragment_prefix: "fragments".into(),
            record_db: PathBuf::from("~/.local/share/shardvault/records.json"),
        }
    }
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            mem_cost_kib: 19456,
            time_cost: 2,
            parallelism: 1,
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}
