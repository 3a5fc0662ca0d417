//! The `Vault`: object store + record store + pipeline settings
//!
//! Both stores are injected at construction; there is no ambient handle.

use secrecy::{ExposeSecret, SecretString};
use std::sync::{Arc, OnceLock};
use shv_core::config::ShvConfig;
use shv_core::{FileId, FileSummary, VaultError, VaultResult};
use shv_crypto::VerifierParams;
use shv_storage::{FragmentStore, RecordStore};

/// Pipeline settings for one vault
#[derive(Debug, Clone)]
pub struct VaultOptions {
    /// Plaintext bytes per fragment
    pub chunk_size: usize,
    /// Fragments processed concurrently per file
    pub max_in_flight: usize,
    /// Object key prefix for fragments
    pub fragment_prefix: String,
    /// Argon2id cost for new verification hashes
    pub verifier: VerifierParams,
}

impl Default for VaultOptions {
    fn default() -> Self {
        Self {
            chunk_size: 1024 * 1024,
            max_in_flight: 8,
            fragment_prefix: "fragments".into(),
            verifier: VerifierParams::default(),
        }
    }
}

impl VaultOptions {
    pub fn from_config(config: &ShvConfig) -> Self {
        Self {
            chunk_size: config.vault.chunk_size,
            max_in_flight: config.vault.max_in_flight,
            fragment_prefix: config.vault.fragment_prefix.clone(),
            verifier: VerifierParams {
                mem_cost_kib: config.verifier.mem_cost_kib,
                time_cost: config.verifier.time_cost,
                parallelism: config.verifier.parallelism,
            },
        }
    }
}

/// Fragmented, password-encrypted file storage.
pub struct Vault<S, R> {
    pub(crate) store: S,
    pub(crate) records: R,
    pub(crate) options: VaultOptions,
    /// Verification hash checked when an id is unknown, built on first use
    /// with the vault's own Argon2id cost.
    pub(crate) decoy_hash: Arc<OnceLock<String>>,
}

impl<S: FragmentStore, R: RecordStore> Vault<S, R> {
    pub fn new(store: S, records: R, options: VaultOptions) -> VaultResult<Self> {
        if options.chunk_size == 0 {
            return Err(VaultError::Config("chunk_size must be at least 1".into()));
        }
        if options.max_in_flight == 0 {
            return Err(VaultError::Config("max_in_flight must be at least 1".into()));
        }
        Ok(Self {
            store,
            records,
            options,
            decoy_hash: Arc::new(OnceLock::new()),
        })
    }

    pub fn options(&self) -> &VaultOptions {
        &self.options
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn records(&self) -> &R {
        &self.records
    }

    /// Files owned by `owner`, newest first.
    pub fn list(&self, owner: &str) -> VaultResult<Vec<FileSummary>> {
        list_files(&self.records, owner)
    }

    /// Object key for fragment `index` of `file_id`
    pub(crate) fn fragment_name(&self, file_id: &FileId, index: u64) -> String {
        format!(
            "{}/{file_id}/{index:06}",
            self.options.fragment_prefix.trim_end_matches('/')
        )
    }
}

/// Files owned by `owner`, newest first, straight from a record store.
///
/// Needs no object store, so listing works without storage credentials.
pub fn list_files<R: RecordStore>(records: &R, owner: &str) -> VaultResult<Vec<FileSummary>> {
    if owner.is_empty() {
        return Err(VaultError::MissingInput("owner identity".into()));
    }
    let records = records
        .list_by_owner(owner)
        .map_err(|e| VaultError::PersistenceFailed(format!("{e:#}")))?;
    Ok(records.iter().map(|r| r.summary()).collect())
}

/// Treat an absent or empty password as not supplied.
pub(crate) fn require_password(password: Option<&SecretString>) -> VaultResult<&SecretString> {
    match password {
        Some(pw) if !pw.expose_secret().is_empty() => Ok(pw),
        _ => Err(VaultError::MissingInput("password".into())),
    }
}

pub(crate) fn unix_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;
    use shv_storage::{MemoryRecordStore, OpendalFragmentStore};

    fn memory_store() -> OpendalFragmentStore {
        let op = opendal::Operator::new(opendal::services::Memory::default())
            .expect("memory operator")
            .finish();
        OpendalFragmentStore::new(op)
    }

    #[test]
    fn zero_chunk_size_rejected() {
        let options = VaultOptions {
            chunk_size: 0,
            ..Default::default()
        };
        let result = Vault::new(memory_store(), MemoryRecordStore::new(), options);
        assert!(matches!(result, Err(VaultError::Config(_))));
    }

    #[test]
    fn fragment_names_are_zero_padded() {
        let options = VaultOptions {
            fragment_prefix: "frags/".into(),
            ..Default::default()
        };
        let vault = Vault::new(memory_store(), MemoryRecordStore::new(), options).unwrap();
        let id = FileId::new();
        assert_eq!(vault.fragment_name(&id, 7), format!("frags/{id}/000007"));
    }

    #[test]
    fn options_follow_config() {
        let mut config = ShvConfig::default();
        config.vault.chunk_size = 4096;
        config.verifier.time_cost = 5;
        let options = VaultOptions::from_config(&config);
        assert_eq!(options.chunk_size, 4096);
        assert_eq!(options.verifier.time_cost, 5);
    }

    #[test]
    fn empty_password_counts_as_missing() {
        let empty = SecretString::from("");
        assert!(require_password(Some(&empty)).is_err());
        assert!(require_password(None).is_err());
        let pw = SecretString::from("x");
        assert!(require_password(Some(&pw)).is_ok());
    }

    #[test]
    fn list_files_reads_records_only() {
        let records = MemoryRecordStore::new();
        assert!(matches!(
            list_files(&records, ""),
            Err(VaultError::MissingInput(_))
        ));
        assert!(list_files(&records, "alice").unwrap().is_empty());
    }

    #[test]
    fn list_requires_owner() {
        let vault = Vault::new(memory_store(), MemoryRecordStore::new(), VaultOptions::default())
            .unwrap();
        assert!(matches!(vault.list(""), Err(VaultError::MissingInput(_))));
        assert!(vault.list("nobody").unwrap().is_empty());
    }
}
