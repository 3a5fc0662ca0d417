//! Retrieval orchestrator: lookup, verify, fetch, decrypt, reassemble

use futures::{StreamExt, TryStreamExt};
use secrecy::{ExposeSecret, SecretString};
use std::sync::Arc;
use tracing::{debug, info, warn};

use shv_chunks::Chunk;
use shv_core::{FileId, FragmentRef, StoredFile, VaultError, VaultResult};
use shv_crypto::{
    decrypt_fragment, derive_key, hash_password, verify_password, CryptoError, DerivedKey,
};
use shv_storage::{FragmentStore, RecordStore};

use crate::vault::{require_password, Vault};

/// A reconstructed file
#[derive(Debug, Clone)]
pub struct RetrievedFile {
    pub id: FileId,
    pub name: String,
    pub bytes: Vec<u8>,
}

impl<S: FragmentStore, R: RecordStore> Vault<S, R> {
    /// Reconstruct a file, checking `password` against its record first.
    ///
    /// An unknown id and a wrong password are distinct errors here; callers
    /// facing an untrusted party should report them through
    /// [`VaultError::public_message`].
    pub async fn download(
        &self,
        file_id: &FileId,
        password: Option<&SecretString>,
    ) -> VaultResult<RetrievedFile> {
        let record = match self.lookup(file_id) {
            Err(VaultError::NotFound(id)) => {
                if let Ok(password) = require_password(password) {
                    self.verify_against_decoy(password).await;
                }
                return Err(VaultError::NotFound(id));
            }
            other => other?,
        };
        let password = require_password(password)?;

        if !self.check_secret(&record, password).await? {
            warn!(file_id = %file_id, "password rejected");
            return Err(VaultError::InvalidSecret);
        }

        let fragments = ordered_fragments(&record.retrieve_fragments)?;
        let key = Arc::new(derive_key(password));

        let chunks: Vec<Chunk> = futures::stream::iter(fragments)
            .map(|fragment| {
                let key = key.clone();
                async move { self.fetch_fragment(file_id, fragment, key).await }
            })
            .buffer_unordered(self.options.max_in_flight)
            .try_collect()
            .await?;

        let bytes = shv_chunks::merge_indexed(chunks).map_err(|e| {
            VaultError::FragmentUnavailable {
                index: 0,
                reason: e.to_string(),
            }
        })?;

        if bytes.len() as u64 != record.size {
            return Err(VaultError::FragmentUnavailable {
                index: record.retrieve_fragments.len().saturating_sub(1) as u64,
                reason: format!(
                    "reassembled {} bytes, record says {}",
                    bytes.len(),
                    record.size
                ),
            });
        }

        info!(
            file_id = %file_id,
            name = %record.name,
            fragments = record.retrieve_fragments.len(),
            bytes = bytes.len(),
            "retrieved"
        );
        Ok(RetrievedFile {
            id: record.id,
            name: record.name,
            bytes,
        })
    }

    pub(crate) fn lookup(&self, file_id: &FileId) -> VaultResult<StoredFile> {
        match self.records.find_by_id(file_id) {
            Ok(Some(record)) => Ok(record),
            Ok(None) => {
                warn!(file_id = %file_id, "no such file");
                Err(VaultError::NotFound(*file_id))
            }
            Err(e) => Err(VaultError::PersistenceFailed(format!("{e:#}"))),
        }
    }

    /// Argon2id verification on the blocking pool.
    async fn check_secret(&self, record: &StoredFile, password: &SecretString) -> VaultResult<bool> {
        let stored = record.verification_hash.clone();
        let password = SecretString::from(password.expose_secret().to_owned());
        tokio::task::spawn_blocking(move || verify_password(&stored, &password))
            .await
            .map_err(|e| VaultError::Other(anyhow::anyhow!("verification task failed: {e}")))?
            .map_err(|e| match e {
                CryptoError::MalformedHash(reason) => VaultError::PersistenceFailed(format!(
                    "stored verification hash is unusable: {reason}"
                )),
                other => VaultError::Other(other.into()),
            })
    }

    /// Run one Argon2id verification that cannot succeed, so an unknown id
    /// costs as much as a wrong password.
    async fn verify_against_decoy(&self, password: &SecretString) {
        let decoy = self.decoy_hash.clone();
        let params = self.options.verifier.clone();
        let password = SecretString::from(password.expose_secret().to_owned());
        let outcome = tokio::task::spawn_blocking(move || {
            let stored = decoy.get_or_init(|| {
                let unguessable = SecretString::from(FileId::new().to_string());
                hash_password(&unguessable, &params).unwrap_or_default()
            });
            verify_password(stored, &password)
        })
        .await;
        if let Ok(Ok(true)) = outcome {
            warn!("decoy verification unexpectedly matched");
        }
    }

    async fn fetch_fragment(
        &self,
        file_id: &FileId,
        fragment: &FragmentRef,
        key: Arc<DerivedKey>,
    ) -> VaultResult<Chunk> {
        let index = fragment.index;
        let unavailable = |reason: String| VaultError::FragmentUnavailable { index, reason };

        let encrypted = self
            .store
            .get(&fragment.locator)
            .await
            .map_err(|e| unavailable(format!("{e:#}")))?;

        if encrypted.len() as u64 != fragment.size {
            return Err(unavailable(format!(
                "size mismatch: expected {} bytes, got {}",
                fragment.size,
                encrypted.len()
            )));
        }
        let expected = shv_chunks::hash_from_hex(&fragment.digest)
            .map_err(|e| unavailable(format!("{e:#}")))?;
        if shv_chunks::hash_bytes(&encrypted) != expected {
            return Err(unavailable("digest mismatch".into()));
        }

        let file_id = *file_id;
        let data = tokio::task::spawn_blocking(move || {
            decrypt_fragment(&key, index, file_id.as_bytes(), &encrypted)
        })
        .await
        .map_err(|e| VaultError::Other(anyhow::anyhow!("decryption task failed: {e}")))?
        .map_err(|e| VaultError::DecryptionFailed {
            index,
            reason: e.to_string(),
        })?;

        debug!(file_id = %file_id, index, "fragment decrypted");
        Ok(Chunk { index, data })
    }
}

/// Sort fragment refs by index and require exactly `0..n`.
fn ordered_fragments(fragments: &[FragmentRef]) -> VaultResult<Vec<&FragmentRef>> {
    if fragments.is_empty() {
        return Err(VaultError::FragmentUnavailable {
            index: 0,
            reason: "record lists no fragments".into(),
        });
    }
    let mut ordered: Vec<&FragmentRef> = fragments.iter().collect();
    ordered.sort_by_key(|f| f.index);
    for (expected, fragment) in ordered.iter().enumerate() {
        let expected = expected as u64;
        if fragment.index != expected {
            let reason = if fragment.index < expected {
                "duplicate fragment index".to_string()
            } else {
                format!("fragment {expected} missing from record")
            };
            return Err(VaultError::FragmentUnavailable {
                index: expected.min(fragment.index),
                reason,
            });
        }
    }
    Ok(ordered)
}
