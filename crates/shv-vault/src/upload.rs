//! Upload orchestrator
//!
//! Per file: `Received → Fragmenting → Encrypting → Uploading → Persisting → Done`,
//! with `Failed` reachable from any stage before `Done`.
//!
//! Chunks are pipelined: each chunk read from the source is encrypted on the
//! blocking pool and uploaded, with at most `max_in_flight` chunks in flight.
//! The record is written only after every fragment is stored, so no record
//! ever references a missing fragment. On any failure no further chunks are
//! dispatched, in-flight ones run to completion, and every fragment that did
//! land is deleted best-effort.

use futures::StreamExt;
use secrecy::{ExposeSecret, SecretString};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use tokio::io::AsyncRead;
use tracing::{debug, info, warn};

use shv_chunks::{AsyncFragmenter, Chunk};
use shv_core::{FileId, FragmentRef, StoredFile, VaultError, VaultResult};
use shv_crypto::{derive_key, encrypt_fragment, hash_password, DerivedKey};
use shv_storage::{FragmentStore, RecordStore};

use crate::cleanup::delete_fragments;
use crate::vault::{require_password, unix_now, Vault};

/// Progress of one upload, in pipeline order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum UploadStage {
    Received = 0,
    Fragmenting = 1,
    Encrypting = 2,
    Uploading = 3,
    Persisting = 4,
    Done = 5,
    Failed = 6,
}

impl UploadStage {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => UploadStage::Received,
            1 => UploadStage::Fragmenting,
            2 => UploadStage::Encrypting,
            3 => UploadStage::Uploading,
            4 => UploadStage::Persisting,
            5 => UploadStage::Done,
            _ => UploadStage::Failed,
        }
    }
}

impl fmt::Display for UploadStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            UploadStage::Received => "received",
            UploadStage::Fragmenting => "fragmenting",
            UploadStage::Encrypting => "encrypting",
            UploadStage::Uploading => "uploading",
            UploadStage::Persisting => "persisting",
            UploadStage::Done => "done",
            UploadStage::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Furthest stage reached. Chunk workers advance it concurrently; it only
/// moves forward and logs each stage once.
struct StageTracker {
    file_id: FileId,
    stage: AtomicU8,
}

impl StageTracker {
    fn new(file_id: FileId) -> Self {
        Self {
            file_id,
            stage: AtomicU8::new(UploadStage::Received as u8),
        }
    }

    fn advance(&self, to: UploadStage) {
        let prev = self.stage.fetch_max(to as u8, Ordering::AcqRel);
        if prev < to as u8 {
            debug!(file_id = %self.file_id, from = %UploadStage::from_u8(prev), to = %to, "upload stage");
        }
    }

    /// Move to `Failed`, returning the stage the upload was in. A finished
    /// upload stays `Done`.
    fn fail(&self) -> UploadStage {
        let mut prev = self.stage.load(Ordering::Acquire);
        loop {
            if prev >= UploadStage::Done as u8 {
                return UploadStage::from_u8(prev);
            }
            match self.stage.compare_exchange(
                prev,
                UploadStage::Failed as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => {
                    let from = UploadStage::from_u8(prev);
                    debug!(file_id = %self.file_id, from = %from, to = %UploadStage::Failed, "upload stage");
                    return from;
                }
                Err(actual) => prev = actual,
            }
        }
    }

    fn current(&self) -> UploadStage {
        UploadStage::from_u8(self.stage.load(Ordering::Acquire))
    }
}

/// Result of a successful upload
#[derive(Debug, Clone)]
pub struct UploadReceipt {
    pub file_id: FileId,
    pub name: String,
    pub fragments: usize,
    /// Plaintext bytes
    pub bytes: u64,
    pub stage: UploadStage,
}

impl<S: FragmentStore, R: RecordStore> Vault<S, R> {
    /// Fragment, encrypt, and store `reader` under `password`, owned by `owner`.
    pub async fn upload<Rd>(
        &self,
        reader: Rd,
        file_name: &str,
        password: Option<&SecretString>,
        owner: &str,
    ) -> VaultResult<UploadReceipt>
    where
        Rd: AsyncRead + Unpin + Send,
    {
        if file_name.trim().is_empty() {
            return Err(VaultError::MissingInput("file".into()));
        }
        let password = require_password(password)?;
        if owner.is_empty() {
            return Err(VaultError::MissingInput("owner identity".into()));
        }

        let file_id = FileId::new();
        let tracker = StageTracker::new(file_id);
        debug!(file_id = %file_id, name = %file_name, "upload received");

        let result = self
            .upload_inner(reader, file_id, file_name, password, owner, &tracker)
            .await;

        match &result {
            Ok(receipt) => info!(
                file_id = %file_id,
                name = %file_name,
                fragments = receipt.fragments,
                bytes = receipt.bytes,
                "uploaded"
            ),
            Err(e) => {
                let failed_at = tracker.fail();
                warn!(
                    file_id = %file_id,
                    name = %file_name,
                    stage = %failed_at,
                    "upload failed: {e}"
                )
            }
        }
        result
    }

    /// Convenience wrapper for in-memory content.
    pub async fn upload_bytes(
        &self,
        data: &[u8],
        file_name: &str,
        password: Option<&SecretString>,
        owner: &str,
    ) -> VaultResult<UploadReceipt> {
        self.upload(data, file_name, password, owner).await
    }

    async fn upload_inner<Rd>(
        &self,
        reader: Rd,
        file_id: FileId,
        file_name: &str,
        password: &SecretString,
        owner: &str,
        tracker: &StageTracker,
    ) -> VaultResult<UploadReceipt>
    where
        Rd: AsyncRead + Unpin + Send,
    {
        let key = Arc::new(derive_key(password));
        let abort = Arc::new(AtomicBool::new(false));

        tracker.advance(UploadStage::Fragmenting);
        let fragmenter = AsyncFragmenter::new(reader, self.options.chunk_size);
        let chunks = futures::stream::unfold(
            (fragmenter, abort.clone()),
            |(mut fragmenter, abort)| async move {
                if abort.load(Ordering::Acquire) {
                    return None;
                }
                match fragmenter.next_chunk().await {
                    Ok(Some(chunk)) => Some((Ok(chunk), (fragmenter, abort))),
                    Ok(None) => None,
                    Err(e) => Some((Err(e), (fragmenter, abort))),
                }
            },
        );

        let in_flight = chunks
            .map(|chunk| {
                let key = key.clone();
                async move {
                    let chunk = chunk.map_err(VaultError::Io)?;
                    self.store_chunk(file_id, chunk, key, tracker).await
                }
            })
            .buffer_unordered(self.options.max_in_flight);
        let mut in_flight = std::pin::pin!(in_flight);

        let mut stored: Vec<FragmentRef> = Vec::new();
        let mut plaintext_bytes = 0u64;
        let mut first_error: Option<VaultError> = None;

        while let Some(outcome) = in_flight.next().await {
            match outcome {
                Ok((fragment, len)) => {
                    plaintext_bytes += len;
                    stored.push(fragment);
                }
                Err(e) => {
                    abort.store(true, Ordering::Release);
                    if first_error.is_none() {
                        first_error = Some(e);
                    } else {
                        debug!(file_id = %file_id, "additional fragment failure: {e}");
                    }
                }
            }
        }
        drop(in_flight);

        if let Some(err) = first_error {
            self.discard(file_id, &stored).await;
            return Err(err);
        }
        if stored.is_empty() {
            return Err(VaultError::MissingInput("empty file".into()));
        }
        stored.sort_by_key(|f| f.index);

        tracker.advance(UploadStage::Persisting);
        let verification_hash = match self.hash_secret(password).await {
            Ok(hash) => hash,
            Err(e) => {
                self.discard(file_id, &stored).await;
                return Err(e);
            }
        };

        let retrieve_fragments = stored
            .iter()
            .map(|f| FragmentRef {
                locator: self.store.retrieve_locator(&f.locator),
                ..f.clone()
            })
            .collect();

        let record = StoredFile {
            id: file_id,
            name: file_name.to_string(),
            retrieve_fragments,
            fragments: stored,
            verification_hash,
            owner: owner.to_string(),
            size: plaintext_bytes,
            chunk_size: self.options.chunk_size as u64,
            created_at: unix_now(),
        };

        if let Err(e) = self.records.create(&record) {
            self.discard(file_id, &record.fragments).await;
            return Err(VaultError::PersistenceFailed(format!("{e:#}")));
        }

        tracker.advance(UploadStage::Done);
        Ok(UploadReceipt {
            file_id,
            name: record.name,
            fragments: record.fragments.len(),
            bytes: plaintext_bytes,
            stage: tracker.current(),
        })
    }

    /// Encrypt one chunk and put it in the object store.
    ///
    /// Returns the fragment reference and the chunk's plaintext length.
    async fn store_chunk(
        &self,
        file_id: FileId,
        chunk: Chunk,
        key: Arc<DerivedKey>,
        tracker: &StageTracker,
    ) -> VaultResult<(FragmentRef, u64)> {
        let index = chunk.index;
        let len = chunk.data.len() as u64;

        tracker.advance(UploadStage::Encrypting);
        let encrypted = tokio::task::spawn_blocking(move || {
            encrypt_fragment(&key, chunk.index, file_id.as_bytes(), &chunk.data)
        })
        .await
        .map_err(|e| VaultError::Other(anyhow::anyhow!("encryption task failed: {e}")))?
        .map_err(|e| VaultError::Other(anyhow::anyhow!("fragment {index}: {e}")))?;

        let digest = shv_chunks::digest_hex(&encrypted);
        let size = encrypted.len() as u64;
        let name = self.fragment_name(&file_id, index);

        tracker.advance(UploadStage::Uploading);
        let locator = self
            .store
            .put(&name, encrypted)
            .await
            .map_err(|e| VaultError::FragmentUnavailable {
                index,
                reason: format!("{e:#}"),
            })?;

        debug!(file_id = %file_id, index, size, "fragment stored");
        Ok((
            FragmentRef {
                index,
                locator,
                digest,
                size,
            },
            len,
        ))
    }

    /// Argon2id on the blocking pool.
    async fn hash_secret(&self, password: &SecretString) -> VaultResult<String> {
        let password = SecretString::from(password.expose_secret().to_owned());
        let params = self.options.verifier.clone();
        tokio::task::spawn_blocking(move || hash_password(&password, &params))
            .await
            .map_err(|e| VaultError::Other(anyhow::anyhow!("hashing task failed: {e}")))?
            .map_err(|e| VaultError::Other(e.into()))
    }

    /// Best-effort removal of fragments no record will reference.
    async fn discard(&self, file_id: FileId, fragments: &[FragmentRef]) {
        if fragments.is_empty() {
            return;
        }
        let failures = delete_fragments(&self.store, fragments, self.options.max_in_flight).await;
        if failures.is_empty() {
            debug!(file_id = %file_id, fragments = fragments.len(), "orphaned fragments removed");
        } else {
            warn!(
                file_id = %file_id,
                failed = failures.len(),
                total = fragments.len(),
                "could not remove all orphaned fragments"
            );
        }
    }
}
