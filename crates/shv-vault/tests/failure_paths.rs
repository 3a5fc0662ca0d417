//! Integration test: partial failures never leave a record pointing at
//! missing fragments, and never leave orphaned fragments behind when avoidable.
//!
//! Uses store doubles that wrap the in-memory backends and fail on demand.

use anyhow::Result;
use opendal::Operator;
use secrecy::SecretString;
use shv_core::{FileId, Locator, StoredFile, VaultError};
use shv_crypto::VerifierParams;
use shv_storage::{FragmentStore, MemoryRecordStore, OpendalFragmentStore, RecordStore};
use shv_vault::{Vault, VaultOptions};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

type Events = Arc<Mutex<Vec<String>>>;

fn fragment_index(key: &str) -> Option<u64> {
    key.rsplit('/').next()?.parse().ok()
}

/// Fragment store that fails `put`/`delete` for chosen indices
struct FlakyStore {
    inner: OpendalFragmentStore,
    fail_put: Mutex<HashSet<u64>>,
    fail_delete: Mutex<HashSet<u64>>,
    stored: Mutex<Vec<Locator>>,
    put_calls: AtomicUsize,
    get_calls: AtomicUsize,
    events: Events,
}

impl FlakyStore {
    fn new(events: Events) -> Self {
        let op = Operator::new(opendal::services::Memory::default())
            .expect("memory operator")
            .finish();
        Self {
            inner: OpendalFragmentStore::new(op),
            fail_put: Mutex::default(),
            fail_delete: Mutex::default(),
            stored: Mutex::default(),
            put_calls: AtomicUsize::new(0),
            get_calls: AtomicUsize::new(0),
            events,
        }
    }

    fn fail_put_at(&self, index: u64) {
        self.fail_put.lock().unwrap().insert(index);
    }

    fn fail_delete_at(&self, index: u64) {
        self.fail_delete.lock().unwrap().insert(index);
    }

    fn heal(&self) {
        self.fail_put.lock().unwrap().clear();
        self.fail_delete.lock().unwrap().clear();
    }

    fn stored(&self) -> Vec<Locator> {
        self.stored.lock().unwrap().clone()
    }

    fn should_fail(set: &Mutex<HashSet<u64>>, key: &str) -> bool {
        fragment_index(key).is_some_and(|i| set.lock().unwrap().contains(&i))
    }
}

impl FragmentStore for FlakyStore {
    async fn put(&self, name: &str, bytes: Vec<u8>) -> Result<Locator> {
        self.put_calls.fetch_add(1, Ordering::SeqCst);
        if Self::should_fail(&self.fail_put, name) {
            anyhow::bail!("injected put failure: {name}");
        }
        let locator = self.inner.put(name, bytes).await?;
        self.stored.lock().unwrap().push(locator.clone());
        Ok(locator)
    }

    async fn get(&self, locator: &Locator) -> Result<Vec<u8>> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.get(locator).await
    }

    async fn delete(&self, locator: &Locator) -> Result<()> {
        if Self::should_fail(&self.fail_delete, locator.as_str()) {
            anyhow::bail!("injected delete failure: {locator}");
        }
        self.inner.delete(locator).await?;
        self.events
            .lock()
            .unwrap()
            .push(format!("fragment:{}", locator.as_str()));
        Ok(())
    }
}

/// Record store that counts creates and can refuse them
struct RecordingRecords {
    inner: MemoryRecordStore,
    creates: AtomicUsize,
    refuse_create: Mutex<bool>,
    events: Events,
}

impl RecordingRecords {
    fn new(events: Events) -> Self {
        Self {
            inner: MemoryRecordStore::new(),
            creates: AtomicUsize::new(0),
            refuse_create: Mutex::new(false),
            events,
        }
    }
}

impl RecordStore for RecordingRecords {
    fn create(&self, record: &StoredFile) -> Result<()> {
        self.creates.fetch_add(1, Ordering::SeqCst);
        if *self.refuse_create.lock().unwrap() {
            anyhow::bail!("injected create failure");
        }
        self.inner.create(record)
    }

    fn find_by_id(&self, id: &FileId) -> Result<Option<StoredFile>> {
        self.inner.find_by_id(id)
    }

    fn delete(&self, id: &FileId) -> Result<()> {
        self.events.lock().unwrap().push(format!("record:{id}"));
        self.inner.delete(id)
    }

    fn list_by_owner(&self, owner: &str) -> Result<Vec<StoredFile>> {
        self.inner.list_by_owner(owner)
    }
}

type Harness = (
    Vault<Arc<FlakyStore>, Arc<RecordingRecords>>,
    Arc<FlakyStore>,
    Arc<RecordingRecords>,
    Events,
);

fn harness() -> Harness {
    harness_with(4, 2)
}

fn harness_with(chunk_size: usize, max_in_flight: usize) -> Harness {
    let events: Events = Arc::default();
    let store = Arc::new(FlakyStore::new(events.clone()));
    let records = Arc::new(RecordingRecords::new(events.clone()));
    let options = VaultOptions {
        chunk_size,
        max_in_flight,
        fragment_prefix: "fragments".into(),
        verifier: VerifierParams {
            mem_cost_kib: 1024,
            time_cost: 1,
            parallelism: 1,
        },
    };
    let vault = Vault::new(store.clone(), records.clone(), options).unwrap();
    (vault, store, records, events)
}

fn pw() -> SecretString {
    SecretString::from("correct-horse".to_string())
}

#[tokio::test]
async fn failed_put_creates_no_record_and_cleans_up() {
    let (vault, store, records, _) = harness();
    store.fail_put_at(1);

    let err = vault
        .upload_bytes(b"0123456789", "f.bin", Some(&pw()), "alice")
        .await
        .unwrap_err();

    assert!(matches!(err, VaultError::FragmentUnavailable { index: 1, .. }));
    assert_eq!(records.creates.load(Ordering::SeqCst), 0, "no record may be written");
    assert!(vault.list("alice").unwrap().is_empty());

    for locator in store.stored() {
        assert!(
            store.get(&locator).await.is_err(),
            "orphaned fragment left behind: {locator}"
        );
    }
}

#[tokio::test]
async fn refused_record_cleans_up_fragments() {
    let (vault, store, records, _) = harness();
    *records.refuse_create.lock().unwrap() = true;

    let err = vault
        .upload_bytes(b"0123456789", "f.bin", Some(&pw()), "alice")
        .await
        .unwrap_err();

    assert!(matches!(err, VaultError::PersistenceFailed(_)));
    assert_eq!(records.creates.load(Ordering::SeqCst), 1);
    assert_eq!(store.stored().len(), 3);
    for locator in store.stored() {
        assert!(store.get(&locator).await.is_err());
    }
}

#[tokio::test]
async fn cleanup_failure_does_not_mask_original_error() {
    let (vault, store, _, _) = harness();
    store.fail_put_at(2);
    store.fail_delete_at(0);

    let err = vault
        .upload_bytes(b"0123456789", "f.bin", Some(&pw()), "alice")
        .await
        .unwrap_err();
    assert!(matches!(err, VaultError::FragmentUnavailable { index: 2, .. }));
}

#[tokio::test]
async fn delete_removes_record_only_after_fragments() {
    let (vault, _, _, events) = harness();
    let receipt = vault
        .upload_bytes(b"0123456789", "f.bin", Some(&pw()), "alice")
        .await
        .unwrap();

    vault.delete(&receipt.file_id).await.unwrap();

    let events = events.lock().unwrap().clone();
    assert_eq!(events.len(), 4, "three fragments then one record: {events:?}");
    assert!(events[..3].iter().all(|e| e.starts_with("fragment:")));
    assert_eq!(events[3], format!("record:{}", receipt.file_id));
}

#[tokio::test]
async fn failed_fragment_delete_keeps_record() {
    let (vault, store, records, events) = harness();
    let receipt = vault
        .upload_bytes(b"0123456789", "f.bin", Some(&pw()), "alice")
        .await
        .unwrap();
    store.fail_delete_at(1);

    let err = vault.delete(&receipt.file_id).await.unwrap_err();
    assert!(matches!(err, VaultError::FragmentUnavailable { index: 1, .. }));
    assert!(records.find_by_id(&receipt.file_id).unwrap().is_some());
    assert!(events.lock().unwrap().iter().all(|e| !e.starts_with("record:")));

    // The other fragments were still attempted
    let removed = events
        .lock()
        .unwrap()
        .iter()
        .filter(|e| e.starts_with("fragment:"))
        .count();
    assert_eq!(removed, 2);

    store.heal();
    vault.delete(&receipt.file_id).await.unwrap();
    assert!(records.find_by_id(&receipt.file_id).unwrap().is_none());
}

#[tokio::test]
async fn missing_fragment_fails_download() {
    let (vault, store, _, _) = harness();
    let receipt = vault
        .upload_bytes(b"0123456789", "f.bin", Some(&pw()), "alice")
        .await
        .unwrap();

    let victim = store
        .stored()
        .into_iter()
        .find(|l| l.as_str().ends_with("/000002"))
        .unwrap();
    store.inner.delete(&victim).await.unwrap();

    let err = vault.download(&receipt.file_id, Some(&pw())).await.unwrap_err();
    assert!(matches!(err, VaultError::FragmentUnavailable { index: 2, .. }));
}

#[tokio::test]
async fn wrong_password_fetches_nothing() {
    let (vault, store, _, _) = harness();
    let receipt = vault
        .upload_bytes(b"0123456789", "f.bin", Some(&pw()), "alice")
        .await
        .unwrap();

    let wrong = SecretString::from("wrong-password".to_string());
    let err = vault.download(&receipt.file_id, Some(&wrong)).await.unwrap_err();

    assert!(matches!(err, VaultError::InvalidSecret));
    assert_eq!(store.get_calls.load(Ordering::SeqCst), 0, "verification must gate every fetch");
}

#[tokio::test]
async fn first_failed_put_stops_dispatch() {
    let (vault, store, records, _) = harness_with(1, 1);
    store.fail_put_at(0);

    let data = vec![0x5Au8; 200];
    let err = vault
        .upload_bytes(&data, "f.bin", Some(&pw()), "alice")
        .await
        .unwrap_err();

    assert!(matches!(err, VaultError::FragmentUnavailable { index: 0, .. }));
    assert_eq!(store.put_calls.load(Ordering::SeqCst), 1, "no chunk may follow a failed put");
    assert_eq!(records.creates.load(Ordering::SeqCst), 0);
}
