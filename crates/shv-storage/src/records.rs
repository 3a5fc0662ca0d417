//! Record-store capability for file metadata
//!
//! Two backends:
//!   - **Memory**: `HashMap` behind a lock, for tests and throwaway runs.
//!   - **JSON**: whole map mirrored in memory, persisted on every mutation via
//!     an atomic write (temp file + rename). A failed write rolls the
//!     in-memory change back, so each call is all-or-nothing.

use anyhow::{Context, Result};
use shv_core::{FileId, StoredFile};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock};

/// File-record persistence consumed by the vault. Each call is atomic.
pub trait RecordStore: Send + Sync {
    /// Insert a new record. Fails if the id already exists.
    fn create(&self, record: &StoredFile) -> Result<()>;

    /// Look a record up by id.
    fn find_by_id(&self, id: &FileId) -> Result<Option<StoredFile>>;

    /// Remove a record. Removing an absent id is not an error.
    fn delete(&self, id: &FileId) -> Result<()>;

    /// All records owned by `owner`, newest first.
    fn list_by_owner(&self, owner: &str) -> Result<Vec<StoredFile>>;
}

impl<T: RecordStore> RecordStore for Arc<T> {
    fn create(&self, record: &StoredFile) -> Result<()> {
        (**self).create(record)
    }
    fn find_by_id(&self, id: &FileId) -> Result<Option<StoredFile>> {
        (**self).find_by_id(id)
    }
    fn delete(&self, id: &FileId) -> Result<()> {
        (**self).delete(id)
    }
    fn list_by_owner(&self, owner: &str) -> Result<Vec<StoredFile>> {
        (**self).list_by_owner(owner)
    }
}

fn owned_newest_first<'a>(
    records: impl Iterator<Item = &'a StoredFile>,
    owner: &str,
) -> Vec<StoredFile> {
    let mut out: Vec<StoredFile> = records.filter(|r| r.owner == owner).cloned().collect();
    out.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.name.cmp(&b.name)));
    out
}

// ── Memory backend ───────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    records: RwLock<HashMap<FileId, StoredFile>>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.read().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl RecordStore for MemoryRecordStore {
    fn create(&self, record: &StoredFile) -> Result<()> {
        let mut records = self
            .records
            .write()
            .map_err(|_| anyhow::anyhow!("record store lock poisoned"))?;
        if records.contains_key(&record.id) {
            anyhow::bail!("record already exists: {}", record.id);
        }
        records.insert(record.id, record.clone());
        Ok(())
    }

    fn find_by_id(&self, id: &FileId) -> Result<Option<StoredFile>> {
        let records = self
            .records
            .read()
            .map_err(|_| anyhow::anyhow!("record store lock poisoned"))?;
        Ok(records.get(id).cloned())
    }

    fn delete(&self, id: &FileId) -> Result<()> {
        let mut records = self
            .records
            .write()
            .map_err(|_| anyhow::anyhow!("record store lock poisoned"))?;
        records.remove(id);
        Ok(())
    }

    fn list_by_owner(&self, owner: &str) -> Result<Vec<StoredFile>> {
        let records = self
            .records
            .read()
            .map_err(|_| anyhow::anyhow!("record store lock poisoned"))?;
        Ok(owned_newest_first(records.values(), owner))
    }
}

// ── JSON file backend ────────────────────────────────────────────────────────

/// Record store persisted to a single JSON file
pub struct JsonRecordStore {
    db_path: PathBuf,
    entries: Mutex<HashMap<String, StoredFile>>,
}

impl JsonRecordStore {
    /// Load or create a record store at the given path.
    /// If the file doesn't exist, starts empty.
    pub fn open(db_path: &Path) -> Result<Self> {
        let entries = if db_path.exists() {
            let content = std::fs::read_to_string(db_path)
                .with_context(|| format!("reading record store: {}", db_path.display()))?;
            serde_json::from_str(&content)
                .with_context(|| format!("parsing record store: {}", db_path.display()))?
        } else {
            HashMap::new()
        };

        Ok(JsonRecordStore {
            db_path: db_path.to_path_buf(),
            entries: Mutex::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.db_path
    }

    /// Write the full map to disk: temp file, then rename.
    fn persist(&self, entries: &HashMap<String, StoredFile>) -> Result<()> {
        if let Some(parent) = self.db_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating record dir: {}", parent.display()))?;
        }

        let json = serde_json::to_string_pretty(entries).context("serializing record store")?;

        let tmp_path = self.db_path.with_extension("tmp");
        std::fs::write(&tmp_path, &json)
            .with_context(|| format!("writing record store temp: {}", tmp_path.display()))?;
        std::fs::rename(&tmp_path, &self.db_path)
            .with_context(|| format!("renaming record store: {}", self.db_path.display()))?;
        Ok(())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, StoredFile>>> {
        self.entries
            .lock()
            .map_err(|_| anyhow::anyhow!("record store lock poisoned"))
    }
}

impl RecordStore for JsonRecordStore {
    fn create(&self, record: &StoredFile) -> Result<()> {
        let mut entries = self.lock()?;
        let key = record.id.to_string();
        if entries.contains_key(&key) {
            anyhow::bail!("record already exists: {key}");
        }

        entries.insert(key.clone(), record.clone());
        if let Err(e) = self.persist(&entries) {
            entries.remove(&key);
            return Err(e);
        }
        Ok(())
    }

    fn find_by_id(&self, id: &FileId) -> Result<Option<StoredFile>> {
        Ok(self.lock()?.get(&id.to_string()).cloned())
    }

    fn delete(&self, id: &FileId) -> Result<()> {
        let mut entries = self.lock()?;
        let key = id.to_string();
        let Some(previous) = entries.remove(&key) else {
            return Ok(());
        };

        if let Err(e) = self.persist(&entries) {
            entries.insert(key, previous);
            return Err(e);
        }
        Ok(())
    }

    fn list_by_owner(&self, owner: &str) -> Result<Vec<StoredFile>> {
        Ok(owned_newest_first(self.lock()?.values(), owner))
    }
}
