use super::{upsert, EntityStore, Record};
use crate::error::{Result, SyncError};
use std::fs;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// A collection persisted as one pretty-printed JSON array.
///
/// A missing file reads as an empty collection. Every write replaces the file
/// atomically (temp file + rename).
pub struct JsonFileStore<T> {
    path: PathBuf,
    _record: PhantomData<T>,
}

impl<T: Record> JsonFileStore<T> {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            _record: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<Vec<T>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let content = fs::read_to_string(&self.path)?;
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }
        serde_json::from_str(&content).map_err(|e| {
            SyncError::Store(format!("{} is corrupt: {}", self.path.display(), e))
        })
    }

    fn save(&self, records: &[T]) -> Result<()> {
        let dir = self
            .path
            .parent()
            .ok_or_else(|| SyncError::Store(format!("{} has no parent", self.path.display())))?;
        if !dir.exists() {
            fs::create_dir_all(dir)?;
        }
        let content = serde_json::to_string_pretty(records)?;
        let tmp_file = dir.join(format!(".store-{}.tmp", Uuid::new_v4()));
        fs::write(&tmp_file, content)?;
        fs::rename(&tmp_file, &self.path)?;
        Ok(())
    }
}

impl<T: Record> EntityStore<T> for JsonFileStore<T> {
    fn get_all(&self) -> Result<Vec<T>> {
        self.load()
    }

    fn put(&self, record: T) -> Result<()> {
        self.import_records(vec![record])
    }

    fn clear(&self) -> Result<()> {
        if self.path.exists() {
            fs::remove_file(&self.path)?;
        }
        Ok(())
    }

    fn import_records(&self, records: Vec<T>) -> Result<()> {
        let mut all = self.load()?;
        upsert(&mut all, records);
        self.save(&all)
    }
}
