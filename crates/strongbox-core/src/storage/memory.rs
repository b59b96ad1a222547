//! Process-local datastore.
//!
//! Keeps envelopes in a map behind a mutex. Every operation, batches
//! included, runs under a single lock acquisition, so writes are atomic.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use super::traits::{MetadataStore, RecordStore, VaultStore};
use super::types::{list_order, Category, Record, RecordId, VaultMetadata, WriteBatch};
use crate::error::{Result, VaultError};

#[derive(Default)]
struct MemoryState {
    metadata: Option<VaultMetadata>,
    records: BTreeMap<(Category, RecordId), Record>,
}

/// In-memory vault store.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_state(&self) -> Result<MutexGuard<'_, MemoryState>> {
        self.state
            .lock()
            .map_err(|_| VaultError::Storage("Memory store poisoned".to_string()))
    }
}

impl MetadataStore for MemoryStore {
    fn load(&self) -> Result<VaultMetadata> {
        self.lock_state()?
            .metadata
            .clone()
            .ok_or_else(|| VaultError::not_found("vault metadata"))
    }

    fn save(&self, metadata: &VaultMetadata) -> Result<()> {
        self.lock_state()?.metadata = Some(metadata.clone());
        Ok(())
    }

    fn exists(&self) -> Result<bool> {
        Ok(self.lock_state()?.metadata.is_some())
    }
}

impl RecordStore for MemoryStore {
    fn put(&self, record: &Record) -> Result<()> {
        self.lock_state()?
            .records
            .insert(record_key(record), record.clone());
        Ok(())
    }

    fn get(&self, category: &Category, id: &RecordId) -> Result<Record> {
        self.lock_state()?
            .records
            .get(&(category.clone(), id.clone()))
            .cloned()
            .ok_or_else(|| VaultError::not_found(format!("{} record {}", category, id)))
    }

    fn delete(&self, category: &Category, id: &RecordId) -> Result<()> {
        self.lock_state()?
            .records
            .remove(&(category.clone(), id.clone()))
            .map(|_| ())
            .ok_or_else(|| VaultError::not_found(format!("{} record {}", category, id)))
    }

    fn list(&self, category: Option<&Category>) -> Result<Vec<Record>> {
        let state = self.lock_state()?;
        let mut records: Vec<Record> = state
            .records
            .values()
            .filter(|record| category.map_or(true, |c| &record.category == c))
            .cloned()
            .collect();
        records.sort_by(list_order);
        Ok(records)
    }
}

impl VaultStore for MemoryStore {
    fn apply_batch(&self, batch: &WriteBatch) -> Result<()> {
        let mut state = self.lock_state()?;
        if let Some(metadata) = &batch.metadata {
            state.metadata = Some(metadata.clone());
        }
        if batch.replace_records {
            state.records.clear();
        }
        for record in &batch.records {
            state.records.insert(record_key(record), record.clone());
        }
        Ok(())
    }

    fn wipe(&self) -> Result<()> {
        let mut state = self.lock_state()?;
        state.metadata = None;
        state.records.clear();
        Ok(())
    }
}

fn record_key(record: &Record) -> (Category, RecordId) {
    (record.category.clone(), record.id.clone())
}
