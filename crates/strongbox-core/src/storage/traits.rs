//! Storage trait definitions.
//!
//! The datastore is untrusted: it only ever sees envelopes and non-secret
//! metadata. These traits let the engine run over SQLite, memory, or any other
//! backend that offers per-key atomic writes.

use super::types::{Category, Record, RecordId, VaultMetadata, WriteBatch};
use crate::error::Result;

/// Holds the single bootstrap record of a vault.
pub trait MetadataStore: Send + Sync {
    /// Load the vault metadata.
    ///
    /// # Errors
    ///
    /// Returns `VaultError::NotFound` if the vault has not been initialized.
    fn load(&self) -> Result<VaultMetadata>;

    /// Store the metadata atomically, replacing any previous value.
    fn save(&self, metadata: &VaultMetadata) -> Result<()>;

    /// Whether metadata has been stored.
    fn exists(&self) -> Result<bool>;
}

/// Persists encrypted records, keyed by `(category, id)`.
///
/// Implementations must ensure:
/// - Each write is atomic per record
/// - Listings are ordered by `last_modified` descending, then id ascending,
///   then category name ascending
/// - Plaintext never reaches the store
pub trait RecordStore: Send + Sync {
    /// Insert or replace the record with this category and id.
    fn put(&self, record: &Record) -> Result<()>;

    /// Get the record `id` in `category`.
    ///
    /// # Errors
    ///
    /// Returns `VaultError::NotFound` if no such record exists.
    fn get(&self, category: &Category, id: &RecordId) -> Result<Record>;

    /// Permanently delete the record `id` in `category`.
    ///
    /// # Errors
    ///
    /// Returns `VaultError::NotFound` if no such record exists.
    fn delete(&self, category: &Category, id: &RecordId) -> Result<()>;

    /// List records, optionally restricted to one category (exact match).
    fn list(&self, category: Option<&Category>) -> Result<Vec<Record>>;

    /// List every record.
    fn list_all(&self) -> Result<Vec<Record>> {
        self.list(None)
    }
}

/// A complete vault datastore with multi-record commits.
pub trait VaultStore: MetadataStore + RecordStore {
    /// Apply every write in `batch` atomically. On error nothing is applied.
    fn apply_batch(&self, batch: &WriteBatch) -> Result<()>;

    /// Remove metadata and every record.
    fn wipe(&self) -> Result<()>;
}
