//! Encrypted record storage.
//!
//! - **traits**: the storage contract (`MetadataStore`, `RecordStore`, `VaultStore`)
//! - **types**: records, categories, metadata, write batches
//! - **sqlite**: file-backed SQLite implementation
//! - **memory**: in-process implementation

pub mod memory;
pub mod sqlite;
pub mod traits;
pub mod types;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use traits::{MetadataStore, RecordStore, VaultStore};
pub use types::{Category, Record, RecordId, VaultMetadata, WriteBatch, FORMAT_VERSION};
