//! SQLite storage backend.
//!
//! Envelopes are stored as BLOB columns next to their non-secret identity.
//! SQLite gives per-statement atomicity for single records and a transaction
//! for batches, so a crash mid-batch leaves the previous state intact.

mod row;

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;

use crate::error::{Result, VaultError};
use crate::storage::traits::{MetadataStore, RecordStore, VaultStore};
use crate::storage::types::{Category, Record, RecordId, VaultMetadata, WriteBatch};

use row::{MetadataRow, RecordRow};

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS vault_meta (
        id INTEGER PRIMARY KEY CHECK (id = 1),
        format_version INTEGER NOT NULL,
        salt BLOB NOT NULL,
        kdf_json TEXT NOT NULL,
        check_algorithm TEXT NOT NULL,
        check_nonce BLOB NOT NULL,
        check_ciphertext BLOB NOT NULL,
        created_at INTEGER NOT NULL
    );

    CREATE TABLE IF NOT EXISTS records (
        category TEXT NOT NULL,
        id TEXT NOT NULL,
        algorithm TEXT NOT NULL,
        nonce BLOB NOT NULL,
        ciphertext BLOB NOT NULL,
        last_modified INTEGER NOT NULL,
        PRIMARY KEY (category, id)
    );

    CREATE INDEX IF NOT EXISTS records_by_category
    ON records (category, last_modified DESC);
"#;

/// SQLite-backed vault store.
pub struct SqliteStore {
    path: Option<PathBuf>,
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) a store at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        Self::init(&conn)?;
        crate::fs::restrict_permissions(path)?;
        debug!(path = %path.display(), "opened sqlite vault store");

        Ok(Self {
            path: Some(path.to_path_buf()),
            conn: Mutex::new(conn),
        })
    }

    /// Open a store that lives only as long as this value.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init(&conn)?;
        Ok(Self {
            path: None,
            conn: Mutex::new(conn),
        })
    }

    /// Location on disk, if file-backed.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn init(conn: &Connection) -> Result<()> {
        conn.pragma_update(None, "synchronous", "FULL")?;
        conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    /// Lock the database connection, returning an error if the mutex is poisoned.
    fn lock_conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| VaultError::Storage("SQLite connection poisoned".to_string()))
    }

    fn upsert_metadata(conn: &Connection, metadata: &VaultMetadata) -> Result<()> {
        let kdf_json = serde_json::to_string(&metadata.kdf)?;
        conn.execute(
            "INSERT INTO vault_meta (id, format_version, salt, kdf_json, check_algorithm,
                                     check_nonce, check_ciphertext, created_at)
             VALUES (1, ?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(id) DO UPDATE SET
                format_version = excluded.format_version,
                salt = excluded.salt,
                kdf_json = excluded.kdf_json,
                check_algorithm = excluded.check_algorithm,
                check_nonce = excluded.check_nonce,
                check_ciphertext = excluded.check_ciphertext,
                created_at = excluded.created_at",
            params![
                metadata.format_version,
                metadata.salt,
                kdf_json,
                metadata.key_check.algorithm,
                metadata.key_check.nonce,
                metadata.key_check.ciphertext,
                metadata.created_at,
            ],
        )?;
        Ok(())
    }

    fn upsert_record(conn: &Connection, record: &Record) -> Result<()> {
        conn.execute(
            "INSERT INTO records (id, category, algorithm, nonce, ciphertext, last_modified)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(category, id) DO UPDATE SET
                algorithm = excluded.algorithm,
                nonce = excluded.nonce,
                ciphertext = excluded.ciphertext,
                last_modified = excluded.last_modified",
            params![
                record.id.as_str(),
                record.category.as_str(),
                record.envelope.algorithm,
                record.envelope.nonce,
                record.envelope.ciphertext,
                record.last_modified,
            ],
        )?;
        Ok(())
    }

    fn query_records(
        conn: &Connection,
        sql: &str,
        params: impl rusqlite::Params,
    ) -> Result<Vec<Record>> {
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map(params, RecordRow::from_row)?;

        let mut records = Vec::new();
        for row in rows {
            records.push(Record::try_from(row?)?);
        }
        Ok(records)
    }
}

impl MetadataStore for SqliteStore {
    fn load(&self) -> Result<VaultMetadata> {
        let conn = self.lock_conn()?;
        let row = conn
            .query_row(
                &format!("SELECT {} FROM vault_meta WHERE id = 1", MetadataRow::COLUMNS),
                [],
                MetadataRow::from_row,
            )
            .optional()?;

        match row {
            Some(row) => VaultMetadata::try_from(row),
            None => Err(VaultError::not_found("vault metadata")),
        }
    }

    fn save(&self, metadata: &VaultMetadata) -> Result<()> {
        let conn = self.lock_conn()?;
        Self::upsert_metadata(&conn, metadata)
    }

    fn exists(&self) -> Result<bool> {
        let conn = self.lock_conn()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM vault_meta", [], |row| row.get(0))?;
        Ok(count > 0)
    }
}

impl RecordStore for SqliteStore {
    fn put(&self, record: &Record) -> Result<()> {
        let conn = self.lock_conn()?;
        Self::upsert_record(&conn, record)
    }

    fn get(&self, category: &Category, id: &RecordId) -> Result<Record> {
        let conn = self.lock_conn()?;
        let row = conn
            .query_row(
                &format!(
                    "SELECT {} FROM records WHERE category = ?1 AND id = ?2",
                    RecordRow::COLUMNS
                ),
                [category.as_str(), id.as_str()],
                RecordRow::from_row,
            )
            .optional()?;

        match row {
            Some(row) => Record::try_from(row),
            None => Err(VaultError::not_found(format!("{} record {}", category, id))),
        }
    }

    fn delete(&self, category: &Category, id: &RecordId) -> Result<()> {
        let conn = self.lock_conn()?;
        let deleted = conn.execute(
            "DELETE FROM records WHERE category = ?1 AND id = ?2",
            [category.as_str(), id.as_str()],
        )?;
        if deleted == 0 {
            return Err(VaultError::not_found(format!("{} record {}", category, id)));
        }
        Ok(())
    }

    fn list(&self, category: Option<&Category>) -> Result<Vec<Record>> {
        let conn = self.lock_conn()?;
        match category {
            Some(category) => Self::query_records(
                &conn,
                &format!(
                    "SELECT {} FROM records WHERE category = ?1
                     ORDER BY last_modified DESC, id ASC, category ASC",
                    RecordRow::COLUMNS
                ),
                [category.as_str()],
            ),
            None => Self::query_records(
                &conn,
                &format!(
                    "SELECT {} FROM records ORDER BY last_modified DESC, id ASC, category ASC",
                    RecordRow::COLUMNS
                ),
                [],
            ),
        }
    }
}

impl VaultStore for SqliteStore {
    fn apply_batch(&self, batch: &WriteBatch) -> Result<()> {
        let mut conn = self.lock_conn()?;
        let tx = conn.transaction()?;

        if let Some(metadata) = &batch.metadata {
            Self::upsert_metadata(&tx, metadata)?;
        }
        if batch.replace_records {
            tx.execute("DELETE FROM records", [])?;
        }
        for record in &batch.records {
            Self::upsert_record(&tx, record)?;
        }

        tx.commit()?;
        debug!(
            records = batch.records.len(),
            replace = batch.replace_records,
            metadata = batch.metadata.is_some(),
            "committed write batch"
        );
        Ok(())
    }

    fn wipe(&self) -> Result<()> {
        let mut conn = self.lock_conn()?;
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM records", [])?;
        tx.execute("DELETE FROM vault_meta", [])?;
        tx.commit()?;
        Ok(())
    }
}
