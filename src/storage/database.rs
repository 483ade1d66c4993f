// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Embedded platform database backed by redb (pure Rust, ACID).
//!
//! ## Table Layout
//!
//! - `credentials`, `otps`, `merchants`, `detonators`, `products`,
//!   `campaigns`, `orders`: id → serialized row (JSON bytes)
//! - `credential_emails`, `credential_phones`: unique key → credential id
//! - `latest_otp`: email → id of the most recent passcode
//! - `merchant_by_credential`, `detonator_by_credential`: credential id → row id
//! - `sequences`: table name → last allocated id
//!
//! Every mutation goes through a [`WriteTxn`]. Dropping it without
//! [`WriteTxn::commit`] discards all of its writes.

use std::path::Path;

use redb::{ReadableDatabase, ReadableTable, TableDefinition, TableHandle};
use serde::{de::DeserializeOwned, Serialize};

// =============================================================================
// Table Definitions
// =============================================================================

/// Rows keyed by numeric id, stored as JSON bytes.
pub type JsonTable = TableDefinition<'static, u64, &'static [u8]>;
/// Unique string key → row id.
pub type IndexTable = TableDefinition<'static, &'static str, u64>;
/// Row id → row id.
pub type LinkTable = TableDefinition<'static, u64, u64>;

pub const CREDENTIALS: JsonTable = TableDefinition::new("credentials");
pub const CREDENTIAL_EMAILS: IndexTable = TableDefinition::new("credential_emails");
pub const CREDENTIAL_PHONES: IndexTable = TableDefinition::new("credential_phones");

pub const OTPS: JsonTable = TableDefinition::new("otps");
pub const LATEST_OTP: IndexTable = TableDefinition::new("latest_otp");

pub const MERCHANTS: JsonTable = TableDefinition::new("merchants");
pub const MERCHANT_BY_CREDENTIAL: LinkTable = TableDefinition::new("merchant_by_credential");

pub const DETONATORS: JsonTable = TableDefinition::new("detonators");
pub const DETONATOR_BY_CREDENTIAL: LinkTable = TableDefinition::new("detonator_by_credential");

pub const PRODUCTS: JsonTable = TableDefinition::new("products");
pub const CAMPAIGNS: JsonTable = TableDefinition::new("campaigns");
pub const ORDERS: JsonTable = TableDefinition::new("orders");

const SEQUENCES: IndexTable = TableDefinition::new("sequences");

const JSON_TABLES: [JsonTable; 7] = [
    CREDENTIALS,
    OTPS,
    MERCHANTS,
    DETONATORS,
    PRODUCTS,
    CAMPAIGNS,
    ORDERS,
];
const INDEX_TABLES: [IndexTable; 4] = [CREDENTIAL_EMAILS, CREDENTIAL_PHONES, LATEST_OTP, SEQUENCES];
const LINK_TABLES: [LinkTable; 2] = [MERCHANT_BY_CREDENTIAL, DETONATOR_BY_CREDENTIAL];

// =============================================================================
// Error Type
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("redb error: {0}")]
    Redb(#[from] redb::Error),

    #[error("redb database error: {0}")]
    RedbDatabase(#[from] redb::DatabaseError),

    #[error("redb transaction error: {0}")]
    RedbTransaction(#[from] redb::TransactionError),

    #[error("redb table error: {0}")]
    RedbTable(#[from] redb::TableError),

    #[error("redb storage error: {0}")]
    RedbStorage(#[from] redb::StorageError),

    #[error("redb commit error: {0}")]
    RedbCommit(#[from] redb::CommitError),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("failed to prepare data directory: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0} not found")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Turn a missing row into [`StoreError::NotFound`].
pub fn require<T>(row: Option<T>, what: impl std::fmt::Display) -> StoreResult<T> {
    row.ok_or_else(|| StoreError::NotFound(what.to_string()))
}

// =============================================================================
// Table helpers shared by read and write transactions
// =============================================================================

fn load_json<T: DeserializeOwned>(
    table: &impl ReadableTable<u64, &'static [u8]>,
    id: u64,
) -> StoreResult<Option<T>> {
    match table.get(id)? {
        Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
        None => Ok(None),
    }
}

fn load_index(table: &impl ReadableTable<&'static str, u64>, key: &str) -> StoreResult<Option<u64>> {
    Ok(table.get(key)?.map(|v| v.value()))
}

fn load_link(table: &impl ReadableTable<u64, u64>, key: u64) -> StoreResult<Option<u64>> {
    Ok(table.get(key)?.map(|v| v.value()))
}

/// All rows, highest id (newest) first.
fn scan_desc<T: DeserializeOwned>(
    table: &impl ReadableTable<u64, &'static [u8]>,
) -> StoreResult<Vec<T>> {
    let mut rows = Vec::new();
    for entry in table.iter()?.rev() {
        let (_, value) = entry?;
        rows.push(serde_json::from_slice(value.value())?);
    }
    Ok(rows)
}

/// Read access shared by [`ReadTxn`] and [`WriteTxn`].
///
/// A write transaction observes its own uncommitted writes, so repositories
/// can run their lookups through either.
pub trait StoreRead {
    fn get_json<T: DeserializeOwned>(&self, table: JsonTable, id: u64) -> StoreResult<Option<T>>;
    fn index_get(&self, table: IndexTable, key: &str) -> StoreResult<Option<u64>>;
    fn link_get(&self, table: LinkTable, key: u64) -> StoreResult<Option<u64>>;
    fn scan_json<T: DeserializeOwned>(&self, table: JsonTable) -> StoreResult<Vec<T>>;
}

// =============================================================================
// Database
// =============================================================================

/// Embedded ACID platform database.
pub struct Database {
    db: redb::Database,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database").finish_non_exhaustive()
    }
}

impl Database {
    /// Open (or create) the database at the given path.
    pub fn open(path: &Path) -> StoreResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let db = redb::Database::create(path)?;

        // Pre-create all tables so later read transactions don't fail
        let write_txn = db.begin_write()?;
        {
            for table in JSON_TABLES {
                write_txn.open_table(table)?;
            }
            for table in INDEX_TABLES {
                write_txn.open_table(table)?;
            }
            for table in LINK_TABLES {
                write_txn.open_table(table)?;
            }
        }
        write_txn.commit()?;

        Ok(Self { db })
    }

    /// Start a write transaction. Only one is active at a time.
    pub fn begin_write(&self) -> StoreResult<WriteTxn> {
        Ok(WriteTxn {
            inner: self.db.begin_write()?,
        })
    }

    /// Start a read transaction over a consistent snapshot.
    pub fn begin_read(&self) -> StoreResult<ReadTxn> {
        Ok(ReadTxn {
            inner: self.db.begin_read()?,
        })
    }

    /// Readiness probe: open a snapshot and touch the credential table.
    pub fn health_check(&self) -> StoreResult<()> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(CREDENTIALS)?;
        table.first()?;
        Ok(())
    }
}

// =============================================================================
// Transactions
// =============================================================================

/// Read-only snapshot.
pub struct ReadTxn {
    inner: redb::ReadTransaction,
}

impl StoreRead for ReadTxn {
    fn get_json<T: DeserializeOwned>(&self, table: JsonTable, id: u64) -> StoreResult<Option<T>> {
        load_json(&self.inner.open_table(table)?, id)
    }

    fn index_get(&self, table: IndexTable, key: &str) -> StoreResult<Option<u64>> {
        load_index(&self.inner.open_table(table)?, key)
    }

    fn link_get(&self, table: LinkTable, key: u64) -> StoreResult<Option<u64>> {
        load_link(&self.inner.open_table(table)?, key)
    }

    fn scan_json<T: DeserializeOwned>(&self, table: JsonTable) -> StoreResult<Vec<T>> {
        scan_desc(&self.inner.open_table(table)?)
    }
}

/// All-or-nothing write transaction.
pub struct WriteTxn {
    inner: redb::WriteTransaction,
}

impl WriteTxn {
    /// Make every write of this transaction durable and visible.
    pub fn commit(self) -> StoreResult<()> {
        self.inner.commit()?;
        Ok(())
    }

    /// Allocate the next id for `table` (ids start at 1).
    pub fn next_id(&self, table: JsonTable) -> StoreResult<u64> {
        let name = table.name();
        let mut sequences = self.inner.open_table(SEQUENCES)?;
        let next = sequences.get(name)?.map(|v| v.value()).unwrap_or(0) + 1;
        sequences.insert(name, next)?;
        Ok(next)
    }

    pub fn put_json<T: Serialize>(&self, table: JsonTable, id: u64, row: &T) -> StoreResult<()> {
        let json = serde_json::to_vec(row)?;
        let mut table = self.inner.open_table(table)?;
        table.insert(id, json.as_slice())?;
        Ok(())
    }

    pub fn remove_json(&self, table: JsonTable, id: u64) -> StoreResult<()> {
        let mut table = self.inner.open_table(table)?;
        table.remove(id)?;
        Ok(())
    }

    pub fn index_put(&self, table: IndexTable, key: &str, id: u64) -> StoreResult<()> {
        let mut table = self.inner.open_table(table)?;
        table.insert(key, id)?;
        Ok(())
    }

    pub fn index_remove(&self, table: IndexTable, key: &str) -> StoreResult<()> {
        let mut table = self.inner.open_table(table)?;
        table.remove(key)?;
        Ok(())
    }

    pub fn link_put(&self, table: LinkTable, key: u64, id: u64) -> StoreResult<()> {
        let mut table = self.inner.open_table(table)?;
        table.insert(key, id)?;
        Ok(())
    }
}

impl StoreRead for WriteTxn {
    fn get_json<T: DeserializeOwned>(&self, table: JsonTable, id: u64) -> StoreResult<Option<T>> {
        load_json(&self.inner.open_table(table)?, id)
    }

    fn index_get(&self, table: IndexTable, key: &str) -> StoreResult<Option<u64>> {
        load_index(&self.inner.open_table(table)?, key)
    }

    fn link_get(&self, table: LinkTable, key: u64) -> StoreResult<Option<u64>> {
        load_link(&self.inner.open_table(table)?, key)
    }

    fn scan_json<T: DeserializeOwned>(&self, table: JsonTable) -> StoreResult<Vec<T>> {
        scan_desc(&self.inner.open_table(table)?)
    }
}

/// Fresh database in a temporary directory. The directory must outlive the database.
#[cfg(test)]
pub(crate) fn open_temp() -> (tempfile::TempDir, Database) {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::open(&dir.path().join("platform.redb")).unwrap();
    (dir, db)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Row {
        id: u64,
        name: String,
    }

    #[test]
    fn open_creates_tables() {
        let (_dir, db) = open_temp();
        let read = db.begin_read().unwrap();
        assert!(read.scan_json::<Row>(CREDENTIALS).unwrap().is_empty());
        assert_eq!(read.index_get(CREDENTIAL_EMAILS, "a@x.com").unwrap(), None);
        db.health_check().unwrap();
    }

    #[test]
    fn reopen_keeps_committed_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("platform.redb");
        {
            let db = Database::open(&path).unwrap();
            let txn = db.begin_write().unwrap();
            txn.put_json(CAMPAIGNS, 1, &Row { id: 1, name: "a".into() }).unwrap();
            txn.commit().unwrap();
        }
        let db = Database::open(&path).unwrap();
        let read = db.begin_read().unwrap();
        let row: Option<Row> = read.get_json(CAMPAIGNS, 1).unwrap();
        assert_eq!(row.unwrap().name, "a");
    }

    #[test]
    fn sequences_are_per_table() {
        let (_dir, db) = open_temp();
        let txn = db.begin_write().unwrap();
        assert_eq!(txn.next_id(CREDENTIALS).unwrap(), 1);
        assert_eq!(txn.next_id(CREDENTIALS).unwrap(), 2);
        assert_eq!(txn.next_id(MERCHANTS).unwrap(), 1);
        txn.commit().unwrap();

        let txn = db.begin_write().unwrap();
        assert_eq!(txn.next_id(CREDENTIALS).unwrap(), 3);
    }

    #[test]
    fn dropped_transaction_rolls_back() {
        let (_dir, db) = open_temp();
        {
            let txn = db.begin_write().unwrap();
            txn.put_json(PRODUCTS, 1, &Row { id: 1, name: "x".into() }).unwrap();
            txn.index_put(CREDENTIAL_EMAILS, "a@x.com", 1).unwrap();
        }
        let read = db.begin_read().unwrap();
        assert_eq!(read.get_json::<Row>(PRODUCTS, 1).unwrap(), None);
        assert_eq!(read.index_get(CREDENTIAL_EMAILS, "a@x.com").unwrap(), None);
    }

    #[test]
    fn write_txn_sees_its_own_writes() {
        let (_dir, db) = open_temp();
        let txn = db.begin_write().unwrap();
        txn.index_put(LATEST_OTP, "a@x.com", 3).unwrap();
        assert_eq!(txn.index_get(LATEST_OTP, "a@x.com").unwrap(), Some(3));
        txn.index_remove(LATEST_OTP, "a@x.com").unwrap();
        assert_eq!(txn.index_get(LATEST_OTP, "a@x.com").unwrap(), None);
    }

    #[test]
    fn scan_returns_newest_first() {
        let (_dir, db) = open_temp();
        let txn = db.begin_write().unwrap();
        for id in 1..=3 {
            txn.put_json(ORDERS, id, &Row { id, name: format!("r{id}") }).unwrap();
        }
        txn.commit().unwrap();

        let rows: Vec<Row> = db.begin_read().unwrap().scan_json(ORDERS).unwrap();
        let ids: Vec<u64> = rows.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![3, 2, 1]);
    }

    #[test]
    fn require_maps_missing_rows() {
        assert!(matches!(
            require::<u8>(None, "Merchant 4"),
            Err(StoreError::NotFound(what)) if what == "Merchant 4"
        ));
        assert_eq!(require(Some(1u8), "x").unwrap(), 1);
    }
}
