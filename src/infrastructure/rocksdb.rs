use crate::domain::ports::TransactionJournal;
use crate::domain::transaction::TransactionRecord;
use crate::error::StoreError;
use async_trait::async_trait;
use rocksdb::{ColumnFamilyDescriptor, DB, Options};
use std::path::Path;
use std::sync::Arc;

/// Column Family holding one JSON row per authorized transaction.
pub const CF_TRANSACTIONS: &str = "iso_transactions";

/// A persistent journal backed by RocksDB.
///
/// Rows are keyed by the big-endian pipeline transaction id, so iteration follows
/// arrival order within one server run.
///
/// This struct is thread-safe (`Clone` shares the underlying `Arc<DB>`).
#[derive(Clone)]
pub struct RocksDbJournal {
    db: Arc<DB>,
}

impl RocksDbJournal {
    /// Opens or creates a RocksDB instance at the specified path.
    ///
    /// Ensures that the transactions column family exists.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf = ColumnFamilyDescriptor::new(CF_TRANSACTIONS, Options::default());
        let db = DB::open_cf_descriptors(&opts, path, vec![cf])?;

        Ok(Self { db: Arc::new(db) })
    }

    /// Reads back every stored row.
    pub fn records(&self) -> Result<Vec<TransactionRecord>, StoreError> {
        let cf = self.db.cf_handle(CF_TRANSACTIONS).ok_or_else(|| {
            StoreError::Internal("Transactions column family not found".to_string())
        })?;

        let mut records = Vec::new();
        for item in self.db.iterator_cf(&cf, rocksdb::IteratorMode::Start) {
            let (_key, value) = item?;
            records.push(serde_json::from_slice(&value)?);
        }
        Ok(records)
    }
}

#[async_trait]
impl TransactionJournal for RocksDbJournal {
    async fn insert(&self, record: &TransactionRecord) -> Result<(), StoreError> {
        let cf = self.db.cf_handle(CF_TRANSACTIONS).ok_or_else(|| {
            StoreError::Internal("Transactions column family not found".to_string())
        })?;

        let key = record.id.to_be_bytes();
        let value = serde_json::to_vec(record)?;
        self.db.put_cf(&cf, key, value)?;

        Ok(())
    }
}
