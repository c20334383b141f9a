use crate::domain::ports::TransactionJournal;
use crate::domain::transaction::TransactionRecord;
use crate::error::StoreError;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

/// A thread-safe in-memory transaction journal.
///
/// Uses `Arc<RwLock<Vec<TransactionRecord>>>` so clones share the same rows.
/// Used when no persistent backend is configured, and by the tests.
#[derive(Default, Clone)]
pub struct InMemoryJournal {
    records: Arc<RwLock<Vec<TransactionRecord>>>,
}

impl InMemoryJournal {
    /// Creates a new, empty in-memory journal.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every inserted row, in insertion order.
    pub async fn records(&self) -> Vec<TransactionRecord> {
        self.records.read().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl TransactionJournal for InMemoryJournal {
    async fn insert(&self, record: &TransactionRecord) -> Result<(), StoreError> {
        let mut records = self.records.write().await;
        records.push(record.clone());
        Ok(())
    }
}
