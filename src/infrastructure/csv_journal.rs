use crate::domain::ports::TransactionJournal;
use crate::domain::transaction::TransactionRecord;
use crate::error::StoreError;
use async_trait::async_trait;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Append-only CSV journal.
///
/// The header row is written when the file is created; later opens append below it.
#[derive(Clone)]
pub struct CsvJournal {
    path: PathBuf,
    writer: Arc<Mutex<csv::Writer<File>>>,
}

impl CsvJournal {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let needs_header = std::fs::metadata(&path).map(|m| m.len() == 0).unwrap_or(true);
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let writer = csv::WriterBuilder::new()
            .has_headers(needs_header)
            .from_writer(file);
        Ok(Self {
            path,
            writer: Arc::new(Mutex::new(writer)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads every row back from disk.
    pub fn records(&self) -> Result<Vec<TransactionRecord>, StoreError> {
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_path(&self.path)?;
        let mut records = Vec::new();
        for row in reader.deserialize() {
            records.push(row?);
        }
        Ok(records)
    }
}

#[async_trait]
impl TransactionJournal for CsvJournal {
    async fn insert(&self, record: &TransactionRecord) -> Result<(), StoreError> {
        let mut writer = self.writer.lock().await;
        writer.serialize(record)?;
        writer.flush()?;
        Ok(())
    }
}
