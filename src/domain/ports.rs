use super::message::{IsoMessage, MessageError};
use super::transaction::TransactionRecord;
use crate::error::{ChannelError, StoreError};
use async_trait::async_trait;
use std::time::Duration;

/// Wire codec between packed bytes and an [`IsoMessage`].
pub trait Packager: Send + Sync {
    fn pack(&self, message: &IsoMessage) -> Result<Vec<u8>, MessageError>;
    fn unpack(&self, bytes: &[u8]) -> Result<IsoMessage, MessageError>;
}

/// A single point-to-point message transport.
///
/// `receive` must report an expired read timeout as [`ChannelError::Timeout`] so callers can
/// tell "no answer yet" apart from a broken connection.
#[async_trait]
pub trait Channel: Send {
    async fn connect(&mut self) -> Result<(), ChannelError>;
    async fn disconnect(&mut self) -> Result<(), ChannelError>;
    fn is_connected(&self) -> bool;
    async fn send(&mut self, message: &IsoMessage) -> Result<(), ChannelError>;
    async fn receive(&mut self) -> Result<IsoMessage, ChannelError>;
    /// `None` disables the read timeout.
    fn set_timeout(&mut self, timeout: Option<Duration>);
}

/// Append-only sink for authorized transactions.
#[async_trait]
pub trait TransactionJournal: Send + Sync {
    async fn insert(&self, record: &TransactionRecord) -> Result<(), StoreError>;
}

pub type JournalBox = Box<dyn TransactionJournal>;
