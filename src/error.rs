use crate::domain::message::MessageError;
use std::io;
use std::time::Duration;
use thiserror::Error;

/// Failures raised by a transport channel.
#[derive(Error, Debug)]
pub enum ChannelError {
    #[error("unable to resolve host {host}: {source}")]
    Resolve {
        host: String,
        #[source]
        source: io::Error,
    },
    #[error("no address found for host {0}")]
    NoAddress(String),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("no message received within {0:?}")]
    Timeout(Duration),
    #[error("channel is not connected")]
    NotConnected,
    #[error("peer closed the connection")]
    Closed,
    #[error("frame of {0} bytes exceeds the channel limit")]
    FrameTooLarge(usize),
    #[error("codec error: {0}")]
    Codec(#[from] MessageError),
}

impl ChannelError {
    /// Errors that may clear up on a later connect attempt.
    pub fn is_transient(&self) -> bool {
        match self {
            ChannelError::Resolve { .. }
            | ChannelError::NoAddress(_)
            | ChannelError::Timeout(_)
            | ChannelError::Closed => true,
            ChannelError::Io(e) => !matches!(
                e.kind(),
                io::ErrorKind::InvalidInput | io::ErrorKind::PermissionDenied
            ),
            _ => false,
        }
    }
}

/// Failures of the transaction journal and its pool.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("timed out after {0:?} waiting for a journal connection")]
    PoolTimeout(Duration),
    #[error("journal pool is closed")]
    PoolClosed,
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[cfg(feature = "storage-rocksdb")]
    #[error("RocksDB error: {0}")]
    RocksDb(#[from] rocksdb::Error),
    #[error("journal error: {0}")]
    Internal(String),
}

#[derive(Error, Debug)]
pub enum IsoError {
    #[error("connect error: {0}")]
    Connect(#[source] ChannelError),
    #[error("transport error: {0}")]
    Transport(#[source] ChannelError),
    #[error("Unable to connect to ISO host {host}:{port}")]
    ConnectDeadline { host: String, port: u16 },
    #[error("Unable to connect to any configured ISO server host {hosts:?}")]
    HostsExhausted {
        hosts: Vec<String>,
        #[source]
        source: Box<IsoError>,
    },
    #[error("context corruption: {0}")]
    ContextCorruption(String),
    #[error("message error: {0}")]
    Message(#[from] MessageError),
    #[error("persistence failure: {0}")]
    Store(#[from] StoreError),
    #[error("Missing required configuration value: {0}")]
    MissingConfig(String),
    #[error("invalid configuration value for {key}: {reason}")]
    InvalidConfig { key: String, reason: String },
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, IsoError>;
