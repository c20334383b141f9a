//! Concrete adapters for the domain ports: the TCP channel, the ASCII packager and the
//! journal backends.

pub mod channel;
pub mod csv_journal;
pub mod in_memory;
pub mod packager;
pub mod pool;
#[cfg(feature = "storage-rocksdb")]
pub mod rocksdb;
