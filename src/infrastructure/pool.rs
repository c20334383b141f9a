use crate::domain::ports::TransactionJournal;
use crate::error::StoreError;
use std::ops::Deref;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::info;

pub const DEFAULT_MAX_POOL: usize = 10;
pub const DEFAULT_CONNECTION_TIMEOUT: Duration = Duration::from_millis(30_000);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolConfig {
    pub max_size: usize,
    /// How long `acquire` waits for a free connection.
    pub connection_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_size: DEFAULT_MAX_POOL,
            connection_timeout: DEFAULT_CONNECTION_TIMEOUT,
        }
    }
}

/// Bounded access to a shared journal backend.
///
/// At most `max_size` callers hold a [`PooledJournal`] at once; the slot is returned when
/// the handle is dropped.
#[derive(Clone)]
pub struct JournalPool {
    journal: Arc<dyn TransactionJournal>,
    permits: Arc<Semaphore>,
    config: PoolConfig,
}

/// A checked-out journal connection.
pub struct PooledJournal {
    journal: Arc<dyn TransactionJournal>,
    _permit: OwnedSemaphorePermit,
}

impl Deref for PooledJournal {
    type Target = dyn TransactionJournal;

    fn deref(&self) -> &Self::Target {
        self.journal.as_ref()
    }
}

impl JournalPool {
    pub fn new(journal: Arc<dyn TransactionJournal>, config: PoolConfig) -> Self {
        let config = PoolConfig {
            max_size: config.max_size.max(1),
            ..config
        };
        info!(
            max_size = config.max_size,
            connection_timeout_ms = config.connection_timeout.as_millis() as u64,
            "initialised journal pool"
        );
        Self {
            journal,
            permits: Arc::new(Semaphore::new(config.max_size)),
            config,
        }
    }

    pub async fn acquire(&self) -> Result<PooledJournal, StoreError> {
        let permit = tokio::time::timeout(
            self.config.connection_timeout,
            self.permits.clone().acquire_owned(),
        )
        .await
        .map_err(|_| StoreError::PoolTimeout(self.config.connection_timeout))?
        .map_err(|_| StoreError::PoolClosed)?;
        Ok(PooledJournal {
            journal: self.journal.clone(),
            _permit: permit,
        })
    }

    /// Free connection slots.
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    pub fn config(&self) -> PoolConfig {
        self.config
    }

    /// Refuses further checkouts. Connections already handed out stay valid.
    pub fn close(&self) {
        if !self.permits.is_closed() {
            info!("shutting down journal pool");
            self.permits.close();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::in_memory::InMemoryJournal;

    fn pool(max_size: usize, timeout_ms: u64) -> JournalPool {
        JournalPool::new(
            Arc::new(InMemoryJournal::new()),
            PoolConfig {
                max_size,
                connection_timeout: Duration::from_millis(timeout_ms),
            },
        )
    }

    #[tokio::test]
    async fn test_permit_released_on_drop() {
        let pool = pool(1, 50);
        {
            let _conn = pool.acquire().await.unwrap();
            assert_eq!(pool.available(), 0);
        }
        assert_eq!(pool.available(), 1);
        assert!(pool.acquire().await.is_ok());
    }

    #[tokio::test]
    async fn test_acquire_times_out_when_exhausted() {
        let pool = pool(1, 20);
        let _held = pool.acquire().await.unwrap();
        let err = pool.acquire().await.err().unwrap();
        assert!(matches!(err, StoreError::PoolTimeout(_)));
    }

    #[tokio::test]
    async fn test_closed_pool_refuses_checkout() {
        let pool = pool(2, 20);
        pool.close();
        assert!(matches!(
            pool.acquire().await.err().unwrap(),
            StoreError::PoolClosed
        ));
    }

    #[test]
    fn test_zero_size_is_clamped() {
        assert_eq!(pool(0, 10).config().max_size, 1);
    }
}
