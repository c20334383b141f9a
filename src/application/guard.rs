use crate::domain::message::IsoMessage;
use crate::domain::ports::Channel;
use crate::error::{IsoError, Result};
use tokio::sync::{Mutex, MutexGuard};
use tracing::warn;

/// Exclusive owner of one channel.
///
/// Every operation takes the same lock, so the check-then-connect in
/// [`ConnectionGuard::ensure_connected`] cannot race with a send or a close.
pub struct ConnectionGuard<C: Channel> {
    channel: Mutex<C>,
}

impl<C: Channel> ConnectionGuard<C> {
    pub fn new(channel: C) -> Self {
        Self {
            channel: Mutex::new(channel),
        }
    }

    /// Connects unless already connected. Exactly one attempt, no retry.
    pub async fn ensure_connected(&self) -> Result<()> {
        let mut channel = self.channel.lock().await;
        connect_locked(&mut *channel).await
    }

    pub async fn send(&self, message: &IsoMessage) -> Result<()> {
        let mut channel = self.channel.lock().await;
        connect_locked(&mut *channel).await?;
        channel.send(message).await.map_err(IsoError::Transport)
    }

    pub async fn is_connected(&self) -> bool {
        self.channel.lock().await.is_connected()
    }

    /// Disconnects if connected. Disconnect failures are logged and dropped.
    pub async fn close(&self) {
        let mut channel = self.channel.lock().await;
        if channel.is_connected()
            && let Err(e) = channel.disconnect().await
        {
            warn!(error = %e, "error disconnecting ISO channel");
        }
    }

    /// Holds the lock for a multi-step exchange.
    pub(crate) async fn lock(&self) -> MutexGuard<'_, C> {
        self.channel.lock().await
    }
}

pub(crate) async fn connect_locked<C: Channel>(channel: &mut C) -> Result<()> {
    if channel.is_connected() {
        return Ok(());
    }
    channel.connect().await.map_err(IsoError::Connect)
}
