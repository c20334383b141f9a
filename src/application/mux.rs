use super::guard::{ConnectionGuard, connect_locked};
use crate::domain::message::IsoMessage;
use crate::domain::ports::Channel;
use crate::error::{ChannelError, IsoError, Result};
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Pause between failed connect attempts.
pub const CONNECT_BACKOFF: Duration = Duration::from_millis(200);
/// Connect window used when the caller passes a non-positive deadline.
pub const DEFAULT_CONNECT_WINDOW: Duration = Duration::from_secs(5);
/// Largest read timeout a channel accepts, in milliseconds.
pub const MAX_CHANNEL_TIMEOUT_MS: i64 = i32::MAX as i64;

/// Maps a caller supplied timeout onto the channel's range.
///
/// Non-positive means no timeout; oversized values saturate at [`MAX_CHANNEL_TIMEOUT_MS`].
pub fn channel_timeout(timeout_ms: i64) -> Option<Duration> {
    if timeout_ms <= 0 {
        return None;
    }
    Some(Duration::from_millis(
        timeout_ms.min(MAX_CHANNEL_TIMEOUT_MS) as u64
    ))
}

/// Synchronous request/response on top of a single guarded channel.
///
/// One request is in flight at a time: the send and the matching receive run under the
/// guard's lock.
pub struct Multiplexer<C: Channel> {
    guard: ConnectionGuard<C>,
}

impl<C: Channel> Multiplexer<C> {
    pub fn new(channel: C) -> Self {
        Self {
            guard: ConnectionGuard::new(channel),
        }
    }

    /// Retries `ensure_connected` until it succeeds or `deadline_ms` elapses.
    ///
    /// Returns `Ok(false)` when the window closed without a connection and without any
    /// failed attempt to report; otherwise the last connect error is returned.
    pub async fn connect(&self, deadline_ms: i64) -> Result<bool> {
        let window = if deadline_ms <= 0 {
            DEFAULT_CONNECT_WINDOW
        } else {
            Duration::from_millis(deadline_ms as u64)
        };
        let deadline = Instant::now() + window;
        let mut last_error = None;

        while Instant::now() < deadline {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match tokio::time::timeout(remaining, self.guard.ensure_connected()).await {
                Ok(Ok(())) => return Ok(true),
                Ok(Err(IsoError::Connect(e))) if e.is_transient() => {
                    debug!(error = %e, "connect attempt failed, backing off");
                    last_error = Some(IsoError::Connect(e));
                    let pause = CONNECT_BACKOFF.min(deadline.saturating_duration_since(Instant::now()));
                    tokio::time::sleep(pause).await;
                }
                Ok(Err(e)) => return Err(e),
                Err(_) => break,
            }
        }

        if let Some(e) = last_error {
            return Err(e);
        }
        Ok(self.guard.is_connected().await)
    }

    /// Sends `message` and waits up to `timeout_ms` for one reply.
    ///
    /// `Ok(None)` means nothing arrived in time; the channel is then dropped so a late
    /// reply can never answer the next request. Other I/O failures are
    /// [`IsoError::Transport`].
    pub async fn request(&self, message: &IsoMessage, timeout_ms: i64) -> Result<Option<IsoMessage>> {
        let mut channel = self.guard.lock().await;
        connect_locked(&mut *channel).await?;
        channel.set_timeout(channel_timeout(timeout_ms));
        channel.send(message).await.map_err(IsoError::Transport)?;
        match channel.receive().await {
            Ok(response) => Ok(Some(response)),
            Err(ChannelError::Timeout(limit)) => {
                debug!(?limit, "no reply before timeout");
                if channel.is_connected()
                    && let Err(e) = channel.disconnect().await
                {
                    debug!(error = %e, "error dropping timed out channel");
                }
                Ok(None)
            }
            Err(e) => Err(IsoError::Transport(e)),
        }
    }

    /// Fire-and-forget send.
    pub async fn send(&self, message: &IsoMessage) -> Result<()> {
        self.guard.send(message).await
    }

    pub async fn is_connected(&self) -> bool {
        self.guard.is_connected().await
    }

    pub async fn close(&self) {
        self.guard.close().await;
    }
}
