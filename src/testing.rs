//! In-process channel double for unit tests.

use crate::domain::message::IsoMessage;
use crate::domain::ports::Channel;
use crate::error::ChannelError;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Scripted answer for the next `receive`.
pub enum Reply {
    Message(IsoMessage),
    Timeout,
    Fail(io::ErrorKind),
}

#[derive(Default)]
pub struct ChannelStats {
    connect_calls: AtomicUsize,
    disconnect_calls: AtomicUsize,
    sent: Mutex<Vec<IsoMessage>>,
    timeouts: Mutex<Vec<Option<Duration>>>,
}

impl ChannelStats {
    pub fn connect_calls(&self) -> usize {
        self.connect_calls.load(Ordering::SeqCst)
    }

    pub fn disconnect_calls(&self) -> usize {
        self.disconnect_calls.load(Ordering::SeqCst)
    }

    pub fn sent(&self) -> Vec<IsoMessage> {
        self.sent.lock().unwrap().clone()
    }

    pub fn timeouts(&self) -> Vec<Option<Duration>> {
        self.timeouts.lock().unwrap().clone()
    }
}

pub struct ScriptedChannel {
    connected: bool,
    failing_connects: usize,
    connect_error: fn() -> ChannelError,
    hang_connects: bool,
    fail_disconnect: bool,
    replies: VecDeque<Reply>,
    timeout: Option<Duration>,
    stats: Arc<ChannelStats>,
}

fn refused() -> ChannelError {
    ChannelError::Io(io::Error::from(io::ErrorKind::ConnectionRefused))
}

impl ScriptedChannel {
    pub fn new() -> Self {
        Self {
            connected: false,
            failing_connects: 0,
            connect_error: refused,
            hang_connects: false,
            fail_disconnect: false,
            replies: VecDeque::new(),
            timeout: None,
            stats: Arc::new(ChannelStats::default()),
        }
    }

    /// The first `n` connects fail with "connection refused".
    pub fn refuse_connects(mut self, n: usize) -> Self {
        self.failing_connects = n;
        self
    }

    /// Every connect fails with the given error.
    pub fn connect_error(mut self, error: fn() -> ChannelError) -> Self {
        self.failing_connects = usize::MAX;
        self.connect_error = error;
        self
    }

    /// Every connect stays pending, like a host that drops SYNs.
    pub fn hang_connects(mut self) -> Self {
        self.hang_connects = true;
        self
    }

    pub fn fail_disconnect(mut self) -> Self {
        self.fail_disconnect = true;
        self
    }

    pub fn reply(mut self, reply: Reply) -> Self {
        self.replies.push_back(reply);
        self
    }

    pub fn stats(&self) -> Arc<ChannelStats> {
        self.stats.clone()
    }
}

#[async_trait]
impl Channel for ScriptedChannel {
    async fn connect(&mut self) -> Result<(), ChannelError> {
        self.stats.connect_calls.fetch_add(1, Ordering::SeqCst);
        if self.hang_connects {
            std::future::pending::<()>().await;
        }
        if self.failing_connects > 0 {
            self.failing_connects = self.failing_connects.saturating_sub(1);
            return Err((self.connect_error)());
        }
        self.connected = true;
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), ChannelError> {
        self.stats.disconnect_calls.fetch_add(1, Ordering::SeqCst);
        self.connected = false;
        if self.fail_disconnect {
            return Err(ChannelError::Io(io::Error::from(io::ErrorKind::BrokenPipe)));
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    async fn send(&mut self, message: &IsoMessage) -> Result<(), ChannelError> {
        if !self.connected {
            return Err(ChannelError::NotConnected);
        }
        self.stats.sent.lock().unwrap().push(message.clone());
        self.stats.timeouts.lock().unwrap().push(self.timeout);
        Ok(())
    }

    async fn receive(&mut self) -> Result<IsoMessage, ChannelError> {
        match self.replies.pop_front() {
            Some(Reply::Message(message)) => Ok(message),
            Some(Reply::Fail(kind)) => Err(ChannelError::Io(io::Error::from(kind))),
            Some(Reply::Timeout) | None => Err(ChannelError::Timeout(
                self.timeout.unwrap_or(Duration::ZERO),
            )),
        }
    }

    fn set_timeout(&mut self, timeout: Option<Duration>) {
        self.timeout = timeout;
    }
}
