use crate::domain::message::IsoMessage;
use crate::domain::ports::{Channel, Packager};
use crate::error::ChannelError;
use async_trait::async_trait;
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpStream, lookup_host};
use tracing::debug;

/// Length header: four ASCII decimal digits.
pub const HEADER_LEN: usize = 4;
/// Largest body a four digit header can describe.
pub const MAX_FRAME_LEN: usize = 9999;

/// TCP channel framing each packed message behind a 4-digit ASCII length header.
pub struct AsciiChannel {
    host: String,
    port: u16,
    packager: Arc<dyn Packager>,
    stream: Option<TcpStream>,
    timeout: Option<Duration>,
}

impl AsciiChannel {
    /// Creates an unconnected client channel for `host:port`.
    pub fn new(host: impl Into<String>, port: u16, packager: Arc<dyn Packager>) -> Self {
        Self {
            host: host.into(),
            port,
            packager,
            stream: None,
            timeout: None,
        }
    }

    /// Wraps a socket accepted by a listener.
    pub fn from_stream(stream: TcpStream, packager: Arc<dyn Packager>) -> Self {
        let (host, port) = stream
            .peer_addr()
            .map(|addr| (addr.ip().to_string(), addr.port()))
            .unwrap_or_else(|_| ("unknown".to_string(), 0));
        Self {
            host,
            port,
            packager,
            stream: Some(stream),
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[async_trait]
impl Channel for AsciiChannel {
    async fn connect(&mut self) -> Result<(), ChannelError> {
        let addrs = lookup_host((self.host.as_str(), self.port))
            .await
            .map_err(|source| ChannelError::Resolve {
                host: self.host.clone(),
                source,
            })?;

        let mut last_error = None;
        for addr in addrs {
            match TcpStream::connect(addr).await {
                Ok(stream) => {
                    stream.set_nodelay(true)?;
                    debug!(endpoint = %self.endpoint(), %addr, "channel connected");
                    self.stream = Some(stream);
                    return Ok(());
                }
                Err(e) => last_error = Some(e),
            }
        }
        match last_error {
            Some(e) => Err(ChannelError::Io(e)),
            None => Err(ChannelError::NoAddress(self.host.clone())),
        }
    }

    async fn disconnect(&mut self) -> Result<(), ChannelError> {
        if let Some(mut stream) = self.stream.take() {
            stream.shutdown().await?;
            debug!(endpoint = %self.endpoint(), "channel disconnected");
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    async fn send(&mut self, message: &IsoMessage) -> Result<(), ChannelError> {
        let body = self.packager.pack(message)?;
        if body.len() > MAX_FRAME_LEN {
            return Err(ChannelError::FrameTooLarge(body.len()));
        }
        let stream = self.stream.as_mut().ok_or(ChannelError::NotConnected)?;
        let mut frame = Vec::with_capacity(HEADER_LEN + body.len());
        frame.extend_from_slice(format!("{:04}", body.len()).as_bytes());
        frame.extend_from_slice(&body);
        if let Err(e) = write_frame(stream, &frame).await {
            self.stream = None;
            return Err(ChannelError::Io(e));
        }
        Ok(())
    }

    async fn receive(&mut self) -> Result<IsoMessage, ChannelError> {
        let stream = self.stream.as_mut().ok_or(ChannelError::NotConnected)?;
        let frame = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, read_frame(stream))
                .await
                .unwrap_or(Err(ChannelError::Timeout(limit))),
            None => read_frame(stream).await,
        };
        match frame {
            Ok(body) => Ok(self.packager.unpack(&body)?),
            // A late reply or a half-read frame would desync the next exchange.
            Err(e) => {
                self.stream = None;
                Err(e)
            }
        }
    }

    fn set_timeout(&mut self, timeout: Option<Duration>) {
        self.timeout = timeout;
    }
}

async fn write_frame(stream: &mut TcpStream, frame: &[u8]) -> io::Result<()> {
    stream.write_all(frame).await?;
    stream.flush().await
}

async fn read_frame(stream: &mut TcpStream) -> Result<Vec<u8>, ChannelError> {
    let mut header = [0u8; HEADER_LEN];
    stream.read_exact(&mut header).await.map_err(eof_as_closed)?;
    let len = std::str::from_utf8(&header)
        .ok()
        .and_then(|h| h.parse::<usize>().ok())
        .ok_or_else(|| {
            ChannelError::Io(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("invalid length header {header:?}"),
            ))
        })?;
    let mut body = vec![0u8; len];
    stream.read_exact(&mut body).await.map_err(eof_as_closed)?;
    Ok(body)
}

fn eof_as_closed(e: io::Error) -> ChannelError {
    if e.kind() == io::ErrorKind::UnexpectedEof {
        ChannelError::Closed
    } else {
        ChannelError::Io(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::message::Mti;
    use crate::infrastructure::packager::Iso87AsciiPackager;
    use tokio::net::TcpListener;

    fn packager() -> Arc<dyn Packager> {
        Arc::new(Iso87AsciiPackager::new())
    }

    #[tokio::test]
    async fn test_frame_exchange_over_loopback() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let mut channel = AsciiChannel::from_stream(socket, packager());
            let request = channel.receive().await.unwrap();
            let mut response = request.to_response().unwrap();
            response.set(39, "00").unwrap();
            channel.send(&response).await.unwrap();
        });

        let mut client = AsciiChannel::new("127.0.0.1", port, packager())
            .with_timeout(Some(Duration::from_secs(5)));
        client.connect().await.unwrap();
        assert!(client.is_connected());

        let mut request = IsoMessage::with_mti(Mti::AUTHORIZATION_REQUEST);
        request.set(11, "000001").unwrap();
        client.send(&request).await.unwrap();
        let response = client.receive().await.unwrap();
        assert_eq!(response.mti(), Some(Mti::AUTHORIZATION_RESPONSE));
        assert_eq!(response.get(39), Some("00"));

        server.await.unwrap();
        client.disconnect().await.unwrap();
        assert!(!client.is_connected());
    }

    #[tokio::test]
    async fn test_receive_timeout_is_distinguished() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_millis(500)).await;
            drop(socket);
        });

        let mut client = AsciiChannel::new("127.0.0.1", port, packager());
        client.connect().await.unwrap();
        client.set_timeout(Some(Duration::from_millis(50)));
        let err = client.receive().await.unwrap_err();
        assert!(matches!(err, ChannelError::Timeout(_)));
        assert!(!client.is_connected());
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_send_requires_connection() {
        let mut client = AsciiChannel::new("127.0.0.1", 1, packager());
        let request = IsoMessage::with_mti(Mti::AUTHORIZATION_REQUEST);
        assert!(matches!(
            client.send(&request).await,
            Err(ChannelError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn test_peer_close_is_reported() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            drop(socket);
        });

        let mut client = AsciiChannel::new("127.0.0.1", port, packager());
        client.connect().await.unwrap();
        server.await.unwrap();
        assert!(matches!(client.receive().await, Err(ChannelError::Closed)));
        assert!(!client.is_connected());
    }

    #[tokio::test]
    async fn test_failed_send_drops_the_stream() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            drop(socket);
        });

        let mut client = AsciiChannel::new("127.0.0.1", port, packager());
        client.connect().await.unwrap();
        server.await.unwrap();

        let mut request = IsoMessage::with_mti(Mti::AUTHORIZATION_REQUEST);
        request.set(11, "000001").unwrap();
        // The first write after the peer's close may still be buffered; a later one hits the reset.
        let mut failure = None;
        for _ in 0..50 {
            if let Err(e) = client.send(&request).await {
                failure = Some(e);
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(matches!(failure, Some(ChannelError::Io(_))));
        assert!(!client.is_connected());
    }
}
