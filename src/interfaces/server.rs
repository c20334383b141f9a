use crate::application::manager::TransactionManager;
use crate::config::ServerConfig;
use crate::domain::ports::{Channel, Packager, TransactionJournal};
use crate::error::{ChannelError, IsoError, Result};
use crate::infrastructure::channel::AsciiChannel;
use crate::infrastructure::csv_journal::CsvJournal;
use crate::infrastructure::in_memory::InMemoryJournal;
use std::future::Future;
use std::net::SocketAddr;
#[cfg(not(feature = "storage-rocksdb"))]
use std::path::Path;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

/// Picks the journal backend: RocksDB, then CSV, then in-memory.
pub fn open_journal(config: &ServerConfig) -> Result<Arc<dyn TransactionJournal>> {
    if let Some(db_path) = &config.db_path {
        #[cfg(feature = "storage-rocksdb")]
        {
            let journal = crate::infrastructure::rocksdb::RocksDbJournal::open(db_path)?;
            info!(path = %db_path.display(), "using RocksDB journal");
            return Ok(Arc::new(journal));
        }
        #[cfg(not(feature = "storage-rocksdb"))]
        warn!("{}", rocksdb_fallback_notice(db_path, config.journal_csv.as_deref()));
    }
    if let Some(csv_path) = &config.journal_csv {
        let journal = CsvJournal::open(csv_path)?;
        info!(path = %csv_path.display(), "using CSV journal");
        return Ok(Arc::new(journal));
    }
    Ok(Arc::new(InMemoryJournal::new()))
}

#[cfg(not(feature = "storage-rocksdb"))]
fn rocksdb_fallback_notice(db_path: &Path, journal_csv: Option<&Path>) -> String {
    let backend = match journal_csv {
        Some(csv_path) => format!("the CSV journal at {}", csv_path.display()),
        None => "the in-memory journal".to_string(),
    };
    format!(
        "RocksDB journal requested at {}, but the 'storage-rocksdb' feature is not enabled. Falling back to {backend}.",
        db_path.display()
    )
}

/// Accepts ISO connections and answers every message through the pipeline.
pub struct IsoServer {
    listener: TcpListener,
    manager: Arc<TransactionManager>,
    packager: Arc<dyn Packager>,
}

impl IsoServer {
    pub async fn bind(
        address: &str,
        manager: Arc<TransactionManager>,
        packager: Arc<dyn Packager>,
    ) -> Result<Self> {
        let listener = TcpListener::bind(address).await?;
        Ok(Self {
            listener,
            manager,
            packager,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Serves connections until `shutdown` resolves.
    pub async fn run_until<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        info!(address = %self.local_addr()?, "ISO server listening");
        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("ISO server shutting down");
                    return Ok(());
                }
                accepted = self.listener.accept() => match accepted {
                    Ok((socket, peer)) => {
                        let channel = AsciiChannel::from_stream(socket, self.packager.clone());
                        tokio::spawn(serve_connection(channel, peer, self.manager.clone()));
                    }
                    Err(e) => warn!(error = %e, "failed to accept connection"),
                },
            }
        }
    }
}

async fn serve_connection(
    mut channel: AsciiChannel,
    peer: SocketAddr,
    manager: Arc<TransactionManager>,
) {
    debug!(%peer, "connection accepted");
    loop {
        let request = match channel.receive().await {
            Ok(message) => message,
            Err(ChannelError::Closed) => {
                debug!(%peer, "peer closed connection");
                break;
            }
            Err(ChannelError::Codec(e)) => {
                warn!(%peer, error = %e, "discarding unparseable message");
                continue;
            }
            Err(e) => {
                warn!(%peer, error = %e, "connection failed");
                break;
            }
        };
        debug!(%peer, "Received ISO request: {request}");

        let (status, mut ctx) = manager.process(request).await;
        let Some(response) = ctx.take_response() else {
            let corruption = IsoError::ContextCorruption(format!(
                "transaction {} finished without a response",
                ctx.id()
            ));
            error!(%peer, ?status, error = %corruption, "no response sent");
            continue;
        };
        match channel.send(&response).await {
            Ok(()) => info!(%peer, id = ctx.id(), ?status, "Sent ISO response: {response}"),
            Err(ChannelError::Codec(e)) => {
                error!(%peer, id = ctx.id(), error = %e, "failed to pack response")
            }
            Err(e) => {
                warn!(%peer, error = %e, "failed to send response");
                break;
            }
        }
    }
    if let Err(e) = channel.disconnect().await {
        debug!(%peer, error = %e, "error closing connection");
    }
}
