#![allow(dead_code)]

use async_trait::async_trait;
use isogate::application::manager::TransactionManager;
use isogate::config::{ClientConfig, ClientTimezone, Environment, RequestDefaults};
use isogate::domain::message::{IsoMessage, Mti};
use isogate::domain::ports::{Packager, TransactionJournal};
use isogate::domain::transaction::TransactionRecord;
use isogate::error::StoreError;
use isogate::infrastructure::packager::Iso87AsciiPackager;
use isogate::infrastructure::pool::{JournalPool, PoolConfig};
use isogate::interfaces::server::IsoServer;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

pub fn packager() -> Arc<dyn Packager> {
    Arc::new(Iso87AsciiPackager::new())
}

/// Server bound to an ephemeral loopback port, stopped on drop.
pub struct RunningServer {
    pub addr: SocketAddr,
    pub pool: JournalPool,
    shutdown: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<isogate::error::Result<()>>>,
}

impl RunningServer {
    pub async fn stop(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            handle.await.unwrap().unwrap();
        }
        self.pool.close();
    }
}

impl Drop for RunningServer {
    fn drop(&mut self) {
        if let Some(handle) = &self.handle {
            handle.abort();
        }
    }
}

pub async fn spawn_server(journal: Arc<dyn TransactionJournal>) -> RunningServer {
    let pool = JournalPool::new(journal, PoolConfig::default());
    let manager = Arc::new(TransactionManager::authorization(pool.clone()));
    let server = IsoServer::bind("127.0.0.1:0", manager, packager())
        .await
        .unwrap();
    let addr = server.local_addr().unwrap();
    let (tx, rx) = oneshot::channel::<()>();
    let handle = tokio::spawn(server.run_until(async move {
        let _ = rx.await;
    }));
    RunningServer {
        addr,
        pool,
        shutdown: Some(tx),
        handle: Some(handle),
    }
}

pub fn client_config(hosts: &str, port: u16) -> ClientConfig {
    ClientConfig {
        hosts: Some(hosts.to_string()),
        port,
        connect_timeout_ms: 2_000,
        response_timeout_ms: 2_000,
        timezone: ClientTimezone::Utc,
        request: RequestDefaults::from_env(&Environment::default()),
    }
}

pub fn full_request() -> IsoMessage {
    let mut msg = IsoMessage::with_mti(Mti::AUTHORIZATION_REQUEST);
    msg.set(2, "4242424242424242").unwrap();
    msg.set(3, "000000").unwrap();
    msg.set(4, "000000010000").unwrap();
    msg.set(7, "1019103000").unwrap();
    msg.set(11, "000123").unwrap();
    msg.set(41, "TERM0001").unwrap();
    msg
}

/// Journal whose every insert fails.
pub struct FailingJournal;

#[async_trait]
impl TransactionJournal for FailingJournal {
    async fn insert(&self, _record: &TransactionRecord) -> Result<(), StoreError> {
        Err(StoreError::Internal("disk on fire".to_string()))
    }
}
