use super::request::{build_authorization_request, generate_stan};
use crate::application::failover::{Exchange, FailoverSettings, HostFailover};
use crate::config::ClientConfig;
use crate::domain::ports::Packager;
use crate::error::Result;
use crate::infrastructure::channel::AsciiChannel;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Sends one authorization request, failing over across the configured hosts.
pub async fn run_client(config: &ClientConfig, packager: Arc<dyn Packager>) -> Result<Exchange> {
    let settings = FailoverSettings {
        port: config.port,
        connect_timeout_ms: config.connect_timeout_ms,
        response_timeout_ms: config.response_timeout_ms,
    };
    let factory = move |host: &str, port: u16, idle_timeout: Option<Duration>| {
        AsciiChannel::new(host, port, packager.clone()).with_timeout(idle_timeout)
    };
    let failover = HostFailover::new(config.hosts.as_deref(), settings, factory);
    info!(hosts = ?failover.hosts(), port = config.port, "starting ISO client");

    failover
        .execute(|| {
            build_authorization_request(&config.request, config.timezone.now(), &generate_stan())
        })
        .await
}
