use super::mux::{Multiplexer, channel_timeout};
use crate::domain::message::IsoMessage;
use crate::domain::ports::Channel;
use crate::error::{ChannelError, IsoError, Result};
use std::error::Error as StdError;
use std::io;
use std::time::Duration;
use tracing::{info, warn};

pub const DEFAULT_HOST: &str = "localhost";
pub const SERVER_ALIAS: &str = "server";

fn is_loopback(host: &str) -> bool {
    host.eq_ignore_ascii_case("localhost") || host == "127.0.0.1" || host == "::1"
}

/// Ordered, de-duplicated host candidates from a comma separated list.
///
/// A configured `server` alias without any loopback entry gets `localhost` appended;
/// an empty list becomes `[localhost]`.
pub fn candidate_hosts(raw: Option<&str>) -> Vec<String> {
    let mut hosts: Vec<String> = Vec::new();
    for candidate in raw.unwrap_or_default().split(',').map(str::trim) {
        if candidate.is_empty() || hosts.iter().any(|h| h.eq_ignore_ascii_case(candidate)) {
            continue;
        }
        hosts.push(candidate.to_string());
    }

    if hosts.is_empty() {
        hosts.push(DEFAULT_HOST.to_string());
    } else if hosts.iter().any(|h| h.eq_ignore_ascii_case(SERVER_ALIAS))
        && !hosts.iter().any(|h| is_loopback(h))
    {
        hosts.push(DEFAULT_HOST.to_string());
    }
    hosts
}

/// True when the cause chain holds a name resolution failure or a refused connection.
pub fn is_retryable_host_error(error: &IsoError) -> bool {
    let mut cause: Option<&(dyn StdError + 'static)> = Some(error);
    while let Some(err) = cause {
        if let Some(ChannelError::Resolve { .. } | ChannelError::NoAddress(_)) =
            err.downcast_ref::<ChannelError>()
        {
            return true;
        }
        if let Some(io) = err.downcast_ref::<io::Error>()
            && io.kind() == io::ErrorKind::ConnectionRefused
        {
            return true;
        }
        cause = err.source();
    }
    false
}

fn allows_fallback(error: &IsoError) -> bool {
    matches!(error, IsoError::ConnectDeadline { .. }) || is_retryable_host_error(error)
}

fn root_cause(error: &IsoError) -> String {
    let mut current: &(dyn StdError + 'static) = error;
    while let Some(next) = current.source() {
        current = next;
    }
    current.to_string()
}

/// Opens a fresh channel for one connection attempt.
pub trait ChannelFactory {
    type Channel: Channel;

    fn open(&self, host: &str, port: u16, idle_timeout: Option<Duration>) -> Self::Channel;
}

impl<F, C> ChannelFactory for F
where
    F: Fn(&str, u16, Option<Duration>) -> C,
    C: Channel,
{
    type Channel = C;

    fn open(&self, host: &str, port: u16, idle_timeout: Option<Duration>) -> C {
        self(host, port, idle_timeout)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FailoverSettings {
    pub port: u16,
    pub connect_timeout_ms: i64,
    pub response_timeout_ms: i64,
}

/// Result of the one successful exchange.
#[derive(Debug, Clone, PartialEq)]
pub struct Exchange {
    pub host: String,
    pub request: IsoMessage,
    /// `None` when the host stayed silent for the whole response timeout.
    pub response: Option<IsoMessage>,
}

/// Walks the candidate hosts until one exchange completes.
pub struct HostFailover<F> {
    hosts: Vec<String>,
    settings: FailoverSettings,
    factory: F,
}

impl<F: ChannelFactory> HostFailover<F> {
    pub fn new(raw_hosts: Option<&str>, settings: FailoverSettings, factory: F) -> Self {
        Self {
            hosts: candidate_hosts(raw_hosts),
            settings,
            factory,
        }
    }

    pub fn hosts(&self) -> &[String] {
        &self.hosts
    }

    /// Runs one request against the first host that accepts it.
    ///
    /// Only refused/unresolvable hosts and connect deadlines fall through to the next
    /// candidate. The last candidate's error is returned as is.
    pub async fn execute<B>(&self, build: B) -> Result<Exchange>
    where
        B: Fn() -> Result<IsoMessage>,
    {
        let port = self.settings.port;
        let mut last_retryable = None;
        for (index, host) in self.hosts.iter().enumerate() {
            let has_fallback = index + 1 < self.hosts.len();
            match self.attempt(host, &build).await {
                Ok(exchange) => return Ok(exchange),
                Err(e) if has_fallback && allows_fallback(&e) => {
                    warn!(
                        "Connection attempt to {host}:{port} failed ({}). Trying next candidate...",
                        root_cause(&e)
                    );
                    last_retryable = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        match last_retryable {
            Some(e) => Err(IsoError::HostsExhausted {
                hosts: self.hosts.clone(),
                source: Box::new(e),
            }),
            None => Err(IsoError::MissingConfig("ISO_SERVER_HOST".to_string())),
        }
    }

    async fn attempt<B>(&self, host: &str, build: &B) -> Result<Exchange>
    where
        B: Fn() -> Result<IsoMessage>,
    {
        let idle_timeout = channel_timeout(self.settings.response_timeout_ms);
        let mux = Multiplexer::new(self.factory.open(host, self.settings.port, idle_timeout));
        let outcome = self.exchange(&mux, host, build).await;
        mux.close().await;
        outcome
    }

    async fn exchange<B>(
        &self,
        mux: &Multiplexer<F::Channel>,
        host: &str,
        build: &B,
    ) -> Result<Exchange>
    where
        B: Fn() -> Result<IsoMessage>,
    {
        let settings = self.settings;
        if !mux.connect(settings.connect_timeout_ms).await? {
            return Err(IsoError::ConnectDeadline {
                host: host.to_string(),
                port: settings.port,
            });
        }

        let request = build()?;
        info!(%host, "Sending ISO request: {request}");
        let response = mux.request(&request, settings.response_timeout_ms).await?;
        match &response {
            Some(message) => info!(%host, "Received ISO response: {message}"),
            None => warn!(
                "No response received from ISO host within {} ms",
                settings.response_timeout_ms
            ),
        }
        Ok(Exchange {
            host: host.to_string(),
            request,
            response,
        })
    }
}
