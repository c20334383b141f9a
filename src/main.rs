use clap::{Parser, Subcommand};
use isogate::application::manager::TransactionManager;
use isogate::config::{ClientConfig, Environment, ServerConfig, parse_override};
use isogate::domain::ports::Packager;
use isogate::infrastructure::packager::Iso87AsciiPackager;
use isogate::infrastructure::pool::JournalPool;
use isogate::interfaces::client::run_client;
use isogate::interfaces::server::{IsoServer, open_journal};
use miette::{IntoDiagnostic, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Dotenv file consulted after the process environment (defaults to .env)
    #[arg(long, global = true)]
    env_file: Option<PathBuf>,

    /// Configuration override as KEY=VALUE, may be repeated
    #[arg(long = "set", global = true, value_parser = parse_override)]
    overrides: Vec<(String, String)>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Send one authorization request and print the response.
    Client {
        /// Comma separated host list, tried in order
        #[arg(long)]
        host: Option<String>,

        #[arg(long)]
        port: Option<u16>,
    },
    /// Accept authorization requests over TCP.
    Server {
        #[arg(long)]
        bind: Option<String>,

        #[arg(long)]
        port: Option<u16>,

        /// Path to persistent database. Requires the storage-rocksdb feature.
        #[arg(long)]
        db_path: Option<PathBuf>,

        /// Append journal records to this CSV file
        #[arg(long)]
        journal_csv: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let env = Environment::load(cli.env_file.as_deref(), cli.overrides);
    let packager: Arc<dyn Packager> = Arc::new(Iso87AsciiPackager::new());

    match cli.command {
        Command::Client { host, port } => {
            let mut config = ClientConfig::from_env(&env);
            if host.is_some() {
                config.hosts = host;
            }
            if let Some(port) = port {
                config.port = port;
            }

            let exchange = run_client(&config, packager).await.into_diagnostic()?;
            println!("Request:  {}", exchange.request);
            match exchange.response {
                Some(response) => println!("Response: {response}"),
                None => println!("No response from {}", exchange.host),
            }
        }
        Command::Server {
            bind,
            port,
            db_path,
            journal_csv,
        } => {
            let mut config = ServerConfig::from_env(&env);
            if let Some(bind) = bind {
                config.bind = bind;
            }
            if let Some(port) = port {
                config.port = port;
            }
            if db_path.is_some() {
                config.db_path = db_path;
            }
            if journal_csv.is_some() {
                config.journal_csv = journal_csv;
            }

            let pool = JournalPool::new(open_journal(&config).into_diagnostic()?, config.pool);
            let manager = Arc::new(TransactionManager::authorization(pool.clone()));
            let server = IsoServer::bind(&config.address(), manager, packager)
                .await
                .into_diagnostic()?;
            server.run_until(shutdown_signal()).await.into_diagnostic()?;
            pool.close();
            info!("journal pool closed");
        }
    }

    Ok(())
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .try_init();
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "unable to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
