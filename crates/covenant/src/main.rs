//! Covenant command line.
//!
//! Usage:
//!   covenant stub [--config covenant.yaml] [--port 9000] [--strict] contract.yaml...

use clap::{Parser, Subcommand};
use covenant::config::StubConfig;
use covenant::server::StubServer;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "covenant")]
#[command(author, version, about = "Contract testing and API virtualization")]
struct Args {
    /// Log level used when RUST_LOG is not set
    #[arg(long, global = true, default_value = "info", env = "COVENANT_LOG_LEVEL")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve contracts as an HTTP stub
    Stub {
        /// Contract documents, added to those listed in the config file
        contracts: Vec<PathBuf>,

        /// Configuration file (YAML or JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,

        #[arg(long)]
        host: Option<String>,

        #[arg(short, long)]
        port: Option<u16>,

        /// Answer requests no expectation covers with 400
        #[arg(short, long)]
        strict: bool,

        /// Expectation documents registered at startup
        #[arg(short, long = "expectations")]
        expectations: Vec<PathBuf>,
    },
}

fn init_tracing(log_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_tracing(&args.log_level);

    if let Err(e) = run(args.command).await {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

async fn run(command: Command) -> Result<(), anyhow::Error> {
    match command {
        Command::Stub {
            contracts,
            config,
            host,
            port,
            strict,
            expectations,
        } => {
            let mut stub_config = match config {
                Some(path) => StubConfig::from_file(&path)?,
                None => StubConfig::default(),
            };
            stub_config.contracts.extend(contracts);
            stub_config.expectations.extend(expectations);
            if let Some(host) = host {
                stub_config.host = host;
            }
            if let Some(port) = port {
                stub_config.port = port;
            }
            stub_config.strict_mode |= strict;
            stub_config.validate()?;

            let stub = Arc::new(stub_config.build_stub()?);
            info!(
                contracts = stub.features().len(),
                strict = stub_config.strict_mode,
                "stub ready"
            );
            let server = StubServer::bind(stub_config.socket_addr()?, stub).await?;
            tokio::select! {
                served = server.run() => served,
                _ = tokio::signal::ctrl_c() => {
                    info!("Received Ctrl-C, exiting");
                    Ok(())
                }
            }
        }
    }
}
