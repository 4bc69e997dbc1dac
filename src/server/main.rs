//! PQC PSK Server - Responder (Peer B)
//!
//! Waits for a single initiator, runs the ML-KEM-768 exchange and writes
//! the derived PSK to disk.

use anyhow::Result;
use clap::Parser;
use log::{error, info};
use std::path::PathBuf;
use std::process::ExitCode;

use pqc_psk::{ExchangeError, ResponderConfig, ResponderSession};

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(name = "pqc-psk-server")]
#[command(about = "PQC PSK Server - ML-KEM-768 pre-shared key responder")]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "config/server.toml")]
    config: PathBuf,

    /// Override host to bind to
    #[arg(long)]
    host: Option<String>,

    /// Override listening port
    #[arg(short, long)]
    port: Option<u16>,

    /// Override PSK output file
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Exchange key confirmation tags (the client must enable it too)
    #[arg(long)]
    confirm: bool,

    /// Read/write timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,

    /// Log level
    #[arg(long)]
    log_level: Option<String>,
}

fn load_config(args: &Args) -> Result<ResponderConfig> {
    let mut config = if args.config.exists() {
        ResponderConfig::from_file(&args.config)?
    } else {
        ResponderConfig::default()
    };

    if let Some(host) = &args.host {
        config.host = host.clone();
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(output) = &args.output {
        config.psk_path = output.clone();
    }
    if args.timeout.is_some() {
        config.io_timeout_secs = args.timeout;
    }
    if let Some(level) = &args.log_level {
        config.log_level = level.clone();
    }
    config.key_confirmation |= args.confirm;
    Ok(config)
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let args = Args::parse();

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error[config]: {:#}", e);
            return ExitCode::from(pqc_psk::ErrorKind::Config.exit_code());
        }
    };

    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&config.log_level))
        .init();
    if !args.config.exists() {
        info!("Config file not found, using defaults");
    }

    match run(&config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Key exchange failed: {}", e);
            eprintln!("error[{}]: {}", e.kind(), e);
            if let Some(psk) = e.recovered_psk() {
                eprintln!("[Server] Key file not written; store this key manually:");
                println!("PresharedKey = {}", psk.to_base64());
            }
            ExitCode::from(e.kind().exit_code())
        }
    }
}

async fn run(config: &ResponderConfig) -> Result<(), ExchangeError> {
    let session = ResponderSession::bind(config).await?;
    let outcome = session.run().await?;
    info!(
        "{} exchange with {} complete in {:?}",
        outcome.algorithm,
        outcome
            .peer
            .map(|p| p.to_string())
            .unwrap_or_else(|| "peer".to_string()),
        outcome.elapsed
    );
    println!("[Server] Shared secret saved to {}", outcome.psk_path.display());
    Ok(())
}
