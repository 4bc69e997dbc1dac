//! PQC PSK Client - Initiator (Peer A)
//!
//! Connects to the responder, runs the ML-KEM-768 exchange and writes the
//! derived PSK to disk.

use anyhow::Result;
use clap::Parser;
use log::{error, info};
use std::path::PathBuf;
use std::process::ExitCode;

use pqc_psk::{ErrorKind, ExchangeError, InitiatorConfig};

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(name = "pqc-psk-client")]
#[command(about = "PQC PSK Client - ML-KEM-768 pre-shared key initiator")]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "config/client.toml")]
    config: PathBuf,

    /// Responder host or IP
    #[arg(short, long)]
    server: Option<String>,

    /// Responder port
    #[arg(short, long)]
    port: Option<u16>,

    /// Override PSK output file
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Number of connection attempts
    #[arg(short, long)]
    attempts: Option<u32>,

    /// Delay between attempts (milliseconds)
    #[arg(short, long)]
    delay: Option<u64>,

    /// Connect and read/write timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,

    /// Exchange key confirmation tags (the server must enable it too)
    #[arg(long)]
    confirm: bool,

    /// Log level
    #[arg(long)]
    log_level: Option<String>,
}

fn load_config(args: &Args) -> Result<InitiatorConfig> {
    let mut config = if args.config.exists() {
        InitiatorConfig::from_file(&args.config)?
    } else {
        InitiatorConfig::default()
    };

    if let Some(server) = &args.server {
        config.server_host = server.clone();
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(output) = &args.output {
        config.psk_path = output.clone();
    }
    if let Some(attempts) = args.attempts {
        config.connect_attempts = attempts;
    }
    if let Some(delay) = args.delay {
        config.retry_delay_ms = delay;
    }
    if args.timeout.is_some() {
        config.connect_timeout_secs = args.timeout;
        config.io_timeout_secs = args.timeout;
    }
    if let Some(level) = &args.log_level {
        config.log_level = level.clone();
    }
    config.key_confirmation |= args.confirm;
    config.validate()?;
    Ok(config)
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let args = Args::parse();

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error[{}]: {:#}", ErrorKind::Config, e);
            return ExitCode::from(ErrorKind::Config.exit_code());
        }
    };

    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&config.log_level))
        .init();

    match run(&config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Key exchange failed: {}", e);
            eprintln!("error[{}]: {}", e.kind(), e);
            if let Some(psk) = e.recovered_psk() {
                eprintln!("[Client] Key file not written; store this key manually:");
                println!("PresharedKey = {}", psk.to_base64());
            }
            ExitCode::from(e.kind().exit_code())
        }
    }
}

async fn run(config: &InitiatorConfig) -> Result<(), ExchangeError> {
    info!("Connecting to {}:{}", config.server_host, config.port);
    let outcome = pqc_psk::run_initiator(config).await?;
    info!(
        "{} exchange complete in {:?} (key confirmation: {})",
        outcome.algorithm, outcome.elapsed, outcome.key_confirmed
    );
    println!("[Client] Shared secret saved to {}", outcome.psk_path.display());
    Ok(())
}
