//! PQC PSK Self-Test
//!
//! Runs both roles in one process without a network and prints the
//! resulting PSK. The printed key is diagnostic only; do not use it as a
//! live tunnel PSK.

use clap::Parser;
use std::process::ExitCode;

use pqc_psk::crypto;

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(name = "pqc-psk-selftest")]
#[command(about = "Local ML-KEM encapsulation/decapsulation self-test")]
struct Args {
    /// KEM algorithm
    #[arg(long, default_value = "ML-KEM-768")]
    algorithm: String,

    /// JSON output format (algorithm, hex, base64)
    #[arg(long)]
    json: bool,

    /// Accept a shared secret shorter than 32 bytes
    #[arg(long)]
    allow_short_psk: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp_millis()
        .init();

    let result = crypto::initialize(&args.algorithm)
        .and_then(|kem| pqc_psk::run_self_test(kem.as_ref(), args.allow_short_psk));

    let report = match result {
        Ok(report) => report,
        Err(e) => {
            eprintln!("error[{}]: {}", e.kind(), e);
            return ExitCode::from(e.kind().exit_code());
        }
    };

    if args.json {
        match serde_json::to_string_pretty(&report.summary()) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                eprintln!("error: failed to encode report: {}", e);
                return ExitCode::FAILURE;
            }
        }
    } else {
        println!("{}", report.psk.to_hex());
    }
    ExitCode::SUCCESS
}
