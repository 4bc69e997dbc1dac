//! Initiator Role (Peer A / client)
//!
//! Connects to the responder, receives its public key, encapsulates a
//! shared secret against it, sends the ciphertext and persists the PSK.

use log::{info, warn};
use std::net::SocketAddr;
use std::path::Path;
use std::time::Instant;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;

use crate::config::{ExchangeOptions, InitiatorConfig};
use crate::crypto::{self, KemBackend, SecretBytes};
use crate::error::ExchangeError;
use crate::protocol::{
    self, with_timeout, ExchangeOutcome, ExchangeState, Progress, Role, CONFIRM_TAG_LEN,
};
use crate::psk::{self, Psk};

/// Connect, exchange and persist
pub async fn run_initiator(config: &InitiatorConfig) -> Result<ExchangeOutcome, ExchangeError> {
    let kem = crypto::initialize(&config.algorithm)?;
    run_initiator_with(kem.as_ref(), config).await
}

pub async fn run_initiator_with(
    kem: &dyn KemBackend,
    config: &InitiatorConfig,
) -> Result<ExchangeOutcome, ExchangeError> {
    config.validate()?;

    let (mut stream, peer) = connect(config).await?;
    info!("[Client] Connected to server {}", peer);

    let mut outcome = initiate_and_persist(
        &mut stream,
        kem,
        &config.exchange_options(),
        &config.psk_path,
    )
    .await?;
    outcome.peer = Some(peer);
    Ok(outcome)
}

/// Connect to the responder, retrying up to `connect_attempts` times
pub async fn connect(config: &InitiatorConfig) -> Result<(TcpStream, SocketAddr), ExchangeError> {
    let addr = format!("{}:{}", config.server_host, config.port);
    let attempts = config.connect_attempts.max(1);
    let mut attempt = 1;

    loop {
        let result = with_timeout(
            config.connect_timeout(),
            "connecting to responder",
            TcpStream::connect(addr.as_str()),
        )
        .await;

        match result {
            Ok(stream) => {
                let peer = stream
                    .peer_addr()
                    .map_err(|e| ExchangeError::transport("connecting to responder", e))?;
                return Ok((stream, peer));
            }
            Err(e) if attempt < attempts => {
                warn!("Connection attempt {}/{} to {} failed: {}", attempt, attempts, addr, e);
                attempt += 1;
                tokio::time::sleep(config.retry_delay()).await;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Run the exchange over a connected stream and persist the PSK
pub async fn initiate_and_persist<S>(
    stream: &mut S,
    kem: &dyn KemBackend,
    options: &ExchangeOptions,
    psk_path: &Path,
) -> Result<ExchangeOutcome, ExchangeError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let started = Instant::now();
    let psk = initiate(stream, kem, options).await?;
    psk::persist_psk(&psk, psk_path).map_err(|e| e.with_psk(psk.clone()))?;
    info!("[Client] Shared secret saved to {}", psk_path.display());

    Ok(ExchangeOutcome {
        role: Role::Initiator,
        algorithm: kem.parameters().algorithm,
        peer: None,
        psk_path: psk_path.to_path_buf(),
        psk_len: psk.len(),
        key_confirmed: options.key_confirmation,
        elapsed: started.elapsed(),
    })
}

/// Initiator side of the exchange over a connected stream
pub async fn initiate<S>(
    stream: &mut S,
    kem: &dyn KemBackend,
    options: &ExchangeOptions,
) -> Result<Psk, ExchangeError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut progress = Progress::new(Role::Initiator, ExchangeState::AwaitingPublicKey);
    let result = exchange(stream, kem, options, &mut progress).await;
    progress.finish(&result);
    result
}

async fn exchange<S>(
    stream: &mut S,
    kem: &dyn KemBackend,
    options: &ExchangeOptions,
    progress: &mut Progress,
) -> Result<Psk, ExchangeError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let params = kem.parameters();
    let timeout = options.io_timeout;

    let public_key =
        protocol::read_message(stream, params.public_key_len, "receiving public key", timeout)
            .await?;

    progress.advance(ExchangeState::Encapsulating);
    let (ciphertext, shared_secret) = kem.encapsulate(&public_key)?;
    protocol::write_message(stream, &ciphertext, "sending ciphertext", timeout).await?;

    if options.key_confirmation {
        progress.advance(ExchangeState::Confirming);
        confirm(stream, &shared_secret, options)
            .await
            .map_err(|e| protocol::confirmation_hint(Role::Initiator, e))?;
    }

    psk::derive_checked(shared_secret.as_bytes(), options.allow_short_psk)
}

/// Reads the responder's tag first, answers with ours, then verifies.
/// Answering before verifying lets the responder detect a mismatch too.
async fn confirm<S>(
    stream: &mut S,
    shared_secret: &SecretBytes,
    options: &ExchangeOptions,
) -> Result<(), ExchangeError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let peer_tag = protocol::read_message(
        stream,
        CONFIRM_TAG_LEN,
        "receiving confirmation tag",
        options.io_timeout,
    )
    .await?;

    let tag = protocol::confirmation_tag(Role::Initiator, shared_secret);
    protocol::write_message(stream, &tag, "sending confirmation tag", options.io_timeout).await?;

    protocol::verify_tag(Role::Responder, shared_secret, &peer_tag)
}
