//! Responder Role (Peer B / server)
//!
//! Generates a key pair, accepts exactly one connection, sends the public
//! key, decapsulates the initiator's ciphertext and persists the PSK.
//!
//! This is a single-exchange protocol, not a long-lived service: there are
//! no concurrent sessions and no reconnection handling. The listener is
//! closed as soon as the first connection is accepted.

use log::info;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;

use crate::config::{ExchangeOptions, ResponderConfig};
use crate::crypto::{self, KemBackend, KeyPair, SecretBytes};
use crate::error::ExchangeError;
use crate::protocol::{
    self, ExchangeOutcome, ExchangeState, Progress, Role, CONFIRM_TAG_LEN,
};
use crate::psk::{self, Psk};

/// A responder with its key pair generated and its listener bound
pub struct ResponderSession {
    kem: Box<dyn KemBackend>,
    key_pair: KeyPair,
    listener: TcpListener,
    options: ExchangeOptions,
    psk_path: PathBuf,
}

impl ResponderSession {
    /// Generate the key pair, then bind. Key generation failure aborts
    /// before any socket is opened.
    pub async fn bind(config: &ResponderConfig) -> Result<Self, ExchangeError> {
        let kem = crypto::initialize(&config.algorithm)?;
        Self::bind_with(kem, config).await
    }

    pub async fn bind_with(
        kem: Box<dyn KemBackend>,
        config: &ResponderConfig,
    ) -> Result<Self, ExchangeError> {
        let params = kem.parameters();
        let key_pair = kem.generate_keypair()?;
        info!(
            "Generated {} key pair ({} byte public key)",
            params.algorithm,
            key_pair.public_key.len()
        );

        let addr = format!("{}:{}", config.host, config.port);
        let listener = TcpListener::bind(addr.as_str())
            .await
            .map_err(|e| ExchangeError::transport("binding listener", e))?;

        let session = Self {
            kem,
            key_pair,
            listener,
            options: config.exchange_options(),
            psk_path: config.psk_path.clone(),
        };
        info!("[Server] Waiting for connection on {}", session.local_addr()?);
        Ok(session)
    }

    pub fn local_addr(&self) -> Result<SocketAddr, ExchangeError> {
        self.listener
            .local_addr()
            .map_err(|e| ExchangeError::transport("reading listener address", e))
    }

    /// Accept one connection and run the exchange on it
    pub async fn run(self) -> Result<ExchangeOutcome, ExchangeError> {
        let Self {
            kem,
            key_pair,
            listener,
            options,
            psk_path,
        } = self;

        let (mut stream, peer) = listener
            .accept()
            .await
            .map_err(|e| ExchangeError::transport("accepting connection", e))?;
        drop(listener);
        info!("[Server] Connected to {}", peer);

        let mut outcome =
            respond_and_persist(&mut stream, kem.as_ref(), key_pair, &options, &psk_path).await?;
        outcome.peer = Some(peer);
        Ok(outcome)
    }
}

/// Bind, accept one connection, exchange and persist
pub async fn run_responder(config: &ResponderConfig) -> Result<ExchangeOutcome, ExchangeError> {
    ResponderSession::bind(config).await?.run().await
}

/// Run the exchange over a connected stream and persist the PSK.
/// Nothing is written unless the exchange succeeds.
pub async fn respond_and_persist<S>(
    stream: &mut S,
    kem: &dyn KemBackend,
    key_pair: KeyPair,
    options: &ExchangeOptions,
    psk_path: &Path,
) -> Result<ExchangeOutcome, ExchangeError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let started = Instant::now();
    let psk = respond(stream, kem, key_pair, options).await?;
    psk::persist_psk(&psk, psk_path).map_err(|e| e.with_psk(psk.clone()))?;
    info!("[Server] Shared secret saved to {}", psk_path.display());

    Ok(ExchangeOutcome {
        role: Role::Responder,
        algorithm: kem.parameters().algorithm,
        peer: None,
        psk_path: psk_path.to_path_buf(),
        psk_len: psk.len(),
        key_confirmed: options.key_confirmation,
        elapsed: started.elapsed(),
    })
}

/// Responder side of the exchange over a connected stream.
///
/// The secret key is consumed and wiped as soon as decapsulation finishes,
/// or when an error returns early.
pub async fn respond<S>(
    stream: &mut S,
    kem: &dyn KemBackend,
    key_pair: KeyPair,
    options: &ExchangeOptions,
) -> Result<Psk, ExchangeError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut progress = Progress::new(Role::Responder, ExchangeState::Connected);
    let result = exchange(stream, kem, key_pair, options, &mut progress).await;
    progress.finish(&result);
    result
}

async fn exchange<S>(
    stream: &mut S,
    kem: &dyn KemBackend,
    key_pair: KeyPair,
    options: &ExchangeOptions,
    progress: &mut Progress,
) -> Result<Psk, ExchangeError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let params = kem.parameters();
    let timeout = options.io_timeout;

    protocol::write_message(stream, &key_pair.public_key, "sending public key", timeout).await?;

    progress.advance(ExchangeState::AwaitingCiphertext);
    let ciphertext =
        protocol::read_message(stream, params.ciphertext_len, "receiving ciphertext", timeout)
            .await?;

    progress.advance(ExchangeState::Decapsulating);
    let shared_secret = kem.decapsulate(&ciphertext, &key_pair.secret_key)?;
    drop(key_pair);

    if options.key_confirmation {
        progress.advance(ExchangeState::Confirming);
        confirm(stream, &shared_secret, options)
            .await
            .map_err(|e| protocol::confirmation_hint(Role::Responder, e))?;
    }

    psk::derive_checked(shared_secret.as_bytes(), options.allow_short_psk)
}

async fn confirm<S>(
    stream: &mut S,
    shared_secret: &SecretBytes,
    options: &ExchangeOptions,
) -> Result<(), ExchangeError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let tag = protocol::confirmation_tag(Role::Responder, shared_secret);
    protocol::write_message(stream, &tag, "sending confirmation tag", options.io_timeout).await?;

    let peer_tag = protocol::read_message(
        stream,
        CONFIRM_TAG_LEN,
        "receiving confirmation tag",
        options.io_timeout,
    )
    .await?;
    protocol::verify_tag(Role::Initiator, shared_secret, &peer_tag)
}
