//! Key Exchange Wire Protocol
//!
//! Two unframed messages over a byte stream:
//!
//! 1. responder -> initiator: public key (`public_key_len` bytes)
//! 2. initiator -> responder: ciphertext (`ciphertext_len` bytes)
//!
//! With key confirmation enabled two 32-byte tags follow, responder's
//! first. Lengths are fixed by the KEM parameters, so there are no length
//! prefixes, type tags or version fields.

use log::{debug, warn};
use sha3::{Digest, Sha3_256};
use std::fmt;
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::crypto::{ct_eq, KemAlgorithm, SecretBytes};
use crate::error::ExchangeError;

/// Length of a key confirmation tag
pub const CONFIRM_TAG_LEN: usize = 32;

const CONFIRM_DOMAIN: &[u8] = b"pqc-psk confirm ";

/// Participant role in the exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Initiator,
    Responder,
}

impl Role {
    pub fn label(self) -> &'static str {
        match self {
            Role::Initiator => "initiator",
            Role::Responder => "responder",
        }
    }
}

/// Progress of one exchange, used for logging
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeState {
    Idle,
    Listening,
    Connecting,
    Connected,
    AwaitingPublicKey,
    Encapsulating,
    AwaitingCiphertext,
    Decapsulating,
    Confirming,
    Done,
    Failed,
}

impl fmt::Display for ExchangeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ExchangeState::Idle => "idle",
            ExchangeState::Listening => "listening",
            ExchangeState::Connecting => "connecting",
            ExchangeState::Connected => "connected",
            ExchangeState::AwaitingPublicKey => "awaiting public key",
            ExchangeState::Encapsulating => "encapsulating",
            ExchangeState::AwaitingCiphertext => "awaiting ciphertext",
            ExchangeState::Decapsulating => "decapsulating",
            ExchangeState::Confirming => "confirming",
            ExchangeState::Done => "done",
            ExchangeState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Tracks and logs the state machine of one role
#[derive(Debug)]
pub(crate) struct Progress {
    role: Role,
    state: ExchangeState,
}

impl Progress {
    pub(crate) fn new(role: Role, state: ExchangeState) -> Self {
        debug!("{}: {}", role.label(), state);
        Self { role, state }
    }

    pub(crate) fn advance(&mut self, next: ExchangeState) {
        debug!("{}: {} -> {}", self.role.label(), self.state, next);
        self.state = next;
    }

    pub(crate) fn finish<T>(&mut self, result: &Result<T, ExchangeError>) {
        match result {
            Ok(_) => self.advance(ExchangeState::Done),
            Err(e) => {
                warn!(
                    "{} failed while {} [{}]: {}",
                    self.role.label(),
                    self.state,
                    e.kind(),
                    e
                );
                self.state = ExchangeState::Failed;
            }
        }
    }
}

/// Summary of a completed exchange. Contains no secret material.
#[derive(Debug, Clone)]
pub struct ExchangeOutcome {
    pub role: Role,
    pub algorithm: KemAlgorithm,
    pub peer: Option<SocketAddr>,
    pub psk_path: PathBuf,
    pub psk_len: usize,
    pub key_confirmed: bool,
    pub elapsed: Duration,
}

/// Run an I/O future under an optional deadline
pub async fn with_timeout<T, F>(
    limit: Option<Duration>,
    stage: &'static str,
    fut: F,
) -> Result<T, ExchangeError>
where
    F: Future<Output = io::Result<T>>,
{
    let result = match limit {
        Some(limit) => match tokio::time::timeout(limit, fut).await {
            Ok(result) => result,
            Err(_) => {
                warn!("Timed out after {:?} while {}", limit, stage);
                Err(io::Error::new(io::ErrorKind::TimedOut, "operation timed out"))
            }
        },
        None => fut.await,
    };
    result.map_err(|e| ExchangeError::transport(stage, e))
}

/// Read exactly `len` bytes, assembling short reads.
///
/// A connection closed before `len` bytes arrive is a transport failure.
pub async fn read_message<R>(
    reader: &mut R,
    len: usize,
    stage: &'static str,
    limit: Option<Duration>,
) -> Result<Vec<u8>, ExchangeError>
where
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; len];
    let fragments = with_timeout(limit, stage, fill(reader, &mut buf)).await?;
    debug!("Received {} bytes in {} read(s) while {}", len, fragments, stage);
    Ok(buf)
}

async fn fill<R>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize>
where
    R: AsyncRead + Unpin,
{
    let mut filled = 0;
    let mut fragments = 0;
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..]).await?;
        if n == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("peer closed after {} of {} bytes", filled, buf.len()),
            ));
        }
        filled += n;
        fragments += 1;
    }
    Ok(fragments)
}

/// Write all of `data` and flush
pub async fn write_message<W>(
    writer: &mut W,
    data: &[u8],
    stage: &'static str,
    limit: Option<Duration>,
) -> Result<(), ExchangeError>
where
    W: AsyncWrite + Unpin,
{
    with_timeout(limit, stage, async {
        writer.write_all(data).await?;
        writer.flush().await
    })
    .await?;
    debug!("Sent {} bytes while {}", data.len(), stage);
    Ok(())
}

/// Key confirmation tag: SHA3-256(domain || role || shared_secret)
pub fn confirmation_tag(role: Role, shared_secret: &SecretBytes) -> [u8; CONFIRM_TAG_LEN] {
    let mut hasher = Sha3_256::new();
    hasher.update(CONFIRM_DOMAIN);
    hasher.update(role.label().as_bytes());
    hasher.update(shared_secret.as_bytes());
    hasher.finalize().into()
}

/// Check a peer's tag in constant time
pub fn verify_tag(
    peer: Role,
    shared_secret: &SecretBytes,
    received: &[u8],
) -> Result<(), ExchangeError> {
    let expected = confirmation_tag(peer, shared_secret);
    if !ct_eq(&expected, received) {
        return Err(ExchangeError::SharedSecretMismatch);
    }
    Ok(())
}

/// True when the peer closed or reset the connection under us
pub(crate) fn peer_hung_up(err: &ExchangeError) -> bool {
    match err {
        ExchangeError::TransportFailure { source, .. } => matches!(
            source.kind(),
            io::ErrorKind::UnexpectedEof
                | io::ErrorKind::BrokenPipe
                | io::ErrorKind::ConnectionReset
        ),
        _ => false,
    }
}

/// Pass a confirmation-stage error through, warning when the peer hung up.
/// A peer without key confirmation finishes after the ciphertext and
/// closes, which surfaces here as a plain EOF.
pub(crate) fn confirmation_hint(role: Role, err: ExchangeError) -> ExchangeError {
    if peer_hung_up(&err) {
        warn!(
            "{}: peer closed the connection during key confirmation; \
             key_confirmation must be enabled on both peers",
            role.label()
        );
    }
    err
}
