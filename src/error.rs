//! Exchange Errors
//!
//! One variant per failure category so callers and scripts can tell
//! "no peer reachable" apart from "cryptographic primitive failed" and
//! "could not write key file".

use std::fmt;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

use crate::config::ConfigError;
use crate::psk::Psk;

/// Errors that terminate a key exchange attempt
#[derive(Error, Debug)]
pub enum ExchangeError {
    #[error("Unsupported KEM algorithm: {0}")]
    UnsupportedAlgorithm(String),
    #[error("Key pair generation failed: {0}")]
    KeyGenFailure(String),
    #[error("Invalid {what} length: expected {expected} bytes, got {actual}")]
    InvalidInputLength {
        what: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("Encapsulation failed: {0}")]
    EncapsulationFailure(String),
    #[error("Decapsulation failed: {0}")]
    DecapsulationFailure(String),
    #[error("Shared secrets do not match")]
    SharedSecretMismatch,
    #[error("Shared secret is only {len} bytes, shorter than a full PSK")]
    ShortSharedSecret { len: usize },
    #[error("Transport failure while {stage}: {source}")]
    TransportFailure {
        stage: &'static str,
        #[source]
        source: io::Error,
    },
    #[error("Key exchange completed but the PSK could not be written to {}: {source}", path.display())]
    PersistenceFailure {
        path: PathBuf,
        #[source]
        source: io::Error,
        /// The derived key, kept so the caller can store it elsewhere
        psk: Option<Psk>,
    },
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl ExchangeError {
    pub(crate) fn transport(stage: &'static str, source: io::Error) -> Self {
        ExchangeError::TransportFailure { stage, source }
    }

    pub(crate) fn persistence(path: impl Into<PathBuf>, source: io::Error) -> Self {
        ExchangeError::PersistenceFailure {
            path: path.into(),
            source,
            psk: None,
        }
    }

    /// Attach the derived key to a persistence failure
    pub(crate) fn with_psk(self, derived: Psk) -> Self {
        match self {
            ExchangeError::PersistenceFailure { path, source, .. } => {
                ExchangeError::PersistenceFailure {
                    path,
                    source,
                    psk: Some(derived),
                }
            }
            other => other,
        }
    }

    /// Key that was derived but could not be persisted
    pub fn recovered_psk(&self) -> Option<&Psk> {
        match self {
            ExchangeError::PersistenceFailure { psk, .. } => psk.as_ref(),
            _ => None,
        }
    }

    /// Stable category tag for this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            ExchangeError::UnsupportedAlgorithm(_) => ErrorKind::UnsupportedAlgorithm,
            ExchangeError::KeyGenFailure(_) => ErrorKind::KeyGenFailure,
            ExchangeError::InvalidInputLength { .. } => ErrorKind::InvalidInputLength,
            ExchangeError::EncapsulationFailure(_) => ErrorKind::EncapsulationFailure,
            ExchangeError::DecapsulationFailure(_) => ErrorKind::DecapsulationFailure,
            ExchangeError::SharedSecretMismatch => ErrorKind::SharedSecretMismatch,
            ExchangeError::ShortSharedSecret { .. } => ErrorKind::ShortSharedSecret,
            ExchangeError::TransportFailure { .. } => ErrorKind::TransportFailure,
            ExchangeError::PersistenceFailure { .. } => ErrorKind::PersistenceFailure,
            ExchangeError::Config(_) => ErrorKind::Config,
        }
    }
}

/// Failure category, each with its own process exit code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    UnsupportedAlgorithm,
    KeyGenFailure,
    InvalidInputLength,
    EncapsulationFailure,
    DecapsulationFailure,
    SharedSecretMismatch,
    ShortSharedSecret,
    TransportFailure,
    PersistenceFailure,
    Config,
}

impl ErrorKind {
    pub const ALL: [ErrorKind; 10] = [
        ErrorKind::UnsupportedAlgorithm,
        ErrorKind::KeyGenFailure,
        ErrorKind::InvalidInputLength,
        ErrorKind::EncapsulationFailure,
        ErrorKind::DecapsulationFailure,
        ErrorKind::SharedSecretMismatch,
        ErrorKind::ShortSharedSecret,
        ErrorKind::TransportFailure,
        ErrorKind::PersistenceFailure,
        ErrorKind::Config,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::UnsupportedAlgorithm => "unsupported-algorithm",
            ErrorKind::KeyGenFailure => "keygen-failure",
            ErrorKind::InvalidInputLength => "invalid-input-length",
            ErrorKind::EncapsulationFailure => "encapsulation-failure",
            ErrorKind::DecapsulationFailure => "decapsulation-failure",
            ErrorKind::SharedSecretMismatch => "shared-secret-mismatch",
            ErrorKind::ShortSharedSecret => "short-shared-secret",
            ErrorKind::TransportFailure => "transport-failure",
            ErrorKind::PersistenceFailure => "persistence-failure",
            ErrorKind::Config => "config",
        }
    }

    /// Process exit code. Crypto failures are 10-19, transport 20,
    /// persistence 30, configuration 2.
    pub fn exit_code(self) -> u8 {
        match self {
            ErrorKind::UnsupportedAlgorithm => 10,
            ErrorKind::KeyGenFailure => 11,
            ErrorKind::InvalidInputLength => 12,
            ErrorKind::EncapsulationFailure => 13,
            ErrorKind::DecapsulationFailure => 14,
            ErrorKind::SharedSecretMismatch => 15,
            ErrorKind::ShortSharedSecret => 16,
            ErrorKind::TransportFailure => 20,
            ErrorKind::PersistenceFailure => 30,
            ErrorKind::Config => 2,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
