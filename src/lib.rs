//! PQC PSK - Post-Quantum Pre-Shared Key Exchange
//!
//! Establishes a 32-byte pre-shared key between two peers with an
//! ML-KEM-768 key encapsulation, for use as the out-of-band PSK of a
//! classical tunnel such as WireGuard.
//!
//! The exchange does not authenticate peers. Over an untrusted channel it
//! is open to a man-in-the-middle.

pub mod config;
pub mod crypto;
pub mod error;
pub mod initiator;
pub mod protocol;
pub mod psk;
pub mod responder;
pub mod self_test;

pub use config::{ExchangeOptions, InitiatorConfig, ResponderConfig};
pub use crypto::{KemAlgorithm, KemBackend, KemParameters, MlKem768};
pub use error::{ErrorKind, ExchangeError};
pub use initiator::run_initiator;
pub use protocol::ExchangeOutcome;
pub use psk::{derive_psk, load_psk, persist_psk, Psk, PSK_LEN};
pub use responder::{run_responder, ResponderSession};
pub use self_test::run_self_test;
