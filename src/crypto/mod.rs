//! Post-Quantum Cryptography Module
//!
//! KEM capability adapter and secret buffer handling.

pub mod kem;
pub mod secret;

#[cfg(test)]
pub(crate) mod testing;

pub use kem::{initialize, KemAlgorithm, KemBackend, KemParameters, KeyPair, MlKem768};
pub use secret::{ct_eq, SecretBytes};
