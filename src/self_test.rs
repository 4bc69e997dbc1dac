//! Local Verification Mode
//!
//! Runs key generation, encapsulation and decapsulation back to back in one
//! process and checks that both sides agree. The resulting PSK is printed,
//! never persisted.
//!
//! A self-test PSK is diagnostic output. Reusing it as a live tunnel key
//! is a misuse: it never crossed a peer boundary and was printed in clear.

use chrono::Utc;
use log::{error, info};
use serde::Serialize;
use std::time::{Duration, Instant};

use crate::crypto::{KemBackend, KemParameters};
use crate::error::ExchangeError;
use crate::psk::{self, Psk};

/// Result of a successful self-test
#[derive(Debug)]
pub struct SelfTestReport {
    pub parameters: KemParameters,
    pub psk: Psk,
    pub elapsed: Duration,
}

/// JSON form of a self-test result
#[derive(Debug, Serialize)]
pub struct SelfTestSummary {
    pub algorithm: String,
    pub hex: String,
    pub base64: String,
    pub psk_len: usize,
    pub elapsed_us: u64,
    pub timestamp: String,
}

impl SelfTestReport {
    pub fn summary(&self) -> SelfTestSummary {
        SelfTestSummary {
            algorithm: self.parameters.algorithm.to_string(),
            hex: self.psk.to_hex(),
            base64: self.psk.to_base64(),
            psk_len: self.psk.len(),
            elapsed_us: u64::try_from(self.elapsed.as_micros()).unwrap_or(u64::MAX),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

/// Run both roles in-process.
///
/// Disagreeing shared secrets mean the KEM backend itself is broken and are
/// reported as [`ExchangeError::SharedSecretMismatch`].
pub fn run_self_test(
    kem: &dyn KemBackend,
    allow_short_psk: bool,
) -> Result<SelfTestReport, ExchangeError> {
    let started = Instant::now();
    let parameters = kem.parameters();

    let key_pair = kem.generate_keypair()?;
    let (ciphertext, initiator_secret) = kem.encapsulate(&key_pair.public_key)?;
    let responder_secret = kem.decapsulate(&ciphertext, &key_pair.secret_key)?;
    drop(key_pair);

    if !initiator_secret.ct_eq(&responder_secret) {
        error!(
            "{} self-test produced different shared secrets; the KEM backend is faulty",
            parameters.algorithm
        );
        return Err(ExchangeError::SharedSecretMismatch);
    }

    let psk = psk::derive_checked(initiator_secret.as_bytes(), allow_short_psk)?;
    let elapsed = started.elapsed();
    info!("{} self-test passed in {:?}", parameters.algorithm, elapsed);

    Ok(SelfTestReport {
        parameters,
        psk,
        elapsed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::testing::{Fault, FaultyKem};
    use crate::crypto::MlKem768;
    use crate::error::ErrorKind;

    #[test]
    fn test_self_test_passes() {
        let report = run_self_test(&MlKem768, false).unwrap();
        assert_eq!(report.psk.len(), 32);
        assert_eq!(report.psk.to_hex().len(), 64);
        assert_eq!(report.parameters.ciphertext_len, 1088);
    }

    #[test]
    fn test_fresh_key_each_run() {
        let first = run_self_test(&MlKem768, false).unwrap();
        let second = run_self_test(&MlKem768, false).unwrap();
        assert_ne!(first.psk, second.psk);
    }

    #[test]
    fn test_corrupted_ciphertext_is_mismatch() {
        let err = run_self_test(&FaultyKem::new(Fault::CorruptCiphertext), false).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SharedSecretMismatch);
    }

    #[test]
    fn test_backend_failures_keep_their_kind() {
        let cases = [
            (Fault::KeyGen, ErrorKind::KeyGenFailure),
            (Fault::Encapsulate, ErrorKind::EncapsulationFailure),
            (Fault::Decapsulate, ErrorKind::DecapsulationFailure),
        ];
        for (fault, kind) in cases {
            let err = run_self_test(&FaultyKem::new(fault), false).unwrap_err();
            assert_eq!(err.kind(), kind);
        }
    }

    #[test]
    fn test_short_secret_policy() {
        let kem = FaultyKem::new(Fault::ShortSecret(24));
        let err = run_self_test(&kem, false).unwrap_err();
        assert!(matches!(err, ExchangeError::ShortSharedSecret { len: 24 }));

        let report = run_self_test(&kem, true).unwrap();
        assert_eq!(report.psk.len(), 24);
    }

    #[test]
    fn test_summary_json() {
        let report = run_self_test(&FaultyKem::new(Fault::None), false).unwrap();
        let json = serde_json::to_value(report.summary()).unwrap();
        assert_eq!(json["algorithm"], "ML-KEM-768");
        assert_eq!(json["hex"], report.psk.to_hex());
        assert_eq!(json["base64"], report.psk.to_base64());
        assert_eq!(json["psk_len"], 32);
    }

    #[test]
    fn test_summary_elapsed_saturates() {
        let mut report = run_self_test(&MlKem768, false).unwrap();
        report.elapsed = Duration::from_micros(1500);
        assert_eq!(report.summary().elapsed_us, 1500);

        report.elapsed = Duration::MAX;
        assert_eq!(report.summary().elapsed_us, u64::MAX);
    }
}
