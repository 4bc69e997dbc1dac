//! Fault-injecting KEM backend for tests

use super::kem::{KemBackend, KemParameters, KeyPair, MlKem768};
use super::secret::SecretBytes;
use crate::error::ExchangeError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Fault {
    None,
    KeyGen,
    Encapsulate,
    Decapsulate,
    /// Flip a ciphertext bit after encapsulation, keeping the original secret
    CorruptCiphertext,
    /// Truncate every shared secret to this many bytes
    ShortSecret(usize),
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct FaultyKem {
    pub(crate) fault: Fault,
}

impl FaultyKem {
    pub(crate) fn new(fault: Fault) -> Self {
        Self { fault }
    }

    fn shorten(&self, secret: SecretBytes) -> SecretBytes {
        match self.fault {
            Fault::ShortSecret(len) => SecretBytes::from_slice(&secret.as_bytes()[..len]),
            _ => secret,
        }
    }
}

impl KemBackend for FaultyKem {
    fn parameters(&self) -> KemParameters {
        let mut params = MlKem768.parameters();
        if let Fault::ShortSecret(len) = self.fault {
            params.shared_secret_len = len;
        }
        params
    }

    fn generate_keypair(&self) -> Result<KeyPair, ExchangeError> {
        if self.fault == Fault::KeyGen {
            return Err(ExchangeError::KeyGenFailure("injected".to_string()));
        }
        MlKem768.generate_keypair()
    }

    fn encapsulate(&self, public_key: &[u8]) -> Result<(Vec<u8>, SecretBytes), ExchangeError> {
        if self.fault == Fault::Encapsulate {
            return Err(ExchangeError::EncapsulationFailure("injected".to_string()));
        }
        let (mut ciphertext, shared_secret) = MlKem768.encapsulate(public_key)?;
        if self.fault == Fault::CorruptCiphertext {
            ciphertext[0] ^= 0x80;
        }
        Ok((ciphertext, self.shorten(shared_secret)))
    }

    fn decapsulate(
        &self,
        ciphertext: &[u8],
        secret_key: &SecretBytes,
    ) -> Result<SecretBytes, ExchangeError> {
        if self.fault == Fault::Decapsulate {
            return Err(ExchangeError::DecapsulationFailure("injected".to_string()));
        }
        let shared_secret = MlKem768.decapsulate(ciphertext, secret_key)?;
        Ok(self.shorten(shared_secret))
    }
}
