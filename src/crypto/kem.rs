//! KEM Capability Adapter
//!
//! The key exchange only needs four operations from a key encapsulation
//! mechanism: key pair generation, encapsulation, decapsulation and the
//! fixed byte lengths of its values. [`KemBackend`] captures that contract;
//! [`MlKem768`] provides it on top of the RustCrypto `ml-kem` crate.

use kem::{Decapsulate, Encapsulate};
use ml_kem::kem::{DecapsulationKey, EncapsulationKey};
use ml_kem::{Encoded, EncodedSizeUser, KemCore, MlKem768Params};
use rand::rngs::OsRng;
use std::fmt;
use std::str::FromStr;
use zeroize::Zeroize;

use super::secret::SecretBytes;
use crate::error::ExchangeError;

/// Supported KEM algorithms
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KemAlgorithm {
    /// NIST security level 3 lattice KEM (1184-byte public keys)
    MlKem768,
}

impl KemAlgorithm {
    pub fn identifier(self) -> &'static str {
        match self {
            KemAlgorithm::MlKem768 => "ML-KEM-768",
        }
    }
}

impl fmt::Display for KemAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.identifier())
    }
}

impl FromStr for KemAlgorithm {
    type Err = ExchangeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ml-kem-768" | "mlkem768" | "kyber768" => Ok(KemAlgorithm::MlKem768),
            _ => Err(ExchangeError::UnsupportedAlgorithm(s.to_string())),
        }
    }
}

/// Byte lengths of every KEM value, fixed for the lifetime of an exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KemParameters {
    pub algorithm: KemAlgorithm,
    pub public_key_len: usize,
    pub secret_key_len: usize,
    pub ciphertext_len: usize,
    pub shared_secret_len: usize,
}

/// A freshly generated key pair. The secret key is wiped on drop.
#[derive(Debug)]
pub struct KeyPair {
    pub public_key: Vec<u8>,
    pub secret_key: SecretBytes,
}

/// Key encapsulation capability consumed by both exchange roles.
///
/// All operations are synchronous and single-call. Implementations must
/// length-check their inputs against [`KemBackend::parameters`] and
/// report [`ExchangeError::InvalidInputLength`] on mismatch.
pub trait KemBackend: Send + Sync {
    fn parameters(&self) -> KemParameters;

    fn generate_keypair(&self) -> Result<KeyPair, ExchangeError>;

    /// Returns `(ciphertext, shared_secret)`
    fn encapsulate(&self, public_key: &[u8]) -> Result<(Vec<u8>, SecretBytes), ExchangeError>;

    fn decapsulate(
        &self,
        ciphertext: &[u8],
        secret_key: &SecretBytes,
    ) -> Result<SecretBytes, ExchangeError>;
}

/// Resolve an algorithm identifier to a backend
pub fn initialize(algorithm_id: &str) -> Result<Box<dyn KemBackend>, ExchangeError> {
    match algorithm_id.parse::<KemAlgorithm>()? {
        KemAlgorithm::MlKem768 => Ok(Box::new(MlKem768)),
    }
}

pub(crate) fn check_len(
    what: &'static str,
    expected: usize,
    actual: usize,
) -> Result<(), ExchangeError> {
    if expected != actual {
        return Err(ExchangeError::InvalidInputLength {
            what,
            expected,
            actual,
        });
    }
    Ok(())
}

// ML-KEM-768 byte lengths (FIPS 203, parameter set 768)
const PUBLIC_KEY_LEN: usize = 1184;
const SECRET_KEY_LEN: usize = 2400;
const CIPHERTEXT_LEN: usize = 1088;
const SHARED_SECRET_LEN: usize = 32;

fn wipe(bytes: &mut [u8]) {
    bytes.zeroize();
}

/// ML-KEM-768 backend (FIPS 203).
///
/// Every intermediate copy of the decapsulation key or a shared secret is
/// wiped once it has been moved into a [`SecretBytes`]. The decapsulation
/// key itself zeroizes on drop.
#[derive(Debug, Clone, Copy, Default)]
pub struct MlKem768;

impl KemBackend for MlKem768 {
    fn parameters(&self) -> KemParameters {
        KemParameters {
            algorithm: KemAlgorithm::MlKem768,
            public_key_len: PUBLIC_KEY_LEN,
            secret_key_len: SECRET_KEY_LEN,
            ciphertext_len: CIPHERTEXT_LEN,
            shared_secret_len: SHARED_SECRET_LEN,
        }
    }

    fn generate_keypair(&self) -> Result<KeyPair, ExchangeError> {
        let (decapsulation_key, encapsulation_key) = ml_kem::MlKem768::generate(&mut OsRng);

        let mut dk_bytes = decapsulation_key.as_bytes();
        let key_pair = KeyPair {
            public_key: encapsulation_key.as_bytes().to_vec(),
            secret_key: SecretBytes::from_slice(&dk_bytes),
        };
        wipe(&mut dk_bytes);

        if key_pair.public_key.len() != PUBLIC_KEY_LEN
            || key_pair.secret_key.len() != SECRET_KEY_LEN
        {
            return Err(ExchangeError::KeyGenFailure(
                "backend returned key pair of unexpected size".to_string(),
            ));
        }
        Ok(key_pair)
    }

    fn encapsulate(&self, public_key: &[u8]) -> Result<(Vec<u8>, SecretBytes), ExchangeError> {
        check_len("public key", PUBLIC_KEY_LEN, public_key.len())?;
        let ek_bytes: &[u8; PUBLIC_KEY_LEN] = public_key
            .try_into()
            .map_err(|_| ExchangeError::EncapsulationFailure("malformed public key".to_string()))?;
        let encapsulation_key =
            EncapsulationKey::<MlKem768Params>::from_bytes(&(*ek_bytes).into());

        let (ciphertext, mut shared_key) = encapsulation_key
            .encapsulate(&mut OsRng)
            .map_err(|e| ExchangeError::EncapsulationFailure(format!("{:?}", e)))?;

        let shared_secret = SecretBytes::from_slice(&shared_key);
        wipe(&mut shared_key);
        Ok((ciphertext.to_vec(), shared_secret))
    }

    fn decapsulate(
        &self,
        ciphertext: &[u8],
        secret_key: &SecretBytes,
    ) -> Result<SecretBytes, ExchangeError> {
        check_len("ciphertext", CIPHERTEXT_LEN, ciphertext.len())?;
        check_len("secret key", SECRET_KEY_LEN, secret_key.len())?;

        let ct_bytes: &[u8; CIPHERTEXT_LEN] = ciphertext
            .try_into()
            .map_err(|_| ExchangeError::DecapsulationFailure("malformed ciphertext".to_string()))?;

        let mut encoded = Encoded::<DecapsulationKey<MlKem768Params>>::default();
        encoded.copy_from_slice(secret_key.as_bytes());
        let decapsulation_key = DecapsulationKey::<MlKem768Params>::from_bytes(&encoded);
        wipe(&mut encoded);

        let mut shared_key = decapsulation_key
            .decapsulate(&(*ct_bytes).into())
            .map_err(|e| ExchangeError::DecapsulationFailure(format!("{:?}", e)))?;

        let shared_secret = SecretBytes::from_slice(&shared_key);
        wipe(&mut shared_key);
        Ok(shared_secret)
    }
}
