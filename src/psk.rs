//! Pre-Shared Key Derivation and Persistence
//!
//! The PSK is the first 32 bytes of the KEM shared secret, stored as raw
//! bytes with no framing. WireGuard consumes the same 32 bytes as a
//! base64 `PresharedKey`.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use log::{debug, info};
use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use zeroize::Zeroizing;

use crate::error::ExchangeError;

/// Length of a full pre-shared key
pub const PSK_LEN: usize = 32;

/// Default file name used by both roles
pub const DEFAULT_PSK_PATH: &str = "pqc_psk.key";

/// Derived pre-shared key, wiped on drop
#[derive(Clone, PartialEq, Eq)]
pub struct Psk(Zeroizing<Vec<u8>>);

impl Psk {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn is_full_length(&self) -> bool {
        self.len() == PSK_LEN
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.as_bytes())
    }

    pub fn to_base64(&self) -> String {
        BASE64.encode(self.as_bytes())
    }
}

impl fmt::Debug for Psk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Psk([REDACTED; {}])", self.len())
    }
}

/// Take the first `min(32, len)` bytes of a shared secret
pub fn derive_psk(shared_secret: &[u8]) -> Psk {
    let len = shared_secret.len().min(PSK_LEN);
    Psk(Zeroizing::new(shared_secret[..len].to_vec()))
}

/// Derive a PSK, rejecting short secrets unless `allow_short` is set
pub fn derive_checked(shared_secret: &[u8], allow_short: bool) -> Result<Psk, ExchangeError> {
    let psk = derive_psk(shared_secret);
    if !psk.is_full_length() && !allow_short {
        return Err(ExchangeError::ShortSharedSecret { len: psk.len() });
    }
    Ok(psk)
}

/// Overwrite `path` with exactly the PSK bytes.
///
/// On Unix a newly created file gets mode 0600.
pub fn persist_psk(psk: &Psk, path: &Path) -> Result<(), ExchangeError> {
    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let write = || -> io::Result<()> {
        let mut file = options.open(path)?;
        file.write_all(psk.as_bytes())?;
        file.sync_all()
    };
    write().map_err(|e| ExchangeError::persistence(path, e))?;

    info!("PSK ({} bytes) saved to {}", psk.len(), path.display());
    Ok(())
}

/// Read a persisted PSK back
pub fn load_psk(path: &Path) -> Result<Psk, ExchangeError> {
    let bytes = Zeroizing::new(fs::read(path).map_err(|e| ExchangeError::persistence(path, e))?);
    if bytes.is_empty() || bytes.len() > PSK_LEN {
        return Err(ExchangeError::persistence(
            path,
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("expected 1..={} bytes, found {}", PSK_LEN, bytes.len()),
            ),
        ));
    }
    debug!("Loaded {}-byte PSK from {}", bytes.len(), path.display());
    Ok(derive_psk(&bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use std::path::PathBuf;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("pqc-psk-{}-{}.key", name, uuid::Uuid::new_v4()))
    }

    #[test]
    fn test_derive_truncates_to_32() {
        let secret: Vec<u8> = (0..64).collect();
        let psk = derive_psk(&secret);
        assert_eq!(psk.len(), PSK_LEN);
        assert_eq!(psk.as_bytes(), &secret[..32]);
    }

    #[test]
    fn test_derive_is_deterministic() {
        let secret = [0x5Au8; 32];
        assert_eq!(derive_psk(&secret), derive_psk(&secret));
        assert_eq!(derive_psk(&secret).as_bytes(), &secret);
    }

    #[test]
    fn test_derive_short_secret() {
        for len in [0usize, 1, 16, 31, 32, 33, 48] {
            let secret = vec![7u8; len];
            assert_eq!(derive_psk(&secret).len(), len.min(PSK_LEN));
        }

        let err = derive_checked(&[1u8; 16], false).unwrap_err();
        assert!(matches!(err, ExchangeError::ShortSharedSecret { len: 16 }));
        assert_eq!(derive_checked(&[1u8; 16], true).unwrap().len(), 16);
        assert!(derive_checked(&[1u8; 32], false).unwrap().is_full_length());
    }

    #[test]
    fn test_encodings() {
        let psk = derive_psk(&[0u8; 32]);
        assert_eq!(psk.to_hex(), "0".repeat(64));
        assert_eq!(psk.to_base64(), "AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA=");

        let psk = derive_psk(&[0xde, 0xad, 0xbe, 0xef]);
        assert_eq!(psk.to_hex(), "deadbeef");
    }

    #[test]
    fn test_persist_and_load() {
        let path = temp_path("persist");
        let secret: Vec<u8> = (100..140).collect();
        let psk = derive_psk(&secret);

        persist_psk(&psk, &path).unwrap();
        let on_disk = fs::read(&path).unwrap();
        assert_eq!(on_disk, &secret[..32]);
        assert_eq!(load_psk(&path).unwrap(), psk);

        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_persist_overwrites() {
        let path = temp_path("overwrite");
        fs::write(&path, vec![0xFFu8; 100]).unwrap();

        let psk = derive_psk(&[0x11u8; 32]);
        persist_psk(&psk, &path).unwrap();
        assert_eq!(fs::read(&path).unwrap(), vec![0x11u8; 32]);

        fs::remove_file(&path).unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn test_persist_file_mode() {
        use std::os::unix::fs::PermissionsExt;

        let path = temp_path("mode");
        persist_psk(&derive_psk(&[3u8; 32]), &path).unwrap();
        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);

        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_persist_failure() {
        let path = std::env::temp_dir()
            .join(format!("missing-dir-{}", uuid::Uuid::new_v4()))
            .join("psk.key");
        let err = persist_psk(&derive_psk(&[1u8; 32]), &path).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PersistenceFailure);
    }

    #[test]
    fn test_load_rejects_oversized_file() {
        let path = temp_path("oversized");
        fs::write(&path, vec![1u8; 33]).unwrap();
        let err = load_psk(&path).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PersistenceFailure);
        fs::remove_file(&path).unwrap();
    }
}
