//! Secret Buffers
//!
//! Heap buffers for secret keys and shared secrets. The contents are
//! overwritten with zeros when the buffer is dropped, on every exit path.

use std::fmt;
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

/// Secret byte buffer, wiped on drop
#[derive(Clone)]
pub struct SecretBytes(Zeroizing<Vec<u8>>);

impl SecretBytes {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(Zeroizing::new(bytes))
    }

    pub fn from_slice(bytes: &[u8]) -> Self {
        Self::new(bytes.to_vec())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Constant-time comparison with another secret
    pub fn ct_eq(&self, other: &SecretBytes) -> bool {
        ct_eq(self.as_bytes(), other.as_bytes())
    }
}

impl fmt::Debug for SecretBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretBytes([REDACTED; {}])", self.len())
    }
}

/// Constant-time equality. Lengths are not secret; unequal lengths
/// compare unequal.
pub fn ct_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && bool::from(a.ct_eq(b))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_is_redacted() {
        let secret = SecretBytes::from_slice(&[0xAB; 32]);
        let shown = format!("{:?}", secret);
        assert!(shown.contains("REDACTED"));
        assert!(!shown.to_lowercase().contains("ab, ab"));
    }

    #[test]
    fn test_ct_eq() {
        let a = SecretBytes::from_slice(&[1, 2, 3, 4]);
        let b = SecretBytes::from_slice(&[1, 2, 3, 4]);
        let c = SecretBytes::from_slice(&[1, 2, 3, 5]);
        assert!(a.ct_eq(&b));
        assert!(!a.ct_eq(&c));
        assert!(!ct_eq(&[1, 2, 3], &[1, 2, 3, 4]));
    }
}
