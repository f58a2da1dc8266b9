//! Key identities as they appear in network documents.
//!
//! The nodelist never verifies signatures or performs key operations: it
//! only compares identities for equality.  These types therefore store raw
//! key material and expose equality, zero-checking, and hex formatting.

use std::fmt;

/// How many bytes are in an "RSA ID"?  (This is a legacy tor concept, and
/// refers to the SHA1 hash of the DER-encoded public key.)
pub const RSA_ID_LEN: usize = 20;

/// An identifier for an RSA key, based on SHA1 and DER encoding.
#[derive(Clone, Copy, Hash, Ord, PartialOrd, Eq, PartialEq, Default)]
pub struct RsaIdentity {
    /// SHA1 digest of a DER encoded public key.
    id: [u8; RSA_ID_LEN],
}

impl fmt::Display for RsaIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${}", hex::encode(self.id))
    }
}
impl fmt::Debug for RsaIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RsaIdentity {{ {} }}", self)
    }
}

impl RsaIdentity {
    /// Expose an RsaIdentity as a slice of bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.id[..]
    }
    /// Construct an RsaIdentity from a slice of bytes.
    ///
    /// Returns None if the input is not the right length.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        Some(RsaIdentity {
            id: bytes.try_into().ok()?,
        })
    }
    /// Decode an RsaIdentity from a hexadecimal string.
    ///
    /// The string must have no spaces, or any extra characters.
    pub fn from_hex(s: &str) -> Option<Self> {
        let bytes = hex::decode(s).ok()?;
        Self::from_bytes(&bytes)
    }
    /// Return true if this RsaIdentity is composed entirely of zeroed bytes.
    ///
    /// Such all-zero values should not be used internally, since they are
    /// not a valid key.  Instead, they are used to designate an identity
    /// that is not present.
    pub fn is_zero(&self) -> bool {
        self.id.iter().all(|b| *b == 0)
    }
}

impl From<[u8; RSA_ID_LEN]> for RsaIdentity {
    fn from(id: [u8; RSA_ID_LEN]) -> RsaIdentity {
        RsaIdentity { id }
    }
}

/// An Ed25519 identity key, as it is stored in documents.
///
/// This is the identity of a relay's signing key; we treat it as an opaque
/// 32-byte value, since the nodelist only compares identities.
#[derive(Clone, Copy, Hash, PartialOrd, Ord, Eq, PartialEq)]
pub struct Ed25519Identity {
    /// A raw unchecked public key.
    id: [u8; 32],
}

impl Ed25519Identity {
    /// Construct a new Ed25519Identity from a 32-byte sequence.
    pub fn new(id: [u8; 32]) -> Self {
        Ed25519Identity { id }
    }
    /// If `id` is of the correct length, wrap it in an Ed25519Identity.
    pub fn from_bytes(id: &[u8]) -> Option<Self> {
        Some(Ed25519Identity::new(id.try_into().ok()?))
    }
    /// Return a reference to the bytes in this key.
    pub fn as_bytes(&self) -> &[u8] {
        &self.id[..]
    }
    /// Return true if this identity consists entirely of zeroes.
    ///
    /// It is a mistake to use such an "identity", since every real Ed25519
    /// key has nonzero bytes somewhere.  The zero value marks an identity
    /// that is not actually present.
    pub fn is_zero(&self) -> bool {
        self.id.iter().all(|b| *b == 0)
    }
}

impl From<[u8; 32]> for Ed25519Identity {
    fn from(id: [u8; 32]) -> Self {
        Ed25519Identity::new(id)
    }
}

impl fmt::Display for Ed25519Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.id))
    }
}
impl fmt::Debug for Ed25519Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Ed25519Identity {{ {} }}", self)
    }
}

/// A Curve25519 public key, as used for the ntor onion-key handshake.
#[derive(Clone, Copy, Hash, Eq, PartialEq)]
pub struct Curve25519Public {
    /// A raw unchecked public key.
    key: [u8; 32],
}

impl Curve25519Public {
    /// Return a reference to the bytes in this key.
    pub fn as_bytes(&self) -> &[u8] {
        &self.key[..]
    }
    /// Return true if this key consists entirely of zeroes.
    ///
    /// (The all-zero "key" is how documents represent a missing onion key.)
    pub fn is_zero(&self) -> bool {
        self.key.iter().all(|b| *b == 0)
    }
}

impl From<[u8; 32]> for Curve25519Public {
    fn from(key: [u8; 32]) -> Self {
        Curve25519Public { key }
    }
}

impl fmt::Debug for Curve25519Public {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Curve25519Public {{ {} }}", hex::encode(self.key))
    }
}

#[cfg(test)]
mod test {
    #![allow(clippy::unwrap_used)]
    use super::*;

    #[test]
    fn rsa_id_basics() {
        let id = RsaIdentity::from([17; 20]);
        assert_eq!(id.as_bytes(), &[17; 20]);
        assert!(!id.is_zero());
        assert!(RsaIdentity::from([0; 20]).is_zero());

        let hex = "1111111111111111111111111111111111111111";
        assert_eq!(RsaIdentity::from_hex(hex), Some(id));
        assert_eq!(RsaIdentity::from_hex("171717"), None);
        assert_eq!(RsaIdentity::from_hex("wombat"), None);
        assert_eq!(format!("{}", id), format!("${}", hex));
    }

    #[test]
    fn ed_id_basics() {
        let id = Ed25519Identity::new([3; 32]);
        assert!(!id.is_zero());
        assert!(Ed25519Identity::new([0; 32]).is_zero());
        assert_eq!(Ed25519Identity::from_bytes(&[3; 32]), Some(id));
        assert_eq!(Ed25519Identity::from_bytes(&[3; 31]), None);
    }
}
