//! Handshake transcript: `c_nonce (16) || V_pub (33) || E_pub (33)`.
//!
//! The transcript names exactly one handshake. It feeds the KDF as context
//! and seals the ticket as AEAD associated data, so the same 82 bytes must
//! come out on both sides.

use std::fmt;

use crate::config::{CLIENT_NONCE_LEN, POINT_LEN, TRANSCRIPT_LEN};
use crate::crypto::point::CompressedPoint;

/// The 82-byte handshake transcript: `c_nonce || V_pub || E_pub`.
///
/// Both ends build it independently. It is the HKDF input alongside the
/// ECDH secret and the associated data of the ticket, so a ticket opens
/// only under the exact handshake that minted it.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Transcript([u8; TRANSCRIPT_LEN]);

impl Transcript {
    /// Concatenate the three handshake values.
    ///
    /// # Arguments
    ///
    /// * `c_nonce` - The prover's 16-byte freshness token.
    /// * `v_pub` - The prover's compressed public point.
    /// * `e_pub` - The issuer's ephemeral compressed public point.
    pub fn new(
        c_nonce: &[u8; CLIENT_NONCE_LEN],
        v_pub: &CompressedPoint,
        e_pub: &CompressedPoint,
    ) -> Self {
        let mut bytes = [0u8; TRANSCRIPT_LEN];
        bytes[..CLIENT_NONCE_LEN].copy_from_slice(c_nonce);
        bytes[CLIENT_NONCE_LEN..CLIENT_NONCE_LEN + POINT_LEN].copy_from_slice(v_pub.as_bytes());
        bytes[CLIENT_NONCE_LEN + POINT_LEN..].copy_from_slice(e_pub.as_bytes());
        Self(bytes)
    }

    /// Wrap bytes received off the wire. Only the length is checked; the
    /// ticket's AEAD tag decides whether they are the right ones.
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        let arr: [u8; TRANSCRIPT_LEN] = bytes.try_into().ok()?;
        Some(Self(arr))
    }

    /// The full 82 bytes.
    pub fn as_bytes(&self) -> &[u8; TRANSCRIPT_LEN] {
        &self.0
    }

    /// Owned copy, for wire messages.
    pub fn to_vec(&self) -> Vec<u8> {
        self.0.to_vec()
    }

    /// Bytes 0..16.
    pub fn c_nonce(&self) -> &[u8] {
        &self.0[..CLIENT_NONCE_LEN]
    }

    /// Bytes 16..49.
    pub fn v_pub(&self) -> &[u8] {
        &self.0[CLIENT_NONCE_LEN..CLIENT_NONCE_LEN + POINT_LEN]
    }

    /// Bytes 49..82.
    pub fn e_pub(&self) -> &[u8] {
        &self.0[CLIENT_NONCE_LEN + POINT_LEN..]
    }
}

impl AsRef<[u8]> for Transcript {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for Transcript {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Transcript({}..)", hex::encode(&self.0[..8]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::keys::KeyPair;

    #[test]
    fn test_layout() {
        let v = KeyPair::generate().public_bytes();
        let e = KeyPair::generate().public_bytes();
        let nonce = [0x11; CLIENT_NONCE_LEN];

        let t = Transcript::new(&nonce, &v, &e);
        assert_eq!(t.as_bytes().len(), 82);
        assert_eq!(t.c_nonce(), &nonce);
        assert_eq!(t.v_pub(), v.as_bytes());
        assert_eq!(t.e_pub(), e.as_bytes());

        let mut expected = nonce.to_vec();
        expected.extend_from_slice(v.as_bytes());
        expected.extend_from_slice(e.as_bytes());
        assert_eq!(t.to_vec(), expected);
    }

    #[test]
    fn test_from_slice_checks_length() {
        assert!(Transcript::from_slice(&[0u8; 82]).is_some());
        assert!(Transcript::from_slice(&[0u8; 81]).is_none());
        assert!(Transcript::from_slice(&[]).is_none());
    }
}
