//! # Key Pairs and ECDH
//!
//! Every handshake uses fresh P-256 key pairs on both sides. The private
//! scalar is uniform in `[1, n-1]` (drawn by `p256` from `OsRng`) and the
//! public point is always `scalar * G`.
//!
//! [`shared_secret`] returns the x-coordinate of `priv * peer`. That is key
//! derivation *input*, not a key. Feed it to
//! [`derive_session_key`](super::kdf::derive_session_key).
//!
//! Private scalars are zeroized on drop (courtesy of `p256::SecretKey`) and
//! never appear in `Debug` output or logs.

use std::fmt;

use p256::ecdh::diffie_hellman;
use p256::{FieldBytes, NonZeroScalar, PublicKey, SecretKey};
use rand::rngs::OsRng;
use thiserror::Error;
use zeroize::Zeroizing;

use super::point::{decode_point, encode_point, CompressedPoint, PointError};
use crate::config::SCALAR_LEN;

/// Key construction failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum KeyError {
    #[error("invalid private scalar: must be in [1, n-1]")]
    InvalidScalar,
}

/// A P-256 key pair.
#[derive(Clone)]
pub struct KeyPair {
    secret: SecretKey,
    public: PublicKey,
}

impl KeyPair {
    /// Fresh uniform scalar from the OS RNG.
    pub fn generate() -> Self {
        Self::from_secret(SecretKey::random(&mut OsRng))
    }

    /// Build from a big-endian scalar. Zero and values `>= n` are rejected.
    pub fn from_scalar_bytes(bytes: &[u8; SCALAR_LEN]) -> Result<Self, KeyError> {
        let secret =
            SecretKey::from_bytes(FieldBytes::from_slice(bytes)).map_err(|_| KeyError::InvalidScalar)?;
        Ok(Self::from_secret(secret))
    }

    fn from_secret(secret: SecretKey) -> Self {
        let public = secret.public_key();
        Self { secret, public }
    }

    /// The public point `V = v·G`.
    pub fn public_key(&self) -> &PublicKey {
        &self.public
    }

    /// The public point in its 33-byte compressed wire form.
    ///
    /// This is what goes into a `HelloRequest` as `v_pub` and into the
    /// transcript, so both ends must agree on it byte for byte.
    pub fn public_bytes(&self) -> CompressedPoint {
        encode_point(&self.public)
    }

    /// The secret scalar `v`. Handle with care: it is `Copy` inside `p256`
    /// and is not zeroized once it leaves this key pair.
    pub fn scalar(&self) -> NonZeroScalar {
        self.secret.to_nonzero_scalar()
    }

    /// ECDH against a compressed peer point.
    pub fn shared_secret(&self, peer_pub: &[u8]) -> Result<SharedSecret, PointError> {
        shared_secret(&self.scalar(), peer_pub)
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("public", &self.public_bytes())
            .finish_non_exhaustive()
    }
}

/// Raw ECDH output (the x-coordinate of the shared point).
pub struct SharedSecret(Zeroizing<[u8; SCALAR_LEN]>);

impl SharedSecret {
    /// Feed this to
    /// [`derive_session_key`](crate::crypto::kdf::derive_session_key), never
    /// use it as a key directly.
    pub fn as_bytes(&self) -> &[u8; SCALAR_LEN] {
        &self.0
    }
}

impl fmt::Debug for SharedSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedSecret").finish_non_exhaustive()
    }
}

/// Decode `peer_pub` with the crate's own codec, then compute `priv * peer`.
pub fn shared_secret(secret: &NonZeroScalar, peer_pub: &[u8]) -> Result<SharedSecret, PointError> {
    let peer = decode_point(peer_pub)?;
    let shared = diffie_hellman(secret, peer.as_affine());
    let mut out = Zeroizing::new([0u8; SCALAR_LEN]);
    out.copy_from_slice(shared.raw_secret_bytes());
    Ok(SharedSecret(out))
}
