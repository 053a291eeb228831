//! # Key Derivation (HKDF-SHA256)
//!
//! The raw ECDH output is never used as a key. It goes through two HKDF
//! stages, each with a zero salt and its own info label:
//!
//! ```text
//! K         = HKDF(shared_secret || transcript, info = "ECDDH-SDV-K")
//! K_session = HKDF(K,                           info = "ECDDH-SDV-session")
//! ```
//!
//! `K` is the protocol-wide key for one handshake; `K_session` is the only
//! thing that touches live traffic. Additional per-purpose keys can be hung
//! off `K` later without redoing the key agreement.
//!
//! Same inputs, same outputs, on both ends of the wire. That determinism is
//! what lets the prover and the issuer agree on `K_session` without ever
//! sending it.

use std::fmt;

use hkdf::Hkdf;
use sha2::Sha256;
use subtle::ConstantTimeEq;
use thiserror::Error;
use zeroize::{ZeroizeOnDrop, Zeroizing};

use crate::config::{KdfLabels, SESSION_KEY_LEN};

/// Maximum HKDF-SHA256 output: 255 * HashLen.
pub const HKDF_MAX_OUTPUT_LEN: usize = 255 * 32;

/// HKDF expansion failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum KdfError {
    #[error("requested {0} bytes, HKDF-SHA256 yields at most {HKDF_MAX_OUTPUT_LEN}")]
    OutputTooLong(usize),
}

/// A 32-byte session key.
///
/// Compared in constant time, zeroized on drop, never printed.
#[derive(Clone, ZeroizeOnDrop)]
pub struct SessionKey([u8; SESSION_KEY_LEN]);

impl SessionKey {
    /// Wrap 32 raw key bytes, e.g. ones just returned by a redeem call.
    pub fn from_bytes(bytes: [u8; SESSION_KEY_LEN]) -> Self {
        Self(bytes)
    }

    /// Accepts exactly [`SESSION_KEY_LEN`] bytes.
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        let arr: [u8; SESSION_KEY_LEN] = bytes.try_into().ok()?;
        Some(Self(arr))
    }

    /// Raw key bytes, for the frame MAC.
    pub fn as_bytes(&self) -> &[u8; SESSION_KEY_LEN] {
        &self.0
    }
}

impl PartialEq for SessionKey {
    fn eq(&self, other: &Self) -> bool {
        self.0.ct_eq(&other.0).into()
    }
}

impl Eq for SessionKey {}

impl fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionKey").finish_non_exhaustive()
    }
}

/// Single-step extract-and-expand with HKDF-SHA256 and no salt.
pub fn derive(ikm: &[u8], info: &[u8], length: usize) -> Result<Zeroizing<Vec<u8>>, KdfError> {
    let mut out = Zeroizing::new(vec![0u8; length]);
    Hkdf::<Sha256>::new(None, ikm)
        .expand(info, out.as_mut_slice())
        .map_err(|_| KdfError::OutputTooLong(length))?;
    Ok(out)
}

/// Fixed-size variant of [`derive`].
pub fn derive_array<const N: usize>(ikm: &[u8], info: &[u8]) -> Result<[u8; N], KdfError> {
    let mut out = [0u8; N];
    Hkdf::<Sha256>::new(None, ikm)
        .expand(info, &mut out)
        .map_err(|_| KdfError::OutputTooLong(N))?;
    Ok(out)
}

/// Run both stages of the session key schedule.
pub fn derive_session_key(
    shared_secret: &[u8],
    transcript: &[u8],
    labels: &KdfLabels,
) -> Result<SessionKey, KdfError> {
    let mut ikm = Zeroizing::new(Vec::with_capacity(shared_secret.len() + transcript.len()));
    ikm.extend_from_slice(shared_secret);
    ikm.extend_from_slice(transcript);

    let k = Zeroizing::new(derive_array::<SESSION_KEY_LEN>(ikm.as_slice(), &labels.k_info)?);
    let session = derive_array::<SESSION_KEY_LEN>(k.as_slice(), &labels.session_info)?;
    Ok(SessionKey(session))
}
