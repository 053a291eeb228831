//! # Ticket Sealing (ChaCha20-Poly1305)
//!
//! A ticket is the session key sealed under the issuer's static ticket key,
//! with the handshake transcript as associated data. Whoever presents the
//! ticket must also present the exact transcript it was minted for, or the
//! Poly1305 tag fails and they get nothing.
//!
//! ## Nonce management
//!
//! Random 96-bit nonces from `OsRng`, one per seal. Nonce reuse under the
//! same key leaks the keystream XOR and lets an attacker forge tags, so there
//! is no API that accepts a caller-chosen nonce.
//!
//! ## Wire format
//!
//! ```text
//! ticket = nonce (12) || ciphertext (len(plaintext)) || tag (16)
//! ```
//!
//! Errors are uninformative. "Wrong key", "wrong transcript"
//! and "corrupted ticket" all look the same from the outside.

use std::fmt;

use chacha20poly1305::{
    aead::{Aead, KeyInit, Payload},
    ChaCha20Poly1305, Key, Nonce,
};
use rand::RngCore;
use thiserror::Error;
use zeroize::{ZeroizeOnDrop, Zeroizing};

use crate::config::{ConfigError, TICKET_KEY_LEN, TICKET_NONCE_LEN, TICKET_TAG_LEN};

/// Ticket seal/open failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TicketError {
    /// Authentication failed, or the blob is too short to hold a nonce
    /// and a tag. Callers cannot tell the two apart.
    #[error("ticket invalid -- authentication failed")]
    TicketInvalid,

    #[error("ticket sealing failed")]
    SealFailed,
}

/// The issuer's static ticket key. Zeroized on drop, redacted in `Debug`.
#[derive(Clone, ZeroizeOnDrop)]
pub struct TicketKey {
    bytes: [u8; TICKET_KEY_LEN],
}

impl TicketKey {
    /// Wrap an existing 32-byte key.
    pub fn from_bytes(bytes: [u8; TICKET_KEY_LEN]) -> Self {
        Self { bytes }
    }

    /// Fresh key from the OS RNG.
    ///
    /// Tickets sealed under it can only be opened by issuers holding the same
    /// bytes, so a generated key means every outstanding ticket dies with the
    /// process.
    pub fn generate() -> Self {
        let mut bytes = [0u8; TICKET_KEY_LEN];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        Self { bytes }
    }

    /// Parse a hex-encoded key, e.g. from the environment.
    pub fn from_hex(hex_key: &str) -> Result<Self, ConfigError> {
        let raw = Zeroizing::new(hex::decode(hex_key).map_err(|_| ConfigError::InvalidTicketKey)?);
        let bytes: [u8; TICKET_KEY_LEN] = raw
            .as_slice()
            .try_into()
            .map_err(|_| ConfigError::InvalidTicketKey)?;
        Ok(Self { bytes })
    }

    /// Raw key bytes. Needed to share one key between issuer replicas.
    pub fn as_bytes(&self) -> &[u8; TICKET_KEY_LEN] {
        &self.bytes
    }

    fn cipher(&self) -> ChaCha20Poly1305 {
        ChaCha20Poly1305::new(Key::from_slice(&self.bytes))
    }
}

impl fmt::Debug for TicketKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TicketKey").finish_non_exhaustive()
    }
}

/// Seal `plaintext` under `key`, authenticating `aad`.
///
/// Returns `nonce || ciphertext_and_tag`.
pub fn seal_ticket(key: &TicketKey, aad: &[u8], plaintext: &[u8]) -> Result<Vec<u8>, TicketError> {
    let mut nonce_bytes = [0u8; TICKET_NONCE_LEN];
    rand::rngs::OsRng.fill_bytes(&mut nonce_bytes);

    let ciphertext = key
        .cipher()
        .encrypt(
            Nonce::from_slice(&nonce_bytes),
            Payload {
                msg: plaintext,
                aad,
            },
        )
        .map_err(|_| TicketError::SealFailed)?;

    let mut out = Vec::with_capacity(TICKET_NONCE_LEN + ciphertext.len());
    out.extend_from_slice(&nonce_bytes);
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

/// Open a ticket produced by [`seal_ticket`].
///
/// The plaintext comes back wrapped in [`Zeroizing`] since in practice it
/// always carries a session key.
pub fn open_ticket(
    key: &TicketKey,
    aad: &[u8],
    blob: &[u8],
) -> Result<Zeroizing<Vec<u8>>, TicketError> {
    if blob.len() < TICKET_NONCE_LEN + TICKET_TAG_LEN {
        return Err(TicketError::TicketInvalid);
    }
    let (nonce_bytes, ciphertext) = blob.split_at(TICKET_NONCE_LEN);

    key.cipher()
        .decrypt(
            Nonce::from_slice(nonce_bytes),
            Payload {
                msg: ciphertext,
                aad,
            },
        )
        .map(Zeroizing::new)
        .map_err(|_| TicketError::TicketInvalid)
}
