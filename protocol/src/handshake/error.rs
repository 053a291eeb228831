//! Error types for the handshake.
//!
//! `InvalidProof` and `RedeemFailed` are the two outcomes a peer is allowed
//! to learn about. Neither says which check failed.

use thiserror::Error;

use crate::crypto::{KdfError, PointError, TicketError};

/// Everything that can stop a hello or a redeem.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HandshakeError {
    /// The hello's Schnorr proof did not verify. Never retried.
    #[error("invalid proof")]
    InvalidProof,

    /// Ticket could not be opened, or opened to an unexpected payload.
    #[error("ticket redemption failed")]
    RedeemFailed,

    /// A message field had the wrong length or shape.
    #[error("invalid message: {0}")]
    InvalidMessage(String),

    #[error("point decoding failed: {0}")]
    Point(#[from] PointError),

    #[error("key derivation failed: {0}")]
    KeyDerivation(#[from] KdfError),

    #[error("ticket error: {0}")]
    Ticket(#[from] TicketError),

    /// The issuer endpoint (transport) failed to deliver a response.
    #[error("issuer exchange failed: {0}")]
    Exchange(String),
}
