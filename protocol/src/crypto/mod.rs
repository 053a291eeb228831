//! # Cryptographic Primitives
//!
//! Everything the handshake and the gateway need, and nothing more:
//!
//! - **P-256** for key agreement and the Schnorr proof group.
//! - **SHA-256** for the Fiat–Shamir challenge and as the HKDF hash.
//! - **ChaCha20-Poly1305** for sealing tickets.
//! - **HMAC-SHA256** for frame tags (see [`crate::frame`]).
//!
//! Group arithmetic comes from the audited `p256` crate. The one piece we do
//! ourselves is point decompression ([`point`] on top of [`modsqrt`]), so
//! the codec stays independent of any one curve implementation.
//!
//! Key bytes are never logged and never appear in error messages.

pub mod kdf;
pub mod keys;
pub mod modsqrt;
pub mod point;
pub mod schnorr;
pub mod ticket;

pub use kdf::{derive, derive_session_key, KdfError, SessionKey};
pub use keys::{shared_secret, KeyError, KeyPair, SharedSecret};
pub use point::{decode_point, encode_point, CompressedPoint, PointError};
pub use schnorr::{prove, verify_proof, SchnorrProof};
pub use ticket::{open_ticket, seal_ticket, TicketError, TicketKey};
