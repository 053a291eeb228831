//! # Protocol Configuration & Constants
//!
//! Every byte length and domain-separation label used on the wire lives here.
//! Changing any of these breaks compatibility with every vehicle already in
//! the field, so treat them as frozen.
//!
//! The runtime configuration objects ([`IssuerConfig`], [`GatewayConfig`])
//! are plain values built once at startup and handed to the role that owns
//! them. There are no process-wide globals: two issuers in the same test
//! binary do not share a ticket key unless you give them the same one.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::crypto::ticket::TicketKey;

// ---------------------------------------------------------------------------
// Encodings
// ---------------------------------------------------------------------------

/// Compressed SEC1 point: one parity byte plus the 32-byte x-coordinate.
pub const POINT_LEN: usize = 33;

/// Big-endian scalar length for P-256.
pub const SCALAR_LEN: usize = 32;

/// Prefix byte for a compressed point whose y-coordinate is even.
pub const POINT_TAG_EVEN: u8 = 0x02;

/// Prefix byte for a compressed point whose y-coordinate is odd.
pub const POINT_TAG_ODD: u8 = 0x03;

// ---------------------------------------------------------------------------
// Handshake
// ---------------------------------------------------------------------------

/// Length of the prover's freshness token (`c_nonce`).
pub const CLIENT_NONCE_LEN: usize = 16;

/// Transcript = `c_nonce || V_pub || E_pub`.
pub const TRANSCRIPT_LEN: usize = CLIENT_NONCE_LEN + 2 * POINT_LEN;

/// Session key length. Also the HKDF output length for both derivation stages.
pub const SESSION_KEY_LEN: usize = 32;

/// HKDF info label for the protocol-wide key `K`.
pub const KDF_INFO_K: &[u8] = b"ECDDH-SDV-K";

/// HKDF info label for the live session key derived from `K`.
pub const KDF_INFO_SESSION: &[u8] = b"ECDDH-SDV-session";

// ---------------------------------------------------------------------------
// Tickets
// ---------------------------------------------------------------------------

/// ChaCha20-Poly1305 key length.
pub const TICKET_KEY_LEN: usize = 32;

/// ChaCha20-Poly1305 nonce length. 96 bits, prepended to every ticket.
pub const TICKET_NONCE_LEN: usize = 12;

/// Poly1305 tag length.
pub const TICKET_TAG_LEN: usize = 16;

/// Every sealed ticket payload starts with this marker.
pub const TICKET_PAYLOAD_PREFIX: &[u8] = b"K_session:";

/// Environment variable holding the issuer's hex-encoded ticket key.
pub const TICKET_KEY_ENV: &str = "SDV_TICKET_KEY";

// ---------------------------------------------------------------------------
// Frames
// ---------------------------------------------------------------------------

/// Frame header: 4-byte big-endian channel identifier.
pub const FRAME_HEADER_LEN: usize = 4;

/// HMAC-SHA256 output length.
pub const FRAME_TAG_LEN: usize = 32;

/// Frame counter encoding length (big-endian u64).
pub const FRAME_COUNTER_LEN: usize = 8;

// ---------------------------------------------------------------------------
// Runtime configuration
// ---------------------------------------------------------------------------

/// Errors raised while assembling runtime configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid ticket key: expected {TICKET_KEY_LEN} hex-encoded bytes")]
    InvalidTicketKey,

    #[error("invalid gateway config: {0}")]
    InvalidGatewayConfig(String),

    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
}

/// The two HKDF info labels of the session key schedule.
///
/// Both parties must agree on these. The issuer echoes `k_info` back in
/// every hello response so a prover can detect a mismatch early.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfLabels {
    #[serde(with = "crate::handshake::messages::b64")]
    pub k_info: Vec<u8>,
    #[serde(with = "crate::handshake::messages::b64")]
    pub session_info: Vec<u8>,
}

impl Default for KdfLabels {
    fn default() -> Self {
        Self {
            k_info: KDF_INFO_K.to_vec(),
            session_info: KDF_INFO_SESSION.to_vec(),
        }
    }
}

/// State owned by an [`Issuer`](crate::handshake::Issuer).
///
/// Not `Serialize`. The ticket key stays in process memory.
#[derive(Clone, Debug)]
pub struct IssuerConfig {
    pub ticket_key: TicketKey,
    pub labels: KdfLabels,
}

impl IssuerConfig {
    /// Wrap an existing ticket key with the default labels.
    pub fn new(ticket_key: TicketKey) -> Self {
        Self {
            ticket_key,
            labels: KdfLabels::default(),
        }
    }

    /// Fresh random ticket key. Tickets minted under it die with the process.
    pub fn generate() -> Self {
        Self::new(TicketKey::generate())
    }

    /// Load the ticket key from [`TICKET_KEY_ENV`].
    ///
    /// An unset variable falls back to [`IssuerConfig::generate`]; a set but
    /// malformed one is an error, never silently replaced.
    pub fn from_env() -> Result<Self, ConfigError> {
        match std::env::var(TICKET_KEY_ENV) {
            Ok(hex_key) => Ok(Self::new(TicketKey::from_hex(hex_key.trim())?)),
            Err(_) => {
                tracing::warn!(
                    env = TICKET_KEY_ENV,
                    "ticket key not configured, generating an ephemeral one"
                );
                Ok(Self::generate())
            }
        }
    }

    /// Override the KDF labels.
    pub fn with_labels(mut self, labels: KdfLabels) -> Self {
        self.labels = labels;
        self
    }
}

/// What the gateway does with the caller-supplied frame counter.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CounterPolicy {
    /// The counter is authenticated but not tracked. A captured
    /// `(header, payload, ctr, tag)` tuple verifies again if replayed.
    #[default]
    Unchecked,
    /// Each session must present strictly increasing counters.
    StrictlyIncreasing,
}

/// Gateway (redeemer) settings.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default)]
    pub counter_policy: CounterPolicy,
}

impl GatewayConfig {
    /// Parse from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(json).map_err(|e| ConfigError::InvalidGatewayConfig(e.to_string()))
    }

    /// Read and parse a JSON file. See [`GatewayConfig::from_json`].
    ///
    /// # Arguments
    ///
    /// * `path` - Location of the gateway's JSON config file.
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(&raw)
    }
}
