//! # Gateway (Redeemer role)
//!
//! The control gateway never sees a proof or a curve point. It trades each
//! `(ticket, transcript)` pair for a session key exactly once, through the
//! issuer's redeem operation, and from then on checks frame tags with HMAC.
//!
//! ```text
//!   AwaitingRedeem ──open_session──► SessionBound ──close_session──► (gone)
//!                                        │  ▲
//!                                        └──┘ accept_frame
//! ```
//!
//! ## Counters
//!
//! Under [`CounterPolicy::Unchecked`] the frame counter is authenticated
//! but not tracked, so a captured frame can be replayed verbatim. Under
//! [`CounterPolicy::StrictlyIncreasing`] each session remembers the last
//! counter it accepted. A frame whose counter is not above it is rejected
//! with [`GatewayError::CounterReplay`]. The counter advances only once the
//! tag has verified.
//!
//! The tag check and the counter advance run inside one
//! [`SessionStore::update`] call, under the entry's lock. A frame racing a
//! rebind or a close is therefore checked entirely against the old entry or
//! entirely against the new one (or finds no entry at all).
//!
//! A rejected frame never tears the session down.

mod store;

pub use store::{MemorySessionStore, SessionEntry, SessionId, SessionStore};

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::{CounterPolicy, GatewayConfig};
use crate::crypto::kdf::SessionKey;
use crate::frame::{self, FrameHeader};
use crate::handshake::{
    FrameMessage, HandshakeError, IssuerEndpoint, OpenSessionRequest, RedeemRequest,
};
use crate::metrics::ProtocolMetrics;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Why the gateway refused a session open or a frame.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    #[error("unknown session")]
    UnknownSession,

    #[error("frame authentication failed")]
    FrameAuthFailed,

    #[error("frame counter replayed: last accepted {last}, got {got}")]
    CounterReplay { last: u64, got: u64 },

    #[error("session open failed: {0}")]
    Redeem(#[from] HandshakeError),
}

/// Gateway-side view of one session id.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RedeemerState {
    AwaitingRedeem,
    SessionBound,
}

// ---------------------------------------------------------------------------
// Redeemer
// ---------------------------------------------------------------------------

/// The control gateway.
///
/// `E` is how it reaches the issuer; `S` is where session keys live.
pub struct Redeemer<E, S = MemorySessionStore> {
    issuer: E,
    store: S,
    config: GatewayConfig,
    metrics: Option<Arc<ProtocolMetrics>>,
}

impl<E: IssuerEndpoint> Redeemer<E, MemorySessionStore> {
    /// Gateway with an in-memory session store.
    pub fn new(issuer: E, config: GatewayConfig) -> Self {
        Self::with_store(issuer, MemorySessionStore::new(), config)
    }
}

impl<E: IssuerEndpoint, S: SessionStore> Redeemer<E, S> {
    /// Gateway over a caller-supplied session store.
    ///
    /// # Arguments
    ///
    /// * `issuer` - How redeem requests reach the issuer. An in-process
    ///   [`Issuer`](crate::handshake::Issuer), a reference or `Arc` to one, or
    ///   a transport client.
    /// * `store` - Where session keys and counters live.
    /// * `config` - Counter policy.
    pub fn with_store(issuer: E, store: S, config: GatewayConfig) -> Self {
        Self {
            issuer,
            store,
            config,
            metrics: None,
        }
    }

    /// Count accepted and rejected frames into `metrics`.
    pub fn with_metrics(mut self, metrics: Arc<ProtocolMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// The gateway's settings, fixed at construction.
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// The backing session store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Whether `id` currently has a bound key.
    pub fn state(&self, id: &SessionId) -> RedeemerState {
        if self.store.get(id).is_some() {
            RedeemerState::SessionBound
        } else {
            RedeemerState::AwaitingRedeem
        }
    }

    /// Last counter accepted for `id`. Only tracked under
    /// [`CounterPolicy::StrictlyIncreasing`].
    pub fn last_counter(&self, id: &SessionId) -> Option<u64> {
        self.store.last_counter(id)
    }

    // -----------------------------------------------------------------------
    // Session lifecycle
    // -----------------------------------------------------------------------

    /// Redeem a ticket and bind the key under a freshly assigned id.
    pub fn open_session(&self, ticket: &[u8], transcript: &[u8]) -> Result<SessionId, GatewayError> {
        let id = SessionId::new();
        self.open_session_as(id, ticket, transcript)?;
        Ok(id)
    }

    /// Redeem a ticket and bind the key under a caller-chosen id.
    ///
    /// Nothing is stored unless redemption succeeds. Rebinding an existing
    /// id replaces its key and resets its counter.
    pub fn open_session_as(
        &self,
        id: SessionId,
        ticket: &[u8],
        transcript: &[u8],
    ) -> Result<(), GatewayError> {
        let response = self.issuer.redeem(&RedeemRequest {
            ticket: ticket.to_vec(),
            transcript: transcript.to_vec(),
        });
        let response = match response {
            Ok(r) => r,
            Err(e) => {
                warn!(session_id = %id, reason = %e, "session open failed");
                return Err(e.into());
            }
        };
        let key = SessionKey::from_slice(&response.k_session)
            .ok_or(GatewayError::Redeem(HandshakeError::RedeemFailed))?;

        self.store.put(id, key);
        info!(session_id = %id, "session bound");
        Ok(())
    }

    /// Handle an [`OpenSessionRequest`] from a prover.
    pub fn handle_open(&self, request: &OpenSessionRequest) -> Result<SessionId, GatewayError> {
        self.open_session_as(request.session_id, &request.ticket, &request.transcript)?;
        Ok(request.session_id)
    }

    /// Forget a session's key and counter. Returns whether it existed.
    pub fn close_session(&self, id: &SessionId) -> bool {
        let existed = self.store.delete(id);
        if existed {
            debug!(session_id = %id, "session closed");
        }
        existed
    }

    // -----------------------------------------------------------------------
    // Frames
    // -----------------------------------------------------------------------

    /// Check one frame for session `id`.
    pub fn verify_frame(
        &self,
        id: &SessionId,
        header: FrameHeader,
        payload: &[u8],
        ctr: u64,
        tag: &[u8],
    ) -> Result<(), GatewayError> {
        let result = self.check_frame(id, header, payload, ctr, tag);
        match &result {
            Ok(()) => {
                debug!(session_id = %id, %header, ctr, "frame accepted");
                self.count(|m| &m.frames_accepted_total);
            }
            Err(e) => {
                warn!(session_id = %id, %header, ctr, reason = %e, "frame rejected");
                self.count(|m| &m.frames_rejected_total);
            }
        }
        result
    }

    /// [`verify_frame`](Self::verify_frame) for a wire message.
    pub fn accept_frame(&self, frame: &FrameMessage) -> Result<(), GatewayError> {
        self.verify_frame(
            &frame.session_id,
            FrameHeader(frame.can_id),
            &frame.payload,
            frame.ctr,
            &frame.tag,
        )
    }

    fn check_frame(
        &self,
        id: &SessionId,
        header: FrameHeader,
        payload: &[u8],
        ctr: u64,
        tag: &[u8],
    ) -> Result<(), GatewayError> {
        let policy = self.config.counter_policy;
        let mut outcome = Ok(());
        let bound = self.store.update(id, &mut |entry| {
            outcome = check_entry(entry, policy, header, payload, ctr, tag);
        });
        if !bound {
            return Err(GatewayError::UnknownSession);
        }
        outcome
    }

    fn count(&self, pick: impl FnOnce(&ProtocolMetrics) -> &prometheus::IntCounter) {
        if let Some(metrics) = &self.metrics {
            pick(metrics).inc();
        }
    }
}

/// Tag check, then counter check and advance, on one locked entry.
fn check_entry(
    entry: &mut SessionEntry,
    policy: CounterPolicy,
    header: FrameHeader,
    payload: &[u8],
    ctr: u64,
    tag: &[u8],
) -> Result<(), GatewayError> {
    if !frame::verify_frame(entry.key.as_bytes(), header, payload, ctr, tag) {
        return Err(GatewayError::FrameAuthFailed);
    }

    match policy {
        CounterPolicy::Unchecked => Ok(()),
        CounterPolicy::StrictlyIncreasing => {
            if let Some(last) = entry.last_ctr {
                if ctr <= last {
                    return Err(GatewayError::CounterReplay { last, got: ctr });
                }
            }
            entry.last_ctr = Some(ctr);
            Ok(())
        }
    }
}
