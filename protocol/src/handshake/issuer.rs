//! # Issuer: proof verification, key derivation, ticket minting
//!
//! The issuer is stateless per request. A hello either fails with
//! [`HandshakeError::InvalidProof`] before any key material exists, or it
//! runs the whole pipeline:
//!
//! ```text
//! verify(V_pub, proof, c_nonce)
//! (e, E_pub)  = fresh key pair
//! shared      = ECDH(e, V_pub)
//! transcript  = c_nonce || V_pub || E_pub
//! K_session   = KDF(shared, transcript)
//! ticket      = seal(ticket_key, aad = transcript, "K_session:" || K_session)
//! ```
//!
//! `K_session` is dropped (and zeroized) as soon as the ticket is sealed.
//! The only way back to it is [`Issuer::redeem`] with the matching
//! transcript.

use std::sync::Arc;

use tracing::{debug, info, warn};
use zeroize::Zeroizing;

use super::error::HandshakeError;
use super::messages::{HelloRequest, HelloResponse, RedeemRequest, RedeemResponse};
use super::transcript::Transcript;
use crate::config::{IssuerConfig, CLIENT_NONCE_LEN, SESSION_KEY_LEN, TICKET_PAYLOAD_PREFIX};
use crate::crypto::kdf::derive_session_key;
use crate::crypto::keys::KeyPair;
use crate::crypto::point::CompressedPoint;
use crate::crypto::schnorr::verify_proof;
use crate::crypto::ticket::{open_ticket, seal_ticket};
use crate::metrics::ProtocolMetrics;

// ---------------------------------------------------------------------------
// Endpoint seam
// ---------------------------------------------------------------------------

/// The two issuer operations, as seen by its callers.
///
/// [`Issuer`] implements this in-process. A transport crate implements it
/// over the network, and the prover and gateway never know the difference.
pub trait IssuerEndpoint {
    fn hello(&self, request: &HelloRequest) -> Result<HelloResponse, HandshakeError>;

    fn redeem(&self, request: &RedeemRequest) -> Result<RedeemResponse, HandshakeError>;
}

impl<T: IssuerEndpoint + ?Sized> IssuerEndpoint for &T {
    fn hello(&self, request: &HelloRequest) -> Result<HelloResponse, HandshakeError> {
        (**self).hello(request)
    }

    fn redeem(&self, request: &RedeemRequest) -> Result<RedeemResponse, HandshakeError> {
        (**self).redeem(request)
    }
}

impl<T: IssuerEndpoint + ?Sized> IssuerEndpoint for Arc<T> {
    fn hello(&self, request: &HelloRequest) -> Result<HelloResponse, HandshakeError> {
        (**self).hello(request)
    }

    fn redeem(&self, request: &RedeemRequest) -> Result<RedeemResponse, HandshakeError> {
        (**self).redeem(request)
    }
}

// ---------------------------------------------------------------------------
// Issuer
// ---------------------------------------------------------------------------

/// The edge authentication server role.
///
/// Holds only the static ticket key and the KDF labels. Safe to share across
/// threads; every call draws its own randomness.
pub struct Issuer {
    config: IssuerConfig,
    metrics: Option<Arc<ProtocolMetrics>>,
}

impl Issuer {
    /// Issuer over `config`, without metrics.
    ///
    /// # Arguments
    ///
    /// * `config` - Ticket key and KDF labels. Every issuer that must redeem
    ///   another's tickets needs the same ticket key.
    pub fn new(config: IssuerConfig) -> Self {
        Self {
            config,
            metrics: None,
        }
    }

    /// Count outcomes in `metrics`.
    pub fn with_metrics(mut self, metrics: Arc<ProtocolMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Ticket key and labels this issuer runs with.
    pub fn config(&self) -> &IssuerConfig {
        &self.config
    }

    /// Verify a hello and mint a ticket for it.
    ///
    /// # Errors
    ///
    /// - [`HandshakeError::InvalidMessage`] if `c_nonce` is not 16 bytes.
    /// - [`HandshakeError::InvalidProof`] if the proof does not verify
    ///   against `v_pub` and `c_nonce`. Nothing is derived in that case.
    pub fn hello(&self, request: &HelloRequest) -> Result<HelloResponse, HandshakeError> {
        let result = self.process_hello(request);
        match &result {
            Ok(_) => self.count(|m| &m.hello_accepted_total),
            Err(e) => {
                warn!(reason = %e, "hello rejected");
                self.count(|m| &m.hello_rejected_total);
            }
        }
        result
    }

    fn process_hello(&self, request: &HelloRequest) -> Result<HelloResponse, HandshakeError> {
        let c_nonce: [u8; CLIENT_NONCE_LEN] =
            request.c_nonce.as_slice().try_into().map_err(|_| {
                HandshakeError::InvalidMessage(format!(
                    "c_nonce must be {CLIENT_NONCE_LEN} bytes, got {}",
                    request.c_nonce.len()
                ))
            })?;

        if !verify_proof(&request.v_pub, &request.proof(), &c_nonce) {
            return Err(HandshakeError::InvalidProof);
        }
        // The proof verified, so v_pub decodes.
        let v_pub = CompressedPoint::try_from(request.v_pub.as_slice())?;

        let ephemeral = KeyPair::generate();
        let e_pub = ephemeral.public_bytes();
        let shared = ephemeral.shared_secret(v_pub.as_bytes())?;
        let transcript = Transcript::new(&c_nonce, &v_pub, &e_pub);

        let k_session = derive_session_key(
            shared.as_bytes(),
            transcript.as_bytes(),
            &self.config.labels,
        )?;

        let mut payload = Zeroizing::new(Vec::with_capacity(
            TICKET_PAYLOAD_PREFIX.len() + SESSION_KEY_LEN,
        ));
        payload.extend_from_slice(TICKET_PAYLOAD_PREFIX);
        payload.extend_from_slice(k_session.as_bytes());

        let ticket = seal_ticket(&self.config.ticket_key, transcript.as_bytes(), &payload)?;

        debug!(
            v_pub = %hex::encode(&v_pub.as_bytes()[..8]),
            e_pub = %hex::encode(&e_pub.as_bytes()[..8]),
            "hello accepted, ticket issued"
        );

        Ok(HelloResponse {
            e_pub: e_pub.to_vec(),
            ticket,
            k_info: self.config.labels.k_info.clone(),
        })
    }

    /// Open a ticket against its transcript and hand back the session key.
    ///
    /// Every failure, whether a tampered ticket, a wrong transcript or a
    /// payload without the `K_session:` marker, is
    /// [`HandshakeError::RedeemFailed`].
    pub fn redeem(&self, request: &RedeemRequest) -> Result<RedeemResponse, HandshakeError> {
        let result = self.process_redeem(request);
        match &result {
            Ok(_) => {
                info!("ticket redeemed");
                self.count(|m| &m.tickets_redeemed_total);
            }
            Err(_) => {
                warn!(ticket_len = request.ticket.len(), "ticket redemption failed");
                self.count(|m| &m.redeem_failed_total);
            }
        }
        result
    }

    fn process_redeem(&self, request: &RedeemRequest) -> Result<RedeemResponse, HandshakeError> {
        let plaintext = open_ticket(
            &self.config.ticket_key,
            &request.transcript,
            &request.ticket,
        )
        .map_err(|_| HandshakeError::RedeemFailed)?;

        let k_session = plaintext
            .strip_prefix(TICKET_PAYLOAD_PREFIX)
            .filter(|k| k.len() == SESSION_KEY_LEN)
            .ok_or(HandshakeError::RedeemFailed)?;

        Ok(RedeemResponse {
            k_session: k_session.to_vec(),
        })
    }

    fn count(&self, pick: impl FnOnce(&ProtocolMetrics) -> &prometheus::IntCounter) {
        if let Some(metrics) = &self.metrics {
            pick(metrics).inc();
        }
    }
}

impl std::fmt::Debug for Issuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Issuer")
            .field("config", &self.config)
            .field("metrics", &self.metrics.is_some())
            .finish()
    }
}

impl IssuerEndpoint for Issuer {
    fn hello(&self, request: &HelloRequest) -> Result<HelloResponse, HandshakeError> {
        Issuer::hello(self, request)
    }

    fn redeem(&self, request: &RedeemRequest) -> Result<RedeemResponse, HandshakeError> {
        Issuer::redeem(self, request)
    }
}
