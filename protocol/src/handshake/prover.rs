//! # Prover (vehicle side)
//!
//! ```text
//!   Init ──begin──► ProofSent ──response──► AwaitingTicket ──derive──► Established
//! ```
//!
//! [`ProverHandshake::begin`] draws a fresh ephemeral key pair and a fresh
//! 16-byte `c_nonce`, proves possession of the scalar over that nonce and
//! hands back the [`HelloRequest`] to send. [`ProverHandshake::receive`]
//! consumes the handshake, so a nonce/key pair can never be completed twice.
//!
//! The two states that outlive a call are types: a [`ProverHandshake`] is
//! always in `ProofSent`, an [`EstablishedSession`] always in `Established`.
//! Both report it through `state()`. `Init` and `AwaitingTicket` last only
//! for the duration of `begin` and `receive`, and show up in the transition
//! logs.
//!
//! The prover never opens the ticket. It derives `K_session` itself from
//! `ECDH(v, E_pub)` and the transcript, exactly as the issuer did.

use std::fmt;

use rand::rngs::OsRng;
use rand::RngCore;
use tracing::{debug, info};

use super::error::HandshakeError;
use super::issuer::IssuerEndpoint;
use super::messages::{FrameMessage, HelloRequest, HelloResponse, OpenSessionRequest};
use super::transcript::Transcript;
use crate::config::{KdfLabels, CLIENT_NONCE_LEN};
use crate::crypto::kdf::{derive_session_key, SessionKey};
use crate::crypto::keys::KeyPair;
use crate::crypto::point::CompressedPoint;
use crate::crypto::schnorr::prove;
use crate::frame::{tag_frame, FrameError, FrameHeader};
use crate::gateway::SessionId;

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

/// Where a prover-side handshake currently is.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProverState {
    Init,
    ProofSent,
    AwaitingTicket,
    Established,
}

impl fmt::Display for ProverState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProverState::Init => "init",
            ProverState::ProofSent => "proof_sent",
            ProverState::AwaitingTicket => "awaiting_ticket",
            ProverState::Established => "established",
        };
        f.write_str(name)
    }
}

// ---------------------------------------------------------------------------
// Handshake
// ---------------------------------------------------------------------------

/// An in-flight prover handshake.
pub struct ProverHandshake {
    keypair: KeyPair,
    c_nonce: [u8; CLIENT_NONCE_LEN],
    v_pub: CompressedPoint,
    labels: KdfLabels,
    state: ProverState,
}

impl ProverHandshake {
    /// Start a handshake with a fresh ephemeral key pair.
    pub fn begin() -> (Self, HelloRequest) {
        Self::begin_with_keypair(KeyPair::generate())
    }

    /// Start a handshake proving possession of `keypair`'s scalar.
    ///
    /// The nonce is always drawn fresh from the OS RNG.
    pub fn begin_with_keypair(keypair: KeyPair) -> (Self, HelloRequest) {
        let mut c_nonce = [0u8; CLIENT_NONCE_LEN];
        OsRng.fill_bytes(&mut c_nonce);

        let (v_pub, proof) = prove(&keypair.scalar(), &c_nonce);
        let request = HelloRequest {
            c_nonce: c_nonce.to_vec(),
            v_pub: v_pub.to_vec(),
            proof_r: proof.r,
            proof_s: proof.s,
        };

        debug!(
            v_pub = %hex::encode(&v_pub.as_bytes()[..8]),
            from = %ProverState::Init,
            to = %ProverState::ProofSent,
            "hello built"
        );

        let handshake = Self {
            keypair,
            c_nonce,
            v_pub,
            labels: KdfLabels::default(),
            state: ProverState::ProofSent,
        };
        (handshake, request)
    }

    /// Use non-default KDF labels. Must match the issuer's.
    pub fn with_labels(mut self, labels: KdfLabels) -> Self {
        self.labels = labels;
        self
    }

    /// Always [`ProverState::ProofSent`] for a handshake that exists.
    pub fn state(&self) -> ProverState {
        self.state
    }

    /// The freshness token this handshake proved over.
    pub fn c_nonce(&self) -> &[u8; CLIENT_NONCE_LEN] {
        &self.c_nonce
    }

    /// Finish the handshake with the issuer's response.
    ///
    /// # Errors
    ///
    /// - [`HandshakeError::InvalidMessage`] if `e_pub` is not a compressed
    ///   point, the ticket is empty, or the issuer reports a different
    ///   `k_info` label than ours.
    /// - [`HandshakeError::Point`] if `e_pub` is not on the curve.
    pub fn receive(mut self, response: &HelloResponse) -> Result<EstablishedSession, HandshakeError> {
        self.transition(ProverState::AwaitingTicket);

        let e_pub = CompressedPoint::try_from(response.e_pub.as_slice())
            .map_err(|_| HandshakeError::InvalidMessage("e_pub is not a compressed point".into()))?;
        if response.ticket.is_empty() {
            return Err(HandshakeError::InvalidMessage("empty ticket".into()));
        }
        if response.k_info != self.labels.k_info {
            return Err(HandshakeError::InvalidMessage(
                "issuer uses a different key derivation label".into(),
            ));
        }

        let shared = self.keypair.shared_secret(e_pub.as_bytes())?;
        let transcript = Transcript::new(&self.c_nonce, &self.v_pub, &e_pub);
        let k_session = derive_session_key(shared.as_bytes(), transcript.as_bytes(), &self.labels)?;

        self.transition(ProverState::Established);
        let session = EstablishedSession::new(k_session, response.ticket.clone(), transcript);
        info!(session_id = %session.session_id, "session established");
        Ok(session)
    }

    fn transition(&mut self, to: ProverState) {
        debug!(from = %self.state, %to, "prover transition");
        self.state = to;
    }
}

impl fmt::Debug for ProverHandshake {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProverHandshake")
            .field("v_pub", &self.v_pub)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

/// Run the full hello exchange against `endpoint`.
pub fn run_handshake_prover<E: IssuerEndpoint + ?Sized>(
    endpoint: &E,
) -> Result<EstablishedSession, HandshakeError> {
    let (handshake, request) = ProverHandshake::begin();
    let response = endpoint.hello(&request)?;
    handshake.receive(&response)
}

// ---------------------------------------------------------------------------
// Established session
// ---------------------------------------------------------------------------

/// What the prover keeps after a successful handshake.
///
/// The session id is picked here, on the vehicle, and announced to the
/// gateway with [`EstablishedSession::open_session_request`]. A gateway that
/// assigns its own ids can override it with
/// [`EstablishedSession::set_session_id`].
pub struct EstablishedSession {
    k_session: SessionKey,
    ticket: Vec<u8>,
    transcript: Transcript,
    session_id: SessionId,
    next_ctr: u64,
}

impl EstablishedSession {
    fn new(k_session: SessionKey, ticket: Vec<u8>, transcript: Transcript) -> Self {
        Self {
            k_session,
            ticket,
            transcript,
            session_id: SessionId::new(),
            next_ctr: 0,
        }
    }

    /// Always [`ProverState::Established`].
    pub fn state(&self) -> ProverState {
        ProverState::Established
    }

    /// The live session key. Never leaves the vehicle.
    pub fn k_session(&self) -> &SessionKey {
        &self.k_session
    }

    /// The opaque sealed ticket, to hand to the gateway.
    pub fn ticket(&self) -> &[u8] {
        &self.ticket
    }

    /// `c_nonce || V_pub || E_pub`, the ticket's associated data.
    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    /// Identifier this session is announced under.
    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    /// Adopt an id assigned by the gateway.
    pub fn set_session_id(&mut self, session_id: SessionId) {
        self.session_id = session_id;
    }

    /// Counter the next [`frame`](Self::frame) call will use.
    pub fn next_counter(&self) -> u64 {
        self.next_ctr
    }

    /// Ticket and transcript for the gateway, under this session's id.
    pub fn open_session_request(&self) -> OpenSessionRequest {
        OpenSessionRequest {
            session_id: self.session_id,
            ticket: self.ticket.clone(),
            transcript: self.transcript.to_vec(),
        }
    }

    /// Tag `payload` with the next counter (0, 1, 2, ...).
    pub fn frame(&mut self, can_id: u32, payload: &[u8]) -> Result<FrameMessage, FrameError> {
        let ctr = self.next_ctr;
        let next = ctr.checked_add(1).ok_or(FrameError::CounterExhausted)?;
        let tag = tag_frame(self.k_session.as_bytes(), FrameHeader(can_id), payload, ctr);
        self.next_ctr = next;

        Ok(FrameMessage {
            session_id: self.session_id,
            can_id,
            payload: payload.to_vec(),
            ctr,
            tag: tag.as_ref().to_vec(),
        })
    }
}

impl fmt::Debug for EstablishedSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EstablishedSession")
            .field("session_id", &self.session_id)
            .field("transcript", &self.transcript)
            .field("next_ctr", &self.next_ctr)
            .finish_non_exhaustive()
    }
}
