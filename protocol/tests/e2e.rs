//! End-to-end integration tests for the SDV authentication protocol.
//!
//! These run the three roles against each other in-process: prover hello,
//! issuer verification and ticket minting, gateway redemption, and a stream
//! of tagged frames. Every test builds its own issuer with its own ticket
//! key, so nothing is shared between tests.

use std::sync::Arc;

use sdv_auth::config::{CounterPolicy, GatewayConfig, IssuerConfig, CLIENT_NONCE_LEN, SCALAR_LEN};
use sdv_auth::crypto::keys::KeyPair;
use sdv_auth::crypto::schnorr::prove;
use sdv_auth::crypto::ticket::TicketKey;
use sdv_auth::frame::{tag_frame, verify_frame, FrameHeader};
use sdv_auth::gateway::{GatewayError, Redeemer, RedeemerState, SessionId, SessionStore};
use sdv_auth::handshake::{
    run_handshake_prover, HandshakeError, HelloRequest, HelloResponse, Issuer, IssuerEndpoint,
    ProverHandshake, RedeemRequest, RedeemResponse,
};
use sdv_auth::metrics::ProtocolMetrics;

// ---------------------------------------------------------------------------
// Test Helpers
// ---------------------------------------------------------------------------

fn issuer() -> Issuer {
    Issuer::new(IssuerConfig::generate())
}

fn strict() -> GatewayConfig {
    GatewayConfig {
        counter_policy: CounterPolicy::StrictlyIncreasing,
    }
}

/// Hello for a fixed scalar and nonce, built directly from the proof engine.
fn hello_for(kp: &KeyPair, c_nonce: [u8; CLIENT_NONCE_LEN]) -> HelloRequest {
    let (v_pub, proof) = prove(&kp.scalar(), &c_nonce);
    HelloRequest {
        c_nonce: c_nonce.to_vec(),
        v_pub: v_pub.to_vec(),
        proof_r: proof.r,
        proof_s: proof.s,
    }
}

/// Endpoint that serializes every message through JSON, the way a real
/// transport would.
struct JsonEndpoint<'a>(&'a Issuer);

impl IssuerEndpoint for JsonEndpoint<'_> {
    fn hello(&self, request: &HelloRequest) -> Result<HelloResponse, HandshakeError> {
        let wire = serde_json::to_string(request).map_err(|e| HandshakeError::Exchange(e.to_string()))?;
        let request: HelloRequest =
            serde_json::from_str(&wire).map_err(|e| HandshakeError::Exchange(e.to_string()))?;
        let response = self.0.hello(&request)?;
        let wire = serde_json::to_string(&response).map_err(|e| HandshakeError::Exchange(e.to_string()))?;
        serde_json::from_str(&wire).map_err(|e| HandshakeError::Exchange(e.to_string()))
    }

    fn redeem(&self, request: &RedeemRequest) -> Result<RedeemResponse, HandshakeError> {
        let wire = serde_json::to_string(request).map_err(|e| HandshakeError::Exchange(e.to_string()))?;
        let request: RedeemRequest =
            serde_json::from_str(&wire).map_err(|e| HandshakeError::Exchange(e.to_string()))?;
        let response = self.0.redeem(&request)?;
        let wire = serde_json::to_string(&response).map_err(|e| HandshakeError::Exchange(e.to_string()))?;
        serde_json::from_str(&wire).map_err(|e| HandshakeError::Exchange(e.to_string()))
    }
}

/// Endpoint whose transport is down.
struct Unreachable;

impl IssuerEndpoint for Unreachable {
    fn hello(&self, _: &HelloRequest) -> Result<HelloResponse, HandshakeError> {
        Err(HandshakeError::Exchange("connection refused".into()))
    }

    fn redeem(&self, _: &RedeemRequest) -> Result<RedeemResponse, HandshakeError> {
        Err(HandshakeError::Exchange("connection refused".into()))
    }
}

// ---------------------------------------------------------------------------
// Handshake
// ---------------------------------------------------------------------------

#[test]
fn test_prover_and_issuer_derive_identical_keys() {
    let issuer = issuer();
    let session = run_handshake_prover(&issuer).unwrap();

    let redeemed = issuer
        .redeem(&RedeemRequest {
            ticket: session.ticket().to_vec(),
            transcript: session.transcript().to_vec(),
        })
        .unwrap();

    assert_eq!(redeemed.k_session.len(), 32);
    assert_eq!(redeemed.k_session.as_slice(), session.k_session().as_bytes());
}

#[test]
fn test_two_handshakes_never_share_keys_or_transcripts() {
    let issuer = issuer();
    let a = run_handshake_prover(&issuer).unwrap();
    let b = run_handshake_prover(&issuer).unwrap();

    assert_ne!(a.k_session(), b.k_session());
    assert_ne!(a.transcript(), b.transcript());
    assert_ne!(a.ticket(), b.ticket());
}

#[test]
fn test_handshake_over_json_transport() {
    let issuer = issuer();
    let endpoint = JsonEndpoint(&issuer);
    let session = run_handshake_prover(&endpoint).unwrap();

    let gateway = Redeemer::new(&endpoint, GatewayConfig::default());
    let id = gateway
        .open_session(session.ticket(), session.transcript().as_bytes())
        .unwrap();
    assert_eq!(gateway.store().get(&id).as_ref(), Some(session.k_session()));
}

#[test]
fn test_transport_failure_surfaces_as_exchange_error() {
    assert!(matches!(
        run_handshake_prover(&Unreachable).unwrap_err(),
        HandshakeError::Exchange(_)
    ));

    let gateway = Redeemer::new(Unreachable, GatewayConfig::default());
    assert!(matches!(
        gateway.open_session(&[0; 70], &[0; 82]).unwrap_err(),
        GatewayError::Redeem(HandshakeError::Exchange(_))
    ));
}

#[test]
fn test_issuers_with_different_ticket_keys_are_independent() {
    let a = issuer();
    let b = issuer();
    let session = run_handshake_prover(&a).unwrap();

    let request = RedeemRequest {
        ticket: session.ticket().to_vec(),
        transcript: session.transcript().to_vec(),
    };
    assert!(a.redeem(&request).is_ok());
    assert_eq!(b.redeem(&request).unwrap_err(), HandshakeError::RedeemFailed);
}

#[test]
fn test_issuer_from_shared_ticket_key_redeems_peer_tickets() {
    let key = TicketKey::generate();
    let minting = Issuer::new(IssuerConfig::new(key.clone()));
    let redeeming = Issuer::new(IssuerConfig::new(key));

    let session = run_handshake_prover(&minting).unwrap();
    let redeemed = redeeming
        .redeem(&RedeemRequest {
            ticket: session.ticket().to_vec(),
            transcript: session.transcript().to_vec(),
        })
        .unwrap();
    assert_eq!(redeemed.k_session.as_slice(), session.k_session().as_bytes());
}

// ---------------------------------------------------------------------------
// Scalar 7, zero nonce
// ---------------------------------------------------------------------------

#[test]
fn test_scalar_seven_zero_nonce_accepted() {
    let mut scalar = [0u8; SCALAR_LEN];
    scalar[SCALAR_LEN - 1] = 7;
    let kp = KeyPair::from_scalar_bytes(&scalar).unwrap();

    let issuer = issuer();
    let request = hello_for(&kp, [0u8; CLIENT_NONCE_LEN]);
    let response = issuer.hello(&request).unwrap();
    assert_eq!(response.e_pub.len(), 33);
}

#[test]
fn test_scalar_seven_rejected_under_different_nonce() {
    let mut scalar = [0u8; SCALAR_LEN];
    scalar[SCALAR_LEN - 1] = 7;
    let kp = KeyPair::from_scalar_bytes(&scalar).unwrap();

    let issuer = issuer();
    let mut request = hello_for(&kp, [0u8; CLIENT_NONCE_LEN]);
    request.c_nonce[CLIENT_NONCE_LEN - 1] = 1;
    assert_eq!(issuer.hello(&request).unwrap_err(), HandshakeError::InvalidProof);
}

// ---------------------------------------------------------------------------
// Redemption
// ---------------------------------------------------------------------------

#[test]
fn test_every_transcript_byte_flip_fails_redemption() {
    let issuer = issuer();
    let session = run_handshake_prover(&issuer).unwrap();
    let transcript = session.transcript().to_vec();

    for i in 0..transcript.len() {
        let mut tampered = transcript.clone();
        tampered[i] ^= 0x01;
        let err = issuer
            .redeem(&RedeemRequest {
                ticket: session.ticket().to_vec(),
                transcript: tampered,
            })
            .unwrap_err();
        assert_eq!(err, HandshakeError::RedeemFailed, "byte {i}");
    }
}

#[test]
fn test_ticket_from_one_handshake_does_not_open_under_another_transcript() {
    let issuer = issuer();
    let a = run_handshake_prover(&issuer).unwrap();
    let b = run_handshake_prover(&issuer).unwrap();

    let err = issuer
        .redeem(&RedeemRequest {
            ticket: a.ticket().to_vec(),
            transcript: b.transcript().to_vec(),
        })
        .unwrap_err();
    assert_eq!(err, HandshakeError::RedeemFailed);
}

#[test]
fn test_tampered_hello_response_breaks_key_agreement() {
    let issuer = issuer();
    let (handshake, request) = ProverHandshake::begin();
    let mut response = issuer.hello(&request).unwrap();

    // Swap in a different issuer ephemeral: the prover derives a different
    // transcript, and its ticket no longer opens.
    response.e_pub = KeyPair::generate().public_bytes().to_vec();
    let session = handshake.receive(&response).unwrap();
    assert_eq!(
        issuer
            .redeem(&RedeemRequest {
                ticket: session.ticket().to_vec(),
                transcript: session.transcript().to_vec(),
            })
            .unwrap_err(),
        HandshakeError::RedeemFailed
    );
}

// ---------------------------------------------------------------------------
// Full flow with frames
// ---------------------------------------------------------------------------

#[test]
fn test_end_to_end_three_frames_and_replay_under_unchecked_policy() {
    let metrics = Arc::new(ProtocolMetrics::new().unwrap());
    let issuer = Issuer::new(IssuerConfig::generate()).with_metrics(metrics.clone());
    let mut session = run_handshake_prover(&issuer).unwrap();

    let gateway =
        Redeemer::new(&issuer, GatewayConfig::default()).with_metrics(metrics.clone());
    let id = gateway.handle_open(&session.open_session_request()).unwrap();
    assert_eq!(id, session.session_id());
    assert_eq!(gateway.state(&id), RedeemerState::SessionBound);
    assert_eq!(gateway.store().get(&id).unwrap().as_bytes().len(), 32);

    let mut frames = Vec::new();
    for i in 0..3u64 {
        let payload = format!("SPD:{:03}", 30 + i);
        let frame = session.frame(0x123, payload.as_bytes()).unwrap();
        assert_eq!(frame.ctr, i);
        gateway.accept_frame(&frame).unwrap();
        frames.push(frame);
    }

    // Counters are authenticated but not tracked: frame 0 verifies again.
    gateway.accept_frame(&frames[0]).unwrap();
    let key = gateway.store().get(&id).unwrap();
    let f0 = &frames[0];
    assert!(verify_frame(
        key.as_bytes(),
        FrameHeader(f0.can_id),
        &f0.payload,
        0,
        &f0.tag
    ));

    assert_eq!(metrics.hello_accepted_total.get(), 1);
    assert_eq!(metrics.tickets_redeemed_total.get(), 1);
    assert_eq!(metrics.frames_accepted_total.get(), 4);
    assert_eq!(metrics.frames_rejected_total.get(), 0);
    assert!(metrics.render().unwrap().contains("sdv_frames_accepted_total 4"));
}

#[test]
fn test_strict_policy_rejects_replayed_frame() {
    let issuer = issuer();
    let mut session = run_handshake_prover(&issuer).unwrap();
    let gateway = Redeemer::new(&issuer, strict());
    let id = gateway.handle_open(&session.open_session_request()).unwrap();

    let frames: Vec<_> = (0..3)
        .map(|i| session.frame(0x123, format!("SPD:{:03}", 30 + i).as_bytes()).unwrap())
        .collect();
    for frame in &frames {
        gateway.accept_frame(frame).unwrap();
    }

    assert_eq!(
        gateway.accept_frame(&frames[0]).unwrap_err(),
        GatewayError::CounterReplay { last: 2, got: 0 }
    );
    assert_eq!(gateway.last_counter(&id), Some(2));

    // The session survives and keeps accepting fresh frames.
    let next = session.frame(0x123, b"SPD:033").unwrap();
    gateway.accept_frame(&next).unwrap();
    assert_eq!(gateway.last_counter(&id), Some(3));
}

#[test]
fn test_frame_tampering_is_rejected_by_gateway() {
    let issuer = issuer();
    let mut session = run_handshake_prover(&issuer).unwrap();
    let gateway = Redeemer::new(&issuer, GatewayConfig::default());
    gateway.handle_open(&session.open_session_request()).unwrap();

    let frame = session.frame(0x123, b"SPD:030").unwrap();

    let mut wrong_header = frame.clone();
    wrong_header.can_id ^= 1;
    let mut wrong_payload = frame.clone();
    wrong_payload.payload[4] ^= 1;
    let mut wrong_ctr = frame.clone();
    wrong_ctr.ctr += 1;
    let mut wrong_session = frame.clone();
    wrong_session.session_id = SessionId::new();

    for bad in [&wrong_header, &wrong_payload, &wrong_ctr] {
        assert_eq!(
            gateway.accept_frame(bad).unwrap_err(),
            GatewayError::FrameAuthFailed
        );
    }
    assert_eq!(
        gateway.accept_frame(&wrong_session).unwrap_err(),
        GatewayError::UnknownSession
    );
    gateway.accept_frame(&frame).unwrap();
}

#[test]
fn test_frames_from_other_session_key_are_rejected() {
    let issuer = issuer();
    let mut a = run_handshake_prover(&issuer).unwrap();
    let b = run_handshake_prover(&issuer).unwrap();
    let gateway = Redeemer::new(&issuer, GatewayConfig::default());
    gateway.handle_open(&a.open_session_request()).unwrap();

    let tag = tag_frame(b.k_session().as_bytes(), FrameHeader(0x123), b"SPD:030", 0);
    let mut forged = a.frame(0x123, b"SPD:030").unwrap();
    forged.tag = tag.as_bytes().to_vec();
    assert_eq!(
        gateway.accept_frame(&forged).unwrap_err(),
        GatewayError::FrameAuthFailed
    );
}

#[test]
fn test_concurrent_sessions_through_one_gateway() {
    let issuer = Arc::new(issuer());
    let gateway = Arc::new(Redeemer::new(issuer.clone(), strict()));

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let issuer = issuer.clone();
            let gateway = gateway.clone();
            std::thread::spawn(move || {
                let mut session = run_handshake_prover(&issuer).unwrap();
                gateway.handle_open(&session.open_session_request()).unwrap();
                for i in 0..5 {
                    let frame = session.frame(0x200, &[i]).unwrap();
                    gateway.accept_frame(&frame).unwrap();
                }
                session.session_id()
            })
        })
        .collect();

    for handle in handles {
        let id = handle.join().unwrap();
        assert_eq!(gateway.last_counter(&id), Some(4));
    }
    assert_eq!(gateway.store().len(), 4);
}
