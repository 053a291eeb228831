//! Wire messages exchanged between Prover, Issuer and Redeemer.
//!
//! Every byte field serializes as a standard (padded) base64 string so the
//! structs drop straight into a JSON transport:
//!
//! ```text
//! Prover   → Issuer:   HelloRequest       { c_nonce, v_pub, proof_r, proof_s }
//! Issuer   → Prover:   HelloResponse      { e_pub, ticket, k_info }
//! Prover   → Redeemer: OpenSessionRequest { session_id, ticket, transcript }
//! Redeemer → Issuer:   RedeemRequest      { ticket, transcript }
//! Issuer   → Redeemer: RedeemResponse     { k_session }
//! Prover   → Redeemer: FrameMessage       { session_id, can_id, payload, ctr, tag }
//! ```
//!
//! Nothing here is validated on deserialization. Lengths and encodings are
//! checked by whichever role consumes the message.

use serde::{Deserialize, Serialize};

use crate::crypto::schnorr::SchnorrProof;
use crate::gateway::SessionId;

/// Serde adapter: `Vec<u8>` as standard base64.
pub mod b64 {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    /// Encode bytes as a standard base64 string.
    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    /// Decode a standard base64 string. Padding is required.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        STANDARD.decode(s.as_bytes()).map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// Hello
// ---------------------------------------------------------------------------

/// Step 1: the prover's proof of possession over a fresh nonce.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HelloRequest {
    /// 16-byte single-use nonce; also the proof's message.
    #[serde(with = "b64")]
    pub c_nonce: Vec<u8>,
    /// Prover's ephemeral public point, compressed.
    #[serde(with = "b64")]
    pub v_pub: Vec<u8>,
    #[serde(with = "b64")]
    pub proof_r: Vec<u8>,
    #[serde(with = "b64")]
    pub proof_s: Vec<u8>,
}

impl HelloRequest {
    /// The `(R, s)` pair as a [`SchnorrProof`], ready for `verify_proof`.
    pub fn proof(&self) -> SchnorrProof {
        SchnorrProof {
            r: self.proof_r.clone(),
            s: self.proof_s.clone(),
        }
    }
}

/// Step 2: issuer's ephemeral point and the sealed ticket.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HelloResponse {
    #[serde(with = "b64")]
    pub e_pub: Vec<u8>,
    #[serde(with = "b64")]
    pub ticket: Vec<u8>,
    /// Info label the issuer used for the first KDF stage.
    #[serde(with = "b64")]
    pub k_info: Vec<u8>,
}

// ---------------------------------------------------------------------------
// Redemption
// ---------------------------------------------------------------------------

/// Gateway to issuer: trade this ticket for its key.
///
/// `transcript` must be the exact 82 bytes the ticket was sealed under.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedeemRequest {
    #[serde(with = "b64")]
    pub ticket: Vec<u8>,
    #[serde(with = "b64")]
    pub transcript: Vec<u8>,
}

/// Carries the session key in the clear. Only ever sent issuer to redeemer,
/// on a channel the transport is responsible for protecting.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedeemResponse {
    #[serde(with = "b64")]
    pub k_session: Vec<u8>,
}

impl std::fmt::Debug for RedeemResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedeemResponse").finish_non_exhaustive()
    }
}

impl Drop for RedeemResponse {
    fn drop(&mut self) {
        zeroize::Zeroize::zeroize(&mut self.k_session);
    }
}

// ---------------------------------------------------------------------------
// Gateway
// ---------------------------------------------------------------------------

/// Prover to gateway: bind my ticket under `session_id`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenSessionRequest {
    pub session_id: SessionId,
    #[serde(with = "b64")]
    pub ticket: Vec<u8>,
    #[serde(with = "b64")]
    pub transcript: Vec<u8>,
}

impl OpenSessionRequest {
    /// The redeem call the gateway makes on behalf of this request.
    pub fn redeem_request(&self) -> RedeemRequest {
        RedeemRequest {
            ticket: self.ticket.clone(),
            transcript: self.transcript.clone(),
        }
    }
}

/// One authenticated frame.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameMessage {
    pub session_id: SessionId,
    /// Becomes the 4-byte big-endian frame header.
    pub can_id: u32,
    #[serde(with = "b64")]
    pub payload: Vec<u8>,
    pub ctr: u64,
    #[serde(with = "b64")]
    pub tag: Vec<u8>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hello_request_json_uses_base64() {
        let req = HelloRequest {
            c_nonce: vec![0u8; 16],
            v_pub: vec![2u8; 33],
            proof_r: vec![3u8; 33],
            proof_s: vec![0xff; 32],
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["c_nonce"], "AAAAAAAAAAAAAAAAAAAAAA==");
        let back: HelloRequest = serde_json::from_value(json).unwrap();
        assert_eq!(back, req);
        assert_eq!(back.proof().s, vec![0xff; 32]);
    }

    #[test]
    fn test_bad_base64_rejected() {
        let json = r#"{"ticket":"***","transcript":""}"#;
        assert!(serde_json::from_str::<RedeemRequest>(json).is_err());
    }

    #[test]
    fn test_frame_message_roundtrip() {
        let msg = FrameMessage {
            session_id: SessionId::new(),
            can_id: 0x123,
            payload: b"SPD:030".to_vec(),
            ctr: 0,
            tag: vec![0xAB; 32],
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"can_id\":291"));
        assert!(json.contains("U1BEOjAzMA=="));
        let back: FrameMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(back, msg);
    }

    #[test]
    fn test_redeem_response_debug_is_redacted() {
        let resp = RedeemResponse {
            k_session: vec![0x42; 32],
        };
        assert_eq!(format!("{resp:?}"), "RedeemResponse { .. }");
    }

    #[test]
    fn test_open_session_request_carries_redeem_fields() {
        let req = OpenSessionRequest {
            session_id: SessionId::new(),
            ticket: vec![1, 2, 3],
            transcript: vec![4, 5],
        };
        let redeem = req.redeem_request();
        assert_eq!(redeem.ticket, vec![1, 2, 3]);
        assert_eq!(redeem.transcript, vec![4, 5]);
    }
}
