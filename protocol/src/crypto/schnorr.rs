//! # Schnorr Proof of Discrete-Log Knowledge
//!
//! Non-interactive (Fiat–Shamir) Schnorr over P-256. The prover convinces a
//! verifier it knows `x` for `X = x·G` without revealing `x`, bound to a
//! message `m`:
//!
//! ```text
//! prove:   k <- [1, n-1]          R = k·G
//!          e = SHA-256(R || X || m) mod n
//!          s = k + e·x mod n                  proof = (R, s)
//!
//! verify:  s·G == R + e·X
//! ```
//!
//! `R` and `X` are hashed in their 33-byte compressed form; `s` travels as
//! 32 big-endian bytes.
//!
//! ## Freshness
//!
//! The proof is only as fresh as `m`. The handshake uses the prover's
//! single-use `c_nonce`; reuse `m` and a captured proof replays cleanly.
//! Reuse `k` and `x` falls out of two proofs with one subtraction, which is
//! why `k` is drawn from `OsRng` on every call and never accepted from the
//! caller.
//!
//! ## Verification is total
//!
//! [`verify_proof`] returns `bool`. Wrong lengths, bad prefixes, off-curve
//! points and non-canonical `s` are all just `false`.

use p256::elliptic_curve::ops::Reduce;
use p256::elliptic_curve::PrimeField;
use p256::{FieldBytes, NonZeroScalar, ProjectivePoint, PublicKey, Scalar, U256};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::point::{decode_point, encode_point, CompressedPoint};
use crate::config::SCALAR_LEN;

/// A Schnorr proof `(R, s)`.
///
/// Fields are raw wire bytes; nothing about them is trusted until
/// [`verify_proof`] says so.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchnorrProof {
    /// Compressed commitment point `R = k·G`.
    #[serde(with = "crate::handshake::messages::b64")]
    pub r: Vec<u8>,
    /// Response scalar `s`, 32 bytes big-endian.
    #[serde(with = "crate::handshake::messages::b64")]
    pub s: Vec<u8>,
}

/// `e = SHA-256(R || X || m) mod n`.
fn challenge(r: &[u8], x: &[u8], m: &[u8]) -> Scalar {
    let digest = Sha256::new()
        .chain_update(r)
        .chain_update(x)
        .chain_update(m)
        .finalize();
    <Scalar as Reduce<U256>>::reduce_bytes(&digest)
}

/// Prove knowledge of `x` bound to `m`. Returns `(encode(X), proof)`.
pub fn prove(x: &NonZeroScalar, m: &[u8]) -> (CompressedPoint, SchnorrProof) {
    let x_point = encode_point(&PublicKey::from_secret_scalar(x));

    let k = NonZeroScalar::random(&mut OsRng);
    let r_point = encode_point(&PublicKey::from_secret_scalar(&k));

    let e = challenge(r_point.as_bytes(), x_point.as_bytes(), m);
    let s = *k + e * **x;

    let proof = SchnorrProof {
        r: r_point.to_vec(),
        s: s.to_repr().to_vec(),
    };
    (x_point, proof)
}

/// Check a proof for public point `x_bytes` and message `m`.
pub fn verify_proof(x_bytes: &[u8], proof: &SchnorrProof, m: &[u8]) -> bool {
    verify_parts(x_bytes, &proof.r, &proof.s, m).unwrap_or(false)
}

fn verify_parts(x_bytes: &[u8], r_bytes: &[u8], s_bytes: &[u8], m: &[u8]) -> Option<bool> {
    let x = decode_point(x_bytes).ok()?;
    let r = decode_point(r_bytes).ok()?;

    if s_bytes.len() != SCALAR_LEN {
        return None;
    }
    // s must be canonical (< n). A verifier that reduced s mod n would also
    // accept s + n for the same proof; this one does not.
    let s = Option::<Scalar>::from(Scalar::from_repr(FieldBytes::clone_from_slice(s_bytes)))?;

    let e = challenge(r_bytes, x_bytes, m);
    let lhs = ProjectivePoint::GENERATOR * s;
    let rhs = r.to_projective() + x.to_projective() * e;
    Some(lhs == rhs)
}
