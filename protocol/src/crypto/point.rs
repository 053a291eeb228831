//! # Compressed Point Codec
//!
//! Points travel as 33 bytes: a parity prefix (`0x02` even y, `0x03` odd y)
//! followed by the big-endian x-coordinate. This is the SEC1 compressed form,
//! but decompression is done here rather than delegated, so that the same
//! code works for any short-Weierstrass curve `y^2 = x^3 + ax + b` over a
//! prime field.
//!
//! Decoding is all-or-nothing:
//!
//! 1. wrong length or unknown prefix → [`PointError::InvalidEncoding`]
//! 2. `x >= p`, or `x^3 + ax + b` has no square root → [`PointError::InvalidPoint`]
//! 3. otherwise pick the root whose parity matches the prefix.
//!
//! The recovered coordinates are handed to `p256`, which re-checks the curve
//! equation and refuses the identity. Belt and braces.

use std::fmt;
use std::sync::OnceLock;

use num_bigint::BigUint;
use p256::elliptic_curve::point::AffineCoordinates;
use p256::elliptic_curve::sec1::FromEncodedPoint;
use p256::{EncodedPoint, FieldBytes, PublicKey};
use thiserror::Error;

use super::modsqrt::sqrt_mod_prime;
use crate::config::{POINT_LEN, POINT_TAG_EVEN, POINT_TAG_ODD, SCALAR_LEN};

/// Point decoding failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PointError {
    #[error("invalid point encoding: expected {POINT_LEN} bytes with a 0x02/0x03 prefix")]
    InvalidEncoding,

    #[error("invalid point: x-coordinate is not on the curve")]
    InvalidPoint,
}

// ---------------------------------------------------------------------------
// Curve parameters
// ---------------------------------------------------------------------------

/// NIST P-256 field prime.
const P256_P: [u8; 32] = [
    0xff, 0xff, 0xff, 0xff, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
];

/// NIST P-256 `a = p - 3`.
const P256_A: [u8; 32] = [
    0xff, 0xff, 0xff, 0xff, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xfc,
];

/// NIST P-256 `b`.
const P256_B: [u8; 32] = [
    0x5a, 0xc6, 0x35, 0xd8, 0xaa, 0x3a, 0x93, 0xe7, 0xb3, 0xeb, 0xbd, 0x55, 0x76, 0x98, 0x86, 0xbc,
    0x65, 0x1d, 0x06, 0xb0, 0xcc, 0x53, 0xb0, 0xf6, 0x3b, 0xce, 0x3c, 0x3e, 0x27, 0xd2, 0x60, 0x4b,
];

/// Parameters of a short-Weierstrass curve over GF(p).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CurveParams {
    pub p: BigUint,
    pub a: BigUint,
    pub b: BigUint,
}

impl CurveParams {
    /// The P-256 parameters, built once per process.
    pub fn p256() -> &'static CurveParams {
        static PARAMS: OnceLock<CurveParams> = OnceLock::new();
        PARAMS.get_or_init(|| CurveParams {
            p: BigUint::from_bytes_be(&P256_P),
            a: BigUint::from_bytes_be(&P256_A),
            b: BigUint::from_bytes_be(&P256_B),
        })
    }

    /// Recover affine `(x, y)` from a compressed encoding.
    pub fn decompress(&self, bytes: &[u8]) -> Result<(BigUint, BigUint), PointError> {
        if bytes.len() != POINT_LEN {
            return Err(PointError::InvalidEncoding);
        }
        let prefix = bytes[0];
        if prefix != POINT_TAG_EVEN && prefix != POINT_TAG_ODD {
            return Err(PointError::InvalidEncoding);
        }

        let x = BigUint::from_bytes_be(&bytes[1..]);
        if x >= self.p {
            return Err(PointError::InvalidPoint);
        }

        let p = &self.p;
        let alpha = (x.modpow(&BigUint::from(3u32), p) + &self.a * &x + &self.b) % p;
        let beta = sqrt_mod_prime(&alpha, p).ok_or(PointError::InvalidPoint)?;

        let want_odd = prefix == POINT_TAG_ODD;
        let y = if beta.bit(0) == want_odd {
            beta
        } else {
            (p - &beta) % p
        };
        Ok((x, y))
    }
}

// ---------------------------------------------------------------------------
// CompressedPoint
// ---------------------------------------------------------------------------

/// A 33-byte compressed point as it appears on the wire.
///
/// Holding one of these says nothing about validity; call
/// [`CompressedPoint::decode`] for that.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct CompressedPoint([u8; POINT_LEN]);

impl CompressedPoint {
    /// Wrap 33 bytes without checking them.
    ///
    /// Nothing here proves the bytes are a point; call [`decode`](Self::decode)
    /// (or go through `TryFrom<&[u8]>`, which checks the prefix) before
    /// trusting it.
    pub fn from_array(bytes: [u8; POINT_LEN]) -> Self {
        Self(bytes)
    }

    /// The 33 wire bytes.
    pub fn as_bytes(&self) -> &[u8; POINT_LEN] {
        &self.0
    }

    /// Owned copy of the wire bytes.
    pub fn to_vec(&self) -> Vec<u8> {
        self.0.to_vec()
    }

    /// Lowercase hex, for logs and debugging.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Decompress and validate. See [`decode_point`].
    pub fn decode(&self) -> Result<PublicKey, PointError> {
        decode_point(&self.0)
    }
}

impl TryFrom<&[u8]> for CompressedPoint {
    type Error = PointError;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        let arr: [u8; POINT_LEN] = bytes.try_into().map_err(|_| PointError::InvalidEncoding)?;
        if arr[0] != POINT_TAG_EVEN && arr[0] != POINT_TAG_ODD {
            return Err(PointError::InvalidEncoding);
        }
        Ok(Self(arr))
    }
}

impl AsRef<[u8]> for CompressedPoint {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for CompressedPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CompressedPoint({})", self.to_hex())
    }
}

// ---------------------------------------------------------------------------
// encode / decode
// ---------------------------------------------------------------------------

/// `[0x02 | 0x03] || be32(x)`.
pub fn encode_point(point: &PublicKey) -> CompressedPoint {
    let affine = point.as_affine();
    let mut out = [0u8; POINT_LEN];
    out[0] = if bool::from(affine.y_is_odd()) {
        POINT_TAG_ODD
    } else {
        POINT_TAG_EVEN
    };
    out[1..].copy_from_slice(&affine.x());
    CompressedPoint(out)
}

/// Decode a compressed P-256 point.
pub fn decode_point(bytes: &[u8]) -> Result<PublicKey, PointError> {
    let (x, y) = CurveParams::p256().decompress(bytes)?;
    let x = field_bytes(&x)?;
    let y = field_bytes(&y)?;
    let encoded = EncodedPoint::from_affine_coordinates(&x, &y, false);
    Option::<PublicKey>::from(PublicKey::from_encoded_point(&encoded))
        .ok_or(PointError::InvalidPoint)
}

/// Left-pad a field element to 32 big-endian bytes.
fn field_bytes(value: &BigUint) -> Result<FieldBytes, PointError> {
    let raw = value.to_bytes_be();
    if raw.len() > SCALAR_LEN {
        return Err(PointError::InvalidPoint);
    }
    let mut out = FieldBytes::default();
    out[SCALAR_LEN - raw.len()..].copy_from_slice(&raw);
    Ok(out)
}
