//! # Frame Authentication (HMAC-SHA256)
//!
//! Once a session is bound, every command/telemetry frame carries a 32-byte
//! tag:
//!
//! ```text
//! tag = HMAC-SHA256(K_session, header(4, BE) || payload || ctr(8, BE))
//! ```
//!
//! The header is the frame's channel identifier (a CAN id on the vehicle
//! side). The counter is supplied by the caller. This module authenticates
//! it but does not track it; a replayed `(header, payload, ctr, tag)` tuple
//! verifies again. Sessions that need replay rejection opt in through
//! [`CounterPolicy::StrictlyIncreasing`](crate::config::CounterPolicy) on the
//! gateway.

use std::fmt;

use hmac::digest::Key;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;

use crate::config::{FRAME_HEADER_LEN, FRAME_TAG_LEN, SESSION_KEY_LEN};

type HmacSha256 = Hmac<Sha256>;

/// Raised by the sending side only. Verification is a plain `bool`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FrameError {
    /// The sender's counter would wrap around.
    #[error("frame counter exhausted")]
    CounterExhausted,
}

/// 4-byte big-endian frame/channel identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FrameHeader(pub u32);

impl FrameHeader {
    /// Big-endian wire encoding.
    pub fn to_bytes(self) -> [u8; FRAME_HEADER_LEN] {
        self.0.to_be_bytes()
    }

    /// Inverse of [`to_bytes`](Self::to_bytes).
    pub fn from_bytes(bytes: [u8; FRAME_HEADER_LEN]) -> Self {
        Self(u32::from_be_bytes(bytes))
    }
}

impl From<u32> for FrameHeader {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

impl fmt::Display for FrameHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:03X}", self.0)
    }
}

/// A frame authentication tag.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct FrameTag(pub [u8; FRAME_TAG_LEN]);

impl FrameTag {
    /// The 32 tag bytes.
    pub fn as_bytes(&self) -> &[u8; FRAME_TAG_LEN] {
        &self.0
    }
}

impl AsRef<[u8]> for FrameTag {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for FrameTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FrameTag({})", hex::encode(&self.0[..8]))
    }
}

/// HMAC over one frame.
///
/// A session key is shorter than the SHA-256 block, and HMAC zero-pads such
/// keys to the block size, so padding it here up front gives the same MAC
/// without going through the fallible slice constructor.
fn keyed_mac(
    key: &[u8; SESSION_KEY_LEN],
    header: FrameHeader,
    payload: &[u8],
    ctr: u64,
) -> HmacSha256 {
    let mut block = Key::<HmacSha256>::default();
    block[..SESSION_KEY_LEN].copy_from_slice(key);
    let mut mac = <HmacSha256 as Mac>::new(&block);
    mac.update(&header.to_bytes());
    mac.update(payload);
    mac.update(&ctr.to_be_bytes());
    mac
}

/// Tag one frame under the session key.
///
/// # Arguments
///
/// * `key` - The 32-byte `K_session` both ends derived.
/// * `header` - Channel identifier, encoded big-endian.
/// * `payload` - Frame body, any length.
/// * `ctr` - Caller-chosen counter, encoded as a big-endian u64.
pub fn tag_frame(
    key: &[u8; SESSION_KEY_LEN],
    header: FrameHeader,
    payload: &[u8],
    ctr: u64,
) -> FrameTag {
    FrameTag(keyed_mac(key, header, payload, ctr).finalize().into_bytes().into())
}

/// Constant-time check of `tag`. A tag of the wrong length is `false`.
pub fn verify_frame(
    key: &[u8; SESSION_KEY_LEN],
    header: FrameHeader,
    payload: &[u8],
    ctr: u64,
    tag: &[u8],
) -> bool {
    keyed_mac(key, header, payload, ctr).verify_slice(tag).is_ok()
}
