// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # SDV Auth Core Library
//!
//! Mutual authentication between a vehicle and the cloud, split across
//! three roles:
//!
//! - the **prover** (vehicle) proves it holds a private scalar without
//!   revealing it, and derives a fresh session key;
//! - the **issuer** (edge auth server) checks the proof, derives the same
//!   key and seals it into a ticket bound to the handshake transcript;
//! - the **redeemer** (control gateway) trades the ticket for the key once,
//!   then authenticates every frame with a cheap HMAC.
//!
//! ## Architecture
//!
//! - **crypto**: P-256 point codec, ECDH, HKDF, Schnorr proofs, ticket AEAD.
//! - **handshake**: Prover and issuer state machines plus the wire messages.
//! - **gateway**: The redeemer and its session key store.
//! - **frame**: HMAC-SHA256 frame tags.
//! - **config**: Wire constants and runtime configuration.
//! - **metrics** / **logging**: Prometheus counters and `tracing` setup.
//!
//! Transport is not part of this crate. Implement
//! [`handshake::IssuerEndpoint`] over whatever RPC layer you have and the
//! prover and gateway work unchanged.
//!
//! ## Quick tour
//!
//! ```
//! use sdv_auth::config::{GatewayConfig, IssuerConfig};
//! use sdv_auth::gateway::Redeemer;
//! use sdv_auth::handshake::{run_handshake_prover, Issuer};
//!
//! let issuer = Issuer::new(IssuerConfig::generate());
//! let mut session = run_handshake_prover(&issuer).unwrap();
//!
//! let gateway = Redeemer::new(&issuer, GatewayConfig::default());
//! gateway.handle_open(&session.open_session_request()).unwrap();
//!
//! let frame = session.frame(0x123, b"SPD:030").unwrap();
//! assert!(gateway.accept_frame(&frame).is_ok());
//! ```

pub mod config;
pub mod crypto;
pub mod frame;
pub mod gateway;
pub mod handshake;
pub mod logging;
pub mod metrics;
