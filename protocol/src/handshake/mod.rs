//! # Handshake Protocol
//!
//! Three roles, one hello round trip, one redemption:
//!
//! ```text
//!   ┌─────────┐               ┌─────────┐               ┌──────────┐
//!   │ Prover  │               │ Issuer  │               │ Redeemer │
//!   └────┬────┘               └────┬────┘               └────┬─────┘
//!        │ 1. Hello                │                         │
//!        │   (c_nonce, V, proof)   │                         │
//!        ├────────────────────────►│                         │
//!        │                         │ verify, ECDH, KDF,      │
//!        │                         │ seal ticket             │
//!        │ 2. (E, ticket, k_info)  │                         │
//!        │◄────────────────────────┤                         │
//!        │ derive K_session        │                         │
//!        │                         │                         │
//!        │ 3. OpenSession (id, ticket, transcript)           │
//!        ├──────────────────────────────────────────────────►│
//!        │                         │ 4. Redeem               │
//!        │                         │◄────────────────────────┤
//!        │                         │ 5. K_session            │
//!        │                         ├────────────────────────►│
//!        │                         │                         │ bind session
//!        │ 6. Frames (tag under K_session)                   │
//!        ├──────────────────────────────────────────────────►│
//! ```
//!
//! ### Prover (`prover.rs`)
//! `Init → ProofSent → AwaitingTicket → Established`. Proves possession of
//! a fresh ephemeral scalar over a fresh nonce, then derives `K_session` on
//! its own from the issuer's ephemeral point.
//!
//! ### Issuer (`issuer.rs`)
//! Stateless per request. Rejects a bad proof before deriving anything;
//! otherwise derives `K_session` and seals it into a ticket bound to the
//! transcript. Redeems tickets for anyone holding the matching transcript.
//!
//! ### Redeemer ([`crate::gateway`])
//! `AwaitingRedeem → SessionBound`. Trades a ticket for `K_session` once,
//! then only ever touches symmetric keys.
//!
//! ## Transcript binding
//!
//! `transcript = c_nonce || V_pub || E_pub` is both the KDF context and the
//! ticket's associated data. Change one byte of it and the ticket will not
//! open.

pub mod issuer;
pub mod messages;
pub mod prover;
pub mod transcript;

mod error;

pub use error::HandshakeError;
pub use issuer::{Issuer, IssuerEndpoint};
pub use messages::{
    FrameMessage, HelloRequest, HelloResponse, OpenSessionRequest, RedeemRequest, RedeemResponse,
};
pub use prover::{run_handshake_prover, EstablishedSession, ProverHandshake, ProverState};
pub use transcript::Transcript;
