//! Client-side protocol core for 2-of-3 threshold ECDSA signing.
//!
//! Three parties hold additive shares of one secp256k1 wallet key: the
//! user, a cold backup, and an online cosigner. This crate implements the
//! user-side protocol logic around an injected [`engine::EcdsaEngine`]:
//!
//! - [`combine`]: merge key-generation shares into durable signing
//!   material, verifying the derived wallet identity first
//! - [`session`]: the nine-step signing state machine for one
//!   transaction request
//! - [`codec`] and [`messaging`]: the authenticated encrypted envelope
//!   key shares travel in
//! - [`gateway`]: the transport seam towards the coordinating service
//!
//! The bundled [`engine::LocalEngine`] is a development-grade engine for
//! exercising the protocol end to end; production deployments inject
//! their own.

pub mod codec;
pub mod combine;
pub mod engine;
pub mod error;
pub mod gateway;
pub mod keygen;
pub mod messaging;
pub mod session;
pub mod shares;
pub mod types;

#[cfg(test)]
pub(crate) mod testutil;

pub use combine::{create_combined_key, signing_shares};
pub use engine::{EcdsaEngine, LocalEngine};
pub use error::{Error, Result};
pub use gateway::{MemoryGateway, SessionShare, TxRequest, TxRequestGateway};
pub use session::{SessionState, SigningSession};
pub use shares::{CombinedKey, KeyShare, ShareKind, SigningMaterial};
pub use types::{CommonKeychain, PartyRole, SessionTimeouts};

/// Total number of key shares dealt per wallet
pub const PARTIES: usize = 3;

/// Number of parties that must cooperate to sign
pub const THRESHOLD: usize = 2;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
