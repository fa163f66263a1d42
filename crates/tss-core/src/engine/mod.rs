//! Threshold-cryptography engine seam
//!
//! The protocol core treats the per-round cryptography as an injected
//! capability so that orchestration carries no hidden global state and
//! tests can substitute a misbehaving engine.

use crate::shares::{
    AShare, DShare, GShare, KShare, MuShare, NShare, OShare, PShare, SShare, WShare, XShare,
    YShare,
};
use crate::types::PartyRole;
use crate::Result;
use std::collections::BTreeMap;

pub(crate) mod local;

pub use local::LocalEngine;

/// The fixed `(i, j)` pair the omicron combine runs against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignIndex {
    pub i: PartyRole,
    pub j: PartyRole,
}

/// Output of [`EcdsaEngine::key_combine`]
#[derive(Debug, Clone)]
pub struct KeyCombineOutput {
    /// Combined local signing input
    pub x_share: XShare,
    /// Counterpart descriptors, keyed by the originating party
    pub y_shares: BTreeMap<PartyRole, YShare>,
}

/// Output of [`EcdsaEngine::sign_share`]
#[derive(Debug, Clone)]
pub struct SignShareOutput {
    /// Offered to the counterpart
    pub k_share: KShare,
    /// Retained locally
    pub w_share: WShare,
}

/// Output of [`EcdsaEngine::sign_convert`]
#[derive(Debug, Clone)]
pub struct SignConvertOutput {
    /// Offered to the counterpart
    pub mu_share: MuShare,
    /// Retained locally
    pub g_share: GShare,
}

/// Output of [`EcdsaEngine::sign_combine`]
#[derive(Debug, Clone)]
pub struct SignCombineOutput {
    /// Retained locally
    pub o_share: OShare,
    /// This party's delta share, addressed to the counterpart
    pub d_share: DShare,
}

/// Opaque per-round threshold-ECDSA primitive.
///
/// Implementations are deterministic given their inputs, aside from any
/// internal randomness the scheme requires for security.
pub trait EcdsaEngine: Send + Sync {
    /// Merge a private share with peer NShares into the combined signing
    /// input and the counterpart descriptors
    fn key_combine(&self, p_share: &PShare, n_shares: &[NShare]) -> Result<KeyCombineOutput>;

    /// First signing round: produce the K-share offer and the retained
    /// W-share
    fn sign_share(&self, x_share: &XShare, y_share: &YShare) -> Result<SignShareOutput>;

    /// Gamma conversion over the counterpart's A-share
    fn sign_convert(&self, w_share: &WShare, a_share: &AShare) -> Result<SignConvertOutput>;

    /// Omicron combine against the fixed signing pair
    fn sign_combine(&self, g_share: &GShare, sign_index: SignIndex) -> Result<SignCombineOutput>;

    /// Final signing step over a 32-byte message digest
    fn sign(&self, digest: &[u8; 32], o_share: &OShare, d_share: &DShare) -> Result<SShare>;
}
