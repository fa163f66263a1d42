//! Share data model and the provenance validation gate
//!
//! Every share exchanged during key combination or signing carries its own
//! `(i, j)` provenance. The pair each share kind must carry is a protocol
//! constant; [`verify_provenance`] is the single gate every share passes
//! before it is consumed or transmitted.

use crate::types::{PartyRole, CHAINCODE_LEN};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Names every share kind, for validation and error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShareKind {
    X,
    Y,
    K,
    W,
    A,
    Mu,
    G,
    O,
    D,
    S,
}

impl ShareKind {
    /// All round share kinds in protocol order
    pub fn all() -> [ShareKind; 10] {
        use ShareKind::*;
        [X, Y, K, W, A, Mu, G, O, D, S]
    }

    /// The `(i, j)` pair a share of this kind must carry.
    ///
    /// `None` for `j` means the kind has no `j` field. The pairs are fixed
    /// protocol constants, not derived from a uniform from/to convention:
    /// shares travelling in the same direction may still disagree on which
    /// endpoint goes in `i`.
    pub fn required_pair(self) -> (PartyRole, Option<PartyRole>) {
        match self {
            ShareKind::X => (PartyRole::User, None),
            ShareKind::Y => (PartyRole::User, Some(PartyRole::Cosigner)),
            ShareKind::K => (PartyRole::Cosigner, Some(PartyRole::User)),
            ShareKind::W => (PartyRole::User, None),
            ShareKind::A => (PartyRole::User, Some(PartyRole::Cosigner)),
            ShareKind::Mu => (PartyRole::Cosigner, Some(PartyRole::User)),
            ShareKind::G => (PartyRole::User, None),
            ShareKind::O => (PartyRole::User, None),
            ShareKind::D => (PartyRole::Cosigner, Some(PartyRole::User)),
            ShareKind::S => (PartyRole::Cosigner, None),
        }
    }
}

impl fmt::Display for ShareKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ShareKind::X => "XShare",
            ShareKind::Y => "YShare",
            ShareKind::K => "KShare",
            ShareKind::W => "WShare",
            ShareKind::A => "AShare",
            ShareKind::Mu => "MUShare",
            ShareKind::G => "GShare",
            ShareKind::O => "OShare",
            ShareKind::D => "DShare",
            ShareKind::S => "SShare",
        };
        f.write_str(name)
    }
}

/// Provenance fields of a share, as consumed by the validation gate
pub trait Provenance {
    /// Kind of this share
    fn kind(&self) -> ShareKind;
    /// Declared `i` index
    fn i(&self) -> PartyRole;
    /// Declared `j` index, if the kind carries one
    fn j(&self) -> Option<PartyRole>;
}

/// Check a share's `(i, j)` against the pair its kind requires.
///
/// Any mismatch is a [`Error::ProtocolViolation`] naming the offending
/// field. No share is transmitted or consumed without passing this gate.
pub fn verify_provenance<T: Provenance>(share: &T) -> Result<()> {
    let kind = share.kind();
    let (want_i, want_j) = kind.required_pair();
    if share.i() != want_i {
        return Err(Error::ProtocolViolation(format!(
            "{kind}: field i is {}, expected {want_i}",
            share.i()
        )));
    }
    if let Some(want_j) = want_j {
        match share.j() {
            Some(j) if j == want_j => {}
            Some(j) => {
                return Err(Error::ProtocolViolation(format!(
                    "{kind}: field j is {j}, expected {want_j}"
                )));
            }
            None => {
                return Err(Error::ProtocolViolation(format!(
                    "{kind}: field j is missing, expected {want_j}"
                )));
            }
        }
    }
    Ok(())
}

macro_rules! impl_provenance {
    ($ty:ty, $kind:expr) => {
        impl Provenance for $ty {
            fn kind(&self) -> ShareKind {
                $kind
            }
            fn i(&self) -> PartyRole {
                self.i
            }
            fn j(&self) -> Option<PartyRole> {
                None
            }
        }
    };
    ($ty:ty, $kind:expr, j) => {
        impl Provenance for $ty {
            fn kind(&self) -> ShareKind {
                $kind
            }
            fn i(&self) -> PartyRole {
                self.i
            }
            fn j(&self) -> Option<PartyRole> {
                Some(self.j)
            }
        }
    };
}

/// A party's private key-generation share
#[derive(Clone, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct PShare {
    /// Owning party
    #[zeroize(skip)]
    pub i: PartyRole,
    /// Public partial key (compressed)
    #[serde(with = "hex::serde")]
    pub y: Vec<u8>,
    /// Secret value, never leaves the owning party
    #[serde(with = "hex::serde")]
    pub u: Vec<u8>,
    /// Paillier modulus (opaque to this core)
    #[serde(with = "hex::serde")]
    pub n: Vec<u8>,
    /// Chaincode contribution
    #[serde(with = "hex::serde")]
    pub chaincode: [u8; CHAINCODE_LEN],
}

/// A key-generation share addressed to one recipient.
///
/// `i` is the recipient and `j` the originating party; `u` is decryptable
/// only by the recipient and travels under the messaging envelope.
#[derive(Clone, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct NShare {
    #[zeroize(skip)]
    pub i: PartyRole,
    #[zeroize(skip)]
    pub j: PartyRole,
    /// Originating party's public partial key (compressed)
    #[serde(with = "hex::serde")]
    pub y: Vec<u8>,
    /// Secret value for the recipient
    #[serde(with = "hex::serde")]
    pub u: Vec<u8>,
    /// Originating party's Paillier modulus
    #[serde(with = "hex::serde")]
    pub n: Vec<u8>,
    /// Originating party's chaincode contribution
    #[serde(with = "hex::serde")]
    pub chaincode: [u8; CHAINCODE_LEN],
}

/// One party's output of distributed key generation: its private share plus
/// the per-recipient shares it must hand to its peers
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyShare {
    pub p_share: PShare,
    /// Shares to distribute, keyed by recipient
    pub n_shares: BTreeMap<PartyRole, NShare>,
}

impl KeyShare {
    /// The share this party must hand to `recipient`
    pub fn n_share_for(&self, recipient: PartyRole) -> Result<&NShare> {
        self.n_shares.get(&recipient).ok_or_else(|| {
            Error::ProtocolViolation(format!(
                "key share of {} has no NShare for {recipient}",
                self.p_share.i
            ))
        })
    }
}

/// Durable wallet-scoped secret bundle produced by key combination.
///
/// Holds the local private share plus the peer shares accepted during
/// combination; never contains another party's plaintext secret beyond what
/// key generation inherently reveals.
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SigningMaterial {
    pub p_share: PShare,
    /// Mandatory: without it the combined key cannot be verified
    pub cosigner_n_share: NShare,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_n_share: Option<NShare>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backup_n_share: Option<NShare>,
}

impl SigningMaterial {
    /// Role of the holding party
    pub fn role(&self) -> PartyRole {
        self.p_share.i
    }

    /// All peer shares held, for handing to the engine
    pub fn peer_shares(&self) -> Vec<NShare> {
        let mut shares = Vec::with_capacity(3);
        if let Some(user) = &self.user_n_share {
            shares.push(user.clone());
        }
        if let Some(backup) = &self.backup_n_share {
            shares.push(backup.clone());
        }
        shares.push(self.cosigner_n_share.clone());
        shares
    }
}

impl fmt::Debug for SigningMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningMaterial")
            .field("party", &self.p_share.i)
            .field("user_n_share", &self.user_n_share.is_some())
            .field("backup_n_share", &self.backup_n_share.is_some())
            .finish_non_exhaustive()
    }
}

/// Result of key combination: the persistent signing material plus the
/// verified wallet identity
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CombinedKey {
    pub signing_material: SigningMaterial,
    pub common_keychain: crate::types::CommonKeychain,
}

/// Local combined signing input, reconstructed per session
#[derive(Debug, Clone, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct XShare {
    #[zeroize(skip)]
    pub i: PartyRole,
    /// Combined public key (compressed)
    #[serde(with = "hex::serde")]
    pub y: Vec<u8>,
    /// Combined secret share
    #[serde(with = "hex::serde")]
    pub x: Vec<u8>,
    #[serde(with = "hex::serde")]
    pub n: Vec<u8>,
    #[serde(with = "hex::serde")]
    pub chaincode: [u8; CHAINCODE_LEN],
}

/// Describes the signing counterpart ahead of a session
#[derive(Debug, Clone, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct YShare {
    #[zeroize(skip)]
    pub i: PartyRole,
    #[zeroize(skip)]
    pub j: PartyRole,
    /// Counterpart's Paillier modulus
    #[serde(with = "hex::serde")]
    pub n: Vec<u8>,
}

/// First-round offer to the counterpart
#[derive(Debug, Clone, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct KShare {
    #[zeroize(skip)]
    pub i: PartyRole,
    #[zeroize(skip)]
    pub j: PartyRole,
    /// Engine-opaque nonce payload
    #[serde(with = "hex::serde")]
    pub k: Vec<u8>,
    #[serde(with = "hex::serde")]
    pub n: Vec<u8>,
}

/// Retained after the first round
#[derive(Debug, Clone, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct WShare {
    #[zeroize(skip)]
    pub i: PartyRole,
    #[serde(with = "hex::serde")]
    pub y: Vec<u8>,
    #[serde(with = "hex::serde")]
    pub k: Vec<u8>,
    #[serde(with = "hex::serde")]
    pub w: Vec<u8>,
    #[serde(with = "hex::serde")]
    pub gamma: Vec<u8>,
}

/// Counterpart's response to the K-share
#[derive(Debug, Clone, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct AShare {
    #[zeroize(skip)]
    pub i: PartyRole,
    #[zeroize(skip)]
    pub j: PartyRole,
    #[serde(with = "hex::serde")]
    pub k: Vec<u8>,
    #[serde(with = "hex::serde")]
    pub alpha: Vec<u8>,
    #[serde(with = "hex::serde")]
    pub mu: Vec<u8>,
}

/// Gamma-conversion offer to the counterpart
#[derive(Debug, Clone, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct MuShare {
    #[zeroize(skip)]
    pub i: PartyRole,
    #[zeroize(skip)]
    pub j: PartyRole,
    #[serde(with = "hex::serde")]
    pub alpha: Vec<u8>,
    #[serde(with = "hex::serde")]
    pub mu: Vec<u8>,
}

/// Retained after gamma conversion
#[derive(Debug, Clone, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct GShare {
    #[zeroize(skip)]
    pub i: PartyRole,
    #[serde(with = "hex::serde")]
    pub y: Vec<u8>,
    #[serde(with = "hex::serde")]
    pub k: Vec<u8>,
    #[serde(with = "hex::serde")]
    pub w: Vec<u8>,
    #[serde(with = "hex::serde")]
    pub gamma: Vec<u8>,
    #[serde(with = "hex::serde")]
    pub alpha: Vec<u8>,
    #[serde(with = "hex::serde")]
    pub mu: Vec<u8>,
    #[serde(with = "hex::serde")]
    pub beta: Vec<u8>,
    #[serde(with = "hex::serde")]
    pub nu: Vec<u8>,
}

/// Retained after the omicron combine
#[derive(Debug, Clone, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
#[serde(rename_all = "camelCase")]
pub struct OShare {
    #[zeroize(skip)]
    pub i: PartyRole,
    #[serde(with = "hex::serde")]
    pub y: Vec<u8>,
    #[serde(with = "hex::serde")]
    pub k: Vec<u8>,
    #[serde(with = "hex::serde")]
    pub omicron: Vec<u8>,
    #[serde(with = "hex::serde")]
    pub delta: Vec<u8>,
    #[serde(with = "hex::serde")]
    pub gamma_commitment: Vec<u8>,
}

/// Counterpart's delta share
#[derive(Debug, Clone, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
#[serde(rename_all = "camelCase")]
pub struct DShare {
    #[zeroize(skip)]
    pub i: PartyRole,
    #[zeroize(skip)]
    pub j: PartyRole,
    #[serde(with = "hex::serde")]
    pub delta: Vec<u8>,
    #[serde(with = "hex::serde")]
    pub gamma_commitment: Vec<u8>,
}

/// Final signature share over the message digest
#[derive(Debug, Clone, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct SShare {
    #[zeroize(skip)]
    pub i: PartyRole,
    #[serde(with = "hex::serde")]
    pub r: Vec<u8>,
    #[serde(with = "hex::serde")]
    pub s: Vec<u8>,
    #[serde(with = "hex::serde")]
    pub y: Vec<u8>,
}

impl_provenance!(XShare, ShareKind::X);
impl_provenance!(YShare, ShareKind::Y, j);
impl_provenance!(KShare, ShareKind::K, j);
impl_provenance!(WShare, ShareKind::W);
impl_provenance!(AShare, ShareKind::A, j);
impl_provenance!(MuShare, ShareKind::Mu, j);
impl_provenance!(GShare, ShareKind::G);
impl_provenance!(OShare, ShareKind::O);
impl_provenance!(DShare, ShareKind::D, j);
impl_provenance!(SShare, ShareKind::S);
