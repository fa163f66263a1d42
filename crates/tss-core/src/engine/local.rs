//! Single-process development engine
//!
//! Implements the round algebra over k256 with additive shares and
//! hash-derived nonces. The Paillier/MtA exchanges and zero-knowledge
//! proofs of the full protocol are omitted; cross terms travel in the
//! clear inside the opaque share payloads. Development and test use only.

use super::{EcdsaEngine, KeyCombineOutput, SignCombineOutput, SignConvertOutput, SignIndex,
            SignShareOutput};
use crate::shares::{
    AShare, DShare, GShare, KShare, MuShare, NShare, OShare, PShare, SShare, WShare, XShare,
    YShare,
};
use crate::types::{PartyRole, CHAINCODE_LEN};
use crate::{Error, Result};
use hmac::{Hmac, Mac};
use k256::{
    elliptic_curve::{
        bigint::U256,
        ops::Reduce,
        sec1::{FromEncodedPoint, ToEncodedPoint},
        Group,
    },
    AffinePoint, ProjectivePoint, Scalar,
};
use sha2::Sha256;
use std::collections::BTreeMap;

/// Length of the `k ‖ Γ` payload carried in K- and A-shares
const NONCE_PAYLOAD_LEN: usize = 65;

/// Development-grade engine over k256.
///
/// Nonces are derived from the engine seed with HMAC-SHA256, so a seeded
/// engine reproduces a session byte-for-byte. A production engine must
/// draw fresh randomness per session instead.
pub struct LocalEngine {
    seed: [u8; 32],
}

impl LocalEngine {
    /// Engine with an OS-random seed
    pub fn new() -> Self {
        Self {
            seed: rand::random(),
        }
    }

    /// Engine with a fixed seed, for reproducible fixtures
    pub fn with_seed(seed: u64) -> Self {
        Self {
            seed: blake3::hash(&seed.to_le_bytes()).into(),
        }
    }

    fn derive_nonce(&self, label: &str, input: &[u8]) -> Result<Scalar> {
        let mut mac = Hmac::<Sha256>::new_from_slice(&self.seed)
            .map_err(|e| Error::Crypto(e.to_string()))?;
        mac.update(label.as_bytes());
        mac.update(input);
        let bytes: [u8; 32] = mac.finalize().into_bytes().into();
        Ok(<Scalar as Reduce<U256>>::reduce_bytes(&bytes.into()))
    }
}

impl Default for LocalEngine {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) fn decode_scalar(bytes: &[u8], what: &str) -> Result<Scalar> {
    let array: [u8; 32] = bytes
        .try_into()
        .map_err(|_| Error::Deserialization(format!("invalid {what} length: {}", bytes.len())))?;
    Ok(<Scalar as Reduce<U256>>::reduce_bytes(&array.into()))
}

pub(crate) fn encode_scalar(scalar: &Scalar) -> Vec<u8> {
    scalar.to_bytes().to_vec()
}

pub(crate) fn decode_point(bytes: &[u8], what: &str) -> Result<ProjectivePoint> {
    let encoded = k256::EncodedPoint::from_bytes(bytes)
        .map_err(|e| Error::Deserialization(format!("invalid {what}: {e}")))?;
    let affine: AffinePoint = Option::from(AffinePoint::from_encoded_point(&encoded))
        .ok_or_else(|| Error::Crypto(format!("{what} is not a curve point")))?;
    Ok(ProjectivePoint::from(affine))
}

pub(crate) fn encode_point(point: &ProjectivePoint) -> Vec<u8> {
    point.to_affine().to_encoded_point(true).as_bytes().to_vec()
}

/// Lagrange coefficient for party `i` over the signing pair `{i, j}`
pub(crate) fn lagrange_coefficient(i: PartyRole, j: PartyRole) -> Scalar {
    let (i, j) = (i.index() as u64, j.index() as u64);
    let numerator = Scalar::from(j);
    let denominator = if j > i {
        Scalar::from(j - i)
    } else {
        -Scalar::from(i - j)
    };
    numerator * denominator.invert().unwrap_or(Scalar::ONE)
}

pub(crate) fn split_nonce_payload(bytes: &[u8], what: &str) -> Result<(Scalar, ProjectivePoint)> {
    if bytes.len() != NONCE_PAYLOAD_LEN {
        return Err(Error::Deserialization(format!(
            "invalid {what} payload length: {}",
            bytes.len()
        )));
    }
    let nonce = decode_scalar(&bytes[..32], what)?;
    let gamma_point = decode_point(&bytes[32..], what)?;
    Ok((nonce, gamma_point))
}

pub(crate) fn join_nonce_payload(nonce: &Scalar, gamma_point: &ProjectivePoint) -> Vec<u8> {
    let mut payload = Vec::with_capacity(NONCE_PAYLOAD_LEN);
    payload.extend_from_slice(&encode_scalar(nonce));
    payload.extend_from_slice(&encode_point(gamma_point));
    payload
}

fn scalar_from_digest(digest: &[u8; 32]) -> Scalar {
    <Scalar as Reduce<U256>>::reduce_bytes(&(*digest).into())
}

fn x_coordinate(point: &ProjectivePoint) -> Result<Scalar> {
    if bool::from(point.is_identity()) {
        return Err(Error::Crypto("degenerate R point".into()));
    }
    let encoded = point.to_affine().to_encoded_point(false);
    let coord: [u8; 32] = encoded.as_bytes()[1..33]
        .try_into()
        .map_err(|_| Error::Crypto("invalid R coordinate".into()))?;
    Ok(<Scalar as Reduce<U256>>::reduce_bytes(&coord.into()))
}

impl EcdsaEngine for LocalEngine {
    fn key_combine(&self, p_share: &PShare, n_shares: &[NShare]) -> Result<KeyCombineOutput> {
        let mut x = decode_scalar(&p_share.u, "p share secret")?;
        let mut y = decode_point(&p_share.y, "p share public key")?;
        let mut chaincode = p_share.chaincode;
        let mut y_shares = BTreeMap::new();

        for n_share in n_shares {
            if n_share.i != p_share.i {
                return Err(Error::ProtocolViolation(format!(
                    "NShare addressed to {} combined by {}",
                    n_share.i, p_share.i
                )));
            }
            x += decode_scalar(&n_share.u, "n share secret")?;
            y += decode_point(&n_share.y, "n share public key")?;
            for idx in 0..CHAINCODE_LEN {
                chaincode[idx] ^= n_share.chaincode[idx];
            }
            y_shares.insert(
                n_share.j,
                YShare {
                    i: p_share.i,
                    j: n_share.j,
                    n: n_share.n.clone(),
                },
            );
        }

        Ok(KeyCombineOutput {
            x_share: XShare {
                i: p_share.i,
                y: encode_point(&y),
                x: encode_scalar(&x),
                n: p_share.n.clone(),
                chaincode,
            },
            y_shares,
        })
    }

    fn sign_share(&self, x_share: &XShare, y_share: &YShare) -> Result<SignShareOutput> {
        if x_share.i == y_share.j {
            return Err(Error::ProtocolViolation(
                "cannot open a session against the local party".into(),
            ));
        }
        let x = decode_scalar(&x_share.x, "x share secret")?;
        let k = self.derive_nonce("sign-share/k", &x_share.x)?;
        let gamma = self.derive_nonce("sign-share/gamma", &x_share.x)?;
        let gamma_point = ProjectivePoint::GENERATOR * gamma;

        let lambda = lagrange_coefficient(x_share.i, y_share.j);
        let w = lambda * x;

        Ok(SignShareOutput {
            k_share: KShare {
                i: y_share.j,
                j: x_share.i,
                k: join_nonce_payload(&k, &gamma_point),
                n: x_share.n.clone(),
            },
            w_share: WShare {
                i: x_share.i,
                y: x_share.y.clone(),
                k: encode_scalar(&k),
                w: encode_scalar(&w),
                gamma: encode_scalar(&gamma),
            },
        })
    }

    fn sign_convert(&self, w_share: &WShare, a_share: &AShare) -> Result<SignConvertOutput> {
        let (their_k, their_gamma_point) = split_nonce_payload(&a_share.k, "A share")?;
        let gamma = decode_scalar(&w_share.gamma, "w share gamma")?;
        let w = decode_scalar(&w_share.w, "w share secret")?;

        // Cross terms for the counterpart's delta and omicron shares
        let alpha = their_k * gamma;
        let mu = their_k * w;

        Ok(SignConvertOutput {
            mu_share: MuShare {
                i: a_share.j,
                j: a_share.i,
                alpha: encode_scalar(&alpha),
                mu: encode_scalar(&mu),
            },
            g_share: GShare {
                i: w_share.i,
                y: w_share.y.clone(),
                k: w_share.k.clone(),
                w: w_share.w.clone(),
                gamma: w_share.gamma.clone(),
                alpha: a_share.alpha.clone(),
                mu: a_share.mu.clone(),
                beta: encode_scalar(&their_k),
                nu: encode_point(&their_gamma_point),
            },
        })
    }

    fn sign_combine(&self, g_share: &GShare, sign_index: SignIndex) -> Result<SignCombineOutput> {
        if sign_index.j != g_share.i {
            return Err(Error::ProtocolViolation(format!(
                "sign index j is {}, expected {}",
                sign_index.j, g_share.i
            )));
        }
        let k = decode_scalar(&g_share.k, "g share nonce")?;
        let gamma = decode_scalar(&g_share.gamma, "g share gamma")?;
        let w = decode_scalar(&g_share.w, "g share secret")?;
        let alpha = decode_scalar(&g_share.alpha, "g share alpha")?;
        let mu = decode_scalar(&g_share.mu, "g share mu")?;
        let their_gamma_point = decode_point(&g_share.nu, "g share nu")?;

        let delta = k * gamma + alpha;
        let omicron = k * w + mu;
        let own_gamma_point = ProjectivePoint::GENERATOR * gamma;
        let combined_gamma = own_gamma_point + their_gamma_point;

        Ok(SignCombineOutput {
            o_share: OShare {
                i: g_share.i,
                y: g_share.y.clone(),
                k: g_share.k.clone(),
                omicron: encode_scalar(&omicron),
                delta: encode_scalar(&delta),
                gamma_commitment: encode_point(&combined_gamma),
            },
            d_share: DShare {
                i: g_share.i,
                j: sign_index.i,
                delta: encode_scalar(&delta),
                gamma_commitment: encode_point(&own_gamma_point),
            },
        })
    }

    fn sign(&self, digest: &[u8; 32], o_share: &OShare, d_share: &DShare) -> Result<SShare> {
        let delta = decode_scalar(&o_share.delta, "o share delta")?
            + decode_scalar(&d_share.delta, "d share delta")?;
        let delta_inv: Scalar = Option::from(delta.invert())
            .ok_or_else(|| Error::Crypto("combined delta is not invertible".into()))?;

        let gamma_commitment = decode_point(&o_share.gamma_commitment, "gamma commitment")?;
        let r_point = gamma_commitment * delta_inv;
        let r = x_coordinate(&r_point)?;

        let m = scalar_from_digest(digest);
        let k = decode_scalar(&o_share.k, "o share nonce")?;
        let omicron = decode_scalar(&o_share.omicron, "o share omicron")?;
        let s = m * k + r * omicron;

        Ok(SShare {
            i: d_share.i,
            r: encode_scalar(&r),
            s: encode_scalar(&s),
            y: o_share.y.clone(),
        })
    }
}
