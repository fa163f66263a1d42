//! Trusted-dealer key generation
//!
//! Local stand-in for the external distributed key generation: one process
//! deals degree-1 Shamir shares for all three parties. Real deployments
//! run DKG across machines; this exists for tests and the dev CLI flow.

use crate::engine::local::{encode_point, encode_scalar};
use crate::shares::{KeyShare, NShare, PShare};
use crate::types::{PartyRole, CHAINCODE_LEN};
use crate::Result;
use k256::{elliptic_curve::Field, ProjectivePoint, Scalar};
use rand::{CryptoRng, RngCore};
use std::collections::BTreeMap;

/// Deal key shares for all three parties from one dealer.
///
/// Each party receives a degree-1 polynomial share of every other party's
/// secret, so any two of the three can later reconstruct the signing key
/// without either ever holding it whole.
pub fn trusted_dealer_keygen<R: RngCore + CryptoRng>(rng: &mut R) -> Result<[KeyShare; 3]> {
    let roles = PartyRole::all();

    // Per-party secret polynomial f_i(z) = u_i + c_i·z plus public metadata
    let mut secrets = Vec::with_capacity(3);
    for _ in &roles {
        let u = Scalar::random(&mut *rng);
        let slope = Scalar::random(&mut *rng);
        let mut chaincode = [0u8; CHAINCODE_LEN];
        rng.fill_bytes(&mut chaincode);
        let mut modulus = vec![0u8; 32];
        rng.fill_bytes(&mut modulus);
        secrets.push((u, slope, chaincode, modulus));
    }

    let evaluate = |party: usize, at: PartyRole| -> Scalar {
        let (u, slope, _, _) = &secrets[party];
        *u + *slope * Scalar::from(at.index() as u64)
    };

    let mut key_shares = Vec::with_capacity(3);
    for (idx, &role) in roles.iter().enumerate() {
        let (u, _, chaincode, modulus) = &secrets[idx];
        let y = encode_point(&(ProjectivePoint::GENERATOR * u));

        let p_share = PShare {
            i: role,
            y: y.clone(),
            u: encode_scalar(&evaluate(idx, role)),
            n: modulus.clone(),
            chaincode: *chaincode,
        };

        let mut n_shares = BTreeMap::new();
        for &recipient in roles.iter().filter(|&&r| r != role) {
            n_shares.insert(
                recipient,
                NShare {
                    i: recipient,
                    j: role,
                    y: y.clone(),
                    u: encode_scalar(&evaluate(idx, recipient)),
                    n: modulus.clone(),
                    chaincode: *chaincode,
                },
            );
        }

        key_shares.push(KeyShare { p_share, n_shares });
    }

    key_shares
        .try_into()
        .map_err(|_| crate::Error::Crypto("dealer produced wrong share count".into()))
}
