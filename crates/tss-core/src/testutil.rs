//! Shared fixtures for unit tests

use crate::codec::{encrypt_n_share, DecryptableNShare};
use crate::engine::local::{
    decode_scalar, encode_point, encode_scalar, join_nonce_payload, lagrange_coefficient,
    split_nonce_payload,
};
use crate::engine::{EcdsaEngine, LocalEngine};
use crate::keygen::trusted_dealer_keygen;
use crate::messaging::MessagingKeys;
use crate::shares::{AShare, DShare, KeyShare, MuShare, NShare, SShare, SigningMaterial};
use crate::types::{CommonKeychain, PartyRole};
use k256::ecdsa::signature::hazmat::PrehashVerifier;
use k256::ecdsa::{Signature as EcdsaSignature, VerifyingKey};
use k256::{
    elliptic_curve::{bigint::U256, ops::Reduce, Field},
    ProjectivePoint, Scalar,
};
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;

fn role_index(role: PartyRole) -> usize {
    role.index() as usize - 1
}

/// One dealt key-generation session plus per-party messaging keys
pub(crate) struct Fixture {
    pub key_shares: [KeyShare; 3],
    pub messaging: [MessagingKeys; 3],
}

impl Fixture {
    pub fn new(seed: u64) -> Self {
        let mut rng = ChaCha20Rng::seed_from_u64(seed);
        let key_shares = trusted_dealer_keygen(&mut rng).unwrap();
        let messaging = [
            MessagingKeys::generate(&mut rng),
            MessagingKeys::generate(&mut rng),
            MessagingKeys::generate(&mut rng),
        ];
        Self {
            key_shares,
            messaging,
        }
    }

    /// Both peers' shares for `recipient`, sealed as they would arrive
    pub fn encrypted_shares_for(&self, recipient: PartyRole) -> Vec<DecryptableNShare> {
        let recipient_public = self.messaging[role_index(recipient)].public();
        PartyRole::all()
            .into_iter()
            .filter(|&role| role != recipient)
            .map(|sender| {
                let sender_keys = &self.messaging[role_index(sender)];
                DecryptableNShare {
                    n_share: encrypt_n_share(
                        &self.key_shares[role_index(sender)],
                        recipient,
                        &recipient_public,
                        sender_keys,
                    )
                    .unwrap(),
                    sender: sender_keys.public(),
                }
            })
            .collect()
    }

    /// The agreed wallet identity, derived independently of any combine call
    pub fn common_keychain(&self) -> CommonKeychain {
        let engine = LocalEngine::with_seed(0);
        let output = engine
            .key_combine(
                &self.key_shares[0].p_share,
                &self.peer_shares_for(PartyRole::User),
            )
            .unwrap();
        CommonKeychain::from_parts(&output.x_share.y, &output.x_share.chaincode).unwrap()
    }

    /// Signing material for `role`, bypassing the encrypted exchange
    pub fn signing_material(&self, role: PartyRole) -> SigningMaterial {
        let mut user_n_share = None;
        let mut backup_n_share = None;
        let mut cosigner_n_share = None;
        for peer in self.peer_shares_for(role) {
            match peer.j {
                PartyRole::User => user_n_share = Some(peer),
                PartyRole::Backup => backup_n_share = Some(peer),
                PartyRole::Cosigner => cosigner_n_share = Some(peer),
            }
        }
        SigningMaterial {
            p_share: self.key_shares[role_index(role)].p_share.clone(),
            cosigner_n_share: cosigner_n_share.unwrap(),
            user_n_share,
            backup_n_share,
        }
    }

    fn peer_shares_for(&self, recipient: PartyRole) -> Vec<NShare> {
        PartyRole::all()
            .into_iter()
            .filter(|&role| role != recipient)
            .map(|sender| {
                self.key_shares[role_index(sender)]
                    .n_share_for(recipient)
                    .unwrap()
                    .clone()
            })
            .collect()
    }
}

/// Deterministic stand-in for the cosigner side of a signing session.
///
/// Answers the user's posted K- and MU-shares with the A- and D-shares a
/// real cosigner would produce, and can verify the final assembled
/// signature against the wallet public key.
pub(crate) struct ScriptedCosigner {
    w: Scalar,
    k: Scalar,
    gamma: Scalar,
    omicron: Option<Scalar>,
}

impl ScriptedCosigner {
    pub fn new(fixture: &Fixture, seed: u64) -> Self {
        // Reconstruct the cosigner's combined secret share F(3)
        let cosigner = &fixture.key_shares[role_index(PartyRole::Cosigner)];
        let mut x = decode_scalar(&cosigner.p_share.u, "p share secret").unwrap();
        for peer in fixture.peer_shares_for(PartyRole::Cosigner) {
            x += decode_scalar(&peer.u, "n share secret").unwrap();
        }
        let w = lagrange_coefficient(PartyRole::Cosigner, PartyRole::User) * x;

        let mut rng = ChaCha20Rng::seed_from_u64(seed);
        Self {
            w,
            k: Scalar::random(&mut rng),
            gamma: Scalar::random(&mut rng),
            omicron: None,
        }
    }

    pub fn answer_k(&self, k_share: &crate::shares::KShare) -> AShare {
        let (their_k, _their_gamma_point) = split_nonce_payload(&k_share.k, "K share").unwrap();
        let gamma_point = ProjectivePoint::GENERATOR * self.gamma;
        AShare {
            i: PartyRole::User,
            j: PartyRole::Cosigner,
            k: join_nonce_payload(&self.k, &gamma_point),
            alpha: encode_scalar(&(their_k * self.gamma)),
            mu: encode_scalar(&(their_k * self.w)),
        }
    }

    pub fn answer_mu(&mut self, mu_share: &MuShare) -> DShare {
        let alpha = decode_scalar(&mu_share.alpha, "mu alpha").unwrap();
        let mu = decode_scalar(&mu_share.mu, "mu mu").unwrap();
        let delta = self.k * self.gamma + alpha;
        self.omicron = Some(self.k * self.w + mu);
        DShare {
            i: PartyRole::Cosigner,
            j: PartyRole::User,
            delta: encode_scalar(&delta),
            gamma_commitment: encode_point(&(ProjectivePoint::GENERATOR * self.gamma)),
        }
    }

    /// Add the cosigner's own signature share and verify the result
    pub fn verify_full_signature(&self, s_share: &SShare, digest: &[u8; 32]) -> bool {
        let Some(omicron) = self.omicron else {
            return false;
        };
        let r = decode_scalar(&s_share.r, "s share r").unwrap();
        let s_user = decode_scalar(&s_share.s, "s share s").unwrap();
        let m = <Scalar as Reduce<U256>>::reduce_bytes(&(*digest).into());
        let s = s_user + m * self.k + r * omicron;

        let Ok(signature) = EcdsaSignature::from_scalars(r.to_bytes(), s.to_bytes()) else {
            return false;
        };
        let signature = signature.normalize_s().unwrap_or(signature);
        let Ok(verifying_key) = VerifyingKey::from_sec1_bytes(&s_share.y) else {
            return false;
        };
        verifying_key.verify_prehash(digest, &signature).is_ok()
    }
}
