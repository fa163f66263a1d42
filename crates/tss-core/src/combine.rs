//! Key combiner
//!
//! Merges a party's own key-generation share with the encrypted shares its
//! peers produced for it, verifies the derived wallet identity against an
//! independently agreed value, and yields the durable signing material.
//! Stateless and idempotent; the caller persists the result.

use crate::codec::{decrypt_n_share, DecryptableNShare};
use crate::engine::EcdsaEngine;
use crate::messaging::MessagingKeys;
use crate::shares::{CombinedKey, KeyShare, NShare, SigningMaterial, XShare, YShare};
use crate::types::{CommonKeychain, PartyRole};
use crate::{Error, Result};
use std::collections::BTreeMap;
use tracing::{debug, info, instrument};

/// Combine the local key share with the peers' encrypted shares.
///
/// The derived common keychain must equal `expected_common_keychain`
/// byte-for-byte; on mismatch nothing is returned and nothing must be
/// persisted.
#[instrument(skip_all, fields(party = %key_share.p_share.i))]
pub fn create_combined_key<E: EcdsaEngine>(
    engine: &E,
    key_share: &KeyShare,
    recipient_keys: &MessagingKeys,
    encrypted_shares: &[DecryptableNShare],
    expected_common_keychain: &CommonKeychain,
) -> Result<CombinedKey> {
    let local = key_share.p_share.i;

    let mut peers: BTreeMap<PartyRole, NShare> = BTreeMap::new();
    for decryptable in encrypted_shares {
        let n_share = decrypt_n_share(decryptable, recipient_keys)?;
        if n_share.i != local {
            return Err(Error::ProtocolViolation(format!(
                "NShare addressed to {} received by {local}",
                n_share.i
            )));
        }
        if n_share.j == local {
            return Err(Error::ProtocolViolation(format!(
                "NShare claims to originate from the local party {local}"
            )));
        }
        debug!(origin = %n_share.j, "accepted peer share");
        if peers.insert(n_share.j, n_share).is_some() {
            return Err(Error::ProtocolViolation(format!(
                "duplicate NShare from one origin for {local}"
            )));
        }
    }

    let cosigner_n_share = peers
        .get(&PartyRole::Cosigner)
        .cloned()
        .ok_or(Error::MissingCounterpartyShare(PartyRole::Cosigner))?;

    let peer_shares: Vec<NShare> = peers.values().cloned().collect();
    let output = engine.key_combine(&key_share.p_share, &peer_shares)?;
    let derived =
        CommonKeychain::from_parts(&output.x_share.y, &output.x_share.chaincode)?;

    if &derived != expected_common_keychain {
        return Err(Error::KeyMismatch {
            expected: expected_common_keychain.to_string(),
            derived: derived.to_string(),
        });
    }

    info!(common_keychain = %derived, "key combination complete");

    Ok(CombinedKey {
        signing_material: SigningMaterial {
            p_share: key_share.p_share.clone(),
            cosigner_n_share,
            user_n_share: peers.remove(&PartyRole::User),
            backup_n_share: peers.remove(&PartyRole::Backup),
        },
        common_keychain: derived,
    })
}

/// Reconstruct the per-session signing inputs from persisted material:
/// the combined local X-share and the Y-share describing the cosigner.
pub fn signing_shares<E: EcdsaEngine>(
    engine: &E,
    material: &SigningMaterial,
) -> Result<(XShare, YShare)> {
    let peer_shares = material.peer_shares();
    let output = engine.key_combine(&material.p_share, &peer_shares)?;
    let y_share = output
        .y_shares
        .get(&PartyRole::Cosigner)
        .cloned()
        .ok_or(Error::MissingCounterpartyShare(PartyRole::Cosigner))?;
    Ok((output.x_share, y_share))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::LocalEngine;
    use crate::testutil;

    #[test]
    fn combine_succeeds_and_echoes_the_keychain() {
        let fixture = testutil::Fixture::new(21);
        let engine = LocalEngine::with_seed(0);
        let expected = fixture.common_keychain();

        let combined = create_combined_key(
            &engine,
            &fixture.key_shares[0],
            &fixture.messaging[0],
            &fixture.encrypted_shares_for(PartyRole::User),
            &expected,
        )
        .unwrap();

        assert_eq!(combined.common_keychain, expected);
        assert_eq!(combined.signing_material.role(), PartyRole::User);
        assert!(combined.signing_material.backup_n_share.is_some());
        assert!(combined.signing_material.user_n_share.is_none());
    }

    #[test]
    fn tampered_ciphertext_fails_as_decryption_not_mismatch() {
        let fixture = testutil::Fixture::new(22);
        let engine = LocalEngine::with_seed(0);
        let expected = fixture.common_keychain();

        let mut shares = fixture.encrypted_shares_for(PartyRole::User);
        shares[0]
            .n_share
            .encrypted_private_share
            .ciphertext[0] ^= 0xff;

        let err = create_combined_key(
            &engine,
            &fixture.key_shares[0],
            &fixture.messaging[0],
            &shares,
            &expected,
        )
        .unwrap_err();
        assert!(matches!(err, Error::ShareDecryption(_)), "{err}");
    }

    #[test]
    fn wrong_expected_keychain_fails_with_mismatch() {
        let fixture = testutil::Fixture::new(23);
        let engine = LocalEngine::with_seed(0);
        let wrong = CommonKeychain::from_parts(&[2u8; 33], &[0u8; 32]).unwrap();

        let err = create_combined_key(
            &engine,
            &fixture.key_shares[0],
            &fixture.messaging[0],
            &fixture.encrypted_shares_for(PartyRole::User),
            &wrong,
        )
        .unwrap_err();
        assert!(matches!(err, Error::KeyMismatch { .. }), "{err}");
    }

    #[test]
    fn missing_cosigner_share_is_fatal() {
        let fixture = testutil::Fixture::new(24);
        let engine = LocalEngine::with_seed(0);
        let expected = fixture.common_keychain();

        // Only the backup's share arrives.
        let shares: Vec<DecryptableNShare> = fixture
            .encrypted_shares_for(PartyRole::User)
            .into_iter()
            .filter(|share| share.n_share.j == PartyRole::Backup)
            .collect();

        let err = create_combined_key(
            &engine,
            &fixture.key_shares[0],
            &fixture.messaging[0],
            &shares,
            &expected,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            Error::MissingCounterpartyShare(PartyRole::Cosigner)
        ));
    }

    #[test]
    fn duplicate_origin_is_a_violation() {
        let fixture = testutil::Fixture::new(25);
        let engine = LocalEngine::with_seed(0);
        let expected = fixture.common_keychain();

        let mut shares = fixture.encrypted_shares_for(PartyRole::User);
        let dup = shares
            .iter()
            .find(|share| share.n_share.j == PartyRole::Cosigner)
            .cloned()
            .unwrap();
        shares.push(dup);

        let err = create_combined_key(
            &engine,
            &fixture.key_shares[0],
            &fixture.messaging[0],
            &shares,
            &expected,
        )
        .unwrap_err();
        assert!(matches!(err, Error::ProtocolViolation(_)), "{err}");
    }

    #[test]
    fn misaddressed_share_is_a_violation() {
        let fixture = testutil::Fixture::new(26);
        let engine = LocalEngine::with_seed(0);
        let expected = fixture.common_keychain();

        // Hand the user a share that was sealed for the backup.
        let shares = fixture.encrypted_shares_for(PartyRole::Backup);
        let err = create_combined_key(
            &engine,
            &fixture.key_shares[0],
            &fixture.messaging[0],
            &shares,
            &expected,
        )
        .unwrap_err();
        // Sealed to a different recipient, so it fails at the envelope.
        assert!(matches!(err, Error::ShareDecryption(_)), "{err}");
    }

    #[test]
    fn user_and_backup_derive_identical_keychains() {
        let fixture = testutil::Fixture::new(27);
        let engine = LocalEngine::with_seed(0);
        let expected = fixture.common_keychain();

        let user = create_combined_key(
            &engine,
            &fixture.key_shares[0],
            &fixture.messaging[0],
            &fixture.encrypted_shares_for(PartyRole::User),
            &expected,
        )
        .unwrap();
        let backup = create_combined_key(
            &engine,
            &fixture.key_shares[1],
            &fixture.messaging[1],
            &fixture.encrypted_shares_for(PartyRole::Backup),
            &expected,
        )
        .unwrap();

        assert_eq!(user.common_keychain, backup.common_keychain);
    }

    #[test]
    fn combine_is_idempotent_byte_for_byte() {
        let fixture = testutil::Fixture::new(28);
        let engine = LocalEngine::with_seed(0);
        let expected = fixture.common_keychain();
        let shares = fixture.encrypted_shares_for(PartyRole::User);

        let first = create_combined_key(
            &engine,
            &fixture.key_shares[0],
            &fixture.messaging[0],
            &shares,
            &expected,
        )
        .unwrap();
        let second = create_combined_key(
            &engine,
            &fixture.key_shares[0],
            &fixture.messaging[0],
            &shares,
            &expected,
        )
        .unwrap();

        assert_eq!(
            serde_json::to_vec(&first).unwrap(),
            serde_json::to_vec(&second).unwrap()
        );
    }

    #[test]
    fn signing_shares_reconstruct_the_session_inputs() {
        let fixture = testutil::Fixture::new(29);
        let engine = LocalEngine::with_seed(0);
        let material = fixture.signing_material(PartyRole::User);

        let (x_share, y_share) = signing_shares(&engine, &material).unwrap();
        assert_eq!(x_share.i, PartyRole::User);
        assert_eq!(y_share.j, PartyRole::Cosigner);
        assert_eq!(
            CommonKeychain::from_parts(&x_share.y, &x_share.chaincode).unwrap(),
            fixture.common_keychain()
        );
    }
}
