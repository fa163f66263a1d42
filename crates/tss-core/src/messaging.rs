//! Encrypt-and-sign envelope for key-generation shares
//!
//! Development-grade implementation of the messaging collaborator: the
//! plaintext is signed with ed25519, then sealed to the recipient with
//! ephemeral-static x25519 agreement, a blake3-derived key and
//! ChaCha20-Poly1305. Round shares do not use this envelope; they travel
//! over the already-authenticated gateway channel.

use crate::{Error, Result};
use aead::{Aead, KeyInit};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use x25519_dalek::{PublicKey, StaticSecret};
use zeroize::{Zeroize, ZeroizeOnDrop};

const KDF_CONTEXT: &str = "tss-core n-share envelope v1";
const SIGNATURE_LEN: usize = 64;

/// A party's long-term messaging key pair (signing + key agreement)
#[derive(Clone, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct MessagingKeys {
    #[serde(with = "hex::serde")]
    signing: [u8; 32],
    #[serde(with = "hex::serde")]
    agreement: [u8; 32],
}

/// Public half of [`MessagingKeys`], safe to share
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessagingPublicKeys {
    #[serde(with = "hex::serde")]
    pub verifying: [u8; 32],
    #[serde(with = "hex::serde")]
    pub agreement: [u8; 32],
}

impl MessagingKeys {
    /// Generate a fresh key pair
    pub fn generate<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        let mut signing = [0u8; 32];
        let mut agreement = [0u8; 32];
        rng.fill_bytes(&mut signing);
        rng.fill_bytes(&mut agreement);
        Self { signing, agreement }
    }

    /// Public half of this key pair
    pub fn public(&self) -> MessagingPublicKeys {
        let signing = SigningKey::from_bytes(&self.signing);
        let agreement = StaticSecret::from(self.agreement);
        MessagingPublicKeys {
            verifying: signing.verifying_key().to_bytes(),
            agreement: PublicKey::from(&agreement).to_bytes(),
        }
    }
}

/// Sealed and signed payload, safe to relay through untrusted parties
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SealedMessage {
    #[serde(with = "hex::serde")]
    pub ephemeral_public: [u8; 32],
    #[serde(with = "hex::serde")]
    pub nonce: [u8; 12],
    #[serde(with = "base64_bytes")]
    pub ciphertext: Vec<u8>,
}

mod base64_bytes {
    use base64::{engine::general_purpose::STANDARD, Engine};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD.decode(&encoded).map_err(serde::de::Error::custom)
    }
}

fn derive_envelope_key(
    shared_secret: &[u8; 32],
    ephemeral_public: &[u8; 32],
    recipient_agreement: &[u8; 32],
) -> [u8; 32] {
    let mut material = Vec::with_capacity(96);
    material.extend_from_slice(shared_secret);
    material.extend_from_slice(ephemeral_public);
    material.extend_from_slice(recipient_agreement);
    let key = blake3::derive_key(KDF_CONTEXT, &material);
    material.zeroize();
    key
}

/// Sign `plaintext` as the sender and seal it to the recipient
pub fn encrypt_and_sign(
    plaintext: &[u8],
    recipient: &MessagingPublicKeys,
    sender: &MessagingKeys,
) -> Result<SealedMessage> {
    let signing = SigningKey::from_bytes(&sender.signing);
    let signature = signing.sign(plaintext);

    let mut payload = Vec::with_capacity(SIGNATURE_LEN + plaintext.len());
    payload.extend_from_slice(&signature.to_bytes());
    payload.extend_from_slice(plaintext);

    let ephemeral = StaticSecret::from(rand::random::<[u8; 32]>());
    let ephemeral_public = PublicKey::from(&ephemeral).to_bytes();
    let shared = ephemeral.diffie_hellman(&PublicKey::from(recipient.agreement));
    let key = derive_envelope_key(shared.as_bytes(), &ephemeral_public, &recipient.agreement);

    let nonce: [u8; 12] = rand::random();
    let cipher = ChaCha20Poly1305::new(Key::from_slice(&key));
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce), payload.as_slice())
        .map_err(|_| Error::Crypto("envelope encryption failed".into()))?;
    payload.zeroize();

    Ok(SealedMessage {
        ephemeral_public,
        nonce,
        ciphertext,
    })
}

/// Open a sealed message and verify it against the claimed sender.
///
/// Tampering, a wrong recipient key and a wrong sender key are all
/// reported as [`Error::ShareDecryption`]; the taxonomy does not
/// distinguish them.
pub fn decrypt_and_verify(
    sealed: &SealedMessage,
    sender: &MessagingPublicKeys,
    recipient: &MessagingKeys,
) -> Result<Vec<u8>> {
    let agreement = StaticSecret::from(recipient.agreement);
    let shared = agreement.diffie_hellman(&PublicKey::from(sealed.ephemeral_public));
    let key = derive_envelope_key(
        shared.as_bytes(),
        &sealed.ephemeral_public,
        &recipient.public().agreement,
    );

    let cipher = ChaCha20Poly1305::new(Key::from_slice(&key));
    let payload = cipher
        .decrypt(Nonce::from_slice(&sealed.nonce), sealed.ciphertext.as_slice())
        .map_err(|_| Error::ShareDecryption("ciphertext failed to authenticate".into()))?;

    if payload.len() < SIGNATURE_LEN {
        return Err(Error::ShareDecryption("payload too short".into()));
    }
    let signature_bytes: [u8; SIGNATURE_LEN] = payload[..SIGNATURE_LEN]
        .try_into()
        .map_err(|_| Error::ShareDecryption("malformed signature".into()))?;
    let signature = Signature::from_bytes(&signature_bytes);
    let plaintext = payload[SIGNATURE_LEN..].to_vec();

    let verifying = VerifyingKey::from_bytes(&sender.verifying)
        .map_err(|_| Error::ShareDecryption("invalid sender verifying key".into()))?;
    verifying
        .verify(&plaintext, &signature)
        .map_err(|_| Error::ShareDecryption("sender signature verification failed".into()))?;

    Ok(plaintext)
}
