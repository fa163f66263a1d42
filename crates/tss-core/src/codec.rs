//! Wire codec for exchanged key-generation shares
//!
//! An NShare travels as a public part (`y ‖ chaincode ‖ n`, hex) plus the
//! secret `u` under the signed messaging envelope. Decoding is strict: a
//! truncated or malformed public part is rejected before any use.

use crate::messaging::{
    decrypt_and_verify, encrypt_and_sign, MessagingKeys, MessagingPublicKeys, SealedMessage,
};
use crate::shares::{KeyShare, NShare};
use crate::types::{PartyRole, CHAINCODE_LEN, PUBLIC_KEY_LEN};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// An NShare prepared for transport to one recipient
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptedNShare {
    pub i: PartyRole,
    pub j: PartyRole,
    /// Hex of `y ‖ chaincode ‖ n`
    pub public_share: String,
    /// Secret `u`, sealed to the recipient and signed by the sender
    pub encrypted_private_share: SealedMessage,
}

/// An encrypted share together with the claimed sender's public keys
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecryptableNShare {
    pub n_share: EncryptedNShare,
    pub sender: MessagingPublicKeys,
}

/// Encrypt the NShare a party holds for `recipient`
pub fn encrypt_n_share(
    key_share: &KeyShare,
    recipient: PartyRole,
    recipient_keys: &MessagingPublicKeys,
    sender_keys: &MessagingKeys,
) -> Result<EncryptedNShare> {
    let n_share = key_share.n_share_for(recipient)?;

    let mut public_share = hex::encode(&n_share.y);
    public_share.push_str(&hex::encode(n_share.chaincode));
    public_share.push_str(&hex::encode(&n_share.n));

    let encrypted_private_share = encrypt_and_sign(&n_share.u, recipient_keys, sender_keys)?;

    Ok(EncryptedNShare {
        i: n_share.i,
        j: n_share.j,
        public_share,
        encrypted_private_share,
    })
}

/// Open and decode a received NShare, verifying it against the claimed sender
pub fn decrypt_n_share(
    decryptable: &DecryptableNShare,
    recipient_keys: &MessagingKeys,
) -> Result<NShare> {
    let share = &decryptable.n_share;
    let u = decrypt_and_verify(
        &share.encrypted_private_share,
        &decryptable.sender,
        recipient_keys,
    )?;

    let (y, chaincode, n) = split_public_share(&share.public_share)?;

    Ok(NShare {
        i: share.i,
        j: share.j,
        y,
        u,
        n,
        chaincode,
    })
}

/// Split a public share into its `y`, chaincode and modulus components
fn split_public_share(public_share: &str) -> Result<(Vec<u8>, [u8; CHAINCODE_LEN], Vec<u8>)> {
    let bytes = hex::decode(public_share)
        .map_err(|e| Error::Deserialization(format!("invalid public share hex: {e}")))?;
    if bytes.len() <= PUBLIC_KEY_LEN + CHAINCODE_LEN {
        return Err(Error::Deserialization(format!(
            "public share too short: {} bytes",
            bytes.len()
        )));
    }

    let y = bytes[..PUBLIC_KEY_LEN].to_vec();
    if y[0] != 0x02 && y[0] != 0x03 {
        return Err(Error::Deserialization(format!(
            "invalid compressed point prefix: {:#04x}",
            y[0]
        )));
    }

    let chaincode: [u8; CHAINCODE_LEN] = bytes[PUBLIC_KEY_LEN..PUBLIC_KEY_LEN + CHAINCODE_LEN]
        .try_into()
        .map_err(|_| Error::Deserialization("invalid chaincode length".into()))?;
    let n = bytes[PUBLIC_KEY_LEN + CHAINCODE_LEN..].to_vec();

    Ok((y, chaincode, n))
}
