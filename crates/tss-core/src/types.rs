//! Core types shared across the signing protocol

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use subtle::ConstantTimeEq;

/// Length of a SEC1 compressed public key
pub const PUBLIC_KEY_LEN: usize = 33;

/// Length of a chaincode
pub const CHAINCODE_LEN: usize = 32;

/// One of the three fixed parties in the 2-of-3 scheme.
///
/// The numeric index is the wire representation and appears as the
/// `(i, j)` provenance pair on every exchanged share.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum PartyRole {
    /// Wallet owner, index 1
    User = 1,
    /// Offline recovery party, index 2
    Backup = 2,
    /// Always-online co-signing service, index 3
    Cosigner = 3,
}

impl PartyRole {
    /// Wire index of this role
    pub fn index(self) -> u8 {
        self as u8
    }

    /// Resolve a wire index into a role
    pub fn from_index(index: u8) -> Result<Self> {
        Self::try_from(index)
    }

    /// All roles in index order
    pub fn all() -> [PartyRole; 3] {
        [PartyRole::User, PartyRole::Backup, PartyRole::Cosigner]
    }
}

impl TryFrom<u8> for PartyRole {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            1 => Ok(PartyRole::User),
            2 => Ok(PartyRole::Backup),
            3 => Ok(PartyRole::Cosigner),
            other => Err(Error::ProtocolViolation(format!(
                "unknown party index: {other}"
            ))),
        }
    }
}

impl From<PartyRole> for u8 {
    fn from(role: PartyRole) -> u8 {
        role.index()
    }
}

impl fmt::Display for PartyRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PartyRole::User => "user",
            PartyRole::Backup => "backup",
            PartyRole::Cosigner => "cosigner",
        };
        write!(f, "{name} ({})", self.index())
    }
}

/// Externally verifiable wallet identity: the combined extended public key.
///
/// Hex concatenation of the compressed public key (33 bytes) and the
/// combined chaincode (32 bytes), 130 lowercase hex characters total.
/// Equality is constant-time.
#[derive(Clone, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommonKeychain(String);

impl CommonKeychain {
    /// Parse and validate a hex keychain string
    pub fn new(value: &str) -> Result<Self> {
        let bytes = hex::decode(value)
            .map_err(|e| Error::Deserialization(format!("invalid keychain hex: {e}")))?;
        if bytes.len() != PUBLIC_KEY_LEN + CHAINCODE_LEN {
            return Err(Error::Deserialization(format!(
                "invalid keychain length: {} bytes",
                bytes.len()
            )));
        }
        Ok(Self(value.to_lowercase()))
    }

    /// Build a keychain from a compressed public key and a chaincode
    pub fn from_parts(public_key: &[u8], chaincode: &[u8; CHAINCODE_LEN]) -> Result<Self> {
        if public_key.len() != PUBLIC_KEY_LEN {
            return Err(Error::Crypto(format!(
                "invalid public key length: {} bytes",
                public_key.len()
            )));
        }
        let mut hex_str = hex::encode(public_key);
        hex_str.push_str(&hex::encode(chaincode));
        Ok(Self(hex_str))
    }

    /// Hex string form
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Compressed public key component
    pub fn public_key(&self) -> Result<Vec<u8>> {
        hex::decode(&self.0[..PUBLIC_KEY_LEN * 2])
            .map_err(|e| Error::Deserialization(e.to_string()))
    }
}

impl PartialEq for CommonKeychain {
    fn eq(&self, other: &Self) -> bool {
        bool::from(self.0.as_bytes().ct_eq(other.0.as_bytes()))
    }
}

impl fmt::Display for CommonKeychain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for CommonKeychain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CommonKeychain({})", self.0)
    }
}

/// Polling parameters for the two wait points of a signing session
#[derive(Debug, Clone, Copy)]
pub struct SessionTimeouts {
    /// Delay between consecutive gateway polls
    pub poll_interval: Duration,
    /// Total deadline per awaited share
    pub share_timeout: Duration,
}

impl Default for SessionTimeouts {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            share_timeout: Duration::from_secs(60),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn party_role_round_trips_through_index() {
        for role in PartyRole::all() {
            assert_eq!(PartyRole::from_index(role.index()).unwrap(), role);
        }
    }

    #[test]
    fn unknown_party_index_is_rejected() {
        for bad in [0u8, 4, 255] {
            assert!(matches!(
                PartyRole::from_index(bad),
                Err(Error::ProtocolViolation(_))
            ));
        }
    }

    #[test]
    fn party_role_serializes_as_number() {
        let json = serde_json::to_string(&PartyRole::Cosigner).unwrap();
        assert_eq!(json, "3");
        let back: PartyRole = serde_json::from_str("1").unwrap();
        assert_eq!(back, PartyRole::User);
    }

    #[test]
    fn keychain_validates_length() {
        assert!(CommonKeychain::new("abcd").is_err());
        let keychain = CommonKeychain::from_parts(&[2u8; 33], &[7u8; 32]).unwrap();
        assert_eq!(keychain.as_str().len(), 130);
        assert_eq!(CommonKeychain::new(keychain.as_str()).unwrap(), keychain);
    }

    #[test]
    fn keychain_equality_is_exact() {
        let a = CommonKeychain::from_parts(&[2u8; 33], &[7u8; 32]).unwrap();
        let b = CommonKeychain::from_parts(&[2u8; 33], &[8u8; 32]).unwrap();
        assert_ne!(a, b);
    }
}
