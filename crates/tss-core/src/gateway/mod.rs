//! Transaction-request gateway seam
//!
//! The coordinator holds one [`TxRequest`] per transaction and accumulates
//! the shares each party posts against it. This core only ever talks to it
//! through the [`TxRequestGateway`] trait; implementations must tolerate
//! multiplexed concurrent sessions.

use crate::shares::{AShare, DShare, KShare, MuShare, SShare};
use crate::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

pub use ::async_trait::async_trait;

/// A share posted against a transaction request.
///
/// Closed union: the gateway accepts exactly these three kinds, matched
/// exhaustively at the boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SessionShare {
    #[serde(rename = "kShare")]
    K(KShare),
    #[serde(rename = "muShare")]
    Mu(MuShare),
    #[serde(rename = "sShare")]
    S(SShare),
}

impl SessionShare {
    /// Kind tag, for logging and duplicate detection
    pub fn kind(&self) -> SessionShareKind {
        match self {
            SessionShare::K(_) => SessionShareKind::K,
            SessionShare::Mu(_) => SessionShareKind::Mu,
            SessionShare::S(_) => SessionShareKind::S,
        }
    }
}

/// Kind tag of a [`SessionShare`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionShareKind {
    K,
    Mu,
    S,
}

impl fmt::Display for SessionShareKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionShareKind::K => "kShare",
            SessionShareKind::Mu => "muShare",
            SessionShareKind::S => "sShare",
        };
        f.write_str(name)
    }
}

/// Coordinator-held record for one transaction.
///
/// A missing share field means "not yet produced".
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxRequest {
    pub tx_request_id: String,
    pub wallet_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub a_share: Option<AShare>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub d_share: Option<DShare>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Gateway to the coordinator's transaction-request API
#[async_trait]
pub trait TxRequestGateway: Send + Sync {
    /// Read the latest state of a transaction request.
    ///
    /// An unknown id is [`crate::Error::UnknownTxRequest`].
    async fn fetch_tx_request(&self, wallet_id: &str, tx_request_id: &str) -> Result<TxRequest>;

    /// Post a share against a transaction request.
    ///
    /// Idempotent per kind: posting the same kind twice is a caller error.
    async fn post_share(
        &self,
        wallet_id: &str,
        tx_request_id: &str,
        share: SessionShare,
    ) -> Result<()>;
}

/// In-memory gateway for testing
pub mod memory;

pub use memory::MemoryGateway;
