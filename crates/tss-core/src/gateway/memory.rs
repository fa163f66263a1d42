//! In-memory gateway implementation for testing
//!
//! Stands in for the coordinator: holds transaction requests, records
//! posted shares and lets tests script the counterpart's A- and D-shares.

use super::{async_trait, SessionShare, TxRequest, TxRequestGateway};
use crate::shares::{AShare, DShare};
use crate::{Error, Result};
use chrono::Utc;
use dashmap::DashMap;
use uuid::Uuid;

type RequestKey = (String, String);

/// In-memory transaction-request store
#[derive(Default)]
pub struct MemoryGateway {
    requests: DashMap<RequestKey, TxRequest>,
    posted: DashMap<RequestKey, Vec<SessionShare>>,
}

impl MemoryGateway {
    /// Create an empty gateway
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a fresh transaction request and return its id
    pub fn create_tx_request(&self, wallet_id: &str) -> String {
        let tx_request_id = Uuid::new_v4().to_string();
        let now = Utc::now();
        self.requests.insert(
            (wallet_id.to_string(), tx_request_id.clone()),
            TxRequest {
                tx_request_id: tx_request_id.clone(),
                wallet_id: wallet_id.to_string(),
                a_share: None,
                d_share: None,
                created_at: now,
                updated_at: now,
            },
        );
        tx_request_id
    }

    /// Script the counterpart's A-share
    pub fn set_a_share(&self, wallet_id: &str, tx_request_id: &str, a_share: AShare) {
        if let Some(mut request) = self
            .requests
            .get_mut(&(wallet_id.to_string(), tx_request_id.to_string()))
        {
            request.a_share = Some(a_share);
            request.updated_at = Utc::now();
        }
    }

    /// Script the counterpart's D-share
    pub fn set_d_share(&self, wallet_id: &str, tx_request_id: &str, d_share: DShare) {
        if let Some(mut request) = self
            .requests
            .get_mut(&(wallet_id.to_string(), tx_request_id.to_string()))
        {
            request.d_share = Some(d_share);
            request.updated_at = Utc::now();
        }
    }

    /// Shares posted so far against a transaction request
    pub fn posted_shares(&self, wallet_id: &str, tx_request_id: &str) -> Vec<SessionShare> {
        self.posted
            .get(&(wallet_id.to_string(), tx_request_id.to_string()))
            .map(|shares| shares.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl TxRequestGateway for MemoryGateway {
    async fn fetch_tx_request(&self, wallet_id: &str, tx_request_id: &str) -> Result<TxRequest> {
        self.requests
            .get(&(wallet_id.to_string(), tx_request_id.to_string()))
            .map(|request| request.clone())
            .ok_or_else(|| Error::UnknownTxRequest(tx_request_id.to_string()))
    }

    async fn post_share(
        &self,
        wallet_id: &str,
        tx_request_id: &str,
        share: SessionShare,
    ) -> Result<()> {
        let key = (wallet_id.to_string(), tx_request_id.to_string());
        if !self.requests.contains_key(&key) {
            return Err(Error::UnknownTxRequest(tx_request_id.to_string()));
        }

        let mut posted = self.posted.entry(key).or_default();
        let kind = share.kind();
        if posted.iter().any(|existing| existing.kind() == kind) {
            return Err(Error::ProtocolViolation(format!(
                "{kind} already posted to transaction request {tx_request_id}"
            )));
        }
        posted.push(share);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shares::SShare;
    use crate::types::PartyRole;

    fn sample_s_share() -> SShare {
        SShare {
            i: PartyRole::Cosigner,
            r: vec![1u8; 32],
            s: vec![2u8; 32],
            y: vec![3u8; 33],
        }
    }

    #[tokio::test]
    async fn unknown_tx_request_is_reported() {
        let gateway = MemoryGateway::new();
        assert!(matches!(
            gateway.fetch_tx_request("w", "missing").await,
            Err(Error::UnknownTxRequest(_))
        ));
        assert!(matches!(
            gateway
                .post_share("w", "missing", SessionShare::S(sample_s_share()))
                .await,
            Err(Error::UnknownTxRequest(_))
        ));
    }

    #[tokio::test]
    async fn duplicate_kind_is_rejected() {
        let gateway = MemoryGateway::new();
        let id = gateway.create_tx_request("w");

        gateway
            .post_share("w", &id, SessionShare::S(sample_s_share()))
            .await
            .unwrap();
        let err = gateway
            .post_share("w", &id, SessionShare::S(sample_s_share()))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ProtocolViolation(_)));
        assert_eq!(gateway.posted_shares("w", &id).len(), 1);
    }

    #[tokio::test]
    async fn scripted_shares_become_visible() {
        let gateway = MemoryGateway::new();
        let id = gateway.create_tx_request("w");

        let before = gateway.fetch_tx_request("w", &id).await.unwrap();
        assert!(before.a_share.is_none());

        gateway.set_a_share(
            "w",
            &id,
            AShare {
                i: PartyRole::User,
                j: PartyRole::Cosigner,
                k: vec![0u8; 65],
                alpha: vec![1u8; 32],
                mu: vec![2u8; 32],
            },
        );
        let after = gateway.fetch_tx_request("w", &id).await.unwrap();
        assert!(after.a_share.is_some());
        assert!(after.updated_at >= before.updated_at);
    }
}
