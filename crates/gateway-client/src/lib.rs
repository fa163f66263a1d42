//! Gateway Client
//!
//! HTTP implementation of the transaction-request gateway seam. Talks to
//! the coordinating wallet service that relays signature shares between
//! the parties.

use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, instrument};
use tss_core::gateway::async_trait;
use tss_core::{Error, Result, SessionShare, TxRequest, TxRequestGateway};

/// HTTP-based transaction-request gateway
pub struct HttpGateway {
    client: Client,
    /// Gateway base URL, without a trailing slash
    url: String,
    /// Bearer token attached to every request, if any
    access_token: Option<String>,
    /// Request timeout
    timeout: Duration,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TxRequestListResponse {
    tx_requests: Vec<TxRequest>,
}

impl HttpGateway {
    /// Create a new gateway client
    pub fn new(url: &str) -> Self {
        Self {
            client: Client::new(),
            url: url.trim_end_matches('/').to_string(),
            access_token: None,
            timeout: Duration::from_secs(30),
        }
    }

    /// Set request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Authenticate requests with a bearer token
    pub fn with_access_token(mut self, token: &str) -> Self {
        self.access_token = Some(token.to_string());
        self
    }

    fn request(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let builder = builder.timeout(self.timeout);
        match &self.access_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }
}

#[async_trait]
impl TxRequestGateway for HttpGateway {
    #[instrument(skip(self))]
    async fn fetch_tx_request(&self, wallet_id: &str, tx_request_id: &str) -> Result<TxRequest> {
        let response = self
            .request(self.client.get(format!(
                "{}/api/v2/wallet/{}/txrequests",
                self.url, wallet_id
            )))
            .query(&[("txRequestIds", tx_request_id), ("latest", "true")])
            .send()
            .await
            .map_err(|e| Error::Gateway(e.to_string()))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(Error::UnknownTxRequest(tx_request_id.to_string()));
        }
        if !response.status().is_success() {
            return Err(Error::Gateway(format!(
                "GET txrequests failed with status: {}",
                response.status()
            )));
        }

        let list: TxRequestListResponse = response
            .json()
            .await
            .map_err(|e| Error::Gateway(e.to_string()))?;

        let request = list
            .tx_requests
            .into_iter()
            .find(|request| request.tx_request_id == tx_request_id)
            .ok_or_else(|| Error::UnknownTxRequest(tx_request_id.to_string()))?;

        debug!(has_a_share = request.a_share.is_some(), has_d_share = request.d_share.is_some(), "transaction request fetched");
        Ok(request)
    }

    #[instrument(skip(self, share), fields(kind = %share.kind()))]
    async fn post_share(
        &self,
        wallet_id: &str,
        tx_request_id: &str,
        share: SessionShare,
    ) -> Result<()> {
        let response = self
            .request(self.client.post(format!(
                "{}/api/v2/wallet/{}/txrequests/{}/signatureshares",
                self.url, wallet_id, tx_request_id
            )))
            .json(&share)
            .send()
            .await
            .map_err(|e| Error::Gateway(e.to_string()))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(Error::UnknownTxRequest(tx_request_id.to_string()));
        }
        if !response.status().is_success() {
            return Err(Error::Gateway(format!(
                "POST signatureshares failed with status: {}",
                response.status()
            )));
        }

        debug!("signature share posted");
        Ok(())
    }
}
